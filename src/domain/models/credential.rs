use std::fmt;

use serde::{Deserialize, Serialize};

/// Value object representing a hashed password
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Create a new HashedPassword from an already hashed string
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// Get the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(..)")
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::models::avatar::StorageRef;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome of the location step. Coordinates exist only when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationGrant {
    #[default]
    Disabled,
    Enabled(Coordinates),
}

impl LocationGrant {
    pub fn from_coordinates(coordinates: Option<Coordinates>) -> Self {
        coordinates.map_or(LocationGrant::Disabled, LocationGrant::Enabled)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LocationGrant::Enabled(_))
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            LocationGrant::Enabled(coordinates) => Some(*coordinates),
            LocationGrant::Disabled => None,
        }
    }
}

/// What the user picked on the location screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationChoice {
    UseLocation,
    Skip,
}

/// Registration data accumulated across the wizard steps.
///
/// Each `with_*` method touches only the fields its step owns.
#[derive(Clone, Default, PartialEq)]
pub struct RegistrationDraft {
    full_name: String,
    email: String,
    password: String,
    location: LocationGrant,
    avatar_ref: Option<StorageRef>,
}

impl RegistrationDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_basic_info(mut self, full_name: String, email: String) -> Self {
        self.full_name = full_name;
        self.email = email;
        self
    }

    pub fn with_password(mut self, password: String) -> Self {
        self.password = password;
        self
    }

    pub fn with_location(mut self, location: LocationGrant) -> Self {
        self.location = location;
        self
    }

    pub fn with_avatar(mut self, avatar_ref: Option<StorageRef>) -> Self {
        self.avatar_ref = avatar_ref;
        self
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn password(&self) -> &str {
        &self.password
    }
    pub fn location(&self) -> LocationGrant {
        self.location
    }
    pub fn location_enabled(&self) -> bool {
        self.location.is_enabled()
    }
    pub fn latitude(&self) -> Option<f64> {
        self.location.coordinates().map(|c| c.latitude)
    }
    pub fn longitude(&self) -> Option<f64> {
        self.location.coordinates().map(|c| c.longitude)
    }
    pub fn avatar_ref(&self) -> Option<&StorageRef> {
        self.avatar_ref.as_ref()
    }
}

impl fmt::Debug for RegistrationDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDraft")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("password_set", &!self.password.is_empty())
            .field("location", &self.location)
            .field("avatar_ref", &self.avatar_ref)
            .finish()
    }
}

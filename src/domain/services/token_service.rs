use chrono::{DateTime, Utc};

use crate::domain::{
    error::DomainError,
    models::user::{Profile, UserId},
};

pub type Token = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: Token,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: UserId,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

pub trait TokenGenerator: Clone + Send + Sync {
    fn generate(&self, profile: &Profile) -> Result<IssuedToken, DomainError>;

    fn verify(&self, token: &str) -> Result<VerifiedToken, DomainError>;
}

use thiserror::Error;

use crate::domain::models::user::UserId;

/// Input errors raised at a step boundary. Shown next to the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your name")]
    EmptyName,

    #[error("Please use your {institution} email")]
    WrongDomain { institution: String },

    #[error("Password must be at least 8 characters long")]
    TooShort,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one number")]
    MissingDigit,

    #[error("Passwords do not match")]
    Mismatch,
}

impl ValidationError {
    /// Form field the message belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyName => "full_name",
            ValidationError::WrongDomain { .. } => "email",
            ValidationError::TooShort
            | ValidationError::MissingLowercase
            | ValidationError::MissingUppercase
            | ValidationError::MissingDigit => "password",
            ValidationError::Mismatch => "confirm_password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("No user logged in")]
    NotSignedIn,

    #[error("Session expired")]
    SessionExpired,

    #[error("User not found")]
    UserNotFound,

    #[error("Authentication provider timed out")]
    Timeout,

    #[error("{0}")]
    Provider(String),
}

impl AuthError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate => AuthError::UserAlreadyExists,
            RepositoryError::NotFound => AuthError::UserNotFound,
            RepositoryError::DatabaseError(msg) => AuthError::Provider(msg),
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Repository(inner) => inner.into(),
            DomainError::InvalidCredentials => AuthError::InvalidCredentials,
            DomainError::TokenExpired => AuthError::SessionExpired,
            DomainError::Hashing(msg) | DomainError::Token(msg) => AuthError::Provider(msg),
        }
    }
}

/// Avatar storage failures. Never fatal to the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Image is empty")]
    Empty,

    #[error("Image is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Invalid or expired signature")]
    InvalidSignature,

    #[error("Object not found")]
    NotFound,

    #[error("Upload timed out")]
    Timeout,

    #[error("Storage error: {0}")]
    Io(String),
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => UploadError::NotFound,
            _ => UploadError::Io(err.to_string()),
        }
    }
}

/// Geolocation outcomes other than a grant. Treated as "declined".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Location permission denied")]
    Denied,

    #[error("Geolocation is not supported")]
    Unavailable,

    #[error("Geolocation request timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Profile {0} not found")]
pub struct NotFoundError(pub UserId);

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Not found")]
    NotFound,

    #[error("Duplicate email")]
    Duplicate,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

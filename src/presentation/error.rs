use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::{
    domain::error::{AuthError, UploadError, ValidationError},
    usecase::{dashboard_usecase::ProfileError, wizard_usecase::WizardError},
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Wizard(#[from] WizardError),

    /// Registration failed after the avatar upload had already been dropped.
    #[error("{source}")]
    RegistrationFailed {
        source: WizardError,
        upload_warning: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("{0}")]
    LoginFailed(String),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Wizard not found")]
    WizardNotFound,

    #[error("Too many sign-ups in progress, try again later")]
    TooManyWizards,
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Validation(err) => ApiError::Validation(err),
            ProfileError::Auth(err) => ApiError::Auth(err),
        }
    }
}

/// json body for every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_warning: Option<String>,
}

fn wizard_status(err: &WizardError) -> StatusCode {
    match err {
        WizardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WizardError::Auth(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::CONFLICT,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Wizard(err) | ApiError::RegistrationFailed { source: err, .. } => {
                wizard_status(err)
            }
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Auth(
                AuthError::InvalidCredentials | AuthError::NotSignedIn | AuthError::SessionExpired,
            )
            | ApiError::LoginFailed(_)
            | ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::UserAlreadyExists) => StatusCode::CONFLICT,
            ApiError::Auth(AuthError::UserNotFound) | ApiError::WizardNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Auth(AuthError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Auth(AuthError::Provider(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Upload(UploadError::InvalidSignature) => StatusCode::FORBIDDEN,
            ApiError::Upload(UploadError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Upload(UploadError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::TooManyWizards => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn field(&self) -> Option<String> {
        match self {
            ApiError::Wizard(WizardError::Validation(err)) | ApiError::Validation(err) => {
                Some(err.field().to_string())
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            field: self.field(),
            upload_warning: match &self {
                ApiError::RegistrationFailed { upload_warning, .. } => Some(upload_warning.clone()),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

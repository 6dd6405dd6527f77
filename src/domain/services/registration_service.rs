use async_trait::async_trait;

use crate::domain::{
    error::AuthError,
    models::{draft::RegistrationDraft, user::UserId},
};

/// Account creation at the end of the wizard.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    async fn submit_registration(&self, draft: &RegistrationDraft) -> Result<UserId, AuthError>;
}

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    error::{AuthError, ValidationError},
    models::user::{Profile, ProfileUpdate},
    services::{auth_service::AuthService, avatar_storage::AvatarStorage},
    validation::validate_full_name,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug)]
pub struct DashboardView {
    pub profile: Profile,
    /// Absent when the user has no avatar or signing failed.
    pub avatar_url: Option<String>,
}

pub struct DashboardUsecase<A: AuthService, S: AvatarStorage> {
    auth: A,
    storage: S,
    signed_url_ttl: Duration,
}

impl<A: AuthService, S: AvatarStorage> DashboardUsecase<A, S> {
    pub fn new(auth: A, storage: S, signed_url_ttl: Duration) -> Self {
        Self {
            auth,
            storage,
            signed_url_ttl,
        }
    }

    pub async fn load(&self, token: &str) -> Result<DashboardView, AuthError> {
        let session = self.auth.authenticate(token).await?;
        let profile = self
            .auth
            .fetch_profile(session.user_id)
            .await
            .map_err(|_| AuthError::UserNotFound)?;
        let avatar_url = self.avatar_url(&profile).await;
        Ok(DashboardView {
            profile,
            avatar_url,
        })
    }

    pub async fn update_profile(
        &self,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<DashboardView, ProfileError> {
        let session = self.auth.authenticate(token).await?;
        if let Some(full_name) = &update.full_name {
            validate_full_name(full_name)
                .inspect_err(|err| debug!(field = err.field(), "profile update rejected"))?;
        }
        let profile = self.auth.update_profile(session.user_id, update).await?;
        let avatar_url = self.avatar_url(&profile).await;
        Ok(DashboardView {
            profile,
            avatar_url,
        })
    }

    async fn avatar_url(&self, profile: &Profile) -> Option<String> {
        let avatar = profile.avatar_ref()?;
        match self.storage.signed_url(avatar, self.signed_url_ttl).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(error = %err, %avatar, "could not sign avatar url");
                None
            }
        }
    }
}

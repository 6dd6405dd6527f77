use async_trait::async_trait;

use crate::domain::{
    error::{AuthError, NotFoundError},
    models::user::{Profile, ProfileUpdate, Session, UserId},
};

/// Session and profile access for the dashboard.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;

    /// Resolve a bearer token to its session.
    async fn authenticate(&self, token: &str) -> Result<Session, AuthError>;

    async fn fetch_profile(&self, user_id: UserId) -> Result<Profile, NotFoundError>;

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<Profile, AuthError>;
}

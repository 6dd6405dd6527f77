use async_trait::async_trait;

use crate::domain::{
    error::RepositoryError,
    models::user::{NewUser, Profile, ProfileUpdate, UserId, UserRecord},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `RepositoryError::Duplicate` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<Profile, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<Profile>, RepositoryError>;
    async fn update(&self, id: UserId, update: ProfileUpdate) -> Result<Profile, RepositoryError>;
}

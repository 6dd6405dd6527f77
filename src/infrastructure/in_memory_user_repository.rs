use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{
    error::RepositoryError,
    models::user::{NewUser, Profile, ProfileUpdate, UserId, UserRecord},
    repositories::user_repository::UserRepository,
};

/// Process-local user store. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<Profile, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|r| r.profile.email() == user.email) {
            return Err(RepositoryError::Duplicate);
        }

        let now = Utc::now();
        let profile = Profile::reconstruct(
            UserId::new(),
            user.email,
            user.full_name,
            user.avatar_ref,
            user.location,
            now,
            now,
        );
        users.insert(
            profile.id(),
            UserRecord {
                profile: profile.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(profile)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|r| r.profile.email() == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(|r| r.profile.clone()))
    }

    async fn update(&self, id: UserId, update: ProfileUpdate) -> Result<Profile, RepositoryError> {
        let mut users = self.users.write().await;
        let record = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.profile.apply(update, Utc::now());
        Ok(record.profile.clone())
    }
}

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{
    error::{AuthError, NotFoundError},
    models::{
        draft::RegistrationDraft,
        user::{NewUser, Profile, ProfileUpdate, Session, UserId},
    },
    repositories::user_repository::UserRepository,
    services::{
        auth_service::AuthService, password_service::PasswordHasher,
        registration_service::RegistrationService, token_service::TokenGenerator,
    },
};

/// Auth backend over an injected user repository.
///
/// Plays the part a hosted auth service would: it creates accounts from a
/// finished draft, issues session tokens and serves profiles.
#[derive(Clone)]
pub struct LocalAuthProvider<U: UserRepository, P: PasswordHasher, T: TokenGenerator> {
    users: U,
    password_hasher: P,
    token_generator: T,
    // signed-out token -> its expiry; expired entries are pruned on sign-out
    revoked: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl<U: UserRepository, P: PasswordHasher, T: TokenGenerator> LocalAuthProvider<U, P, T> {
    pub fn new(users: U, password_hasher: P, token_generator: T) -> Self {
        Self {
            users,
            password_hasher,
            token_generator,
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn open_session(&self, profile: &Profile) -> Result<Session, AuthError> {
        let issued = self.token_generator.generate(profile)?;
        Ok(Session {
            user_id: profile.id(),
            email: profile.email().to_string(),
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }
}

#[async_trait]
impl<U, P, T> RegistrationService for LocalAuthProvider<U, P, T>
where
    U: UserRepository,
    P: PasswordHasher,
    T: TokenGenerator,
{
    async fn submit_registration(&self, draft: &RegistrationDraft) -> Result<UserId, AuthError> {
        if self.users.find_by_email(draft.email()).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = self.password_hasher.hash(draft.password())?;
        let profile = self
            .users
            .create(NewUser {
                email: draft.email().to_string(),
                full_name: draft.full_name().to_string(),
                password_hash,
                avatar_ref: draft.avatar_ref().cloned(),
                location: draft.location(),
            })
            .await?;

        info!(user_id = %profile.id(), location_enabled = draft.location_enabled(), "registered user");
        Ok(profile.id())
    }
}

#[async_trait]
impl<U, P, T> AuthService for LocalAuthProvider<U, P, T>
where
    U: UserRepository,
    P: PasswordHasher,
    T: TokenGenerator,
{
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let record = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.password_hasher.verify(password, &record.password_hash)? {
            debug!("password did not match");
            return Err(AuthError::InvalidCredentials);
        }

        self.open_session(&record.profile)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expires_at| *expires_at > now);
        if session.expires_at > now {
            revoked.insert(session.token.clone(), session.expires_at);
        }
        Ok(())
    }

    async fn authenticate(&self, token: &str) -> Result<Session, AuthError> {
        if self.revoked.read().await.contains_key(token) {
            return Err(AuthError::NotSignedIn);
        }
        let verified = self.token_generator.verify(token)?;
        Ok(Session {
            user_id: verified.user_id,
            email: verified.email,
            token: token.to_string(),
            expires_at: verified.expires_at,
        })
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Profile, NotFoundError> {
        match self.users.find_by_id(user_id).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => Err(NotFoundError(user_id)),
            Err(err) => {
                warn!(error = %err, %user_id, "profile lookup failed");
                Err(NotFoundError(user_id))
            }
        }
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<Profile, AuthError> {
        Ok(self.users.update(user_id, update).await?)
    }
}

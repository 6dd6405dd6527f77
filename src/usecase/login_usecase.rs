use tracing::{info, warn};

use crate::domain::{
    error::AuthError,
    models::user::{Profile, Session},
    services::auth_service::AuthService,
};

#[derive(Debug)]
pub struct LoginResult {
    pub session: Session,
    pub profile: Profile,
}

pub struct LoginUsecase<A: AuthService> {
    auth: A,
}

impl<A: AuthService> LoginUsecase<A> {
    pub fn new(auth: A) -> Self {
        Self { auth }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let session = self.auth.sign_in(email, password).await.inspect_err(|err| {
            warn!(error = %err, "sign in rejected");
        })?;

        // a session for a deleted profile is useless to the dashboard
        let profile = self
            .auth
            .fetch_profile(session.user_id)
            .await
            .map_err(|_| AuthError::UserNotFound)?;

        info!(user_id = %session.user_id, "signed in");
        Ok(LoginResult { session, profile })
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let session = self.auth.authenticate(token).await?;
        self.auth.sign_out(&session).await?;
        info!(user_id = %session.user_id, "signed out");
        Ok(())
    }
}

/// Text shown on the login form for a failed sign-in.
pub fn login_error_message(err: &AuthError) -> String {
    match err {
        AuthError::InvalidCredentials => "Invalid email or password".to_string(),
        other => other.message(),
    }
}

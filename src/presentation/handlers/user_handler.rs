use std::sync::Arc;

use crate::{
    domain::{
        models::{
            avatar::StorageRef,
            draft::LocationGrant,
            user::{Profile, ProfileUpdate},
        },
        services::{auth_service::AuthService, avatar_storage::AvatarStorage},
    },
    presentation::error::ApiError,
    usecase::{
        dashboard_usecase::{DashboardUsecase, DashboardView},
        login_usecase::{LoginUsecase, login_error_message},
    },
};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Request

/// json for login request
#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// json for profile update request, absent fields are left alone
#[derive(Serialize, Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub location: Option<LocationGrant>,
}

// Response

/// json for login response
#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: ProfileInfo,
}

#[derive(Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub avatar_ref: Option<StorageRef>,
    pub location: LocationGrant,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileInfo {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id().to_string(),
            email: profile.email().to_string(),
            full_name: profile.full_name().to_string(),
            avatar_ref: profile.avatar_ref().cloned(),
            location: profile.location(),
            created_at: profile.created_at(),
            updated_at: profile.updated_at(),
        }
    }
}

/// json for dashboard response
#[derive(Serialize, Deserialize)]
pub struct DashboardResponse {
    pub profile: ProfileInfo,
    pub avatar_url: Option<String>,
}

impl From<DashboardView> for DashboardResponse {
    fn from(view: DashboardView) -> Self {
        Self {
            profile: view.profile.into(),
            avatar_url: view.avatar_url,
        }
    }
}

/* Router Function and Handler Function */

// User Router

/// function return Router object
/// Suppose to be nested by main router
pub fn create_user_router<A, S>(
    login_service: LoginUsecase<A>,
    dashboard_service: DashboardUsecase<A, S>,
) -> Router
where
    A: AuthService + 'static,
    S: AvatarStorage + 'static,
{
    let state = AppState {
        login_service: Arc::new(login_service),
        dashboard_service: Arc::new(dashboard_service),
    };

    Router::new()
        .route("/login", post(login::<A, S>))
        .route("/logout", post(logout::<A, S>))
        .route("/dashboard", get(dashboard::<A, S>))
        .route("/profile", patch(update_profile::<A, S>))
        .with_state(state)
}

pub struct AppState<A: AuthService, S: AvatarStorage> {
    pub login_service: Arc<LoginUsecase<A>>,
    pub dashboard_service: Arc<DashboardUsecase<A, S>>,
}

// derive(Clone) would demand A: Clone and S: Clone
impl<A: AuthService, S: AvatarStorage> Clone for AppState<A, S> {
    fn clone(&self) -> Self {
        Self {
            login_service: Arc::clone(&self.login_service),
            dashboard_service: Arc::clone(&self.dashboard_service),
        }
    }
}

/// helper function that extract the session token from `Authorization: Bearer ...`
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingToken)
}

// handler function

/// handler function for login
async fn login<A: AuthService + 'static, S: AvatarStorage + 'static>(
    State(state): State<AppState<A, S>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let result = state
        .login_service
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| ApiError::LoginFailed(login_error_message(&err)))?;

    Ok(Json(LoginResponse {
        token: result.session.token,
        expires_at: result.session.expires_at,
        user: result.profile.into(),
    }))
}

/// handler function for logout
async fn logout<A: AuthService + 'static, S: AvatarStorage + 'static>(
    State(state): State<AppState<A, S>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.login_service.logout(bearer_token(&headers)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// handler function for dashboard
async fn dashboard<A: AuthService + 'static, S: AvatarStorage + 'static>(
    State(state): State<AppState<A, S>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, ApiError> {
    let view = state
        .dashboard_service
        .load(bearer_token(&headers)?)
        .await?;
    Ok(Json(view.into()))
}

/// handler function for profile update
async fn update_profile<A: AuthService + 'static, S: AvatarStorage + 'static>(
    State(state): State<AppState<A, S>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let update = ProfileUpdate {
        full_name: payload.full_name,
        avatar_ref: None,
        location: payload.location,
    };
    let view = state
        .dashboard_service
        .update_profile(bearer_token(&headers)?, update)
        .await?;
    Ok(Json(view.into()))
}

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::{sync::RwLock, time::Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        models::{draft::LocationChoice, step::WizardStep},
        services::{
            avatar_storage::AvatarStorage, geolocation_service::GeolocationProvider,
            registration_service::RegistrationService,
        },
        validation::PasswordChecklist,
    },
    presentation::error::ApiError,
    usecase::wizard_usecase::{WizardController, WizardSettings, WizardSnapshot},
};

// Request

#[derive(Serialize, Deserialize)]
pub struct BasicInfoRequest {
    pub full_name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LocationRequest {
    pub choice: LocationChoice,
}

#[derive(Serialize, Deserialize)]
pub struct ChecklistRequest {
    pub password: String,
}

// Response

#[derive(Serialize)]
pub struct ChecklistResponse {
    #[serde(flatten)]
    pub checklist: PasswordChecklist,
    pub satisfied: bool,
}

#[derive(Serialize)]
pub struct WizardResponse {
    pub wizard_id: Uuid,
    #[serde(flatten)]
    pub wizard: WizardSnapshot,
    /// Upload failure text; the wizard continued without an avatar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_warning: Option<String>,
}

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_OPEN: usize = 10_000;

type Controller<R, S, G> = Arc<WizardController<R, S, G>>;

struct OpenWizard<R, S, G> {
    controller: Controller<R, S, G>,
    touched: Instant,
}

/// Open wizards keyed by id, plus what each new one is built from.
///
/// A wizard untouched for `idle_ttl` is dropped; at most `max_open` are kept.
pub struct WizardApp<R, S, G> {
    registration: R,
    storage: S,
    geolocation: G,
    settings: WizardSettings,
    idle_ttl: Duration,
    max_open: usize,
    wizards: RwLock<HashMap<Uuid, OpenWizard<R, S, G>>>,
}

impl<R, S, G> WizardApp<R, S, G>
where
    R: RegistrationService + Clone,
    S: AvatarStorage + Clone,
    G: GeolocationProvider + Clone,
{
    pub fn new(registration: R, storage: S, geolocation: G, settings: WizardSettings) -> Self {
        Self {
            registration,
            storage,
            geolocation,
            settings,
            idle_ttl: DEFAULT_IDLE_TTL,
            max_open: DEFAULT_MAX_OPEN,
            wizards: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_limits(mut self, idle_ttl: Duration, max_open: usize) -> Self {
        self.idle_ttl = idle_ttl;
        self.max_open = max_open;
        self
    }

    async fn open(&self) -> Result<(Uuid, Controller<R, S, G>), ApiError> {
        let wizard = Arc::new(WizardController::new(
            self.registration.clone(),
            self.storage.clone(),
            self.geolocation.clone(),
            self.settings.clone(),
        ));
        wizard.begin().await?;

        let now = Instant::now();
        let mut wizards = self.wizards.write().await;
        let before = wizards.len();
        wizards.retain(|_, open| now.duration_since(open.touched) < self.idle_ttl);
        if wizards.len() < before {
            info!(expired = before - wizards.len(), "dropped idle wizards");
        }
        if wizards.len() >= self.max_open {
            warn!(open = wizards.len(), "wizard registry full");
            return Err(ApiError::TooManyWizards);
        }

        let id = Uuid::new_v4();
        wizards.insert(
            id,
            OpenWizard {
                controller: Arc::clone(&wizard),
                touched: now,
            },
        );
        info!(wizard_id = %id, "wizard opened");
        Ok((id, wizard))
    }

    /// Look up a wizard and mark it as touched. Idle ones are gone.
    async fn find(&self, id: Uuid) -> Result<Controller<R, S, G>, ApiError> {
        let now = Instant::now();
        let mut wizards = self.wizards.write().await;
        let open = wizards.get_mut(&id).ok_or(ApiError::WizardNotFound)?;
        if now.duration_since(open.touched) >= self.idle_ttl {
            wizards.remove(&id);
            info!(wizard_id = %id, "wizard expired");
            return Err(ApiError::WizardNotFound);
        }
        open.touched = now;
        Ok(Arc::clone(&open.controller))
    }

    async fn close(&self, id: Uuid) {
        if self.wizards.write().await.remove(&id).is_some() {
            info!(wizard_id = %id, "wizard closed");
        }
    }
}

/* Router Function and Handler Function */

/// Suppose to be nested by main router. `body_limit` caps the avatar upload body.
pub fn create_wizard_router<R, S, G>(app: WizardApp<R, S, G>, body_limit: usize) -> Router
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    Router::new()
        .route("/wizard", post(open::<R, S, G>))
        .route("/wizard/password-checklist", post(password_checklist))
        .route("/wizard/{id}", get(show::<R, S, G>))
        .route("/wizard/{id}/basic-info", post(basic_info::<R, S, G>))
        .route("/wizard/{id}/password", post(password::<R, S, G>))
        .route("/wizard/{id}/location", post(location::<R, S, G>))
        .route(
            "/wizard/{id}/avatar",
            post(avatar::<R, S, G>).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/wizard/{id}/finalize", post(finalize::<R, S, G>))
        .route("/wizard/{id}/back", post(back::<R, S, G>))
        .route("/wizard/{id}/abandon", post(abandon::<R, S, G>))
        .with_state(Arc::new(app))
}

type AppState<R, S, G> = State<Arc<WizardApp<R, S, G>>>;

async fn respond<R, S, G>(
    id: Uuid,
    wizard: &WizardController<R, S, G>,
    upload_warning: Option<String>,
) -> Json<WizardResponse>
where
    R: RegistrationService,
    S: AvatarStorage,
    G: GeolocationProvider,
{
    Json(WizardResponse {
        wizard_id: id,
        wizard: wizard.snapshot().await,
        upload_warning,
    })
}

/// Run the registration and forget the wizard once it is done.
async fn finish<R, S, G>(
    app: &WizardApp<R, S, G>,
    id: Uuid,
    wizard: &WizardController<R, S, G>,
    upload_warning: Option<String>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone,
    S: AvatarStorage + Clone,
    G: GeolocationProvider + Clone,
{
    wizard
        .finalize_registration()
        .await
        .map_err(|source| match upload_warning.clone() {
            Some(upload_warning) => ApiError::RegistrationFailed {
                source,
                upload_warning,
            },
            None => ApiError::Wizard(source),
        })?;
    let response = respond(id, wizard, upload_warning).await;
    app.close(id).await;
    Ok(response)
}

async fn open<R, S, G>(
    State(app): AppState<R, S, G>,
) -> Result<(StatusCode, Json<WizardResponse>), ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let (id, wizard) = app.open().await?;
    Ok((StatusCode::CREATED, respond(id, &wizard, None).await))
}

async fn password_checklist(Json(payload): Json<ChecklistRequest>) -> Json<ChecklistResponse> {
    let checklist = PasswordChecklist::evaluate(&payload.password);
    Json(ChecklistResponse {
        satisfied: checklist.is_satisfied(),
        checklist,
    })
}

async fn show<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    Ok(respond(id, &wizard, None).await)
}

async fn basic_info<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BasicInfoRequest>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    wizard
        .submit_basic_info(&payload.full_name, &payload.email)
        .await?;
    Ok(respond(id, &wizard, None).await)
}

async fn password<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PasswordRequest>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    wizard
        .submit_password(&payload.password, &payload.confirm_password)
        .await?;
    Ok(respond(id, &wizard, None).await)
}

async fn location<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    wizard.submit_location(payload.choice).await?;
    Ok(respond(id, &wizard, None).await)
}

/// Raw image body; an empty body skips the avatar. Registration follows straight away.
async fn avatar<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    let image = (!body.is_empty()).then(|| body.to_vec());
    let submission = wizard.submit_avatar(image).await?;
    let upload_warning = submission.upload_error.map(|err| err.to_string());
    finish(&app, id, &wizard, upload_warning).await
}

async fn finalize<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    finish(&app, id, &wizard, None).await
}

async fn back<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    let step = wizard.go_back().await?;
    let response = respond(id, &wizard, None).await;
    // back from basic info leaves the wizard with nothing to resume
    if step == WizardStep::Login {
        app.close(id).await;
    }
    Ok(response)
}

async fn abandon<R, S, G>(
    State(app): AppState<R, S, G>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    R: RegistrationService + Clone + 'static,
    S: AvatarStorage + Clone + 'static,
    G: GeolocationProvider + Clone + 'static,
{
    let wizard = app.find(id).await?;
    wizard.abandon().await;
    app.close(id).await;
    Ok(StatusCode::NO_CONTENT)
}

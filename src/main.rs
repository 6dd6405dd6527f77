mod config;
mod domain;
mod infrastructure;
mod presentation;
mod usecase;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::AppConfig,
    domain::{
        repositories::user_repository::UserRepository, services::password_service::PasswordHasher,
        validation::ValidationRules,
    },
    infrastructure::{
        argon2_password_hasher::Argon2PasswordHasher, configured_geolocation::ConfiguredGeolocation,
        file_avatar_storage::FileAvatarStorage, in_memory_user_repository::InMemoryUserRepository,
        jwt_token_generator::JwtTokenGenerator, local_auth_provider::LocalAuthProvider,
        user_repository::SeaOrmUserRepository,
    },
    presentation::handlers::{
        storage_handler::create_storage_router,
        user_handler::create_user_router,
        wizard_handler::{WizardApp, create_wizard_router},
    },
    usecase::{
        dashboard_usecase::DashboardUsecase, login_usecase::LoginUsecase,
        wizard_usecase::WizardSettings,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tigerbites=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let password_hasher = Argon2PasswordHasher::new();
    let app = match &config.database_url {
        Some(url) => build_app(
            &config,
            SeaOrmUserRepository::connect(url).await?,
            password_hasher,
        ),
        None => {
            warn!("DATABASE_URL not set, users are kept in memory");
            build_app(&config, InMemoryUserRepository::new(), password_hasher)
        }
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Wire the collaborators and mount every router.
fn build_app<U, P>(config: &AppConfig, users: U, password_hasher: P) -> Router
where
    U: UserRepository + Clone + 'static,
    P: PasswordHasher + 'static,
{
    let token_generator =
        JwtTokenGenerator::with_expiration(config.jwt_secret.clone(), config.session_ttl_hours);
    let auth = LocalAuthProvider::new(users, password_hasher, token_generator);
    let storage = FileAvatarStorage::new(
        config.avatar_dir.clone(),
        config.avatar_bucket.clone(),
        config.max_avatar_bytes,
        config.public_base_url.clone(),
        &config.jwt_secret,
    );
    let geolocation = ConfiguredGeolocation::new(config.device_location);
    let settings = WizardSettings {
        rules: ValidationRules::new(config.email_suffix.clone()),
        collaborator_timeout: config.collaborator_timeout,
    };

    let login_service = LoginUsecase::new(auth.clone());
    let dashboard_service =
        DashboardUsecase::new(auth.clone(), storage.clone(), config.signed_url_ttl);
    let wizard_app = WizardApp::new(auth, storage.clone(), geolocation, settings)
        .with_limits(config.wizard_idle_ttl, config.max_open_wizards);
    // oversized uploads must reach storage so they surface as an upload warning
    let body_limit = config.max_avatar_bytes.saturating_mul(2);

    Router::new()
        .nest(
            "/api",
            create_user_router(login_service, dashboard_service)
                .merge(create_wizard_router(wizard_app, body_limit)),
        )
        .merge(create_storage_router(storage))
}

use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    domain::{models::draft::Coordinates, validation::DEFAULT_EMAIL_SUFFIX},
    infrastructure::file_avatar_storage::DEFAULT_BUCKET,
};

const DEV_JWT_SECRET: &str = "dev-secret";
/// One year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub email_suffix: String,
    pub avatar_dir: PathBuf,
    pub avatar_bucket: String,
    pub max_avatar_bytes: usize,
    pub public_base_url: String,
    pub signed_url_ttl: Duration,
    pub collaborator_timeout: Duration,
    pub device_location: Option<Coordinates>,
    pub wizard_idle_ttl: Duration,
    pub max_open_wizards: usize,
}

impl AppConfig {
    /// Load from the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing { key: "JWT_SECRET" }),
        };

        let latitude = parse_opt::<f64>(&lookup, "DEVICE_LATITUDE")?;
        let longitude = parse_opt::<f64>(&lookup, "DEVICE_LONGITUDE")?;
        let device_location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(missing_pair(&lookup, "DEVICE_LONGITUDE")),
            (None, Some(_)) => return Err(missing_pair(&lookup, "DEVICE_LATITUDE")),
        };

        let session_ttl_hours: i64 = parse_or(&lookup, "SESSION_TTL_HOURS", "24")?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            warn!("SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}");
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                value: session_ttl_hours.to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", "0.0.0.0:8080")?,
            database_url: lookup("DATABASE_URL"),
            jwt_secret,
            session_ttl_hours,
            email_suffix: lookup("EMAIL_DOMAIN_SUFFIX")
                .unwrap_or_else(|| DEFAULT_EMAIL_SUFFIX.to_string()),
            avatar_dir: parse_or(&lookup, "AVATAR_DIR", "./avatars")?,
            avatar_bucket: lookup("AVATAR_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            max_avatar_bytes: parse_or(&lookup, "MAX_AVATAR_BYTES", "5242880")?,
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            signed_url_ttl: Duration::from_secs(parse_or(&lookup, "SIGNED_URL_TTL_SECS", "3600")?),
            collaborator_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COLLABORATOR_TIMEOUT_SECS",
                "10",
            )?),
            device_location,
            wizard_idle_ttl: Duration::from_secs(parse_or(
                &lookup,
                "WIZARD_IDLE_TTL_SECS",
                "1800",
            )?),
            max_open_wizards: parse_or(&lookup, "MAX_OPEN_WIZARDS", "10000")?,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse(key, value)
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    lookup(key).map(|value| parse(key, value)).transpose()
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid { key, value }
    })
}

fn missing_pair(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: lookup(key).unwrap_or_default(),
    }
}

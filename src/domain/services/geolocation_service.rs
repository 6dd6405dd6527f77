use async_trait::async_trait;

use crate::domain::{error::PermissionError, models::draft::Coordinates};

/// Implementations must resolve, even when the capability is missing.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn request_geolocation(&self) -> Result<Coordinates, PermissionError>;
}

use async_trait::async_trait;

use crate::domain::{
    error::PermissionError, models::draft::Coordinates,
    services::geolocation_service::GeolocationProvider,
};

/// Geolocation for hosts without a browser: a configured fix, or nothing.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredGeolocation {
    fix: Option<Coordinates>,
}

impl ConfiguredGeolocation {
    pub fn new(fix: Option<Coordinates>) -> Self {
        Self { fix }
    }
}

#[async_trait]
impl GeolocationProvider for ConfiguredGeolocation {
    async fn request_geolocation(&self) -> Result<Coordinates, PermissionError> {
        self.fix.ok_or(PermissionError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_fix_is_unavailable() {
        let provider = ConfiguredGeolocation::default();
        assert_eq!(
            provider.request_geolocation().await,
            Err(PermissionError::Unavailable)
        );
    }

    #[tokio::test]
    async fn test_configured_fix_is_granted() {
        let fix = Coordinates {
            latitude: 35.2043,
            longitude: -85.9211,
        };
        let provider = ConfiguredGeolocation::new(Some(fix));
        assert_eq!(provider.request_geolocation().await, Ok(fix));
    }
}

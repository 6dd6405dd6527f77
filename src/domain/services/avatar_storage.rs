use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{error::UploadError, models::avatar::StorageRef};

#[async_trait]
pub trait AvatarStorage: Send + Sync {
    /// Store the image and return where it landed.
    async fn upload_avatar(&self, image: Vec<u8>) -> Result<StorageRef, UploadError>;

    /// Time-limited URL for reading the object back.
    async fn signed_url(&self, avatar: &StorageRef, ttl: Duration) -> Result<String, UploadError>;

    /// Resolve a signed request to the object bytes.
    async fn open_signed(&self, path: &str, token: &str) -> Result<Vec<u8>, UploadError>;
}

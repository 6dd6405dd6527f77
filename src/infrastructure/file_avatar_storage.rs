use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    error::UploadError,
    models::avatar::{ImageFormat, StorageRef},
    services::avatar_storage::AvatarStorage,
};

pub const DEFAULT_BUCKET: &str = "user-avatars";

#[derive(Debug, Serialize, Deserialize)]
struct UrlClaims {
    url: String, // bucket/file the token grants
    exp: i64,
    iat: i64,
}

#[derive(Clone)]
pub struct FileAvatarStorage {
    root: PathBuf,
    bucket: String,
    max_bytes: usize,
    public_base_url: String,
    secret: Arc<str>,
}

impl FileAvatarStorage {
    pub fn new(
        root: PathBuf,
        bucket: String,
        max_bytes: usize,
        public_base_url: String,
        secret: &str,
    ) -> Self {
        Self {
            root,
            bucket,
            max_bytes,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            secret: Arc::from(secret),
        }
    }

    fn object_path(&self, avatar: &StorageRef) -> PathBuf {
        self.root.join(avatar.bucket()).join(avatar.file_name())
    }
}

#[async_trait]
impl AvatarStorage for FileAvatarStorage {
    async fn upload_avatar(&self, image: Vec<u8>) -> Result<StorageRef, UploadError> {
        if image.is_empty() {
            return Err(UploadError::Empty);
        }
        if image.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: image.len(),
                limit: self.max_bytes,
            });
        }
        let format = ImageFormat::detect(&image).ok_or(UploadError::UnsupportedFormat)?;

        let file_name = format!("{}.{}", Uuid::new_v4(), format.extension());
        let avatar = StorageRef::new(&self.bucket, &file_name);
        let path = self.object_path(&avatar);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, &image).await?;

        info!(%avatar, bytes = image.len(), "stored avatar");
        Ok(avatar)
    }

    async fn signed_url(&self, avatar: &StorageRef, ttl: Duration) -> Result<String, UploadError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let claims = UrlClaims {
            url: avatar.as_str().to_string(),
            exp: now.saturating_add(ttl),
            iat: now,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| UploadError::Io(format!("Failed to sign url: {}", e)))?;

        Ok(format!(
            "{}/storage/{}?token={}",
            self.public_base_url, avatar, token
        ))
    }

    async fn open_signed(&self, path: &str, token: &str) -> Result<Vec<u8>, UploadError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let claims = decode::<UrlClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "rejected avatar signature");
            UploadError::InvalidSignature
        })?
        .claims;

        if claims.url != path {
            return Err(UploadError::InvalidSignature);
        }
        let avatar = StorageRef::parse(path)?;
        Ok(tokio::fs::read(self.object_path(&avatar)).await?)
    }
}

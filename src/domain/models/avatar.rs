use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::UploadError;

/// Location of an uploaded avatar, `bucket/file`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(String);

impl StorageRef {
    pub fn new(bucket: &str, file_name: &str) -> Self {
        Self(format!("{}/{}", bucket, file_name))
    }

    /// Parse a `bucket/file` path, rejecting anything that could escape the bucket.
    pub fn parse(path: &str) -> Result<Self, UploadError> {
        let mut segments = path.split('/');
        let (Some(bucket), Some(file), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(UploadError::InvalidPath(path.to_string()));
        };
        let valid = |s: &str| {
            !s.is_empty()
                && s != "."
                && s != ".."
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid(bucket) || !valid(file) {
            return Err(UploadError::InvalidPath(path.to_string()));
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bucket(&self) -> &str {
        self.0.split_once('/').map_or("", |(bucket, _)| bucket)
    }

    pub fn file_name(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(_, file)| file)
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Heic,
}

impl ImageFormat {
    /// Sniff the format from the leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        const HEIC_BRANDS: [&[u8; 4]; 5] = [b"heic", b"heix", b"hevc", b"mif1", b"msf1"];

        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else if bytes.len() >= 12
            && &bytes[4..8] == b"ftyp"
            && HEIC_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
        {
            Some(ImageFormat::Heic)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Heic => "heic",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Heic => "image/heic",
        }
    }
}

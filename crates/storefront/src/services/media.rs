//! Uploaded media on local disk.
//!
//! Files are written under the configured media directory and served
//! back from `public_url`, which maps to the same directory.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use la_red_core::UserId;

use crate::config::MediaConfig;

/// Errors that can occur while storing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("file is empty")]
    Empty,

    #[error("file exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extension for an accepted image content type.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Local-disk media storage.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    dir: PathBuf,
    public_url: String,
    max_upload_bytes: usize,
}

impl MediaStorage {
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Store an avatar image and return its public URL.
    ///
    /// Each upload gets a fresh name, so a previous avatar URL keeps
    /// working until it is replaced on the profile.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::UnsupportedType` unless the content type is
    /// PNG, JPEG, WebP or GIF, `MediaError::Empty` or `MediaError::TooLarge`
    /// for bad sizes, and `MediaError::Io` if the file cannot be written.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        user_id: UserId,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, MediaError> {
        let ext = image_extension(content_type)
            .ok_or_else(|| MediaError::UnsupportedType(content_type.to_string()))?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(MediaError::TooLarge {
                max: self.max_upload_bytes,
            });
        }

        let relative = format!("avatars/{user_id}/{}.{ext}", Uuid::new_v4());
        let path = self.dir.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        info!(path = %path.display(), "Stored avatar");
        Ok(format!("{}/{relative}", self.public_url))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn storage(dir: PathBuf) -> MediaStorage {
        MediaStorage::new(&MediaConfig {
            dir,
            public_url: "https://lared.example/media/".to_string(),
            max_upload_bytes: 16,
        })
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("la-red-media-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_url() {
        let dir = scratch_dir();
        let media = storage(dir.clone());
        let user = UserId::generate();

        let url = media
            .upload_avatar(user, "image/png", b"\x89PNG....")
            .await
            .unwrap();

        let prefix = format!("https://lared.example/media/avatars/{user}/");
        assert!(url.starts_with(&prefix), "{url}");
        assert!(url.ends_with(".png"));

        let relative = url.trim_start_matches("https://lared.example/media/");
        let written = tokio::fs::read(dir.join(relative)).await.unwrap();
        assert_eq!(written, b"\x89PNG....");

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let media = storage(scratch_dir());
        let user = UserId::generate();

        assert!(matches!(
            media.upload_avatar(user, "text/html", b"<p>").await,
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(matches!(
            media.upload_avatar(user, "image/gif", b"").await,
            Err(MediaError::Empty)
        ));
        assert!(matches!(
            media.upload_avatar(user, "image/gif", &[0u8; 17]).await,
            Err(MediaError::TooLarge { max: 16 })
        ));
    }
}

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Object storage boundary. The rest of the crate never inspects file
/// bytes; it hands them over and gets a public URL back.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ServiceError>;
}

/// Filesystem-backed store serving files under a public URL prefix.
pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ServiceError> {
        let folder = sanitize(folder);
        let unique_name = format!("{}-{}", Uuid::new_v4().simple(), sanitize(file_name));

        let dir = self.root.join(&folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::ServiceUnavailable(format!("media storage: {}", e)))?;
        tokio::fs::write(dir.join(&unique_name), bytes)
            .await
            .map_err(|e| ServiceError::ServiceUnavailable(format!("media storage: {}", e)))?;

        let url = format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            folder,
            unique_name
        );
        info!("Stored media object at {}", url);
        Ok(url)
    }
}

/// Keeps alphanumerics, dots, dashes and underscores; everything else
/// becomes a dash. An empty result falls back to "file".
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

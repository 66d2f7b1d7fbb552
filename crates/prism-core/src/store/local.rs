//! Filesystem asset store, for offline runs and self-hosted static files.

use super::provider::{AssetStore, UploadRequest};
use crate::error::PipelineError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Writes derivatives under a root directory served at `public_base_url`.
pub struct LocalStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    pub fn new(root: PathBuf, public_base_url: &str) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn error(&self, message: String) -> PipelineError {
        PipelineError::Upload {
            store: self.name().to_string(),
            message,
            status_code: None,
        }
    }
}

/// Only plain relative segments may reach the filesystem.
fn is_safe_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl AssetStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, request: &UploadRequest) -> Result<String, PipelineError> {
        if !is_safe_relative(&request.folder) || !is_safe_relative(&request.public_id) {
            return Err(self.error(format!(
                "refusing unsafe path {}/{}",
                request.folder, request.public_id
            )));
        }

        let file_name = format!("{}.{}", request.public_id, request.format.as_str());
        let dir = self.root.join(&request.folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| self.error(format!("cannot create {dir:?}: {e}")))?;

        let target = dir.join(&file_name);
        tokio::fs::write(&target, &request.bytes)
            .await
            .map_err(|e| self.error(format!("cannot write {target:?}: {e}")))?;

        let url = if request.folder.is_empty() {
            format!("{}/{}", self.public_base_url, file_name)
        } else {
            format!("{}/{}/{}", self.public_base_url, request.folder, file_name)
        };
        tracing::debug!("Stored {:?} -> {}", target, url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DerivativeFormat;

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf(), "https://shop.example/uploads/");

        let request = UploadRequest::new(vec![7, 8, 9], "products", "tee", DerivativeFormat::Webp);
        let url = store.upload(&request).await.unwrap();

        assert_eq!(url, "https://shop.example/uploads/products/tee_webp.webp");
        let written = std::fs::read(dir.path().join("products/tee_webp.webp")).unwrap();
        assert_eq!(written, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_fallback_keeps_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf(), "/uploads");
        let request = UploadRequest::new(vec![1], "products", "tee", DerivativeFormat::Jpeg);
        let url = store.upload(&request).await.unwrap();
        assert_eq!(url, "/uploads/products/tee.jpeg");
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf(), "/uploads");
        let request = UploadRequest::new(vec![1], "../etc", "tee", DerivativeFormat::Jpeg);
        let err = store.upload(&request).await.unwrap_err();
        assert!(err.to_string().contains("unsafe"));
    }
}

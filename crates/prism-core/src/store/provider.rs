//! Asset store trait and request types.
//!
//! Defines the interface every remote asset host implements, plus the
//! factory that picks the configured one.

use crate::config::{Config, StoreKind};
use crate::error::PipelineError;
use crate::types::DerivativeFormat;
use async_trait::async_trait;
use std::sync::Arc;

/// One derivative to push to an asset host.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Logical folder on the host
    pub folder: String,
    /// Object name without extension (see [`DerivativeFormat::public_id`])
    pub public_id: String,
    pub format: DerivativeFormat,
}

impl UploadRequest {
    pub fn new(bytes: Vec<u8>, folder: &str, base_name: &str, format: DerivativeFormat) -> Self {
        Self {
            bytes,
            folder: folder.to_string(),
            public_id: format.public_id(base_name),
            format,
        }
    }
}

/// Trait that all asset hosts implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the uploader holds an `Arc<dyn AssetStore>`).
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store name for logging (e.g., "cloudinary", "local").
    fn name(&self) -> &str;

    /// Upload one derivative and return its public URL.
    async fn upload(&self, request: &UploadRequest) -> Result<String, PipelineError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the configured asset store.
pub struct AssetStoreFactory;

impl AssetStoreFactory {
    pub fn create(config: &Config) -> Result<Arc<dyn AssetStore>, PipelineError> {
        match config.upload.store {
            StoreKind::Cloudinary => {
                let store = super::cloudinary::CloudinaryStore::from_config(&config.cloudinary)?;
                Ok(Arc::new(store))
            }
            StoreKind::Local => Ok(Arc::new(super::local::LocalStore::new(
                config.local_store_root(),
                &config.local_store.public_base_url,
            ))),
        }
    }
}

//! Per-asset upload of every derivative, with timeouts and optional retries.
//!
//! All formats of one asset go up concurrently. A format that fails, times
//! out, or exhausts its retries simply comes back without a URL.

use super::provider::{AssetStore, UploadRequest};
use super::retry;
use crate::config::UploadConfig;
use crate::error::PipelineError;
use crate::types::{Derivative, UploadedDerivative};
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Timeout and retry policy for uploads.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after the first failure
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl UploadOptions {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            timeout_ms: config.upload_timeout_ms,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// Pushes derivatives to an asset store.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn AssetStore>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(store: Arc<dyn AssetStore>, options: UploadOptions) -> Self {
        Self { store, options }
    }

    /// Name of the underlying store.
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Upload every derivative of one asset. Output order follows input order.
    pub async fn upload_all(
        &self,
        derivatives: Vec<Derivative>,
        folder: &str,
        base_name: &str,
    ) -> Vec<UploadedDerivative> {
        let uploads = derivatives.into_iter().map(|derivative| {
            let request =
                UploadRequest::new(derivative.buffer, folder, base_name, derivative.format);
            let size = derivative.size;
            let savings = derivative.savings;
            async move {
                let remote_url = match self.upload_one(&request).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!(
                            "Upload of {}/{} ({}) failed: {}",
                            request.folder,
                            request.public_id,
                            request.format,
                            e
                        );
                        None
                    }
                };
                UploadedDerivative {
                    format: request.format,
                    size,
                    savings,
                    remote_url,
                }
            }
        });
        join_all(uploads).await
    }

    /// Upload one request with timeout and retry.
    pub async fn upload_one(&self, request: &UploadRequest) -> Result<String, PipelineError> {
        let mut last_error = None;
        for attempt in 0..=self.options.retry_attempts {
            if attempt > 0 {
                let delay = retry::with_jitter(retry::backoff_duration(
                    attempt - 1,
                    self.options.retry_delay_ms,
                ));
                tracing::debug!(
                    "Retry {attempt}/{} for {} after {delay:?}",
                    self.options.retry_attempts,
                    request.public_id
                );
                tokio::time::sleep(delay).await;
            }

            let error = match tokio::time::timeout(
                Duration::from_millis(self.options.timeout_ms),
                self.store.upload(request),
            )
            .await
            {
                Ok(Ok(url)) => return Ok(url),
                Ok(Err(e)) => e,
                Err(_) => PipelineError::Timeout {
                    path: PathBuf::from(&request.folder).join(&request.public_id),
                    stage: "upload".to_string(),
                    timeout_ms: self.options.timeout_ms,
                },
            };
            let retryable = retry::is_retryable(&error);
            last_error = Some(error);
            if !retryable {
                break;
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::Upload {
            store: self.store.name().to_string(),
            message: "no upload attempt made".to_string(),
            status_code: None,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::DerivativeFormat;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory store that can be told to fail or stall on given formats.
    pub(crate) struct MockStore {
        pub fail_formats: HashSet<DerivativeFormat>,
        pub stall_formats: HashSet<DerivativeFormat>,
        pub status_code: Option<u16>,
        pub calls: AtomicU32,
    }

    impl MockStore {
        pub(crate) fn new() -> Self {
            Self {
                fail_formats: HashSet::new(),
                stall_formats: HashSet::new(),
                status_code: Some(500),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn failing(formats: &[DerivativeFormat]) -> Self {
            Self {
                fail_formats: formats.iter().copied().collect(),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl AssetStore for MockStore {
        fn name(&self) -> &str {
            "mock"
        }

        async fn upload(&self, request: &UploadRequest) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall_formats.contains(&request.format) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail_formats.contains(&request.format) {
                return Err(PipelineError::Upload {
                    store: "mock".to_string(),
                    message: "injected failure".to_string(),
                    status_code: self.status_code,
                });
            }
            Ok(format!(
                "https://res.cloudinary.com/demo/image/upload/{}/{}.{}",
                request.folder,
                request.public_id,
                request.format.as_str()
            ))
        }
    }

    fn derivatives() -> Vec<Derivative> {
        DerivativeFormat::ALL
            .iter()
            .map(|f| Derivative::new(*f, vec![0u8; 10], 100))
            .collect()
    }

    fn fast_options() -> UploadOptions {
        UploadOptions {
            timeout_ms: 200,
            retry_attempts: 0,
            retry_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_all_formats_uploaded_with_suffixes() {
        let uploader = Uploader::new(Arc::new(MockStore::new()), fast_options());
        let results = uploader.upload_all(derivatives(), "products", "tee").await;

        assert_eq!(results.len(), 3);
        assert!(results[0].remote_url.as_deref().unwrap().ends_with("/tee_avif.avif"));
        assert!(results[1].remote_url.as_deref().unwrap().ends_with("/tee_webp.webp"));
        assert!(results[2].remote_url.as_deref().unwrap().ends_with("/tee.jpeg"));
        assert!((results[0].savings - 90.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_one_failed_format_does_not_block_others() {
        let store = MockStore::failing(&[DerivativeFormat::Jpeg]);
        let uploader = Uploader::new(Arc::new(store), fast_options());
        let results = uploader.upload_all(derivatives(), "products", "tee").await;

        assert!(results[0].remote_url.is_some());
        assert!(results[1].remote_url.is_some());
        assert!(results[2].remote_url.is_none());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut store = MockStore::new();
        store.stall_formats.insert(DerivativeFormat::Avif);
        let uploader = Uploader::new(Arc::new(store), fast_options());
        let results = uploader.upload_all(derivatives(), "products", "tee").await;

        assert!(results[0].remote_url.is_none());
        assert!(results[2].remote_url.is_some());
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried() {
        let store = Arc::new(MockStore::failing(&[DerivativeFormat::Webp]));
        let options = UploadOptions {
            retry_attempts: 2,
            ..fast_options()
        };
        let uploader = Uploader::new(store.clone(), options);
        let request = UploadRequest::new(vec![1], "p", "tee", DerivativeFormat::Webp);

        assert!(uploader.upload_one(&request).await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut store = MockStore::failing(&[DerivativeFormat::Webp]);
        store.status_code = Some(400);
        let store = Arc::new(store);
        let options = UploadOptions {
            retry_attempts: 2,
            ..fast_options()
        };
        let uploader = Uploader::new(store.clone(), options);
        let request = UploadRequest::new(vec![1], "p", "tee", DerivativeFormat::Webp);

        assert!(uploader.upload_one(&request).await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_is_one_shot() {
        let store = Arc::new(MockStore::failing(&[DerivativeFormat::Avif]));
        let uploader = Uploader::new(store.clone(), UploadOptions::default());
        let request = UploadRequest::new(vec![1], "p", "tee", DerivativeFormat::Avif);

        assert!(uploader.upload_one(&request).await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}

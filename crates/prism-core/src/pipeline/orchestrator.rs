//! Batch orchestration - wires validation, transcoding, upload and indexing.
//!
//! Each file runs as its own task, bounded by a semaphore and a per-file
//! timeout. A file that fails (bad signature, undecodable, every upload
//! rejected) is dropped from the response and listed under `failures`; the
//! rest of the batch carries on. Staged temp files are deleted on every path,
//! including batch rejections, timeouts and panics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::PipelineError;
use crate::index::BlurIndex;
use crate::store::{AssetStore, AssetStoreFactory, UploadOptions, Uploader};
use crate::types::{
    BatchResult, BlurOutcome, FailedUpload, ImageMetadata, ImageUrls, ProcessedImage,
    UploadedFile,
};

use super::transcode::{TranscodeOptions, Transcoder};
use super::validate::Validator;

/// Deletes a staged file when dropped.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!("Removed temp file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove temp file {:?}: {}", self.path, e),
        }
    }
}

/// Stages shared by every file task of a batch.
#[derive(Clone)]
struct FileStages {
    validator: Validator,
    transcoder: Arc<Transcoder>,
    uploader: Uploader,
    index: Arc<BlurIndex>,
    folder: Arc<str>,
}

/// Runs upload batches end to end.
pub struct UploadPipeline {
    stages: FileStages,
    max_concurrent_files: usize,
    file_timeout_ms: u64,
}

impl UploadPipeline {
    /// Create a pipeline over an explicit store and index.
    pub fn new(config: &Config, store: Arc<dyn AssetStore>, index: Arc<BlurIndex>) -> Self {
        Self {
            stages: FileStages {
                validator: Validator::new(config.limits.clone()),
                transcoder: Arc::new(Transcoder::new(
                    config.blur.clone(),
                    config.transcode.timeout_ms,
                )),
                uploader: Uploader::new(store, UploadOptions::from_config(&config.upload)),
                index,
                folder: Arc::from(config.upload.folder.as_str()),
            },
            max_concurrent_files: config.upload.max_concurrent_files.max(1),
            file_timeout_ms: config.upload.file_timeout_ms,
        }
    }

    /// Create a pipeline with the configured store and index.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let store = AssetStoreFactory::create(config)?;
        let index = Arc::new(BlurIndex::from_config(config));
        Ok(Self::new(config, store, index))
    }

    /// Override the folder derivatives are uploaded into.
    pub fn with_folder(mut self, folder: &str) -> Self {
        self.stages.folder = Arc::from(folder);
        self
    }

    pub fn index(&self) -> &BlurIndex {
        &self.stages.index
    }

    pub fn store_name(&self) -> &str {
        self.stages.uploader.store_name()
    }

    /// Process one upload batch.
    ///
    /// Takes ownership of every staged file. Fails as a whole only when the
    /// batch breaks the count or MIME contract, or when no file produced a
    /// usable derivative.
    pub async fn process_batch(
        &self,
        files: Vec<UploadedFile>,
        options: &TranscodeOptions,
    ) -> Result<BatchResult, PipelineError> {
        let start = Instant::now();
        let guards: Vec<TempFileGuard> = files
            .iter()
            .map(|f| TempFileGuard::new(&f.temp_path))
            .collect();

        // Guards drop on return, so rejected batches are cleaned up too.
        self.stages.validator.validate_batch(&files)?;

        let total = files.len();
        tracing::info!(
            "Processing {} file(s) into {:?} via {}",
            total,
            self.stages.folder,
            self.store_name()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_files));
        let mut handles = Vec::with_capacity(total);

        for (file, guard) in files.into_iter().zip(guards) {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("File semaphore closed unexpectedly, stopping batch");
                    break;
                }
            };

            let filename = file.original_filename.clone();
            let stages = self.stages.clone();
            let options = options.clone();
            let timeout_ms = self.file_timeout_ms;

            let handle = tokio::spawn(async move {
                let _guard = guard;
                let result = match tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    process_file(&stages, &file, &options),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Timeout {
                        path: PathBuf::from(&file.original_filename),
                        stage: "file".to_string(),
                        timeout_ms,
                    }),
                };
                drop(permit);
                result
            });
            handles.push((filename, handle));
        }

        let mut images = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for (filename, handle) in handles {
            let reason = match handle.await {
                Ok(Ok(image)) => {
                    images.push(image);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("processing task panicked: {e}"),
            };
            tracing::error!("Failed to process {}: {}", filename, reason);
            failures.push(FailedUpload { filename, reason });
        }

        if images.is_empty() {
            return Err(PipelineError::NoImagesProcessed {
                failed: failures.len(),
            });
        }

        let result = BatchResult::new(images, failures);
        tracing::info!(
            "Processed {}/{} image(s) in {:?}, average savings {:.1}%",
            result.summary.total,
            total,
            start.elapsed(),
            result.summary.average_savings
        );
        Ok(result)
    }
}

/// Validate, read, transcode, upload and index one file.
async fn process_file(
    stages: &FileStages,
    file: &UploadedFile,
    options: &TranscodeOptions,
) -> Result<ProcessedImage, PipelineError> {
    stages.validator.validate_file(file).await?;

    let bytes = tokio::fs::read(&file.temp_path)
        .await
        .map_err(|source| PipelineError::Io {
            path: file.temp_path.clone(),
            source,
        })?;

    let output = stages
        .transcoder
        .transcode(&file.original_filename, bytes, options)
        .await?;
    let asset = output.asset;
    if output.derivatives.is_empty() {
        return Err(PipelineError::Encode {
            format: "all".to_string(),
            message: format!("no format could be encoded for {}", file.original_filename),
        });
    }

    let base_name = base_name(&asset.original_filename);
    let uploads = stages
        .uploader
        .upload_all(output.derivatives, &stages.folder, &base_name)
        .await;

    let urls = ImageUrls::from_uploads(&uploads);
    if urls.is_empty() {
        return Err(PipelineError::Upload {
            store: stages.uploader.store_name().to_string(),
            message: format!("every upload failed for {}", file.original_filename),
            status_code: None,
        });
    }

    let blur_data_url = match output.blur {
        BlurOutcome::Generated(data_url) => Some(data_url),
        BlurOutcome::Failed(reason) => {
            tracing::debug!("No blur placeholder for {}: {}", file.original_filename, reason);
            None
        }
        BlurOutcome::NotRequested => None,
    };

    if let Some(data_url) = &blur_data_url {
        stages
            .index
            .set_many(
                urls.all()
                    .into_iter()
                    .map(|url| (url.to_string(), data_url.clone())),
            )
            .await;
    }

    let uploaded: Vec<_> = uploads.iter().filter(|u| u.remote_url.is_some()).collect();
    let metadata = ImageMetadata {
        width: asset.metadata.width,
        height: asset.metadata.height,
        format: asset.metadata.source_format,
        original_size: asset.metadata.original_size,
        optimized_sizes: uploaded.iter().map(|u| (u.format, u.size)).collect(),
        savings: uploaded.iter().map(|u| (u.format, u.savings)).collect(),
    };

    tracing::debug!(
        "Uploaded {} as {:?} ({} of {} formats)",
        file.original_filename,
        base_name,
        uploaded.len(),
        uploads.len()
    );

    Ok(ProcessedImage {
        filename: asset.original_filename,
        urls,
        blur_data_url,
        metadata,
    })
}

/// Public-id base for an upload: the file stem with anything outside
/// `[A-Za-z0-9_-]` replaced by `_`.
pub fn base_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}

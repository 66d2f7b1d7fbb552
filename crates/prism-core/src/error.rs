//! Error types for the Prism ingestion pipeline.
//!
//! Errors are organized by stage so that a failure names the file and the
//! step that produced it. Only a handful of these ever reach the caller of
//! a batch: most are caught at a component boundary and turned into the
//! absence of a format, a URL, or a placeholder.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input could not be decoded as an image (hard failure for that file)
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A single output format failed to encode
    #[error("Encode error ({format}): {message}")]
    Encode { format: String, message: String },

    /// Blur placeholder generation failed
    #[error("Blur placeholder failed: {message}")]
    Blur { message: String },

    /// Remote upload failed. `status_code` is set when the host answered.
    #[error("Upload to {store} failed: {message}")]
    Upload {
        store: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds the per-file size ceiling
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Batch exceeds the per-request file count ceiling
    #[error("Too many files in batch: {count} > {max}")]
    BatchTooLarge { count: usize, max: usize },

    /// Upload was not declared as an image
    #[error("Unsupported MIME type for {path}: {mime_type}")]
    UnsupportedMimeType { path: PathBuf, mime_type: String },

    /// Content does not start with a known image signature
    #[error("Not a recognizable image: {path}: {message}")]
    InvalidImage { path: PathBuf, message: String },

    /// Every file in the batch failed
    #[error("No images processed ({failed} file(s) failed)")]
    NoImagesProcessed { failed: usize },

    /// File system errors while handling a specific file
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

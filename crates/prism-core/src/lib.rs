//! Prism Core - storefront image ingestion library.
//!
//! Prism takes product images uploaded by a merchant and turns each one into
//! web-ready derivatives, pushes them to an asset host, and remembers a tiny
//! blurred placeholder for every resulting URL.
//!
//! # Architecture
//!
//! ```text
//! Upload → Validate → Transcode (AVIF/WebP/JPEG + blur) → Upload → Index blur → JSON
//! ```
//!
//! Every stage past validation isolates failure: a format that fails to
//! encode or upload is left out, a file that fails entirely is listed under
//! `failures`, and the batch only errors when nothing at all succeeded.
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{Config, TranscodeOptions, UploadPipeline, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = UploadPipeline::from_config(&config)?;
//!
//!     let files = vec![UploadedFile::new("/tmp/upload-1", "tee.png", "image/png")];
//!     let result = pipeline
//!         .process_batch(files, &TranscodeOptions::from_config(&config))
//!         .await?;
//!     println!("{}", result.urls[0]);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult, PrismError, Result};
pub use index::{BlurEntries, BlurIndex, ImageKeyRules};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{BlurGenerator, TranscodeOptions, Transcoder, UploadPipeline, Validator};
pub use store::{AssetStore, AssetStoreFactory, Uploader};
pub use types::{
    BatchResult, BatchSummary, DerivativeFormat, FailedUpload, ImageUrls, ProcessedImage,
    UploadedFile,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

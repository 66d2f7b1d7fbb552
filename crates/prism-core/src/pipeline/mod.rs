//! Image ingestion pipeline components.
//!
//! - **validate**: Batch checks against the upload limits
//! - **transcode**: Decode once, resize, encode AVIF/WebP/JPEG
//! - **blur**: Tiny blurred JPEG placeholders as data URLs
//! - **orchestrator**: Runs a batch through every stage with failure isolation

pub mod blur;
pub mod orchestrator;
pub mod transcode;
pub mod validate;

// Re-exports for convenient access
pub use blur::BlurGenerator;
pub use orchestrator::{base_name, TempFileGuard, UploadPipeline};
pub use transcode::{TranscodeOptions, TranscodeOutput, Transcoder};
pub use validate::Validator;

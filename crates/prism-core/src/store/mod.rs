//! Remote asset hosts for transcoded derivatives.
//!
//! Provides a store abstraction over the hosts derivatives can be pushed to
//! (Cloudinary, a local directory) and an uploader that sends all formats of
//! one asset concurrently under a timeout and retry policy.

pub(crate) mod cloudinary;
pub(crate) mod local;
pub(crate) mod provider;
pub(crate) mod retry;
pub(crate) mod uploader;

pub use cloudinary::CloudinaryStore;
pub use local::LocalStore;
pub use provider::{AssetStore, AssetStoreFactory, UploadRequest};
pub use uploader::{UploadOptions, Uploader};

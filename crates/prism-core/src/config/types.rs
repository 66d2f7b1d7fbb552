//! Sub-configuration structs with their defaults.

use crate::types::DerivativeFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transcoding defaults applied to every upload unless overridden per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Bounding box width; images are never upscaled into it
    pub max_width: u32,

    /// Bounding box height
    pub max_height: u32,

    /// Formats to generate
    pub formats: Vec<DerivativeFormat>,

    /// rav1e speed preset for AVIF (1 = slowest/best, 10 = fastest)
    pub avif_speed: u8,

    /// Timeout for decoding and encoding one image, in milliseconds
    pub timeout_ms: u64,

    /// Quality per format on a 0-100 scale
    pub quality: QualityConfig,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            formats: DerivativeFormat::ALL.to_vec(),
            avif_speed: 6,
            timeout_ms: 60_000,
            quality: QualityConfig::default(),
        }
    }
}

/// Per-format encode quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub avif: u8,
    pub webp: u8,
    pub jpeg: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            avif: 80,
            webp: 85,
            jpeg: 85,
        }
    }
}

impl QualityConfig {
    pub fn for_format(&self, format: DerivativeFormat) -> u8 {
        match format {
            DerivativeFormat::Avif => self.avif,
            DerivativeFormat::Webp => self.webp,
            DerivativeFormat::Jpeg => self.jpeg,
        }
    }
}

/// Blur placeholder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Whether to generate a placeholder for each upload
    pub enabled: bool,

    /// Bounding box of the placeholder in pixels
    pub size: u32,

    /// Gaussian blur sigma
    pub sigma: f32,

    /// JPEG quality of the placeholder
    pub quality: u8,

    /// Which derivative to build the placeholder from, first available wins.
    /// The fallback format decodes everywhere, so it comes first.
    pub source_priority: Vec<DerivativeFormat>,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 10,
            sigma: 1.0,
            quality: 70,
            source_priority: vec![
                DerivativeFormat::Jpeg,
                DerivativeFormat::Webp,
                DerivativeFormat::Avif,
            ],
        }
    }
}

/// Which remote asset host receives the derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Cloudinary,
    Local,
}

/// Upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Asset host to upload to
    pub store: StoreKind,

    /// Logical folder on the asset host
    pub folder: String,

    /// Files processed concurrently within one batch
    pub max_concurrent_files: usize,

    /// Timeout for a single format upload in milliseconds
    pub upload_timeout_ms: u64,

    /// Timeout for one file's whole processing path in milliseconds
    pub file_timeout_ms: u64,

    /// Extra attempts for a failed upload (0 = one-shot)
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Cloudinary,
            folder: "products".to_string(),
            max_concurrent_files: 4,
            upload_timeout_ms: 30_000,
            file_timeout_ms: 120_000,
            retry_attempts: 0,
            retry_delay_ms: 1000,
        }
    }
}

/// Cloudinary credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    /// Cloud name (supports ${ENV_VAR} syntax)
    pub cloud_name: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// API secret; when unset, uploads go through `upload_preset` unsigned
    pub api_secret: String,

    /// Unsigned upload preset
    pub upload_preset: Option<String>,

    /// Upload API base URL
    pub api_base: String,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: "${CLOUDINARY_CLOUD_NAME}".to_string(),
            api_key: "${CLOUDINARY_API_KEY}".to_string(),
            api_secret: "${CLOUDINARY_API_SECRET}".to_string(),
            upload_preset: None,
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }
}

/// Filesystem-backed asset host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// Directory derivatives are written to
    pub root: String,

    /// URL prefix under which `root` is served
    pub public_base_url: String,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            root: "./public/uploads".to_string(),
            public_base_url: "/uploads".to_string(),
        }
    }
}

/// Blur placeholder index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Path of the JSON sidecar file
    pub path: String,

    /// Substrings identifying CDN-hosted URLs
    pub cdn_host_markers: Vec<String>,

    /// Substrings identifying record-store attachment URLs
    pub attachment_host_markers: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: "./data/blur-placeholders.json".to_string(),
            cdn_host_markers: vec!["res.cloudinary.com".to_string()],
            attachment_host_markers: vec![
                "airtable.com".to_string(),
                "airtableusercontent.com".to_string(),
            ],
        }
    }
}

/// Limits enforced on inbound upload batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum files per batch
    pub max_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            max_files: 10,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,

    /// Per-target overrides, e.g. `{ "prism_core::store" = "debug" }`
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            targets: BTreeMap::new(),
        }
    }
}

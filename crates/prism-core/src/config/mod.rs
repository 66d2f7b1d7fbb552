//! Configuration management for Prism.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file (or no file
//! at all) yields a working setup.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Prism.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcoding defaults
    pub transcode: TranscodeConfig,

    /// Blur placeholder settings
    pub blur: BlurConfig,

    /// Upload and batch concurrency settings
    pub upload: UploadConfig,

    /// Cloudinary asset host
    pub cloudinary: CloudinaryConfig,

    /// Filesystem asset host
    pub local_store: LocalStoreConfig,

    /// Blur placeholder index
    pub index: IndexConfig,

    /// Inbound batch limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.prism.prism/config.toml
    /// - Linux: ~/.config/prism/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\prism\config\config.toml
    ///
    /// Falls back to ~/.prism/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "prism", "prism")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".prism").join("config.toml")
            })
    }

    /// Resolved blur index path (with ~ expansion).
    pub fn index_path(&self) -> PathBuf {
        expand(&self.index.path)
    }

    /// Resolved local store root (with ~ expansion).
    pub fn local_store_root(&self) -> PathBuf {
        expand(&self.local_store.root)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DerivativeFormat;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transcode.max_width, 1920);
        assert_eq!(config.transcode.max_height, 1920);
        assert_eq!(config.transcode.quality.avif, 80);
        assert_eq!(config.transcode.quality.webp, 85);
        assert_eq!(config.transcode.quality.jpeg, 85);
        assert_eq!(config.transcode.formats, DerivativeFormat::ALL.to_vec());
        assert!(config.blur.enabled);
        assert_eq!(config.limits.max_files, 10);
        assert_eq!(config.limits.max_file_size_mb, 10);
    }

    #[test]
    fn test_blur_priority_prefers_fallback() {
        let config = BlurConfig::default();
        assert_eq!(
            config.source_priority,
            vec![
                DerivativeFormat::Jpeg,
                DerivativeFormat::Webp,
                DerivativeFormat::Avif
            ]
        );
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[transcode]"));
        assert!(toml.contains("[upload]"));
        assert!(toml.contains("[index]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[transcode]\nmax_width = 800\nformats = [\"webp\"]\n\n[upload]\nstore = \"local\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.transcode.max_width, 800);
        assert_eq!(config.transcode.max_height, 1920);
        assert_eq!(config.transcode.formats, vec![DerivativeFormat::Webp]);
        assert_eq!(config.upload.store, StoreKind::Local);
        assert_eq!(config.upload.folder, "products");
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[upload]\nmax_concurrent_files = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_files"));
    }

    #[test]
    fn test_index_path_expands_tilde() {
        let mut config = Config::default();
        config.index.path = "~/blur.json".to_string();
        assert!(!config.index_path().to_string_lossy().starts_with('~'));
    }
}

//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transcode.max_width == 0 || self.transcode.max_height == 0 {
            return Err(ConfigError::ValidationError(
                "transcode.max_width and transcode.max_height must be > 0".into(),
            ));
        }
        if self.transcode.formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "transcode.formats must name at least one format".into(),
            ));
        }
        let quality = &self.transcode.quality;
        for (name, value) in [
            ("avif", quality.avif),
            ("webp", quality.webp),
            ("jpeg", quality.jpeg),
        ] {
            if value > 100 {
                return Err(ConfigError::ValidationError(format!(
                    "transcode.quality.{name} must be between 0 and 100"
                )));
            }
        }
        if !(1..=10).contains(&self.transcode.avif_speed) {
            return Err(ConfigError::ValidationError(
                "transcode.avif_speed must be between 1 and 10".into(),
            ));
        }
        if self.transcode.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "transcode.timeout_ms must be > 0".into(),
            ));
        }
        if self.blur.size == 0 {
            return Err(ConfigError::ValidationError("blur.size must be > 0".into()));
        }
        if self.blur.quality == 0 || self.blur.quality > 100 {
            return Err(ConfigError::ValidationError(
                "blur.quality must be between 1 and 100".into(),
            ));
        }
        if self.upload.max_concurrent_files == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_concurrent_files must be > 0".into(),
            ));
        }
        if self.upload.upload_timeout_ms == 0 || self.upload.file_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "upload.upload_timeout_ms and upload.file_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_files == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_files must be > 0".into(),
            ));
        }
        Ok(())
    }
}

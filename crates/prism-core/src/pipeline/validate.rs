//! Inbound validation before processing.
//!
//! Batch-level checks (file count, declared MIME type) reject a request
//! outright. Per-file checks (size, image signature) run inside each file's
//! task, so a bad file only fails itself.

use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::types::UploadedFile;

/// Enforces the upload contract.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Validate the shape of a batch. The first violation rejects it whole.
    ///
    /// Checks:
    /// - Batch holds at most `max_files` files
    /// - Each declared MIME type is `image/*`
    pub fn validate_batch(&self, files: &[UploadedFile]) -> Result<(), PipelineError> {
        if files.len() > self.limits.max_files {
            return Err(PipelineError::BatchTooLarge {
                count: files.len(),
                max: self.limits.max_files,
            });
        }

        for file in files {
            if !file.mime_type.to_ascii_lowercase().starts_with("image/") {
                return Err(PipelineError::UnsupportedMimeType {
                    path: file.temp_path.clone(),
                    mime_type: file.mime_type.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate one staged file: size limit and a known image signature.
    pub async fn validate_file(&self, file: &UploadedFile) -> Result<(), PipelineError> {
        let path = file.temp_path.as_path();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| PipelineError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        Self::check_magic_bytes(path).await
    }

    /// Check file magic bytes to verify it's a valid image format.
    async fn check_magic_bytes(path: &Path) -> Result<(), PipelineError> {
        let io_error = |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::open(path).await.map_err(io_error)?;

        let mut header = [0u8; 12];
        let mut bytes_read = 0;
        while bytes_read < header.len() {
            let n = file
                .read(&mut header[bytes_read..])
                .await
                .map_err(io_error)?;
            if n == 0 {
                break;
            }
            bytes_read += n;
        }

        if bytes_read < 4 {
            return Err(PipelineError::InvalidImage {
                path: path.to_path_buf(),
                message: "file too small to be an image".to_string(),
            });
        }

        if !Self::is_valid_image_header(&header, bytes_read) {
            return Err(PipelineError::InvalidImage {
                path: path.to_path_buf(),
                message: "unrecognized image signature".to_string(),
            });
        }

        Ok(())
    }

    /// Check if the header bytes match known image formats.
    fn is_valid_image_header(header: &[u8; 12], bytes_read: usize) -> bool {
        if bytes_read < 4 {
            return false;
        }

        // JPEG: FF D8 FF
        if header[..3] == [0xFF, 0xD8, 0xFF] {
            return true;
        }

        // PNG: 89 50 4E 47
        if header[..4] == [0x89, b'P', b'N', b'G'] {
            return true;
        }

        // GIF: GIF8
        if &header[..4] == b"GIF8" {
            return true;
        }

        // WebP: RIFF....WEBP
        if &header[..4] == b"RIFF" {
            return bytes_read >= 12 && &header[8..12] == b"WEBP";
        }

        // BMP: BM
        if &header[..2] == b"BM" {
            return true;
        }

        // TIFF: II (little-endian) or MM (big-endian) followed by version 42
        if header[..4] == [b'I', b'I', 0x2A, 0x00] || header[..4] == [b'M', b'M', 0x00, 0x2A] {
            return true;
        }

        // HEIC/HEIF/AVIF: ftyp box at offset 4
        bytes_read >= 12 && &header[4..8] == b"ftyp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_file_size_mb: 1,
            max_files: 3,
        }
    }

    fn staged(dir: &tempfile::TempDir, name: &str, bytes: &[u8], mime: &str) -> UploadedFile {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        UploadedFile::new(path, name, mime)
    }

    #[test]
    fn test_magic_bytes_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(Validator::is_valid_image_header(&header, 12));
    }

    #[test]
    fn test_magic_bytes_png() {
        assert!(Validator::is_valid_image_header(&PNG_HEADER, 12));
    }

    #[test]
    fn test_magic_bytes_webp() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'E', b'B', b'P'];
        assert!(Validator::is_valid_image_header(&header, 12));
    }

    #[test]
    fn test_magic_bytes_riff_non_webp_rejected() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'A', b'V', b'E'];
        assert!(!Validator::is_valid_image_header(&header, 12));
    }

    #[test]
    fn test_magic_bytes_avif() {
        let header = [0, 0, 0, 0x1C, b'f', b't', b'y', b'p', b'a', b'v', b'i', b'f'];
        assert!(Validator::is_valid_image_header(&header, 12));
    }

    #[test]
    fn test_magic_bytes_invalid() {
        let header = [0u8; 12];
        assert!(!Validator::is_valid_image_header(&header, 12));
    }

    #[test]
    fn test_magic_bytes_tiff() {
        let le = [b'I', b'I', 0x2A, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        let be = [b'M', b'M', 0x00, 0x2A, 0, 0, 0, 0, 0, 0, 0, 0];
        let bare = [b'I', b'I', 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(Validator::is_valid_image_header(&le, 12));
        assert!(Validator::is_valid_image_header(&be, 12));
        assert!(!Validator::is_valid_image_header(&bare, 12));
    }

    #[test]
    fn test_batch_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<_> = (0..4)
            .map(|i| staged(&dir, &format!("{i}.png"), &PNG_HEADER, "image/png"))
            .collect();
        let err = Validator::new(limits()).validate_batch(&files).unwrap_err();
        assert!(matches!(err, PipelineError::BatchTooLarge { count: 4, max: 3 }));
    }

    #[test]
    fn test_rejects_non_image_mime() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(&dir, "a.png", &PNG_HEADER, "application/pdf")];
        let err = Validator::new(limits()).validate_batch(&files).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMimeType { .. }));
    }

    #[test]
    fn test_batch_check_ignores_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            staged(&dir, "a.png", &PNG_HEADER, "image/png"),
            staged(&dir, "b.png", b"garbage", "IMAGE/PNG"),
            UploadedFile::new("/nonexistent/prism/c.png", "c.png", "image/png"),
        ];
        assert!(Validator::new(limits()).validate_batch(&files).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = PNG_HEADER.to_vec();
        bytes.resize(1024 * 1024 + 1, 0);
        let file = staged(&dir, "big.png", &bytes, "image/png");
        let err = Validator::new(limits()).validate_file(&file).await.unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { max_mb: 1, .. }));
    }

    #[tokio::test]
    async fn test_rejects_bad_signature() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "fake.jpg", b"hello world!", "image/jpeg");
        let err = Validator::new(limits()).validate_file(&file).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage { .. }));
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "empty.png", b"", "image/png");
        let err = Validator::new(limits()).validate_file(&file).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage { .. }));
    }

    #[tokio::test]
    async fn test_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "a.png", &PNG_HEADER, "image/png");
        assert!(Validator::new(limits()).validate_file(&file).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let file = UploadedFile::new("/nonexistent/prism/x.png", "x.png", "image/png");
        let err = Validator::new(limits()).validate_file(&file).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}

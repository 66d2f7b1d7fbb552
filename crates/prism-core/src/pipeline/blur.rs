//! Blur placeholder generation: a tiny blurred JPEG as a base64 data URL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};

use crate::config::BlurConfig;
use crate::error::PipelineError;

/// Scheme prefix of every placeholder produced here.
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Generates low-cost loading placeholders from images.
#[derive(Debug, Clone)]
pub struct BlurGenerator {
    config: BlurConfig,
}

impl BlurGenerator {
    /// Create a new blur generator with the given configuration.
    pub fn new(config: BlurConfig) -> Self {
        Self { config }
    }

    /// Generate a placeholder data URL from an already decoded image.
    ///
    /// The image is shrunk to fit the configured box (never cropped, never
    /// upscaled), blurred, and re-encoded as JPEG. Same input, same output.
    pub fn generate(&self, image: &DynamicImage) -> Result<String, PipelineError> {
        let size = self.config.size;
        let (width, height) = image.dimensions();

        let small = if width > size || height > size {
            image.thumbnail(size, size)
        } else {
            image.clone()
        };
        let blurred = small.blur(self.config.sigma);

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(blurred.to_rgb8());

        let mut buffer = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(
            &mut buffer,
            self.config.quality,
        ))
        .map_err(|e| PipelineError::Blur {
            message: format!("JPEG encode failed: {e}"),
        })?;

        Ok(format!("{DATA_URL_PREFIX}{}", BASE64.encode(buffer)))
    }

    /// Decode `bytes` and generate a placeholder from them.
    pub fn generate_from_bytes(&self, bytes: &[u8]) -> Result<String, PipelineError> {
        let image = image::load_from_memory(bytes).map_err(|e| PipelineError::Blur {
            message: format!("cannot decode blur source: {e}"),
        })?;
        self.generate(&image)
    }
}

/// Decode a placeholder data URL back into image bytes.
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let payload = data_url.strip_prefix(DATA_URL_PREFIX)?;
    BASE64.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn placeholder_dimensions(data_url: &str) -> (u32, u32) {
        let bytes = decode_data_url(data_url).unwrap();
        image::load_from_memory(&bytes).unwrap().dimensions()
    }

    #[test]
    fn test_placeholder_has_data_url_prefix() {
        let generator = BlurGenerator::new(BlurConfig::default());
        let url = generator.generate(&gradient(400, 300)).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(url.len() > DATA_URL_PREFIX.len());
    }

    #[test]
    fn test_placeholder_fits_ten_pixel_box() {
        let generator = BlurGenerator::new(BlurConfig::default());

        let (w, h) = placeholder_dimensions(&generator.generate(&gradient(1000, 500)).unwrap());
        assert_eq!((w, h), (10, 5));

        let (w, h) = placeholder_dimensions(&generator.generate(&gradient(300, 900)).unwrap());
        assert!(w <= 10 && h <= 10);
        assert_eq!(h, 10);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let generator = BlurGenerator::new(BlurConfig::default());
        let (w, h) = placeholder_dimensions(&generator.generate(&gradient(4, 6)).unwrap());
        assert_eq!((w, h), (4, 6));
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let generator = BlurGenerator::new(BlurConfig::default());
        let image = gradient(640, 480);
        let first = generator.generate(&image).unwrap();
        let second = generator.generate(&image).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_alpha_input_is_flattened() {
        let generator = BlurGenerator::new(BlurConfig::default());
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 50, Rgba([10, 20, 30, 128])));
        assert!(generator.generate(&image).is_ok());
    }

    #[test]
    fn test_undecodable_bytes_report_failure() {
        let generator = BlurGenerator::new(BlurConfig::default());
        let err = generator.generate_from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, PipelineError::Blur { .. }));
    }

    #[test]
    fn test_decode_data_url_rejects_other_schemes() {
        assert!(decode_data_url("data:image/png;base64,AAAA").is_none());
    }
}

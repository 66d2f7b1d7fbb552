//! Multi-format transcoding: inspect once, resize once, encode per format.

use image::codecs::avif::AvifEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{BlurConfig, Config, QualityConfig};
use crate::error::PipelineError;
use crate::types::{AssetMetadata, BlurOutcome, Derivative, DerivativeFormat, ImageAsset};

use super::blur::BlurGenerator;

/// Per-request transcoding options. Defaults come from [`Config`].
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Bounding box; images are only ever scaled down into it
    pub max_width: u32,
    pub max_height: u32,
    /// Quality per format, 0-100
    pub quality: QualityConfig,
    /// Formats to produce
    pub formats: Vec<DerivativeFormat>,
    /// Whether to produce a blur placeholder
    pub blur: bool,
    /// Order in which derivatives are tried as the blur source
    pub blur_priority: Vec<DerivativeFormat>,
    /// rav1e speed preset
    pub avif_speed: u8,
}

impl TranscodeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_width: config.transcode.max_width,
            max_height: config.transcode.max_height,
            quality: config.transcode.quality,
            formats: config.transcode.formats.clone(),
            blur: config.blur.enabled,
            blur_priority: config.blur.source_priority.clone(),
            avif_speed: config.transcode.avif_speed,
        }
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything produced from one input image.
#[derive(Debug)]
pub struct TranscodeOutput {
    /// The original upload with its pre-resize properties
    pub asset: ImageAsset,
    /// Dimensions of the resized working image
    pub output_width: u32,
    pub output_height: u32,
    /// One entry per successfully encoded format, in request order
    pub derivatives: Vec<Derivative>,
    /// Formats that were requested but failed to encode
    pub encode_failures: Vec<(DerivativeFormat, String)>,
    pub blur: BlurOutcome,
}

impl TranscodeOutput {
    pub fn derivative(&self, format: DerivativeFormat) -> Option<&Derivative> {
        self.derivatives.iter().find(|d| d.format == format)
    }
}

/// Decodes an upload and encodes its derivatives on the blocking pool.
pub struct Transcoder {
    blur: BlurGenerator,
    timeout_ms: u64,
}

impl Transcoder {
    /// Create a transcoder with the given blur settings and per-image timeout.
    pub fn new(blur: BlurConfig, timeout_ms: u64) -> Self {
        Self {
            blur: BlurGenerator::new(blur),
            timeout_ms,
        }
    }

    /// Transcode an in-memory upload, taking ownership of its bytes.
    ///
    /// Fails only if the input cannot be decoded (or the whole job times
    /// out); a format that fails to encode is left out of the result and
    /// listed in `encode_failures`.
    pub async fn transcode(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        options: &TranscodeOptions,
    ) -> Result<TranscodeOutput, PipelineError> {
        let path = Path::new(filename);
        let filename_owned = filename.to_string();
        let options = options.clone();
        let blur = self.blur.clone();
        let timeout_duration = Duration::from_millis(self.timeout_ms);

        let result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || {
                Self::transcode_sync(&filename_owned, bytes, &options, &blur)
            })
            .await
        })
        .await;

        match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {e}"),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "transcode".to_string(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    /// Synchronous transcode (runs in spawn_blocking).
    pub fn transcode_sync(
        filename: &str,
        bytes: Vec<u8>,
        options: &TranscodeOptions,
        blur: &BlurGenerator,
    ) -> Result<TranscodeOutput, PipelineError> {
        let path = Path::new(filename);
        let (image, metadata) = inspect(&bytes, path)?;

        let working = normalize(fit_inside(image, options.max_width, options.max_height));
        let (output_width, output_height) = working.dimensions();
        tracing::debug!(
            "Transcoding {:?}: {}x{} -> {}x{}",
            path,
            metadata.width,
            metadata.height,
            output_width,
            output_height
        );

        // Formats are independent; encode them side by side.
        let encoded: Vec<(DerivativeFormat, Result<Vec<u8>, PipelineError>)> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = options
                    .formats
                    .iter()
                    .map(|&format| {
                        let working = &working;
                        let quality = options.quality.for_format(format);
                        let speed = options.avif_speed;
                        (
                            format,
                            scope.spawn(move || encode(working, format, quality, speed)),
                        )
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(format, handle)| {
                        let result = handle.join().unwrap_or_else(|_| {
                            Err(PipelineError::Encode {
                                format: format.to_string(),
                                message: "encoder panicked".to_string(),
                            })
                        });
                        (format, result)
                    })
                    .collect()
            });

        let mut derivatives = Vec::with_capacity(encoded.len());
        let mut encode_failures = Vec::new();
        for (format, result) in encoded {
            match result {
                Ok(buffer) => {
                    derivatives.push(Derivative::new(format, buffer, metadata.original_size))
                }
                Err(e) => {
                    tracing::warn!("Skipping {} for {:?}: {}", format, path, e);
                    encode_failures.push((format, e.to_string()));
                }
            }
        }

        let blur = if options.blur {
            blur_from_derivatives(blur, &derivatives, &options.blur_priority)
        } else {
            BlurOutcome::NotRequested
        };

        Ok(TranscodeOutput {
            asset: ImageAsset {
                original_filename: filename.to_string(),
                original_bytes: bytes,
                metadata,
            },
            output_width,
            output_height,
            derivatives,
            encode_failures,
            blur,
        })
    }
}

/// Decode `bytes` and capture the asset's fixed baseline properties.
pub fn inspect(bytes: &[u8], path: &Path) -> Result<(DynamicImage, AssetMetadata), PipelineError> {
    use std::io::Cursor;

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(path, format!("Cannot detect image format: {e}")))?;
    let format = reader.format();
    let image = reader
        .decode()
        .map_err(|e| decode_error(path, e.to_string()))?;

    let (width, height) = image.dimensions();
    let metadata = AssetMetadata {
        width,
        height,
        source_format: format.map(format_to_string).unwrap_or_else(|| "unknown".to_string()),
        original_size: bytes.len() as u64,
    };
    Ok((image, metadata))
}

fn decode_error(path: &Path, message: String) -> PipelineError {
    PipelineError::Decode {
        path: PathBuf::from(path),
        message,
    }
}

/// Scale down to fit the box, preserving aspect ratio. Never upscales.
pub fn fit_inside(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image;
    }
    image.resize(max_width, max_height, FilterType::Lanczos3)
}

/// Reduce to 8-bit RGB or RGBA, the layouts every encoder here accepts.
fn normalize(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        _ if image.color().has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Composite transparent pixels onto white for formats without alpha.
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgba8(rgba) => RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let p = rgba.get_pixel(x, y).0;
            let alpha = p[3] as u32;
            let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
            Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
        }),
        other => other.to_rgb8(),
    }
}

/// Encode the working image into one format.
fn encode(
    image: &DynamicImage,
    format: DerivativeFormat,
    quality: u8,
    avif_speed: u8,
) -> Result<Vec<u8>, PipelineError> {
    let err = |message: String| PipelineError::Encode {
        format: format.to_string(),
        message,
    };

    match format {
        DerivativeFormat::Avif => {
            let mut buffer = Vec::new();
            image
                .write_with_encoder(AvifEncoder::new_with_speed_quality(
                    &mut buffer,
                    avif_speed,
                    quality,
                ))
                .map_err(|e| err(e.to_string()))?;
            Ok(buffer)
        }
        DerivativeFormat::Webp => {
            let encoder = webp::Encoder::from_image(image).map_err(|e| err(e.to_string()))?;
            Ok(encoder.encode(quality as f32).to_vec())
        }
        DerivativeFormat::Jpeg => {
            let rgb = flatten_on_white(image);
            let width = u16::try_from(rgb.width())
                .map_err(|_| err(format!("width {} exceeds JPEG limit", rgb.width())))?;
            let height = u16::try_from(rgb.height())
                .map_err(|_| err(format!("height {} exceeds JPEG limit", rgb.height())))?;

            let mut buffer = Vec::new();
            // The JPEG quality scale starts at 1.
            let mut encoder = jpeg_encoder::Encoder::new(&mut buffer, quality.max(1));
            encoder.set_progressive(true);
            encoder.set_optimized_huffman_tables(true);
            encoder
                .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
                .map_err(|e| err(e.to_string()))?;
            Ok(buffer)
        }
    }
}

/// Build the placeholder from the first derivative in `priority` that yields one.
fn blur_from_derivatives(
    generator: &BlurGenerator,
    derivatives: &[Derivative],
    priority: &[DerivativeFormat],
) -> BlurOutcome {
    let mut last_error = "no derivative available as blur source".to_string();
    for format in priority {
        let Some(source) = derivatives.iter().find(|d| d.format == *format) else {
            continue;
        };
        match generator.generate_from_bytes(&source.buffer) {
            Ok(url) => return BlurOutcome::Generated(url),
            Err(e) => {
                tracing::debug!("Blur from {} failed: {}", format, e);
                last_error = e.to_string();
            }
        }
    }
    tracing::warn!("No blur placeholder: {}", last_error);
    BlurOutcome::Failed(last_error)
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        _ => "unknown".to_string(),
    }
}

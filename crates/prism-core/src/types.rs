//! Core data types for the Prism ingestion pipeline.
//!
//! The in-memory types (`ImageAsset`, `Derivative`) live only for the length
//! of one upload request. The serializable types (`BatchResult` and friends)
//! are what the upload endpoint hands back to the storefront, so their JSON
//! field names are camelCase to match what the rendering layer reads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The three encodings every upload is transcoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeFormat {
    /// Next-gen compressed format
    Avif,
    /// Wide-compatibility compressed format
    Webp,
    /// Universal fallback, also served as the "primary" product image
    Jpeg,
}

impl DerivativeFormat {
    /// All formats, in generation order.
    pub const ALL: [DerivativeFormat; 3] = [Self::Avif, Self::Webp, Self::Jpeg];

    /// Lowercase identifier, also used as the file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
        }
    }

    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Remote object name for this format.
    ///
    /// The fallback keeps the bare base name so consumers that expect
    /// "the" product image URL keep working.
    pub fn public_id(&self, base: &str) -> String {
        match self {
            Self::Jpeg => base.to_string(),
            other => format!("{base}_{}", other.as_str()),
        }
    }
}

impl fmt::Display for DerivativeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivativeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "avif" => Ok(Self::Avif),
            "webp" => Ok(Self::Webp),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(format!("unknown derivative format: {other}")),
        }
    }
}

/// Properties of the uploaded original, captured once before any resize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub width: u32,
    pub height: u32,
    /// Detected source format ("png", "jpeg", ...)
    pub source_format: String,
    /// Byte length of the original upload; baseline for every savings figure
    pub original_size: u64,
}

/// One uploaded image while it is being processed.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub original_filename: String,
    pub original_bytes: Vec<u8>,
    pub metadata: AssetMetadata,
}

/// An encoded output in one format, not yet uploaded.
#[derive(Debug, Clone)]
pub struct Derivative {
    pub format: DerivativeFormat,
    pub buffer: Vec<u8>,
    /// Encoded size in bytes
    pub size: u64,
    /// Percentage saved against the original; negative if the output grew
    pub savings: f64,
}

impl Derivative {
    /// Wrap an encoded buffer, computing size and savings against `original_size`.
    pub fn new(format: DerivativeFormat, buffer: Vec<u8>, original_size: u64) -> Self {
        let size = buffer.len() as u64;
        Self {
            format,
            buffer,
            size,
            savings: savings_percent(original_size, size),
        }
    }
}

/// `(1 - size / original) * 100`. Zero-sized originals report no savings.
pub fn savings_percent(original_size: u64, size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - size as f64 / original_size as f64) * 100.0
}

/// Whether and how a blur placeholder was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum BlurOutcome {
    /// Blur generation was turned off for this request
    NotRequested,
    /// A `data:image/jpeg;base64,...` URL
    Generated(String),
    /// Generation was attempted and failed; the reason is kept for logs
    Failed(String),
}

impl BlurOutcome {
    /// The data URL, if one was generated.
    pub fn data_url(&self) -> Option<&str> {
        match self {
            Self::Generated(url) => Some(url),
            _ => None,
        }
    }
}

/// A derivative after its upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedDerivative {
    pub format: DerivativeFormat,
    pub size: u64,
    pub savings: f64,
    /// Set if and only if the upload succeeded
    pub remote_url: Option<String>,
}

/// An inbound file staged on disk by the caller.
///
/// The pipeline takes ownership of `temp_path` and deletes it once the file
/// has been handled, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub temp_path: PathBuf,
    /// Name the client sent; drives the public id of every derivative
    pub original_filename: String,
    /// Declared MIME type
    pub mime_type: String,
}

impl UploadedFile {
    pub fn new(
        temp_path: impl Into<PathBuf>,
        original_filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            temp_path: temp_path.into(),
            original_filename: original_filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

// === Batch response ===

/// Derivative URLs for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avif: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg: Option<String>,

    /// Alias of `jpeg`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
}

impl ImageUrls {
    /// Build from upload results; formats without a remote URL are left out.
    pub fn from_uploads(uploads: &[UploadedDerivative]) -> Self {
        let mut urls = Self::default();
        for upload in uploads {
            let Some(url) = upload.remote_url.clone() else {
                continue;
            };
            match upload.format {
                DerivativeFormat::Avif => urls.avif = Some(url),
                DerivativeFormat::Webp => urls.webp = Some(url),
                DerivativeFormat::Jpeg => {
                    urls.primary = Some(url.clone());
                    urls.jpeg = Some(url);
                }
            }
        }
        urls
    }

    pub fn get(&self, format: DerivativeFormat) -> Option<&str> {
        match format {
            DerivativeFormat::Avif => self.avif.as_deref(),
            DerivativeFormat::Webp => self.webp.as_deref(),
            DerivativeFormat::Jpeg => self.jpeg.as_deref(),
        }
    }

    /// Every URL that was obtained, without the `primary` duplicate.
    pub fn all(&self) -> Vec<&str> {
        DerivativeFormat::ALL
            .iter()
            .filter_map(|f| self.get(*f))
            .collect()
    }

    /// The primary URL, or the best other URL when the fallback upload failed.
    pub fn best(&self) -> Option<&str> {
        self.primary
            .as_deref()
            .or(self.webp.as_deref())
            .or(self.avif.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }
}

/// Size and savings figures for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Pre-resize width
    pub width: u32,

    /// Pre-resize height
    pub height: u32,

    /// Detected source format
    pub format: String,

    pub original_size: u64,

    /// Encoded size per uploaded format
    pub optimized_sizes: BTreeMap<DerivativeFormat, u64>,

    /// Savings percentage per uploaded format
    pub savings: BTreeMap<DerivativeFormat, f64>,
}

/// One successfully processed image in the batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub filename: String,

    pub urls: ImageUrls,

    #[serde(rename = "blurDataURL", skip_serializing_if = "Option::is_none")]
    pub blur_data_url: Option<String>,

    pub metadata: ImageMetadata,
}

impl ProcessedImage {
    /// The format whose size stands in for "the optimized size" of this image.
    ///
    /// Next-gen first, then the compressed fallbacks.
    pub fn representative_format(&self) -> Option<DerivativeFormat> {
        [
            DerivativeFormat::Avif,
            DerivativeFormat::Webp,
            DerivativeFormat::Jpeg,
        ]
        .into_iter()
        .find(|f| self.metadata.optimized_sizes.contains_key(f))
    }
}

/// A file that contributed nothing to the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub filename: String,
    pub reason: String,
}

/// Batch-level aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of successfully processed images
    pub total: usize,
    pub total_original_size: u64,
    /// Sum of each image's representative (next-gen) size
    pub total_optimized_size: u64,
    /// Mean of each image's representative savings percentage
    pub average_savings: f64,
}

impl BatchSummary {
    /// Aggregate over the successful images of a batch.
    pub fn from_images(images: &[ProcessedImage]) -> Self {
        let mut summary = Self {
            total: images.len(),
            ..Self::default()
        };
        let mut savings_sum = 0.0;
        for image in images {
            summary.total_original_size += image.metadata.original_size;
            if let Some(format) = image.representative_format() {
                summary.total_optimized_size += image.metadata.optimized_sizes[&format];
                savings_sum += image.metadata.savings.get(&format).copied().unwrap_or(0.0);
            }
        }
        if !images.is_empty() {
            summary.average_savings = savings_sum / images.len() as f64;
        }
        summary
    }
}

/// Response of one upload request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,

    /// One URL per processed image (see [`ImageUrls::best`])
    pub urls: Vec<String>,

    pub images: Vec<ProcessedImage>,

    pub summary: BatchSummary,

    /// Files that were dropped from `images`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedUpload>,
}

impl BatchResult {
    pub fn new(images: Vec<ProcessedImage>, failures: Vec<FailedUpload>) -> Self {
        let urls = images
            .iter()
            .filter_map(|img| img.urls.best().map(String::from))
            .collect();
        let summary = BatchSummary::from_images(&images);
        Self {
            success: !images.is_empty(),
            urls,
            images,
            summary,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded(format: DerivativeFormat, url: Option<&str>) -> UploadedDerivative {
        UploadedDerivative {
            format,
            size: 100,
            savings: 50.0,
            remote_url: url.map(String::from),
        }
    }

    fn image_with(original: u64, sizes: &[(DerivativeFormat, u64)]) -> ProcessedImage {
        let optimized_sizes: BTreeMap<_, _> = sizes.iter().copied().collect();
        let savings = sizes
            .iter()
            .map(|(f, s)| (*f, savings_percent(original, *s)))
            .collect();
        ProcessedImage {
            filename: "x.png".to_string(),
            urls: ImageUrls::default(),
            blur_data_url: None,
            metadata: ImageMetadata {
                width: 10,
                height: 10,
                format: "png".to_string(),
                original_size: original,
                optimized_sizes,
                savings,
            },
        }
    }

    #[test]
    fn test_savings_formula() {
        assert!((savings_percent(1000, 250) - 75.0).abs() < 1e-9);
        assert!((savings_percent(1000, 1000)).abs() < 1e-9);
    }

    #[test]
    fn test_savings_negative_when_derivative_grows() {
        let s = savings_percent(100, 150);
        assert!((s + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_derivative_new_computes_size_and_savings() {
        let d = Derivative::new(DerivativeFormat::Webp, vec![0u8; 40], 200);
        assert_eq!(d.size, 40);
        assert!((d.savings - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_public_id_suffixes() {
        assert_eq!(DerivativeFormat::Avif.public_id("shirt"), "shirt_avif");
        assert_eq!(DerivativeFormat::Webp.public_id("shirt"), "shirt_webp");
        assert_eq!(DerivativeFormat::Jpeg.public_id("shirt"), "shirt");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("AVIF".parse::<DerivativeFormat>(), Ok(DerivativeFormat::Avif));
        assert_eq!("jpg".parse::<DerivativeFormat>(), Ok(DerivativeFormat::Jpeg));
        assert!("gif".parse::<DerivativeFormat>().is_err());
    }

    #[test]
    fn test_urls_primary_aliases_jpeg() {
        let urls = ImageUrls::from_uploads(&[
            uploaded(DerivativeFormat::Avif, Some("a")),
            uploaded(DerivativeFormat::Jpeg, Some("j")),
        ]);
        assert_eq!(urls.primary.as_deref(), Some("j"));
        assert_eq!(urls.jpeg.as_deref(), Some("j"));
        assert_eq!(urls.best(), Some("j"));
        assert_eq!(urls.all(), vec!["a", "j"]);
    }

    #[test]
    fn test_urls_without_fallback_have_no_primary() {
        let urls = ImageUrls::from_uploads(&[
            uploaded(DerivativeFormat::Avif, Some("a")),
            uploaded(DerivativeFormat::Webp, Some("w")),
            uploaded(DerivativeFormat::Jpeg, None),
        ]);
        assert!(urls.primary.is_none());
        assert!(urls.jpeg.is_none());
        assert_eq!(urls.best(), Some("w"));
    }

    #[test]
    fn test_summary_uses_next_gen_size() {
        let images = vec![
            image_with(
                1000,
                &[(DerivativeFormat::Avif, 100), (DerivativeFormat::Jpeg, 500)],
            ),
            image_with(2000, &[(DerivativeFormat::Avif, 1000)]),
        ];
        let summary = BatchSummary::from_images(&images);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.total_original_size, 3000);
        assert_eq!(summary.total_optimized_size, 1100);
        // (90 + 50) / 2
        assert!((summary.average_savings - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_falls_back_when_next_gen_missing() {
        let images = vec![image_with(1000, &[(DerivativeFormat::Webp, 400)])];
        let summary = BatchSummary::from_images(&images);
        assert_eq!(summary.total_optimized_size, 400);
        assert!((summary.average_savings - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_result_json_shape() {
        let mut image = image_with(1000, &[(DerivativeFormat::Avif, 100)]);
        image.urls.avif = Some("https://cdn/x_avif.avif".to_string());
        image.blur_data_url = Some("data:image/jpeg;base64,AA==".to_string());
        let result = BatchResult::new(vec![image], vec![]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["urls"][0], "https://cdn/x_avif.avif");
        assert!(json["images"][0]["blurDataURL"].is_string());
        assert_eq!(json["images"][0]["metadata"]["originalSize"], 1000);
        assert_eq!(json["images"][0]["metadata"]["optimizedSizes"]["avif"], 100);
        assert_eq!(json["summary"]["totalOriginalSize"], 1000);
        assert!(json.get("failures").is_none());
        assert!(json["images"][0]["urls"].get("primary").is_none());
    }
}

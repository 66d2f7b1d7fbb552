//! Image key normalization.
//!
//! The same logical asset shows up under different hosts and query strings;
//! the key strips that down to a stable name so a placeholder stored at upload
//! time can be found again by whatever URL the renderer holds.

use crate::config::IndexConfig;

/// Extensions recognized on CDN URLs.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif"];

/// Host markers that decide which normalization rule applies.
#[derive(Debug, Clone)]
pub struct ImageKeyRules {
    cdn_host_markers: Vec<String>,
    attachment_host_markers: Vec<String>,
}

impl Default for ImageKeyRules {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

impl ImageKeyRules {
    pub fn new(cdn_host_markers: Vec<String>, attachment_host_markers: Vec<String>) -> Self {
        Self {
            cdn_host_markers,
            attachment_host_markers,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(
            config.cdn_host_markers.clone(),
            config.attachment_host_markers.clone(),
        )
    }

    /// Normalize a URL (or local path) into its index key.
    ///
    /// 1. CDN URL that itself ends in an image extension: file name without
    ///    the extension. A query string after the extension disqualifies it.
    /// 2. Record-store attachment URL: the path segment before the query.
    /// 3. Anything else: last `/` segment, query stripped.
    pub fn image_key(&self, url: &str) -> String {
        if self.is_cdn(url) {
            if let Some(stem) = image_stem(last_segment(url)) {
                return stem.to_string();
            }
        }

        let path = strip_query(url);

        if self.is_attachment(url) {
            return last_segment(path).to_string();
        }

        last_segment(path).to_string()
    }

    fn is_cdn(&self, url: &str) -> bool {
        self.cdn_host_markers.iter().any(|m| url.contains(m.as_str()))
    }

    fn is_attachment(&self, url: &str) -> bool {
        self.attachment_host_markers
            .iter()
            .any(|m| url.contains(m.as_str()))
    }
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// File stem if `segment` carries a known image extension.
fn image_stem(segment: &str) -> Option<&str> {
    let (stem, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext.as_str())).then_some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ImageKeyRules {
        ImageKeyRules::default()
    }

    #[test]
    fn test_cdn_url_uses_stem() {
        let key = rules().image_key(
            "https://res.cloudinary.com/demo/image/upload/v1700000000/products/linen-tee_webp.webp",
        );
        assert_eq!(key, "linen-tee_webp");
    }

    #[test]
    fn test_cdn_query_variants_share_key() {
        let r = rules();
        let a = r.image_key("https://res.cloudinary.com/demo/image/upload/products/tee.jpg?w=400");
        let b = r.image_key("https://res.cloudinary.com/demo/image/upload/products/tee.jpg?w=800&q=auto");
        assert_eq!(a, "tee.jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn test_cdn_extension_must_end_the_url() {
        let r = rules();
        assert_eq!(
            r.image_key("https://res.cloudinary.com/d/image/upload/p/tee.jpg"),
            "tee"
        );
        assert_eq!(
            r.image_key("https://res.cloudinary.com/d/image/upload/p/tee.jpg?w=400"),
            "tee.jpg"
        );
        assert_eq!(
            r.image_key("https://res.cloudinary.com/d/image/upload/p/tee.jpg#zoom"),
            "tee.jpg"
        );
    }

    #[test]
    fn test_cdn_distinct_files_distinct_keys() {
        let r = rules();
        let a = r.image_key("https://res.cloudinary.com/demo/image/upload/products/tee.jpg");
        let b = r.image_key("https://res.cloudinary.com/demo/image/upload/products/hoodie.jpg");
        let c = r.image_key("https://res.cloudinary.com/demo/image/upload/products/tee_avif.avif");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cdn_without_extension_falls_through() {
        let key = rules().image_key("https://res.cloudinary.com/demo/image/upload/products/tee");
        assert_eq!(key, "tee");
    }

    #[test]
    fn test_attachment_url_uses_segment_before_query() {
        let key = rules().image_key(
            "https://v5.airtableusercontent.com/v3/u/27/27/1700000000000/AbCdEf/front.png?expires=1",
        );
        assert_eq!(key, "front.png");
    }

    #[test]
    fn test_local_path() {
        assert_eq!(rules().image_key("/images/products/tee.png?v=3"), "tee.png");
        assert_eq!(rules().image_key("tee.png"), "tee.png");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let r = rules();
        for url in [
            "https://res.cloudinary.com/demo/image/upload/products/tee_webp.webp?x=1",
            "https://res.cloudinary.com/demo/image/upload/products/tee_webp.webp",
            "https://dl.airtable.com/.attachments/abc/def/back.jpg?ts=2",
            "/uploads/products/tee.jpeg",
        ] {
            let once = r.image_key(url);
            assert_eq!(r.image_key(&once), once);
        }
    }

    #[test]
    fn test_custom_markers() {
        let r = ImageKeyRules::new(vec!["cdn.shop.example".to_string()], vec![]);
        assert_eq!(r.image_key("https://cdn.shop.example/a/b/tee.WEBP"), "tee");
        assert_eq!(
            r.image_key("https://res.cloudinary.com/demo/image/upload/tee.jpg"),
            "tee.jpg"
        );
    }
}

//! Cloudinary asset store using the Upload API.
//!
//! Sends each derivative as a base64 data URL in a JSON body. Uploads are
//! signed with SHA-256 when an API secret is available, otherwise they go
//! through an unsigned upload preset.

use super::provider::{resolve_env_var, AssetStore, UploadRequest};
use crate::config::CloudinaryConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// How requests are authorized.
#[derive(Debug, Clone)]
enum Auth {
    Signed { api_key: String, api_secret: String },
    Unsigned { upload_preset: String },
}

/// Cloudinary image upload client.
pub struct CloudinaryStore {
    endpoint: String,
    auth: Auth,
    client: reqwest::Client,
}

impl CloudinaryStore {
    /// Build from config, resolving `${ENV_VAR}` credentials.
    pub fn from_config(config: &CloudinaryConfig) -> Result<Self, PipelineError> {
        let cloud_name = resolve_env_var(&config.cloud_name)
            .ok_or_else(|| setup_error("Cloudinary cloud name not set. Set CLOUDINARY_CLOUD_NAME."))?;

        let signed = resolve_env_var(&config.api_key).zip(resolve_env_var(&config.api_secret));
        let auth = match (signed, &config.upload_preset) {
            (Some((api_key, api_secret)), _) => Auth::Signed {
                api_key,
                api_secret,
            },
            (None, Some(preset)) => Auth::Unsigned {
                upload_preset: preset.clone(),
            },
            (None, None) => {
                return Err(setup_error(
                    "Cloudinary credentials not set. Set CLOUDINARY_API_KEY and \
                     CLOUDINARY_API_SECRET, or configure cloudinary.upload_preset.",
                ))
            }
        };

        Ok(Self {
            endpoint: format!(
                "{}/{}/image/upload",
                config.api_base.trim_end_matches('/'),
                cloud_name
            ),
            auth,
            client: reqwest::Client::new(),
        })
    }

    fn build_body(&self, request: &UploadRequest, timestamp: u64) -> UploadBody {
        let file = format!(
            "data:{};base64,{}",
            request.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&request.bytes)
        );

        match &self.auth {
            Auth::Signed {
                api_key,
                api_secret,
            } => {
                let ts = timestamp.to_string();
                let params = [
                    ("folder", request.folder.as_str()),
                    ("overwrite", "true"),
                    ("public_id", request.public_id.as_str()),
                    ("timestamp", ts.as_str()),
                ]
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");

                UploadBody {
                    file,
                    folder: request.folder.clone(),
                    public_id: request.public_id.clone(),
                    overwrite: Some(true),
                    timestamp: Some(timestamp),
                    api_key: Some(api_key.clone()),
                    signature: Some(sign(&params, api_secret)),
                    signature_algorithm: Some("sha256".to_string()),
                    upload_preset: None,
                }
            }
            Auth::Unsigned { upload_preset } => UploadBody {
                file,
                folder: request.folder.clone(),
                public_id: request.public_id.clone(),
                overwrite: None,
                timestamp: None,
                api_key: None,
                signature: None,
                signature_algorithm: None,
                upload_preset: Some(upload_preset.clone()),
            },
        }
    }
}

fn setup_error(message: &str) -> PipelineError {
    PipelineError::Upload {
        store: "cloudinary".to_string(),
        message: message.to_string(),
        status_code: None,
    }
}

/// Hex SHA-256 of the sorted parameter string followed by the secret.
fn sign(params: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

// --- Request types ---

#[derive(Serialize)]
struct UploadBody {
    file: String,
    folder: String,
    public_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    overwrite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_preset: Option<String>,
}

// --- Response types ---

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl AssetStore for CloudinaryStore {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn upload(&self, request: &UploadRequest) -> Result<String, PipelineError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let body = self.build_body(request, timestamp);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Upload {
                store: self.name().to_string(),
                message: format!("request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(PipelineError::Upload {
                store: self.name().to_string(),
                message: format!("HTTP {status}: {detail}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: UploadResponse = resp.json().await.map_err(|e| PipelineError::Upload {
            store: self.name().to_string(),
            message: format!("failed to parse response: {e}"),
            status_code: None,
        })?;

        tracing::debug!("Uploaded {}/{} -> {}", request.folder, request.public_id, parsed.secure_url);
        Ok(parsed.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DerivativeFormat;

    fn signed_config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key123".to_string(),
            api_secret: "secret".to_string(),
            upload_preset: None,
            api_base: "https://api.cloudinary.com/v1_1/".to_string(),
        }
    }

    #[test]
    fn test_endpoint_includes_cloud_name() {
        let store = CloudinaryStore::from_config(&signed_config()).unwrap();
        assert_eq!(
            store.endpoint,
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_signature_is_sha256_hex() {
        // Known SHA-256 of "abc"
        assert_eq!(
            sign("ab", "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_signed_body() {
        let store = CloudinaryStore::from_config(&signed_config()).unwrap();
        let request = UploadRequest::new(vec![1, 2, 3], "products", "tee", DerivativeFormat::Webp);
        let body = store.build_body(&request, 1_700_000_000);

        assert!(body.file.starts_with("data:image/webp;base64,"));
        assert_eq!(body.public_id, "tee_webp");
        assert_eq!(body.api_key.as_deref(), Some("key123"));
        assert_eq!(
            body.signature.as_deref(),
            Some(
                sign(
                    "folder=products&overwrite=true&public_id=tee_webp&timestamp=1700000000",
                    "secret"
                )
                .as_str()
            )
        );
        assert!(body.upload_preset.is_none());
    }

    #[test]
    fn test_unsigned_body_uses_preset() {
        let config = CloudinaryConfig {
            api_key: String::new(),
            api_secret: String::new(),
            upload_preset: Some("storefront".to_string()),
            ..signed_config()
        };
        let store = CloudinaryStore::from_config(&config).unwrap();
        let request = UploadRequest::new(vec![1], "products", "tee", DerivativeFormat::Jpeg);
        let body = store.build_body(&request, 1);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["upload_preset"], "storefront");
        assert_eq!(json["public_id"], "tee");
        assert!(json.get("signature").is_none());
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = CloudinaryConfig {
            api_key: String::new(),
            api_secret: String::new(),
            ..signed_config()
        };
        assert!(CloudinaryStore::from_config(&config).is_err());
    }
}

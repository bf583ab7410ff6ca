//! Image store client for the Cloudinary upload API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::info;

use crate::config::{CloudinaryConfig, SignatureAlgorithm};
use crate::form::UploadedFile;
use crate::{Error, Result};

const CLOUDINARY_API_URL: &str = "https://api.cloudinary.com/v1_1";
const LIST_PAGE_SIZE: u32 = 500;

/// Reference to an image held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    pub url: String,
    pub public_id: String,
}

/// Operations the CMS needs from an image host.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredImage>;

    async fn delete(&self, public_id: &str) -> Result<()>;

    /// All images whose public id starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredImage>>;
}

/// Upload with a time budget; an overrun aborts with [`Error::Timeout`].
pub async fn upload_with_timeout(
    store: &dyn ImageStore,
    file: &UploadedFile,
    folder: &str,
    timeout: Duration,
) -> Result<StoredImage> {
    match tokio::time::timeout(timeout, store.upload(file, folder)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "Image upload exceeded {}s",
            timeout.as_secs()
        ))),
    }
}

/// Derive the store's public id from a delivery URL.
///
/// `https://res.cloudinary.com/demo/image/upload/v1712/blogs/cat.jpg?x=1` → `blogs/cat`
pub fn public_id_from_url(url: &str) -> Option<String> {
    let clean = url.split('?').next().unwrap_or(url);
    let (_, after_upload) = clean.rsplit_once("/upload/")?;

    let without_version = match after_upload.split_once('/') {
        Some((segment, rest))
            if segment.len() > 1
                && segment.starts_with('v')
                && segment[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => after_upload,
    };

    let public_id = match without_version.rfind('.') {
        Some(dot) if dot + 1 < without_version.len() && !without_version[dot..].contains('/') => {
            &without_version[..dot]
        }
        _ => without_version,
    };

    Some(public_id.to_string()).filter(|id| !id.is_empty())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ResourceListResponse {
    #[serde(default)]
    resources: Vec<UploadResponse>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary REST client.
pub struct CloudinaryClient {
    http_client: reqwest::Client,
    config: CloudinaryConfig,
    base_url: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self::with_base_url(config, CLOUDINARY_API_URL)
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(config: CloudinaryConfig, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.config.cloud_name, path)
    }

    /// Hex digest of the sorted, `&`-joined params plus the API secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let payload = format!("{}{}", to_sign, self.config.api_secret);
        match self.config.signature_algorithm {
            SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
            SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => format!("{} ({})", body.error.message, status),
        Err(_) => format!("HTTP {}: {}", status, text),
    }
}

#[async_trait]
impl ImageStore for CloudinaryClient {
    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredImage> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("folder", folder), ("timestamp", &timestamp)]);

        let mut part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| Error::Upload(format!("Invalid content type: {}", e)))?;
        }

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", self.config.signature_algorithm.as_str())
            .part("file", part);

        let response = self
            .http_client
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| match Error::from(e) {
                Error::Upstream(msg) => Error::Upload(msg),
                other => other,
            })?;

        if !response.status().is_success() {
            return Err(Error::Upload(error_message(response).await));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| Error::Upload(format!("Failed to parse upload response: {}", e)))?;

        info!("Uploaded image {} to folder {}", uploaded.public_id, folder);

        Ok(StoredImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", &timestamp)]);

        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.config.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", self.config.signature_algorithm.as_str()),
        ];

        let response = self
            .http_client
            .post(self.endpoint("image/destroy"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Image delete failed: {}",
                error_message(response).await
            )));
        }

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse delete response: {}", e)))?;

        if destroyed.result != "ok" {
            return Err(Error::Upstream(format!(
                "Image delete for {} returned '{}'",
                public_id, destroyed.result
            )));
        }

        info!("Deleted image {}", public_id);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredImage>> {
        let mut images = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("type", "upload".to_string()),
                ("prefix", prefix.to_string()),
                ("max_results", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(next) = &cursor {
                query.push(("next_cursor", next.clone()));
            }

            let response = self
                .http_client
                .get(self.endpoint("resources/image/upload"))
                .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
                .query(&query)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Error::Upstream(format!(
                    "Image listing failed: {}",
                    error_message(response).await
                )));
            }

            let page: ResourceListResponse = response
                .json()
                .await
                .map_err(|e| Error::Upstream(format!("Failed to parse listing: {}", e)))?;

            images.extend(page.resources.into_iter().map(|r| StoredImage {
                url: r.secure_url,
                public_id: r.public_id,
            }));

            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key123".into(),
            api_secret: "secret456".into(),
            signature_algorithm: SignatureAlgorithm::Sha1,
        }
    }

    fn png() -> UploadedFile {
        UploadedFile {
            file_name: "banner.png".into(),
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(b"PNG-banner"),
        }
    }

    #[test]
    fn test_public_id_strip_rules() {
        assert_eq!(
            public_id_from_url(
                "https://res.cloudinary.com/demo/image/upload/v1712345678/blogs/cat.jpg?_a=BAE"
            )
            .as_deref(),
            Some("blogs/cat")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/testimonials/a.b.png")
                .as_deref(),
            Some("testimonials/a.b")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/v12/noext").as_deref(),
            Some("noext")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/video/clip.mp4")
                .as_deref(),
            Some("video/clip")
        );
        assert!(public_id_from_url("https://example.com/cat.jpg").is_none());
        assert!(public_id_from_url("").is_none());
    }

    #[test]
    fn test_version_without_digits_is_kept() {
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/vacation/beach.jpg")
                .as_deref(),
            Some("vacation/beach")
        );
    }

    #[test]
    fn test_signature_is_order_independent() {
        let client = CloudinaryClient::new(config());
        let a = client.sign(&[("timestamp", "1"), ("folder", "blogs")]);
        let b = client.sign(&[("folder", "blogs"), ("timestamp", "1")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert_eq!(a, hex::encode(Sha1::digest(b"folder=blogs&timestamp=1secret456")));
    }

    #[test]
    fn test_signature_with_sha256_account() {
        let client = CloudinaryClient::new(CloudinaryConfig {
            signature_algorithm: SignatureAlgorithm::Sha256,
            ..config()
        });
        let signature = client.sign(&[("public_id", "blogs/cat"), ("timestamp", "1")]);
        assert_eq!(signature.len(), 64);
        assert_eq!(
            signature,
            hex::encode(Sha256::digest(b"public_id=blogs/cat&timestamp=1secret456"))
        );
    }

    #[tokio::test]
    async fn test_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("name=\"folder\""))
            .and(body_string_contains("name=\"signature_algorithm\"\r\n\r\nsha1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "public_id": "blogs/banner",
                "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/blogs/banner.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudinaryClient::with_base_url(config(), server.uri());
        let image = client.upload(&png(), "blogs").await.unwrap();
        assert_eq!(image.public_id, "blogs/banner");
        assert!(image.url.ends_with("banner.png"));
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid Signature"}
            })))
            .mount(&server)
            .await;

        let client = CloudinaryClient::with_base_url(config(), server.uri());
        let err = client.upload(&png(), "blogs").await.unwrap_err();
        assert!(matches!(err, Error::Upload(ref m) if m.contains("Invalid Signature")));
    }

    #[tokio::test]
    async fn test_upload_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({"public_id": "x", "secure_url": "y"})),
            )
            .mount(&server)
            .await;

        let client = CloudinaryClient::with_base_url(config(), server.uri());
        let err = upload_with_timeout(&client, &png(), "blogs", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_delete_not_found_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=blogs%2Fgone"))
            .and(body_string_contains("signature_algorithm=sha1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "not found"})),
            )
            .mount(&server)
            .await;

        let client = CloudinaryClient::with_base_url(config(), server.uri());
        let err = client.delete("blogs/gone").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_list_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/demo/resources/image/upload"))
            .and(query_param("next_cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resources": [{"public_id": "testimonials/b", "secure_url": "https://x/b.png"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/demo/resources/image/upload"))
            .and(query_param("prefix", "testimonials/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resources": [{"public_id": "testimonials/a", "secure_url": "https://x/a.png"}],
                "next_cursor": "page2"
            })))
            .mount(&server)
            .await;

        let client = CloudinaryClient::with_base_url(config(), server.uri());
        let images = client.list("testimonials/").await.unwrap();
        let ids: Vec<_> = images.iter().map(|i| i.public_id.as_str()).collect();
        assert_eq!(ids, vec!["testimonials/a", "testimonials/b"]);
    }
}

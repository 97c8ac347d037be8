use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, info};
use serde::Deserialize;
use std::time::Duration;

use super::{public_id_from_url, MediaStore, MediaStoreError, MediaStoreResult};
use crate::config::{MediaStoreConfig, SignatureAlgorithm};

/// Largest source image `fetch` will read back.
const MAX_FETCH_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary-backed media store using signed REST calls.
#[derive(Clone)]
pub struct CloudinaryStore {
    agent: ureq::Agent,
    config: MediaStoreConfig,
}

impl CloudinaryStore {
    pub fn new(config: MediaStoreConfig, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self { agent, config }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.cloud_name,
            resource_type,
            action
        )
    }

    fn upload_blocking(&self, bytes: &[u8], mime_type: &str) -> MediaStoreResult<String> {
        let file = format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(bytes)
        );
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("timestamp", timestamp.as_str())],
            &self.config.api_secret,
            self.config.signature_algorithm,
        );

        let mut response = self
            .agent
            .post(self.endpoint("auto", "upload"))
            .send_form([
                ("file", file.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
            ])
            .map_err(|e| MediaStoreError::Write(format!("Upload request failed: {}", e)))?;

        let body: UploadResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| MediaStoreError::Write(format!("Unexpected upload response: {}", e)))?;

        info!("Stored {} bytes ({}) at {}", bytes.len(), mime_type, body.secure_url);
        Ok(body.secure_url)
    }

    fn destroy_blocking(&self, url: &str) -> MediaStoreResult<()> {
        let public_id = public_id_from_url(url).ok_or_else(|| {
            MediaStoreError::Delete(format!("Cannot derive object id from URL {}", url))
        })?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
            self.config.signature_algorithm,
        );

        let mut response = self
            .agent
            .post(self.endpoint("image", "destroy"))
            .send_form([
                ("public_id", public_id),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
            ])
            .map_err(|e| MediaStoreError::Delete(format!("Destroy request failed: {}", e)))?;

        let body: DestroyResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| MediaStoreError::Delete(format!("Unexpected destroy response: {}", e)))?;

        if body.result == "ok" {
            info!("Deleted stored object {}", public_id);
            Ok(())
        } else {
            Err(MediaStoreError::Delete(format!(
                "Media host reported '{}' for {}",
                body.result, public_id
            )))
        }
    }

    fn fetch_blocking(&self, url: &str) -> MediaStoreResult<Vec<u8>> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| MediaStoreError::Read(format!("Fetch of {} failed: {}", url, e)))?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_FETCH_BYTES)
            .read_to_vec()
            .map_err(|e| MediaStoreError::Read(format!("Reading {} failed: {}", url, e)))?;

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn store(&self, bytes: Vec<u8>, mime_type: &str) -> MediaStoreResult<String> {
        let store = self.clone();
        let mime_type = mime_type.to_string();
        tokio::task::spawn_blocking(move || store.upload_blocking(&bytes, &mime_type))
            .await
            .map_err(|e| MediaStoreError::Write(format!("Upload task failed: {}", e)))?
    }

    async fn delete(&self, url: &str) -> MediaStoreResult<()> {
        let store = self.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || store.destroy_blocking(&url))
            .await
            .map_err(|e| MediaStoreError::Delete(format!("Destroy task failed: {}", e)))?
    }

    async fn fetch(&self, url: &str) -> MediaStoreResult<Vec<u8>> {
        let store = self.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || store.fetch_blocking(&url))
            .await
            .map_err(|e| MediaStoreError::Read(format!("Fetch task failed: {}", e)))?
    }
}

/// Request signature: parameters sorted by name, joined as `k=v&k=v`, the
/// API secret appended, hex digest of the result.
pub fn sign_params(
    params: &[(&str, &str)],
    api_secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => {
            use sha1::{Digest, Sha1};
            let mut hasher = Sha1::new();
            hasher.update(to_sign.as_bytes());
            hasher.update(api_secret.as_bytes());
            format!("{:x}", hasher.finalize())
        }
        SignatureAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(to_sign.as_bytes());
            hasher.update(api_secret.as_bytes());
            format!("{:x}", hasher.finalize())
        }
    }
}

//! Media Store Client: binary image content kept by an external media host.

pub mod cloudinary;

pub use cloudinary::CloudinaryStore;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MediaStoreError {
    #[error("Storage write failed: {0}")]
    Write(String),
    #[error("Storage delete failed: {0}")]
    Delete(String),
    #[error("Storage read failed: {0}")]
    Read(String),
}

pub type MediaStoreResult<T> = Result<T, MediaStoreError>;

/// Every call is a single attempt; retry policy belongs to the caller.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists `bytes` and returns a permanent retrieval URL.
    async fn store(&self, bytes: Vec<u8>, mime_type: &str) -> MediaStoreResult<String>;

    /// Removes the object behind a URL previously returned by `store`.
    async fn delete(&self, url: &str) -> MediaStoreResult<()>;

    /// Reads stored content back.
    async fn fetch(&self, url: &str) -> MediaStoreResult<Vec<u8>>;
}

/// Object identifier addressed by a stored URL: the trailing path segment
/// without query string, cut at the first `.`.
///
/// `https://res.cloudinary.com/demo/image/upload/v17/abc123.jpg` -> `abc123`
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let file_name = path.trim_end_matches('/').rsplit('/').next()?;
    let public_id = file_name.split('.').next()?;

    if public_id.is_empty() || public_id.contains(':') {
        None
    } else {
        Some(public_id)
    }
}

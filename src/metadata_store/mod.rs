//! Metadata Store Client: per-photo records in an external tabular store.

pub mod airtable;
pub mod record;

pub use airtable::AirtableStore;

use async_trait::async_trait;

use crate::photo::{NewPhoto, Photo, PhotoUpdate};

#[derive(Debug, thiserror::Error)]
pub enum MetadataStoreError {
    #[error("Metadata write failed: {0}")]
    Write(String),
    #[error("Metadata read failed: {0}")]
    Read(String),
    #[error("Unexpected metadata response: {0}")]
    Decode(String),
}

pub type MetadataStoreResult<T> = Result<T, MetadataStoreError>;

/// Records are keyed by an id the store assigns on `create`; every call is a
/// single attempt.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create(&self, photo: NewPhoto) -> MetadataStoreResult<Photo>;

    /// All records. A failed fetch is an error, never an empty list.
    async fn list(&self) -> MetadataStoreResult<Vec<Photo>>;

    /// Merges `update` into record `id`, leaving other fields untouched, and
    /// returns the merged record.
    async fn update(&self, id: &str, update: PhotoUpdate) -> MetadataStoreResult<Photo>;

    /// Whether `id` has the shape of an id this store assigns.
    fn is_valid_id(&self, _id: &str) -> bool {
        true
    }
}

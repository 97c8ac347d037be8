use async_trait::async_trait;
use log::{debug, error, info};
use std::time::Duration;

use super::record::{Record, RecordPage, WriteBody};
use super::{MetadataStore, MetadataStoreError, MetadataStoreResult};
use crate::config::MetadataStoreConfig;
use crate::photo::{NewPhoto, Photo, PhotoUpdate};

/// Guards against a store that keeps handing out pagination tokens.
const MAX_PAGES: usize = 1000;

/// Airtable-backed metadata store for the gallery table.
#[derive(Clone)]
pub struct AirtableStore {
    agent: ureq::Agent,
    config: MetadataStoreConfig,
}

impl AirtableStore {
    pub fn new(config: MetadataStoreConfig, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self { agent, config }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.base_id,
            self.config.table_name
        )
    }

    fn record_url(&self, id: &str) -> Result<String, MetadataStoreError> {
        if !is_valid_record_id(id) {
            return Err(MetadataStoreError::Write(format!("Invalid record id '{}'", id)));
        }
        Ok(format!("{}/{}", self.table_url(), id))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }

    fn create_blocking(&self, photo: &NewPhoto) -> MetadataStoreResult<Photo> {
        let body = WriteBody::from(photo);

        let mut response = self
            .agent
            .post(self.table_url())
            .header("Authorization", self.bearer())
            .send_json(&body)
            .map_err(|e| {
                error!("Record create failed: {}", e);
                MetadataStoreError::Write(format!("Create request failed: {}", e))
            })?;

        let record: Record = response
            .body_mut()
            .read_json()
            .map_err(|e| MetadataStoreError::Decode(format!("create response: {}", e)))?;

        let photo = record.into_photo().ok_or_else(|| {
            MetadataStoreError::Write("Created record came back without image".to_string())
        })?;

        info!("Created record {} for {}", photo.id, photo.image_url);
        Ok(photo)
    }

    fn list_blocking(&self) -> MetadataStoreResult<Vec<Photo>> {
        let mut photos = Vec::new();
        let mut offset: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self
                .agent
                .get(self.table_url())
                .header("Authorization", self.bearer());
            if let Some(token) = &offset {
                request = request.query("offset", token);
            }

            let mut response = request
                .call()
                .map_err(|e| MetadataStoreError::Read(format!("List request failed: {}", e)))?;

            let page: RecordPage = response
                .body_mut()
                .read_json()
                .map_err(|e| MetadataStoreError::Decode(format!("list response: {}", e)))?;

            photos.extend(page.records.into_iter().filter_map(Record::into_photo));

            match page.offset {
                Some(next) => offset = Some(next),
                None => {
                    debug!("Listed {} records", photos.len());
                    return Ok(photos);
                }
            }
        }

        Err(MetadataStoreError::Read(format!(
            "List did not finish within {} pages",
            MAX_PAGES
        )))
    }

    fn update_blocking(&self, id: &str, update: &PhotoUpdate) -> MetadataStoreResult<Photo> {
        let url = self.record_url(id)?;
        let body = WriteBody::try_from(update)
            .map_err(|e| MetadataStoreError::Write(format!("Cannot encode update: {}", e)))?;

        let mut response = self
            .agent
            .patch(url)
            .header("Authorization", self.bearer())
            .send_json(&body)
            .map_err(|e| {
                error!("Record update for {} failed: {}", id, e);
                MetadataStoreError::Write(format!("Update request failed: {}", e))
            })?;

        let record: Record = response
            .body_mut()
            .read_json()
            .map_err(|e| MetadataStoreError::Decode(format!("update response: {}", e)))?;

        record.into_photo().ok_or_else(|| {
            MetadataStoreError::Write(format!("Updated record {} has no image", id))
        })
    }
}

#[async_trait]
impl MetadataStore for AirtableStore {
    async fn create(&self, photo: NewPhoto) -> MetadataStoreResult<Photo> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.create_blocking(&photo))
            .await
            .map_err(|e| MetadataStoreError::Write(format!("Create task failed: {}", e)))?
    }

    async fn list(&self) -> MetadataStoreResult<Vec<Photo>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.list_blocking())
            .await
            .map_err(|e| MetadataStoreError::Read(format!("List task failed: {}", e)))?
    }

    async fn update(&self, id: &str, update: PhotoUpdate) -> MetadataStoreResult<Photo> {
        let store = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.update_blocking(&id, &update))
            .await
            .map_err(|e| MetadataStoreError::Write(format!("Update task failed: {}", e)))?
    }

    fn is_valid_id(&self, id: &str) -> bool {
        is_valid_record_id(id)
    }
}

/// Record ids are opaque but always plain alphanumerics (`recXXXXXXXXXXXXXX`).
fn is_valid_record_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

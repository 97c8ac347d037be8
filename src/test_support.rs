//! In-memory store doubles shared by unit tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::Notify;

use crate::media_store::{MediaStore, MediaStoreError, MediaStoreResult};
use crate::metadata_store::{MetadataStore, MetadataStoreError, MetadataStoreResult};
use crate::photo::{NewPhoto, Photo, PhotoUpdate};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[derive(Default)]
pub struct FakeMediaStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    stores: AtomicUsize,
    delete_attempts: AtomicUsize,
    fail_store: AtomicBool,
    fail_delete: AtomicBool,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_store(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `store` wait until the returned gate is notified.
    pub fn hold_stores(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn stored_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn object(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(url).cloned()
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn store(&self, bytes: Vec<u8>, mime_type: &str) -> MediaStoreResult<String> {
        let gate = self.hold.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(MediaStoreError::Write("store unavailable".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ext = mime_type.rsplit('/').next().unwrap_or("bin");
        let url = format!("https://media.test/upload/obj{}.{}", n, ext);
        self.objects.lock().unwrap().insert(url.clone(), bytes);
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> MediaStoreResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(MediaStoreError::Delete("delete unavailable".to_string()));
        }
        self.objects.lock().unwrap().remove(url);
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn fetch(&self, url: &str) -> MediaStoreResult<Vec<u8>> {
        self.object(url)
            .ok_or_else(|| MediaStoreError::Read(format!("no object at {}", url)))
    }
}

#[derive(Default)]
pub struct FakeMetadataStore {
    records: Mutex<Vec<Photo>>,
    created: Mutex<Vec<NewPhoto>>,
    updates: Mutex<Vec<(String, PhotoUpdate)>>,
    update_attempts: AtomicUsize,
    list_calls: AtomicUsize,
    next_id: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FakeMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_photos(photos: Vec<Photo>) -> Self {
        let store = Self::default();
        *store.records.lock().unwrap() = photos;
        store
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<NewPhoto> {
        self.created.lock().unwrap().clone()
    }

    /// Successful updates in call order.
    pub fn updates(&self) -> Vec<(String, PhotoUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_attempts(&self) -> usize {
        self.update_attempts.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Drops a record as if it was removed from the table by someone else.
    pub fn remove(&self, id: &str) {
        self.records.lock().unwrap().retain(|p| p.id != id);
    }

    pub fn get(&self, id: &str) -> Option<Photo> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn create(&self, photo: NewPhoto) -> MetadataStoreResult<Photo> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MetadataStoreError::Write("table unavailable".to_string()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = Photo {
            id: format!("rec{}", n),
            image_url: photo.image_url.clone(),
            cropped_image_url: None,
            layout: photo.layout,
            crop_rect: None,
            created_time: None,
        };
        self.created.lock().unwrap().push(photo);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> MetadataStoreResult<Vec<Photo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MetadataStoreError::Read("table unavailable".to_string()));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update(&self, id: &str, update: PhotoUpdate) -> MetadataStoreResult<Photo> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MetadataStoreError::Write("table unavailable".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| MetadataStoreError::Write(format!("no record {}", id)))?;
        record.apply(&update);
        let merged = record.clone();
        drop(records);
        self.updates.lock().unwrap().push((id.to_string(), update));
        Ok(merged)
    }

    fn is_valid_id(&self, id: &str) -> bool {
        id.starts_with("rec") && id.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};

use tile_gallery::gallery::Gallery;
use tile_gallery::media_store::{MediaStore, MediaStoreError, MediaStoreResult};
use tile_gallery::metadata_store::{MetadataStore, MetadataStoreError, MetadataStoreResult};
use tile_gallery::photo::{CropRect, CropUnit, Frame, Layout, NewPhoto, Photo, PhotoUpdate};
use tile_gallery::tile::{TileError, TileState};

#[derive(Default)]
struct MemoryMedia {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn store(&self, bytes: Vec<u8>, _mime_type: &str) -> MediaStoreResult<String> {
        let url = format!(
            "https://media.example/obj{}",
            self.counter.fetch_add(1, Ordering::SeqCst)
        );
        self.objects.lock().unwrap().insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> MediaStoreResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(url)
            .ok_or_else(|| MediaStoreError::Delete(format!("unknown {}", url)))?;
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn fetch(&self, url: &str) -> MediaStoreResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| MediaStoreError::Read(format!("unknown {}", url)))
    }
}

#[derive(Default)]
struct MemoryTable {
    records: Mutex<Vec<Photo>>,
    writes: AtomicUsize,
}

#[async_trait]
impl MetadataStore for MemoryTable {
    async fn create(&self, photo: NewPhoto) -> MetadataStoreResult<Photo> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let record = Photo {
            id: format!("rec{:04}", records.len()),
            image_url: photo.image_url,
            cropped_image_url: None,
            layout: photo.layout,
            crop_rect: None,
            created_time: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> MetadataStoreResult<Vec<Photo>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update(&self, id: &str, update: PhotoUpdate) -> MetadataStoreResult<Photo> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| MetadataStoreError::Write(format!("unknown {}", id)))?;
        record.apply(&update);
        Ok(record.clone())
    }
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 251) as u8, 90])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .unwrap();
    buffer.into_inner()
}

fn px(x: f64, y: f64, width: f64, height: f64) -> CropRect {
    CropRect {
        x,
        y,
        width,
        height,
        unit: CropUnit::Pixel,
    }
}

fn setup() -> (Arc<MemoryMedia>, Arc<MemoryTable>, Gallery) {
    let media = Arc::new(MemoryMedia::default());
    let table = Arc::new(MemoryTable::default());
    let gallery = Gallery::new(media.clone(), table.clone());
    (media, table, gallery)
}

#[tokio::test]
async fn test_full_tile_lifecycle() {
    // GIVEN: an empty gallery
    let (media, table, gallery) = setup();
    assert!(gallery.list_tiles().await.unwrap().tiles.is_empty());

    // WHEN: a photo is uploaded, made horizontal and cropped on a half-size preview
    let snapshot = gallery.upload(jpeg(800, 600), "image/jpeg").await.unwrap();
    let id = snapshot.photo.unwrap().id;
    let tile = gallery.tile(&id).await.unwrap();

    tile.select_layout(Layout::Horizontal).await.unwrap();
    tile.open_crop_editor().unwrap();
    let pending = tile
        .drag_crop(px(20.0, 20.0, 200.0, 50.0), Frame::new(400.0, 300.0))
        .unwrap();
    assert_eq!(pending.rect.height, 100.0);
    let cropped = tile.confirm_crop().await.unwrap();

    // THEN: the grid shows the derived 400x200 image at a 2x1 span
    let view = gallery.list_tiles().await.unwrap();
    assert_eq!(view.tiles.len(), 1);
    let grid_tile = &view.tiles[0];
    assert_eq!((grid_tile.col_span, grid_tile.row_span), (2, 1));
    assert_eq!(
        Some(grid_tile.display_url.as_str()),
        cropped.photo.as_ref().unwrap().cropped_image_url.as_deref()
    );
    assert_eq!(grid_tile.crop_rect, Some(px(40.0, 40.0, 400.0, 200.0)));

    let derived = media.fetch(&grid_tile.display_url).await.unwrap();
    let derived = image::load_from_memory(&derived).unwrap();
    assert_eq!(derived.dimensions(), (400, 200));

    // create + layout update + crop update
    assert_eq!(table.writes.load(Ordering::SeqCst), 3);
    assert_eq!(tile.state(), TileState::Idle);
}

#[tokio::test]
async fn test_recrop_replaces_derived_image() {
    let (media, _table, gallery) = setup();
    let id = gallery
        .upload(jpeg(300, 300), "image/jpeg")
        .await
        .unwrap()
        .photo
        .unwrap()
        .id;
    let tile = gallery.tile(&id).await.unwrap();
    let frame = Frame::new(300.0, 300.0);

    tile.drag_crop(px(0.0, 0.0, 100.0, 100.0), frame).unwrap();
    let first = tile.confirm_crop().await.unwrap().photo.unwrap();
    tile.drag_crop(px(10.0, 10.0, 150.0, 150.0), frame).unwrap();
    let second = tile.confirm_crop().await.unwrap().photo.unwrap();

    let deleted = media.deleted.lock().unwrap().clone();
    assert_eq!(deleted, vec![first.cropped_image_url.unwrap()]);
    assert!(media.fetch(&second.image_url).await.is_ok());
    assert_eq!(second.id, id);
}

#[tokio::test]
async fn test_non_image_content_cannot_be_cropped() {
    let (_media, _table, gallery) = setup();
    let id = gallery
        .upload(b"definitely not pixels".to_vec(), "image/png")
        .await
        .unwrap()
        .photo
        .unwrap()
        .id;
    let tile = gallery.tile(&id).await.unwrap();

    tile.drag_crop(px(0.0, 0.0, 10.0, 10.0), Frame::new(10.0, 10.0))
        .unwrap();
    let err = tile.confirm_crop().await.unwrap_err();

    assert!(matches!(err, TileError::Crop(_)));
    assert!(tile.snapshot().last_error.is_some());
}

#[tokio::test]
async fn test_uploads_keep_store_order() {
    let (_media, _table, gallery) = setup();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            gallery
                .upload(jpeg(16, 16), "image/jpeg")
                .await
                .unwrap()
                .photo
                .unwrap()
                .id,
        );
    }

    let view = gallery.list_tiles().await.unwrap();

    let listed: Vec<String> = view.tiles.into_iter().map(|t| t.id).collect();
    assert_eq!(listed, ids);
    assert_eq!(view.upload_tile.layout, Layout::Square);
}

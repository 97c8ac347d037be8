//! Gallery Controller
//!
//! Lists the stored records as a grid and keeps one [`TileController`] per
//! photo so per-tile busy gates hold across requests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;

use crate::media_store::MediaStore;
use crate::metadata_store::MetadataStore;
use crate::photo::{CropRect, Layout, Photo};
use crate::tile::{TileController, TileError, TileResult, TileSnapshot};

/// One occupied cell of the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridTile {
    pub id: String,
    pub image_url: String,
    pub display_url: String,
    pub layout: Layout,
    pub col_span: u32,
    pub row_span: u32,
    pub aspect: f64,
    pub crop_rect: Option<CropRect>,
}

impl From<&Photo> for GridTile {
    fn from(photo: &Photo) -> Self {
        GridTile {
            id: photo.id.clone(),
            image_url: photo.image_url.clone(),
            display_url: photo.display_url().to_string(),
            layout: photo.layout,
            col_span: photo.layout.col_span(),
            row_span: photo.layout.row_span(),
            aspect: photo.layout.aspect(),
            crop_rect: photo.crop_rect,
        }
    }
}

/// Grid contents in store order. The trailing upload tile is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryView {
    pub tiles: Vec<GridTile>,
    pub upload_tile: UploadTile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTile {
    pub layout: Layout,
}

impl Default for UploadTile {
    fn default() -> Self {
        UploadTile {
            layout: Layout::Square,
        }
    }
}

/// Minimum time between listings triggered by lookups of unknown ids.
const RELIST_INTERVAL: Duration = Duration::from_secs(5);

struct RegisteredTile {
    tile: Arc<TileController>,
    registered_at: Instant,
}

pub struct Gallery {
    media: Arc<dyn MediaStore>,
    metadata: Arc<dyn MetadataStore>,
    tiles: Mutex<HashMap<String, RegisteredTile>>,
    listed_at: Mutex<Option<Instant>>,
}

impl Gallery {
    pub fn new(media: Arc<dyn MediaStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            media,
            metadata,
            tiles: Mutex::new(HashMap::new()),
            listed_at: Mutex::new(None),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, RegisteredTile>> {
        self.tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registered(&self, id: &str) -> Option<Arc<TileController>> {
        self.registry().get(id).map(|entry| entry.tile.clone())
    }

    fn register(&self, id: String, tile: Arc<TileController>) {
        let entry = RegisteredTile {
            tile,
            registered_at: Instant::now(),
        };
        self.registry().insert(id, entry);
    }

    /// Fetches all records and renders them as grid tiles.
    ///
    /// A failed fetch is reported as an error so callers can tell an
    /// unreachable store from an empty gallery.
    pub async fn list_tiles(&self) -> TileResult<GalleryView> {
        let started = Instant::now();
        let photos = self.metadata.list().await?;
        self.sync_registry(&photos, started);

        debug!("Gallery lists {} photos", photos.len());
        Ok(GalleryView {
            tiles: photos.iter().map(GridTile::from).collect(),
            upload_tile: UploadTile::default(),
        })
    }

    /// Brings the registry in line with a listing started at `started`.
    /// Tiles missing from it are dropped unless they are mid-operation or
    /// were registered after the listing began.
    fn sync_registry(&self, photos: &[Photo], started: Instant) {
        *self.listed_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(started);

        let listed: HashSet<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        let mut registry = self.registry();

        registry.retain(|id, entry| {
            let keep = listed.contains(id.as_str())
                || entry.registered_at > started
                || entry.tile.is_busy();
            if !keep {
                debug!("Dropping tile {}, no longer in the store", id);
            }
            keep
        });

        for photo in photos {
            match registry.get(&photo.id) {
                Some(entry) => entry.tile.refresh(photo.clone()),
                None => {
                    let tile = TileController::for_photo(
                        self.media.clone(),
                        self.metadata.clone(),
                        photo.clone(),
                    );
                    registry.insert(
                        photo.id.clone(),
                        RegisteredTile {
                            tile: Arc::new(tile),
                            registered_at: Instant::now(),
                        },
                    );
                }
            }
        }
    }

    /// Claims the right to re-list for an unknown id, at most once per
    /// [`RELIST_INTERVAL`].
    fn claim_relist(&self) -> bool {
        let mut listed_at = self.listed_at.lock().unwrap_or_else(PoisonError::into_inner);
        match *listed_at {
            Some(at) if at.elapsed() < RELIST_INTERVAL => false,
            _ => {
                *listed_at = Some(Instant::now());
                true
            }
        }
    }

    /// Controller for photo `id`. Unknown ids of a valid shape reload the
    /// listing, throttled so bogus lookups cannot flood the store.
    pub async fn tile(&self, id: &str) -> TileResult<Arc<TileController>> {
        if let Some(tile) = self.registered(id) {
            return Ok(tile);
        }

        let unknown = || TileError::UnknownPhoto(id.to_string());
        if !self.metadata.is_valid_id(id) {
            return Err(unknown());
        }
        if !self.claim_relist() {
            debug!("Not re-listing for unknown tile {}, listed recently", id);
            return Err(unknown());
        }

        let started = Instant::now();
        let photos = self.metadata.list().await?;
        self.sync_registry(&photos, started);

        self.registered(id).ok_or_else(unknown)
    }

    /// Runs the upload flow on a fresh empty tile and registers it under the
    /// created record's id.
    pub async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> TileResult<TileSnapshot> {
        let tile = Arc::new(TileController::empty(
            self.media.clone(),
            self.metadata.clone(),
        ));
        let snapshot = tile.pick_file(bytes, mime_type).await?;

        if let Some(photo) = &snapshot.photo {
            info!("Registered tile {}", photo.id);
            self.register(photo.id.clone(), tile);
        }
        Ok(snapshot)
    }

    pub fn media(&self) -> &Arc<dyn MediaStore> {
        &self.media
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }
}

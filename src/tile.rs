//! Tile Controller
//!
//! Per-photo state machine driving the upload, layout and crop lifecycle:
//!
//! ```text
//! Empty --pick file--> Uploading --ok--> Idle
//!                          \--err--> Empty
//! Idle <--> EditingLayout, Idle <--> EditingCrop
//! Idle/EditingLayout --select layout--> Idle (on success)
//! EditingCrop --confirm crop--> Idle (on success)
//! ```
//!
//! State lives behind a short-lived lock that is never held across an await;
//! remote calls run between a "begin" and a "finish" critical section. At
//! most one upload and one crop save can be in flight per tile.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};
use serde::Serialize;

use crate::crop_rasterizer::{self, CropError};
use crate::media_store::{MediaStore, MediaStoreError};
use crate::metadata_store::{MetadataStore, MetadataStoreError};
use crate::photo::{CropRect, Frame, Layout, NewPhoto, Photo, PhotoUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TileState {
    Empty,
    Uploading,
    Idle,
    EditingLayout,
    EditingCrop,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Empty => "empty",
            TileState::Uploading => "uploading",
            TileState::Idle => "idle",
            TileState::EditingLayout => "editing layout",
            TileState::EditingCrop => "editing crop",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error(transparent)]
    Storage(#[from] MediaStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataStoreError),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error("Tile is busy: {0} in progress")]
    Busy(&'static str),
    #[error("Tile has no photo")]
    NoPhoto,
    #[error("Cannot {action} while tile is {state}")]
    InvalidTransition {
        state: TileState,
        action: &'static str,
    },
    #[error("Crop rectangle must have non-zero width and height")]
    EmptyCrop,
    #[error("Photo not found: {0}")]
    UnknownPhoto(String),
}

pub type TileResult<T> = Result<T, TileError>;

/// Crop selection not yet saved, in the coordinate frame it was drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendingCrop {
    pub rect: CropRect,
    pub frame: Frame,
}

/// Serializable view of a tile for clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSnapshot {
    pub state: TileState,
    pub photo: Option<Photo>,
    pub pending_crop: Option<PendingCrop>,
    pub crop_aspect: Option<f64>,
    pub uploading: bool,
    pub crop_saving: bool,
    pub last_error: Option<String>,
}

struct TileInner {
    state: TileState,
    photo: Option<Photo>,
    pending_crop: Option<PendingCrop>,
    crop_saving: bool,
    last_error: Option<String>,
}

pub struct TileController {
    media: Arc<dyn MediaStore>,
    metadata: Arc<dyn MetadataStore>,
    inner: Mutex<TileInner>,
}

impl TileController {
    /// Tile with no photo yet, waiting for a file pick.
    pub fn empty(media: Arc<dyn MediaStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self::with_state(media, metadata, TileState::Empty, None)
    }

    /// Tile for an existing record.
    pub fn for_photo(
        media: Arc<dyn MediaStore>,
        metadata: Arc<dyn MetadataStore>,
        photo: Photo,
    ) -> Self {
        Self::with_state(media, metadata, TileState::Idle, Some(photo))
    }

    fn with_state(
        media: Arc<dyn MediaStore>,
        metadata: Arc<dyn MetadataStore>,
        state: TileState,
        photo: Option<Photo>,
    ) -> Self {
        Self {
            media,
            metadata,
            inner: Mutex::new(TileInner {
                state,
                photo,
                pending_crop: None,
                crop_saving: false,
                last_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TileInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> TileSnapshot {
        let inner = self.lock();
        Self::snapshot_of(&inner)
    }

    fn snapshot_of(inner: &TileInner) -> TileSnapshot {
        TileSnapshot {
            state: inner.state,
            photo: inner.photo.clone(),
            pending_crop: inner.pending_crop,
            crop_aspect: inner.photo.as_ref().map(|p| p.layout.aspect()),
            uploading: inner.state == TileState::Uploading,
            crop_saving: inner.crop_saving,
            last_error: inner.last_error.clone(),
        }
    }

    pub fn state(&self) -> TileState {
        self.lock().state
    }

    /// An upload or crop save is in flight.
    pub fn is_busy(&self) -> bool {
        let inner = self.lock();
        inner.state == TileState::Uploading || inner.crop_saving
    }

    pub fn photo(&self) -> Option<Photo> {
        self.lock().photo.clone()
    }

    /// Replaces the cached record with a freshly listed one, unless the tile
    /// is in the middle of an operation that will write it.
    pub fn refresh(&self, photo: Photo) {
        let mut inner = self.lock();
        let same_record = inner.photo.as_ref().map(|p| p.id == photo.id).unwrap_or(false);
        if same_record && inner.state == TileState::Idle && !inner.crop_saving {
            inner.photo = Some(photo);
        }
    }

    /// `Empty --pick file--> Uploading --> Idle | Empty`.
    ///
    /// Stores the original, then creates its record with layout `1x1`. If
    /// the record cannot be created the stored original is removed again so
    /// nothing references a failed upload.
    pub async fn pick_file(&self, bytes: Vec<u8>, mime_type: &str) -> TileResult<TileSnapshot> {
        {
            let mut inner = self.lock();
            match inner.state {
                TileState::Empty => {}
                TileState::Uploading => return Err(TileError::Busy("upload")),
                state => {
                    return Err(TileError::InvalidTransition {
                        state,
                        action: "pick a file",
                    })
                }
            }
            inner.state = TileState::Uploading;
            inner.last_error = None;
        }

        let result = self.upload_and_create(bytes, mime_type).await;

        let mut inner = self.lock();
        match result {
            Ok(photo) => {
                info!("Tile {} uploaded", photo.id);
                inner.photo = Some(photo);
                inner.state = TileState::Idle;
                Ok(Self::snapshot_of(&inner))
            }
            Err(e) => {
                error!("Failed to upload image: {}", e);
                inner.state = TileState::Empty;
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn upload_and_create(&self, bytes: Vec<u8>, mime_type: &str) -> TileResult<Photo> {
        let url = self.media.store(bytes, mime_type).await?;

        match self.metadata.create(NewPhoto::new(url.clone())).await {
            Ok(photo) => Ok(photo),
            Err(e) => {
                if let Err(cleanup) = self.media.delete(&url).await {
                    warn!("Failed to remove orphaned upload {}: {}", url, cleanup);
                }
                Err(e.into())
            }
        }
    }

    pub fn open_layout_editor(&self) -> TileResult<TileSnapshot> {
        self.open_editor(TileState::EditingLayout, "open the layout editor")
    }

    pub fn open_crop_editor(&self) -> TileResult<TileSnapshot> {
        self.open_editor(TileState::EditingCrop, "open the crop editor")
    }

    fn open_editor(&self, target: TileState, action: &'static str) -> TileResult<TileSnapshot> {
        let mut inner = self.lock();
        match inner.state {
            TileState::Idle | TileState::EditingLayout | TileState::EditingCrop => {}
            state => return Err(TileError::InvalidTransition { state, action }),
        }
        if inner.crop_saving {
            return Err(TileError::Busy("crop save"));
        }
        if inner.state != target {
            inner.pending_crop = None;
        }
        inner.state = target;
        Ok(Self::snapshot_of(&inner))
    }

    /// Leaves either editor and drops any unsaved crop selection.
    pub fn close_editor(&self) -> TileResult<TileSnapshot> {
        let mut inner = self.lock();
        match inner.state {
            TileState::Idle | TileState::EditingLayout | TileState::EditingCrop => {}
            state => {
                return Err(TileError::InvalidTransition {
                    state,
                    action: "close the editor",
                })
            }
        }
        if inner.crop_saving {
            return Err(TileError::Busy("crop save"));
        }
        inner.state = TileState::Idle;
        inner.pending_crop = None;
        Ok(Self::snapshot_of(&inner))
    }

    /// `Idle --select layout--> Idle`.
    ///
    /// The displayed layout only changes once the store accepted it; on
    /// failure it stays at the last known good value and an open layout
    /// editor stays open.
    pub async fn select_layout(&self, layout: Layout) -> TileResult<TileSnapshot> {
        let id = {
            let inner = self.lock();
            match inner.state {
                TileState::Idle | TileState::EditingLayout | TileState::EditingCrop => {}
                TileState::Uploading => return Err(TileError::Busy("upload")),
                TileState::Empty => return Err(TileError::NoPhoto),
            }
            inner.photo.as_ref().map(|p| p.id.clone()).ok_or(TileError::NoPhoto)?
        };

        let update = PhotoUpdate::layout(layout);
        let result = self.metadata.update(&id, update.clone()).await;

        let mut inner = self.lock();
        match result {
            Ok(_) => {
                if let Some(photo) = inner.photo.as_mut() {
                    photo.apply(&update);
                }
                // Re-lock an unsaved selection to the new aspect; the saved crop stays as is.
                if let Some(pending) = inner.pending_crop.as_mut() {
                    pending.rect = pending.rect.constrained_to_aspect(pending.frame, layout.aspect());
                }
                if inner.state == TileState::EditingLayout {
                    inner.state = TileState::Idle;
                }
                inner.last_error = None;
                info!("Tile {} layout set to {}", id, layout);
                Ok(Self::snapshot_of(&inner))
            }
            Err(e) => {
                error!("Failed to update layout of {}: {}", id, e);
                inner.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Records the user's crop selection, locked to the active layout's aspect.
    /// Opens the crop editor when called from `Idle`.
    pub fn drag_crop(&self, rect: CropRect, frame: Frame) -> TileResult<PendingCrop> {
        let mut inner = self.lock();
        match inner.state {
            TileState::Idle | TileState::EditingCrop => {}
            state => {
                return Err(TileError::InvalidTransition {
                    state,
                    action: "select a crop",
                })
            }
        }
        if inner.crop_saving {
            return Err(TileError::Busy("crop save"));
        }
        let aspect = inner
            .photo
            .as_ref()
            .map(|p| p.layout.aspect())
            .ok_or(TileError::NoPhoto)?;

        let pending = PendingCrop {
            rect: rect.constrained_to_aspect(frame, aspect),
            frame,
        };
        inner.pending_crop = Some(pending);
        inner.state = TileState::EditingCrop;
        Ok(pending)
    }

    /// `EditingCrop --confirm--> Idle`.
    ///
    /// Rasterizes the pending selection from the original image, stores the
    /// derived image, records it together with the native-space crop
    /// rectangle, then best-effort deletes the superseded derived image.
    /// Only runs for a non-empty selection and never twice at once.
    pub async fn confirm_crop(&self) -> TileResult<TileSnapshot> {
        let (photo, pending) = {
            let mut inner = self.lock();
            if inner.crop_saving {
                return Err(TileError::Busy("crop save"));
            }
            if inner.state != TileState::EditingCrop {
                return Err(TileError::InvalidTransition {
                    state: inner.state,
                    action: "save a crop",
                });
            }
            let pending = match inner.pending_crop {
                Some(pending) if pending.rect.has_area() => pending,
                _ => return Err(TileError::EmptyCrop),
            };
            let photo = inner.photo.clone().ok_or(TileError::NoPhoto)?;
            inner.crop_saving = true;
            inner.last_error = None;
            (photo, pending)
        };

        self.finish_crop(photo, pending).await
    }

    /// Selects `rect` and saves it as one step, like `drag_crop` followed by
    /// `confirm_crop` but with no window for another selection in between.
    pub async fn crop(&self, rect: CropRect, frame: Frame) -> TileResult<TileSnapshot> {
        let (photo, pending) = {
            let mut inner = self.lock();
            match inner.state {
                TileState::Idle | TileState::EditingLayout | TileState::EditingCrop => {}
                TileState::Uploading => return Err(TileError::Busy("upload")),
                TileState::Empty => return Err(TileError::NoPhoto),
            }
            if inner.crop_saving {
                return Err(TileError::Busy("crop save"));
            }
            let photo = inner.photo.clone().ok_or(TileError::NoPhoto)?;
            let pending = PendingCrop {
                rect: rect.constrained_to_aspect(frame, photo.layout.aspect()),
                frame,
            };
            if !pending.rect.has_area() {
                return Err(TileError::EmptyCrop);
            }
            inner.pending_crop = Some(pending);
            inner.state = TileState::EditingCrop;
            inner.crop_saving = true;
            inner.last_error = None;
            (photo, pending)
        };

        self.finish_crop(photo, pending).await
    }

    async fn finish_crop(&self, photo: Photo, pending: PendingCrop) -> TileResult<TileSnapshot> {
        let result = self.save_crop(&photo, pending).await;

        let mut inner = self.lock();
        inner.crop_saving = false;
        match result {
            Ok(update) => {
                if let Some(current) = inner.photo.as_mut() {
                    current.apply(&update);
                }
                inner.pending_crop = None;
                inner.state = TileState::Idle;
                info!("Tile {} crop saved", photo.id);
                Ok(Self::snapshot_of(&inner))
            }
            Err(e) => {
                error!("Failed to save crop of {}: {}", photo.id, e);
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn save_crop(&self, photo: &Photo, pending: PendingCrop) -> TileResult<PhotoUpdate> {
        let source_bytes = self
            .media
            .fetch(&photo.image_url)
            .await
            .map_err(|e| CropError::TaintedCanvas(e.to_string()))?;
        let source = crop_rasterizer::decode_source(&source_bytes)?;

        let (width, height) = (source.width(), source.height());
        let native = pending
            .rect
            .to_native(pending.frame, (width, height))
            .constrained_to_aspect(width, height, photo.layout.aspect());
        let cropped = crop_rasterizer::rasterize(&source, native)?;
        drop(source);

        let cropped_url = self.media.store(cropped.bytes, cropped.mime_type).await?;
        let update = PhotoUpdate::crop(CropRect::from(native), cropped_url.clone());

        if let Err(e) = self.metadata.update(&photo.id, update.clone()).await {
            if let Err(cleanup) = self.media.delete(&cropped_url).await {
                warn!("Failed to remove unused crop {}: {}", cropped_url, cleanup);
            }
            return Err(e.into());
        }

        if let Some(previous) = photo.cropped_image_url.as_deref() {
            if previous != cropped_url && previous != photo.image_url {
                if let Err(e) = self.media.delete(previous).await {
                    warn!("Failed to delete superseded crop {}: {}", previous, e);
                }
            }
        }

        Ok(update)
    }
}

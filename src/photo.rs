//! Gallery data model: photos, grid layouts and crop rectangles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grid span of a tile, written `<columns>x<rows>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layout {
    #[default]
    #[serde(rename = "1x1")]
    Square,
    #[serde(rename = "1x2")]
    Vertical,
    #[serde(rename = "2x1")]
    Horizontal,
    #[serde(rename = "2x2")]
    Large,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Square => "1x1",
            Layout::Vertical => "1x2",
            Layout::Horizontal => "2x1",
            Layout::Large => "2x2",
        }
    }

    pub fn col_span(&self) -> u32 {
        match self {
            Layout::Square | Layout::Vertical => 1,
            Layout::Horizontal | Layout::Large => 2,
        }
    }

    pub fn row_span(&self) -> u32 {
        match self {
            Layout::Square | Layout::Horizontal => 1,
            Layout::Vertical | Layout::Large => 2,
        }
    }

    /// Width / height ratio the crop tool locks to while this layout is active.
    pub fn aspect(&self) -> f64 {
        self.col_span() as f64 / self.row_span() as f64
    }

    /// Parses a stored layout tag; anything unrecognized renders as `1x1`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for Layout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1x1" => Ok(Layout::Square),
            "1x2" => Ok(Layout::Vertical),
            "2x1" => Ok(Layout::Horizontal),
            "2x2" => Ok(Layout::Large),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropUnit {
    #[serde(rename = "%", alias = "percent")]
    Percent,
    #[serde(rename = "px", alias = "pixel")]
    Pixel,
}

/// Size of the coordinate space a crop rectangle was drawn in, usually the
/// displayed size of the image in the crop editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Crop region in the source image's native pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    /// Locks the region to `aspect` inside a `width x height` source.
    pub fn constrained_to_aspect(&self, width: u32, height: u32, aspect: f64) -> PixelRect {
        let rect = CropRect::from(*self)
            .constrained_to_aspect(Frame::new(width as f64, height as f64), aspect);
        PixelRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

impl From<PixelRect> for CropRect {
    fn from(rect: PixelRect) -> Self {
        CropRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            unit: CropUnit::Pixel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub unit: CropUnit,
}

impl CropRect {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Maps this rectangle into native pixel space.
    ///
    /// Percent rectangles are relative to the image itself. Pixel rectangles
    /// are relative to `frame` and get scaled per axis by
    /// `native / frame`; an invalid frame means the rectangle is already native.
    pub fn to_native(&self, frame: Frame, native: (u32, u32)) -> PixelRect {
        let (native_w, native_h) = (native.0 as f64, native.1 as f64);
        let (sx, sy) = match self.unit {
            CropUnit::Percent => (native_w / 100.0, native_h / 100.0),
            CropUnit::Pixel if frame.is_valid() => {
                (native_w / frame.width, native_h / frame.height)
            }
            CropUnit::Pixel => (1.0, 1.0),
        };

        PixelRect {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    /// Locks the rectangle to `aspect` (width / height) inside `frame`.
    ///
    /// Width is kept and height derived from it, then both shrink until the
    /// rectangle fits, then the origin is pulled back inside the frame.
    pub fn constrained_to_aspect(&self, frame: Frame, aspect: f64) -> CropRect {
        if !frame.is_valid() || aspect.is_nan() || aspect <= 0.0 {
            return *self;
        }

        let (to_px_x, to_px_y) = match self.unit {
            CropUnit::Percent => (frame.width / 100.0, frame.height / 100.0),
            CropUnit::Pixel => (1.0, 1.0),
        };

        let mut width = (self.width * to_px_x).max(0.0);
        let mut height = width / aspect;

        if height > frame.height {
            height = frame.height;
            width = height * aspect;
        }
        if width > frame.width {
            width = frame.width;
            height = width / aspect;
        }

        let x = (self.x * to_px_x).clamp(0.0, (frame.width - width).max(0.0));
        let y = (self.y * to_px_y).clamp(0.0, (frame.height - height).max(0.0));

        CropRect {
            x: x / to_px_x,
            y: y / to_px_y,
            width: width / to_px_x,
            height: height / to_px_y,
            unit: self.unit,
        }
    }
}

/// One record per uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub image_url: String,
    pub cropped_image_url: Option<String>,
    pub layout: Layout,
    pub crop_rect: Option<CropRect>,
    pub created_time: Option<DateTime<Utc>>,
}

impl Photo {
    /// URL the grid should show: the derived crop when one exists.
    pub fn display_url(&self) -> &str {
        self.cropped_image_url.as_deref().unwrap_or(&self.image_url)
    }

    /// Merges a partial update. `id` and `image_url` are never touched.
    pub fn apply(&mut self, update: &PhotoUpdate) {
        if let Some(layout) = update.layout {
            self.layout = layout;
        }
        if let Some(crop_rect) = update.crop_rect {
            self.crop_rect = Some(crop_rect);
        }
        if let Some(url) = &update.cropped_image_url {
            self.cropped_image_url = Some(url.clone());
        }
    }
}

/// Initial fields for a freshly uploaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub image_url: String,
    pub layout: Layout,
}

impl NewPhoto {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            layout: Layout::default(),
        }
    }
}

/// Partial update; `None` fields are left as they are in the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoUpdate {
    pub layout: Option<Layout>,
    pub crop_rect: Option<CropRect>,
    pub cropped_image_url: Option<String>,
}

impl PhotoUpdate {
    pub fn layout(layout: Layout) -> Self {
        Self {
            layout: Some(layout),
            ..Default::default()
        }
    }

    pub fn crop(crop_rect: CropRect, cropped_image_url: impl Into<String>) -> Self {
        Self {
            crop_rect: Some(crop_rect),
            cropped_image_url: Some(cropped_image_url.into()),
            ..Default::default()
        }
    }
}

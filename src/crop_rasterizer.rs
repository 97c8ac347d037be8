//! Crop Rasterizer
//!
//! Produces a new raster image from a region of a source image:
//! - Region is given in the source's native pixel space
//! - Output is exactly `round(width) x round(height)` pixels
//! - Parts of the region outside the source stay transparent
//! - Result is encoded as PNG, ready for the media store

use std::io::Cursor;

use image::{imageops, ColorType, DynamicImage, GenericImageView, ImageFormat, RgbaImage};

use crate::photo::PixelRect;

/// Output side length cap; larger requests are treated as invalid input.
pub const MAX_OUTPUT_DIMENSION: u32 = 16_384;

pub const OUTPUT_MIME_TYPE: &str = "image/png";

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Invalid crop rectangle {width}x{height}: width and height must be positive")]
    InvalidCrop { width: f64, height: f64 },
    #[error("Crop origin ({x}, {y}) lies too far outside the source image")]
    OriginOutOfRange { x: f64, y: f64 },
    #[error("Source image cannot be read back: {0}")]
    TaintedCanvas(String),
    #[error("Failed to encode cropped image: {0}")]
    Encode(#[from] image::ImageError),
}

pub type CropResult<T> = Result<T, CropError>;

#[derive(Debug, Clone)]
pub struct RasterizedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Decodes fetched source bytes. Content that cannot be decoded is treated
/// like a tainted canvas: nothing readable can be produced from it.
pub fn decode_source(bytes: &[u8]) -> CropResult<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| CropError::TaintedCanvas(format!("source is not a readable image: {}", e)))
}

/// Crops `source` to `rect` and encodes the result.
pub fn rasterize(source: &DynamicImage, rect: PixelRect) -> CropResult<RasterizedImage> {
    let invalid = || CropError::InvalidCrop {
        width: rect.width,
        height: rect.height,
    };

    if !(rect.width > 0.0 && rect.height > 0.0) || !rect.x.is_finite() || !rect.y.is_finite() {
        return Err(invalid());
    }

    let width = rect.width.round();
    let height = rect.height.round();
    if width < 1.0
        || height < 1.0
        || width > MAX_OUTPUT_DIMENSION as f64
        || height > MAX_OUTPUT_DIMENSION as f64
    {
        return Err(invalid());
    }
    let (width, height) = (width as u32, height as u32);

    // Anything further out would only ever be transparent, and must still fit an i64.
    let reach_x = source.width() as f64 + MAX_OUTPUT_DIMENSION as f64;
    let reach_y = source.height() as f64 + MAX_OUTPUT_DIMENSION as f64;
    if rect.x.abs() > reach_x || rect.y.abs() > reach_y {
        return Err(CropError::OriginOutOfRange {
            x: rect.x,
            y: rect.y,
        });
    }

    let cropped = crop_region(source, rect.x.round() as i64, rect.y.round() as i64, width, height);
    let cropped = match cropped.color() {
        ColorType::Rgb32F | ColorType::Rgba32F => DynamicImage::ImageRgba8(cropped.to_rgba8()),
        _ => cropped,
    };

    let mut buffer = Cursor::new(Vec::new());
    cropped.write_to(&mut buffer, ImageFormat::Png)?;

    log::debug!(
        "Rasterized {}x{} crop at ({}, {}) from {}x{} source",
        width,
        height,
        rect.x,
        rect.y,
        source.width(),
        source.height()
    );

    Ok(RasterizedImage {
        bytes: buffer.into_inner(),
        mime_type: OUTPUT_MIME_TYPE,
        width,
        height,
    })
}

fn crop_region(source: &DynamicImage, x: i64, y: i64, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = (source.width() as i64, source.height() as i64);
    let (w, h) = (width as i64, height as i64);

    let (right, bottom) = (x.saturating_add(w), y.saturating_add(h));

    if x >= 0 && y >= 0 && right <= src_w && bottom <= src_h {
        return source.crop_imm(x as u32, y as u32, width, height);
    }

    // Region leaves the source: draw the overlapping part onto a transparent canvas.
    let mut canvas = RgbaImage::new(width, height);
    let (start_x, start_y) = (x.max(0), y.max(0));
    let (end_x, end_y) = (right.min(src_w), bottom.min(src_h));

    if end_x > start_x && end_y > start_y {
        let visible = source
            .crop_imm(
                start_x as u32,
                start_y as u32,
                (end_x - start_x) as u32,
                (end_y - start_y) as u32,
            )
            .to_rgba8();
        imageops::replace(&mut canvas, &visible, start_x - x, start_y - y);
    }

    DynamicImage::ImageRgba8(canvas)
}

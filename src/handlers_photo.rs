use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::{Filter, Rejection, Reply};

use crate::gallery::Gallery;
use crate::handlers_media::read_image_upload;
use crate::photo::{CropRect, Frame, Layout};
use crate::warp_helpers::{tile_rejection, with_gallery};

#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub layout: Layout,
}

/// Crop selection as drawn in the editor. `frame` is the displayed size of
/// the image the selection was drawn on; without it pixel rectangles are
/// taken as native. Either way the saved crop is locked to the layout.
#[derive(Debug, Deserialize)]
pub struct CropRequest {
    pub crop: CropRect,
    pub frame: Option<Frame>,
}

pub async fn list_photos(gallery: Arc<Gallery>) -> Result<impl Reply, Rejection> {
    let view = gallery.list_tiles().await.map_err(tile_rejection)?;
    Ok(warp::reply::json(&view))
}

pub async fn upload_photo(form: FormData, gallery: Arc<Gallery>) -> Result<impl Reply, Rejection> {
    let upload = read_image_upload(form).await?;

    let snapshot = gallery
        .upload(upload.bytes, &upload.mime_type)
        .await
        .map_err(tile_rejection)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&snapshot),
        StatusCode::CREATED,
    ))
}

pub async fn get_photo(id: String, gallery: Arc<Gallery>) -> Result<impl Reply, Rejection> {
    let tile = gallery.tile(&id).await.map_err(tile_rejection)?;
    Ok(warp::reply::json(&tile.snapshot()))
}

pub async fn set_layout(
    id: String,
    request: LayoutRequest,
    gallery: Arc<Gallery>,
) -> Result<impl Reply, Rejection> {
    let tile = gallery.tile(&id).await.map_err(tile_rejection)?;
    let snapshot = tile
        .select_layout(request.layout)
        .await
        .map_err(tile_rejection)?;
    Ok(warp::reply::json(&snapshot))
}

pub async fn save_crop(
    id: String,
    request: CropRequest,
    gallery: Arc<Gallery>,
) -> Result<impl Reply, Rejection> {
    let tile = gallery.tile(&id).await.map_err(tile_rejection)?;
    let frame = request.frame.unwrap_or(Frame::new(0.0, 0.0));

    let snapshot = tile
        .crop(request.crop, frame)
        .await
        .map_err(tile_rejection)?;

    Ok(warp::reply::json(&snapshot))
}

pub fn build_photo_routes(
    gallery: Arc<Gallery>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let list_route = warp::path!("api" / "photos")
        .and(warp::get())
        .and(with_gallery(gallery.clone()))
        .and_then(list_photos);

    let upload_route = warp::path!("api" / "photos")
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_gallery(gallery.clone()))
        .and_then(upload_photo);

    let get_route = warp::path!("api" / "photos" / String)
        .and(warp::get())
        .and(with_gallery(gallery.clone()))
        .and_then(get_photo);

    let layout_route = warp::path!("api" / "photos" / String / "layout")
        .and(warp::put())
        .and(warp::body::json::<LayoutRequest>())
        .and(with_gallery(gallery.clone()))
        .and_then(set_layout);

    let crop_route = warp::path!("api" / "photos" / String / "crop")
        .and(warp::post())
        .and(warp::body::json::<CropRequest>())
        .and(with_gallery(gallery))
        .and_then(save_crop);

    list_route
        .or(upload_route)
        .or(get_route)
        .or(layout_route)
        .or(crop_route)
}

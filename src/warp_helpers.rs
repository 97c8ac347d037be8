use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::{reject, Filter, Rejection, Reply};

use crate::crop_rasterizer::CropError;
use crate::gallery::Gallery;
use crate::tile::TileError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

/// Media host or metadata store call failed.
#[derive(Debug)]
pub struct UpstreamError {
    pub message: String,
}

impl reject::Reject for UpstreamError {}

#[derive(Debug)]
pub struct NotFoundError;
impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct BusyError {
    pub message: String,
}

impl reject::Reject for BusyError {}

#[derive(Debug)]
pub struct UnreadableSourceError {
    pub message: String,
}

impl reject::Reject for UnreadableSourceError {}

pub fn with_gallery(
    gallery: Arc<Gallery>,
) -> impl Filter<Extract = (Arc<Gallery>,), Error = Infallible> + Clone {
    warp::any().map(move || gallery.clone())
}

/// Maps a tile operation failure onto the rejection carrying its status.
pub fn tile_rejection(err: TileError) -> Rejection {
    let message = err.to_string();
    match err {
        TileError::Storage(_) | TileError::Metadata(_) => {
            reject::custom(UpstreamError { message })
        }
        TileError::Crop(CropError::TaintedCanvas(_)) => {
            reject::custom(UnreadableSourceError { message })
        }
        TileError::Crop(CropError::Encode(_)) => reject::custom(UpstreamError { message }),
        TileError::Crop(CropError::InvalidCrop { .. })
        | TileError::Crop(CropError::OriginOutOfRange { .. })
        | TileError::EmptyCrop => {
            reject::custom(ValidationError { message })
        }
        TileError::Busy(_) | TileError::InvalidTransition { .. } => {
            reject::custom(BusyError { message })
        }
        TileError::NoPhoto | TileError::UnknownPhoto(_) => reject::custom(NotFoundError),
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(upstream_error) = err.find::<UpstreamError>() {
        code = StatusCode::BAD_GATEWAY;
        message = upstream_error.message.clone();
    } else if err.find::<NotFoundError>().is_some() {
        code = StatusCode::NOT_FOUND;
        message = "Photo not found".to_string();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if let Some(busy_error) = err.find::<BusyError>() {
        code = StatusCode::CONFLICT;
        message = busy_error.message.clone();
    } else if let Some(source_error) = err.find::<UnreadableSourceError>() {
        code = StatusCode::UNPROCESSABLE_ENTITY;
        message = source_error.message.clone();
    } else if let Some(body_error) = err.find::<warp::filters::body::BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("Invalid request body: {}", body_error);
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        error: message,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
}

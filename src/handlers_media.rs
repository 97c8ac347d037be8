use bytes::BufMut;
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use warp::multipart::FormData;
use warp::{reject, Filter, Rejection, Reply};

use crate::gallery::Gallery;
use crate::mimetype_detector;
use crate::warp_helpers::{with_gallery, UpstreamError, ValidationError};

/// Image content read from the `file` field of a multipart form.
#[derive(Debug)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    pub image_url: String,
}

fn invalid(message: impl Into<String>) -> Rejection {
    reject::custom(ValidationError {
        message: message.into(),
    })
}

/// Reads the `file` part and checks by content that it is an image.
pub async fn read_image_upload(form: FormData) -> Result<ImageUpload, Rejection> {
    let mut form = Box::pin(form);

    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| invalid(format!("Malformed upload: {}", e)))?
    {
        if part.name() != "file" {
            continue;
        }
        let filename = part.filename().map(str::to_string);

        let mut stream = Box::pin(part.stream());
        let mut bytes = Vec::new();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| invalid(format!("Malformed upload: {}", e)))?
        {
            bytes.put(chunk);
        }

        return image_upload(bytes, filename.as_deref());
    }

    Err(invalid("No file provided"))
}

fn image_upload(bytes: Vec<u8>, filename: Option<&str>) -> Result<ImageUpload, Rejection> {
    if bytes.is_empty() {
        return Err(invalid("Uploaded file is empty"));
    }

    let sniffed = mimetype_detector::from_bytes(&bytes)
        .filter(|mime| mime.is_image())
        .ok_or_else(|| invalid("Uploaded file is not a supported image"))?;

    if let Some(declared) = filename.and_then(|name| mimetype_detector::from_path(Path::new(name))) {
        if declared != sniffed {
            log::debug!(
                "Upload {:?} named as {} but contains {}",
                filename,
                declared,
                sniffed
            );
        }
    }

    Ok(ImageUpload {
        bytes,
        mime_type: sniffed.to_string(),
    })
}

pub async fn upload_image(form: FormData, gallery: Arc<Gallery>) -> Result<impl Reply, Rejection> {
    let upload = read_image_upload(form).await?;

    let url = gallery
        .media()
        .store(upload.bytes, &upload.mime_type)
        .await
        .map_err(|e| {
            log::error!("Image upload failed: {}", e);
            reject::custom(UpstreamError {
                message: e.to_string(),
            })
        })?;

    Ok(warp::reply::json(&json!({ "url": url })))
}

pub async fn delete_image(
    request: DeleteImageRequest,
    gallery: Arc<Gallery>,
) -> Result<impl Reply, Rejection> {
    if request.image_url.trim().is_empty() {
        return Err(invalid("imageUrl is required"));
    }

    gallery
        .media()
        .delete(&request.image_url)
        .await
        .map_err(|e| {
            log::error!("Image delete failed: {}", e);
            reject::custom(UpstreamError {
                message: e.to_string(),
            })
        })?;

    Ok(warp::reply::json(&json!({ "success": true })))
}

pub fn build_media_routes(
    gallery: Arc<Gallery>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let upload_route = warp::path!("api" / "upload")
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_gallery(gallery.clone()))
        .and_then(upload_image);

    let delete_route = warp::path!("api" / "delete-image")
        .and(warp::delete())
        .and(warp::body::json::<DeleteImageRequest>())
        .and(with_gallery(gallery))
        .and_then(delete_image);

    upload_route.or(delete_route)
}

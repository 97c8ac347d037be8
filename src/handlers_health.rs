use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::gallery::Gallery;
use crate::warp_helpers::{with_gallery, UpstreamError};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Ready once the metadata store answers a listing.
pub async fn ready_check(gallery: Arc<Gallery>) -> Result<impl Reply, Rejection> {
    match gallery.metadata().list().await {
        Ok(photos) => Ok(warp::reply::json(&json!({
            "status": "ready",
            "metadata": "connected",
            "photos": photos.len(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))),
        Err(e) => {
            log::error!("Metadata store unreachable: {}", e);
            Err(reject::custom(UpstreamError {
                message: "Metadata store unreachable".to_string(),
            }))
        }
    }
}

pub fn build_health_routes(
    gallery: Arc<Gallery>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health").and(warp::get()).and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::get())
        .and(with_gallery(gallery))
        .and_then(ready_check);

    health.or(ready)
}

pub mod config;
pub mod crop_rasterizer;
pub mod gallery;
pub mod handlers_health;
pub mod handlers_media;
pub mod handlers_photo;
pub mod handlers_static;
pub mod media_store;
pub mod metadata_store;
pub mod mimetype_detector;
pub mod photo;
pub mod tile;
pub mod warp_helpers;

#[cfg(test)]
mod test_support;

use log::{error, info};
use std::net::{IpAddr, TcpListener};
use std::sync::Arc;
use warp::Filter;

use tile_gallery::config::Config;
use tile_gallery::gallery::Gallery;
use tile_gallery::handlers_health::build_health_routes;
use tile_gallery::handlers_media::build_media_routes;
use tile_gallery::handlers_photo::build_photo_routes;
use tile_gallery::handlers_static::build_static_routes;
use tile_gallery::media_store::{CloudinaryStore, MediaStore};
use tile_gallery::metadata_store::{AirtableStore, MetadataStore};
use tile_gallery::warp_helpers::{cors, handle_rejection};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let host: IpAddr = config
        .host
        .parse()
        .map_err(|e| format!("Invalid GALLERY_HOST '{}': {}", config.host, e))?;
    let port = config.port;

    info!("Starting tile gallery on {}:{}", host, port);
    info!(
        "Media host: {} ({}, {} signatures)",
        config.media.api_url, config.media.cloud_name, config.media.signature_algorithm
    );
    info!(
        "Metadata store: {} base {} table {}",
        config.metadata.api_url, config.metadata.base_id, config.metadata.table_name
    );

    if !is_port_available(host, port) {
        error!(
            "Port {} is already in use. Please stop any running gallery instance or use a different port.",
            port
        );
        error!(
            "You can check what's using the port with: lsof -i :{}",
            port
        );
        return Err(format!("Port {} is already in use", port).into());
    }

    let gallery = Arc::new(initialize_gallery(&config));
    let max_upload_bytes = config.max_upload_bytes();

    let routes = build_health_routes(gallery.clone())
        .or(build_photo_routes(gallery.clone(), max_upload_bytes))
        .or(build_media_routes(gallery, max_upload_bytes))
        .or(build_static_routes())
        .with(cors())
        .with(warp::log("tile_gallery"))
        .recover(handle_rejection);

    info!(
        "Server started successfully, listening on http://localhost:{}",
        port
    );

    warp::serve(routes).run((host, port)).await;

    Ok(())
}

fn is_port_available(host: IpAddr, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

fn initialize_gallery(config: &Config) -> Gallery {
    let timeout = config.http_timeout();

    let media: Arc<dyn MediaStore> = Arc::new(CloudinaryStore::new(config.media.clone(), timeout));
    let metadata: Arc<dyn MetadataStore> =
        Arc::new(AirtableStore::new(config.metadata.clone(), timeout));
    info!("Store clients initialized (timeout {:?})", timeout);

    Gallery::new(media, metadata)
}

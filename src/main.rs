//! Cube Streamer - a region-streaming server for large astronomical images.
//!
//! This binary starts the websocket server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cube_streamer::{
    config::Config,
    image::{ArraySource, MemoryCatalog},
    server::{create_router, AppState, RouterConfig},
    tile::RegionService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Cache: {} tiles", config.cache_tiles);
    match &config.cors_origins {
        Some(origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    // Built-in synthetic cubes until a FITS-backed catalog lands.
    // TODO: replace with a directory-scanning catalog once the FITS reader
    // is wired up.
    let mut catalog = MemoryCatalog::new();
    catalog.insert("demo.fits", Arc::new(ArraySource::test_pattern(4096, 4096, 4)));
    catalog.insert("small.fits", Arc::new(ArraySource::test_pattern(512, 512, 2)));
    info!("  Images: demo.fits (4096x4096x4), small.fits (512x512x2)");

    let service = RegionService::with_cache_capacity(config.cache_tiles);
    let state = AppState::new(service, Arc::new(catalog));

    let mut router_config = RouterConfig::new();
    if let Some(origins) = config.cors_origins.clone() {
        router_config = router_config.with_cors_origins(origins);
    }
    let router = create_router(state, router_config);

    let addr = config.bind_address();
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("  Health check:        curl http://{}/health", addr);
    info!("  Viewer websocket:    ws://{}/ws", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "cube_streamer=debug,tower_http=debug"
    } else {
        "cube_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

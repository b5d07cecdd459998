use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod cleanup;
mod config;
mod error;
mod ffmpeg;
mod handlers;
mod keys;
mod models;
mod routes;
mod storage;
mod store;
mod system_info;

use config::Config;
use ffmpeg::FfmpegTools;
use models::AppState;
use storage::S3Storage;
use store::MemoryVideoStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tubely=debug,tower_http=debug")),
        )
        .init();

    // Load configuration
    let config = Config::load()?;

    // Ensure directories exist
    tokio::fs::create_dir_all(&config.assets_root).await?;
    tokio::fs::create_dir_all(&config.temp_dir).await?;

    // Print system info at startup
    let sys_info = system_info::get_system_info(&config).await;
    system_info::print_startup_info(&config, &sys_info);

    let storage = S3Storage::new(
        config.s3_bucket.clone(),
        config.s3_region.clone(),
        config.s3_endpoint.clone(),
    )
    .await;

    // Create app state
    let app_state = Arc::new(AppState {
        videos: Arc::new(MemoryVideoStore::new()),
        storage: Arc::new(storage),
        media: Arc::new(FfmpegTools::new(&config.ffmpeg)),
        config: config.clone(),
    });

    cleanup::start_cleanup_task(Arc::new(config.clone()));

    let app = routes::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("✅ Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

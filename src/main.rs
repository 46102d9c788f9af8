use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use studio_site::router::{SiteState, site_router};
use studio_site::storage::Storage;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &studio_site::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        loglevel = %cfg.loglevel,
        cloud_managed = cfg.cloud_managed(),
        filesystem = cfg.filesystem_enabled(),
        data_dir = %cfg.data_dir.display(),
        uploads_dir = %cfg.uploads_dir.display(),
        secure_cookies = cfg.secure_cookies()
    );

    let storage = Arc::new(Storage::from_config(cfg));
    storage.ensure_initialized().await?;

    let state = SiteState::from_config(cfg, storage);
    let app = site_router(state);

    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

//! Pickup board server.
//!
//! Usage:
//!     pickup --database orders.db --source-url postgres://reader:pw@pos/micros

use anyhow::Result;
use clap::Parser;
use pickup::{Args, Config, ShutdownSignal};
use pickup_logging::init_logging;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; everything can come from the real environment.
    let _ = dotenvy::dotenv();

    let config = Config::try_from(Args::parse())?;
    init_logging(&config.log)?;

    info!("Starting pickup board");
    info!("  Cache: {}", config.cache_path.display());
    info!("  Poll interval: {:?}", config.poll_interval);
    info!(
        "  Daily reset: {} {}",
        config.schedule.at().format("%H:%M"),
        config.schedule.timezone().name()
    );

    let shutdown = ShutdownSignal::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down...");
        signal_shutdown.trigger();
    });

    pickup::app::run(config, shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

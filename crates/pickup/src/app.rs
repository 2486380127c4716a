//! Process wiring: cache bootstrap, background tasks and the HTTP server.

use anyhow::{Context, Result};
use chrono::Utc;
use pickup_db::OrderCache;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::router;
use crate::reconciler::Reconciler;
use crate::reset::{startup_check, DailyReset};
use crate::service::OrderService;
use crate::shutdown::ShutdownSignal;
use crate::snapshot::ViewProjector;
use crate::source::{redact_url, SqlxSource};

/// Run the board until `shutdown` fires or the HTTP server fails.
///
/// Cache initialization failures are fatal; everything after that is retried
/// by the background tasks.
pub async fn run(config: Config, shutdown: ShutdownSignal) -> Result<()> {
    let cache = OrderCache::open(&config.cache_path)
        .await
        .with_context(|| format!("Failed to open order cache {}", config.cache_path.display()))?;

    let action = startup_check(&cache, config.stale_after, Utc::now())
        .await
        .context("Failed to initialize order cache")?;
    info!(?action, "Order cache ready");

    let projector = ViewProjector::new(cache.clone());
    projector
        .refresh()
        .await
        .context("Failed to build initial snapshot")?;

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(addr = %config.bind, "HTTP server listening");

    info!(source = %redact_url(&config.source_url), "Polling source database");
    let source = SqlxSource::new(config.source_url.clone(), config.source_query.clone());
    let reconciler = Reconciler::new(source, cache.clone(), projector.clone(), config.poll_interval);
    let daily_reset = DailyReset::new(cache.clone(), projector.clone(), config.schedule);

    let reconciler_task = tokio::spawn(reconciler.run(shutdown.clone()));
    let reset_task = tokio::spawn(daily_reset.run(shutdown.clone()));

    let service = OrderService::new(cache.clone(), projector);
    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await;

    shutdown.trigger();
    for (name, task) in [("reconciler", reconciler_task), ("daily reset", reset_task)] {
        if let Err(e) = task.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }
    cache.close().await;
    info!("Shutdown complete");

    served.context("HTTP server failed")
}

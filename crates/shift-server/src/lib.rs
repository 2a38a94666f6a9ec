//! shift-server: HTTP API server and background task processing.
//!
//! This crate ties together all other shift-* crates into a running
//! service. It provides:
//!
//! - Axum-based HTTP API for task submission, status, history, and
//!   signed file transfer
//! - A worker pool that claims pending tasks and runs conversions
//! - The retention sweeper and hourly stats reporter
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod queue;
pub mod router;
pub mod routes;
pub mod stats;
pub mod sweeper;
pub mod worker;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use shift_convert::CommandConverter;
use shift_core::config::Config;
use shift_store::{LocalStore, UrlSigner};

use crate::context::AppContext;

/// Start the pdfshift server.
///
/// Initializes the database and object store, constructs the
/// [`AppContext`], re-enqueues pending work, and spawns the HTTP server,
/// worker pool, sweeper, and stats reporter.  Returns when a shutdown
/// signal is received.
pub async fn start(config: Config) -> shift_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Initialize database.
    let db_path = &config.server.db_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created database directory {}", parent.display());
        }
    }
    let db_str = db_path.to_string_lossy();
    let db = shift_db::pool::init_pool(&db_str)?;
    if existed {
        tracing::info!("Database opened (existing) at {db_str}");
    } else {
        tracing::info!("Database created (new) at {db_str}");
    }

    // Object store and URL signer.
    let store = Arc::new(LocalStore::new(config.storage.base_path.clone())?);
    let secret = if config.storage.secret.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        config.storage.secret.clone()
    };
    let signer = Arc::new(UrlSigner::new(secret, config.storage.url_ttl_secs));

    // Converter from configured command templates.
    let converter = Arc::new(CommandConverter::new(config.convert.commands.clone()));

    let (dispatch, source) = queue::dispatch_queue();

    let ctx = AppContext {
        db,
        config: Arc::new(config.clone()),
        store,
        converter,
        signer,
        queue: dispatch,
    };

    // Crash recovery: anything still pending gets redelivered.
    let requeued = queue::requeue_pending(&ctx.db, &ctx.queue)?;
    if requeued > 0 {
        tracing::info!("Re-enqueued {requeued} pending tasks");
    }

    // Cancellation token for graceful shutdown.
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for worker_id in 0..config.worker.count {
        let worker_ctx = ctx.clone();
        let worker_source = source.clone();
        let worker_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            worker::run_worker(worker_ctx, worker_source, worker_id, worker_cancel).await;
        }));
    }

    let sweeper_ctx = ctx.clone();
    let sweeper_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        sweeper::run_sweeper(sweeper_ctx, sweeper_cancel).await;
    }));

    let stats_ctx = ctx.clone();
    let stats_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        stats::run_stats(stats_ctx, stats_cancel).await;
    }));

    // Build and start the HTTP server.
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| shift_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| shift_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| shift_core::Error::Internal(format!("Server error: {e}")))?;

    // Signal all background tasks to stop and wait for them.
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}

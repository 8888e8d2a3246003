//! Processor setup and initialization

pub mod database;
pub mod services;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vitae_core::Config;
use vitae_worker::{TaskQueue, UploadTaskContext};

/// A running processor.
pub struct Processor {
    queue: Arc<TaskQueue>,
    scheduler_handle: JoinHandle<()>,
    shutdown: CancellationToken,
    _context: Arc<UploadTaskContext>,
}

impl Processor {
    /// Stop discovering and claiming new work.
    ///
    /// Pipeline runs already in flight are not cancelled; they finish on the runtime
    /// until the process exits.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.queue.shutdown().await;

        if let Err(e) = self.scheduler_handle.await {
            tracing::error!(error = %e, "Discovery scheduler task ended abnormally");
        }

        tracing::info!("Processor stopped");
    }
}

/// Initialize the processor: telemetry, database, collaborators, queue and scheduler.
pub async fn initialize_processor(config: Config) -> Result<Processor> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let services = services::initialize_services(&config, pool).await?;

    let shutdown = CancellationToken::new();
    let scheduler_handle = services.scheduler.clone().start(shutdown.clone());

    tracing::info!("Processor started");

    Ok(Processor {
        queue: services.queue,
        scheduler_handle,
        shutdown,
        _context: services.context,
    })
}

/// Wait for Ctrl+C (SIGINT) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}

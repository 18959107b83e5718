//! Sweepline Server
//!
//! HTTP host for retention sweeps: a trigger route for cron callers, a
//! health check reporting store readiness, and an optional in-process
//! schedule.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::{ConfigError, ServerConfig};
use handlers::{create_router, AppState};
use std::sync::Arc;
use sweepline_domain::SystemClock;
use sweepline_janitor::{Janitor, JanitorError, JanitorWorker, StoreInstance, SweepOutcome, Sweeper};
use sweepline_store::{RestStore, StoreError};
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),

    /// Store client could not be created
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Sweep or worker error
    #[error(transparent)]
    Janitor(#[from] JanitorError),
}

/// Build a sweeper over the REST stores named in `config`
///
/// Fails when an instance has no usable credentials.
pub fn build_sweeper(config: &ServerConfig) -> Result<Sweeper<RestStore>, ServerError> {
    let janitor = Janitor::new(config.janitor.clone())?;

    let instances = config
        .instances
        .iter()
        .map(|instance| {
            let credentials = config.instance_credentials(instance)?;
            info!(instance = %instance.label, credentials = ?credentials, "Store credentials resolved");

            let store = RestStore::new(&instance.database_url, Some(credentials), instance.timeout())?;
            Ok(StoreInstance::new(&instance.label, store))
        })
        .collect::<Result<Vec<_>, ServerError>>()?;

    Ok(Sweeper::new(janitor, instances, Arc::new(SystemClock))?)
}

/// Run a single sweep and return its outcome
pub async fn run_once(config: &ServerConfig) -> Result<SweepOutcome, ServerError> {
    let sweeper = build_sweeper(config)?;
    Ok(sweeper.trigger().await?)
}

/// Start the HTTP server
///
/// Builds the store clients and sweeper, spawns the scheduled worker when
/// an interval is configured, and serves until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Sweepline");
    info!("Bind address: {}", config.bind_addr());
    info!("Store instances: {}", config.instances.len());
    info!(
        "Retention: {}h ({}){}",
        config.janitor.retention_hours,
        config.janitor.timezone,
        if config.janitor.dry_run { ", dry run" } else { "" }
    );

    let sweeper = Arc::new(build_sweeper(&config)?);

    if let Some(interval) = config.janitor.sweep_interval() {
        let worker = JanitorWorker::new(sweeper.clone(), interval)?;
        tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                tracing::error!("Janitor worker stopped: {}", e);
            }
        });
    }

    let trigger_route = config.trigger_route();
    let state = AppState::new(sweeper, trigger_route.clone())
        .with_auth_token(config.auth_token.clone())
        .with_sweep_timeout(config.sweep_timeout());
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Listening on {} - GET|POST {}", config.bind_addr(), trigger_route);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!("Cannot listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

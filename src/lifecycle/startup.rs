//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (metrics endpoint, config watcher, signals)
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)
//! - A metrics endpoint that fails to start is logged, not fatal

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{ConfigWatcher, ProxyConfig};
use crate::error::ProxyError;
use crate::http::HttpServer;
use crate::lifecycle::{signals::wait_for_signal, Shutdown};
use crate::observability::init_metrics;

/// Fatal startup failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid proxy configuration: {0}")]
    Proxy(#[from] ProxyError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to watch configuration file: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Start every subsystem for a validated `config` and serve until a
/// termination signal arrives.
///
/// When `config_path` is given the file is watched and valid changes to the
/// upstream section are applied without a restart.
pub async fn run(config: ProxyConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        attempts = config.upstream.retries,
        retry_period_ms = config.upstream.retry_period_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        start_metrics(&config.observability.metrics_address);
    }

    let server = HttpServer::new(config.clone())?;

    // The watcher handle must outlive the server or updates stop.
    let (_watcher, updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                tracing::info!(signal, "Termination signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });

    server.run(listener, updates, stopped).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn start_metrics(address: &str) {
    match address.parse::<SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = init_metrics(addr) {
                tracing::error!(metrics_address = %addr, error = %e, "Failed to start metrics endpoint");
            }
        }
        Err(_) => tracing::error!(
            metrics_address = %address,
            "Failed to parse metrics address"
        ),
    }
}

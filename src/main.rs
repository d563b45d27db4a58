//! Request Cache sidecar
//!
//! Serves the request coordinator over a local HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_cache::api::{create_router, AppState};
use request_cache::cache::CacheStore;
use request_cache::config::Config;
use request_cache::coordinator::{HttpFetcher, RequestCoordinator};
use request_cache::tasks::{spawn_sweep_task, SweepTask};

/// Main entry point for the request cache sidecar.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from `CONFIG_PATH` or environment variables
/// 3. Create the cache store and start the background sweep task
/// 4. Build the HTTP fetcher and the request coordinator
/// 5. Serve the router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting request cache sidecar");

    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("loading configuration from environment")?,
    };
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: max_entries={}, categories={}, rules={}, max_attempts={}, port={}",
        config.max_entries,
        config.categories.len(),
        config.invalidation_rules.len(),
        config.max_attempts,
        config.server_port
    );

    let store = CacheStore::from_config(&config).shared();
    let sweep = spawn_sweep_task(store.clone(), config.sweep_interval());
    info!("Background sweep task started");

    let fetcher = HttpFetcher::new(config.api_base_url.as_str(), config.attempt_timeout())
        .context("building HTTP client")?;
    let coordinator = RequestCoordinator::from_config(store, Arc::new(fetcher), &config)
        .await
        .context("building request coordinator")?;
    info!("Coordinator ready, upstream {}", config.api_base_url);

    let app = create_router(AppState::new(coordinator));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then disposes the sweep task.
async fn shutdown_signal(sweep: SweepTask) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweep.dispose();
    info!("Sweep task stopped");
}

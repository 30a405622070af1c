//! Strava proxy server.
//!
//! Serves the front-end assets and proxies the Strava OAuth2 flow and API
//! calls so the browser never sees credentials or tokens.

use std::time::Duration;

use anyhow::{Context, Result};
use strava_proxy::proxy::{ProxyConfig, SessionTokenStore, SharedTokenStore, TokenScope, proxy_routes};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Port used when `PORT` is unset.
const DEFAULT_PORT: u16 = 3000;

/// Interval between sweeps of expired session tokens.
const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = ProxyConfig::from_env().context("Invalid configuration")?;

    let port = match std::env::var("PORT") {
        Ok(port) => port.parse().context("PORT must be a port number")?,
        Err(_) => DEFAULT_PORT,
    };

    let app = match config.token_scope() {
        TokenScope::Session => {
            let store = SessionTokenStore::new(config.session_ttl());
            spawn_purge(store.clone());
            proxy_routes(config, store)
        }
        TokenScope::Global => {
            warn!("TOKEN_SCOPE=global: every browser shares one Strava token pair");
            proxy_routes(config, SharedTokenStore::new())
        }
    };

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("Server running at http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn spawn_purge(store: SessionTokenStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                info!(purged, "Purged expired session tokens");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

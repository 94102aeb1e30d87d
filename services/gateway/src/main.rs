//! Sonauto Gateway
//!
//! Single-binary Rust service that:
//! 1. Issues challenge tokens for the Websim verification flow
//! 2. Verifies completed challenges against the public record store
//! 3. Signs short-lived access tokens for verified users
//! 4. Proxies authorized requests to api.sonauto.ai with the server key

mod config;
mod cors;
mod error;
mod gate;
mod metrics;
mod proxy;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use websim_auth::{ChallengeResolver, CredentialSigner};

use crate::config::Config;
use crate::metrics::ServiceMetrics;
use crate::proxy::ForwardState;
use crate::routes::{AppState, build_router};

/// How long in-flight requests get to drain after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting sonauto-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.gateway.listen_addr,
        upstream_base = %config.upstream.base_url,
        websim_auth_url = %config.auth.websim_auth_url,
        lookback_limit = config.auth.lookback_limit,
        "configuration loaded"
    );

    // Secrets are guaranteed resolved by Config::load; surface a clear
    // error rather than panicking if that invariant ever breaks.
    let jwt_secret = config
        .auth
        .jwt_secret
        .as_ref()
        .context("signing secret missing after config load")?;
    let api_key = config
        .upstream
        .api_key
        .clone()
        .context("upstream API key missing after config load")?;

    let client = reqwest::Client::new();
    let service_metrics = ServiceMetrics::new();

    let state = AppState {
        signer: Arc::new(CredentialSigner::new(jwt_secret.expose())),
        resolver: Arc::new(ChallengeResolver::new(
            client.clone(),
            config.auth.websim_auth_url.clone(),
            config.auth.lookback_limit,
        )),
        forward: ForwardState {
            client,
            upstream_base: config.upstream.base_url.clone(),
            api_key: Arc::new(api_key),
            timeout: Duration::from_secs(config.gateway.timeout_secs),
            requests_total: service_metrics.requests_total.clone(),
            errors_total: service_metrics.errors_total.clone(),
        },
        websim_auth_url: config.auth.websim_auth_url.clone(),
        metrics: service_metrics,
        prometheus: prometheus_handle,
    };

    let app = build_router(state, config.gateway.max_connections);

    let listen_addr = config.gateway.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT bounds how long a slow client can block process exit.
    //    The timer starts at signal receipt, not at server start.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

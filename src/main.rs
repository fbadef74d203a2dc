//! Soccer Stars relay server
//!
//! This is the main entry point for the relay. It handles:
//! - TCP connections from game clients (registration, matchmaking, snapshot relay)
//! - The periodic sweep of expired match requests
//! - An HTTP health endpoint

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soccer_stars::app::AppState;
use soccer_stars::config::Config;
use soccer_stars::http::build_router;
use soccer_stars::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Soccer Stars relay");
    info!("Relay address: {}", config.relay_addr);

    let state = AppState::new(config.clone());

    // Spawn the expiry sweep
    let relay = state.relay.clone();
    tokio::spawn(relay.run_expiry_sweep(config.sweep_interval));

    // Health endpoint
    let http_listener = TcpListener::bind(config.http_addr).await?;
    info!("Health check: http://{}/health", config.http_addr);
    let router = build_router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, router).await {
            tracing::error!(error = %e, "Health server stopped");
        }
    });

    // Relay accept loop runs until shutdown
    let relay_listener = TcpListener::bind(config.relay_addr).await?;
    tokio::select! {
        result = Arc::clone(&state.relay).serve(relay_listener) => result?,
        _ = shutdown_signal() => {}
    }

    info!("Relay shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}

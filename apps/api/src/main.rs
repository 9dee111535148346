//! Council API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use council_core::AppError;
use council_infrastructure::spawn_sweep;
use tokio::sync::watch;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::build_api_services;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let address = config.socket_address()?;
    let services = build_api_services(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handles: Vec<_> = services
        .sweeps
        .into_iter()
        .map(|(job, interval)| spawn_sweep(job, interval, shutdown_rx.clone()))
        .collect();

    let app = build_router(services.state, config.cors_allowed_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(%address, "council api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))?;

    let _ = shutdown_tx.send(true);
    for handle in sweep_handles {
        let _ = handle.await;
    }

    info!("council api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
    }
}

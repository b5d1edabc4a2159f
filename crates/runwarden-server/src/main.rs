// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runwarden Server
//!
//! Admits CI targets over HTTP after proving their credentials against the
//! runner platform.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use runwarden_core::discovery::github::GitHubConnector;
use runwarden_core::discovery::{DEFAULT_PURGE_INTERVAL, DiscoveryCache};
use runwarden_core::{AdmissionController, Config, store};
use runwarden_server::{AppState, router};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runwarden_server=info,runwarden_core=info".into()),
        )
        .init();

    info!("Starting Runwarden Server");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        github_api_url = %config.github_api_url,
        cache_ttl_ms = config.discovery_cache_ttl.as_millis() as u64,
        request_timeout_secs = config.request_timeout.as_secs(),
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let store = store::connect(&config.database_url).await?;
    store.health_check().await?;
    info!("Database connection established, migrations applied");

    let connector = Arc::new(GitHubConnector::new(
        config.github_api_url.clone(),
        config.http_client_timeout,
    )?);
    let discovery = Arc::new(DiscoveryCache::new(config.discovery_cache_ttl));
    let controller = Arc::new(AdmissionController::new(
        store.clone(),
        connector,
        discovery.clone(),
    ));

    let shutdown = CancellationToken::new();
    let janitor = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            discovery
                .run_janitor(DEFAULT_PURGE_INTERVAL, shutdown)
                .await
        }
    });
    let state = AppState::new(store, controller, shutdown.clone(), config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down...");
            shutdown.cancel();
        })
        .await?;

    if let Err(e) = janitor.await {
        error!("Discovery cache janitor failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

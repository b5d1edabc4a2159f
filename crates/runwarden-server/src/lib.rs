// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runwarden Server - HTTP admission boundary
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/target` | `201` with the sanitized target |
//! | `GET` | `/target/{id}` | `200` with the sanitized target |
//! | `DELETE` | `/target/{id}` | `204`, target soft-deleted |
//! | `GET` | `/target/{id}/runners` | `200` with the runners visible to the stored credential |
//! | `GET` | `/quota/{owner}[/{repo}]` | `200` with the last quota snapshot |
//! | `GET` | `/health` | `200` healthy, `503` storage unreachable |

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use runwarden_core::AdmissionController;
use runwarden_core::discovery::DiscoveryCache;
use runwarden_core::store::TargetStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AdmissionController>,
    pub store: Arc<dyn TargetStore>,
    pub discovery: Arc<DiscoveryCache>,
    /// Cancelled on shutdown; every request works under a child of it.
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TargetStore>,
        controller: Arc<AdmissionController>,
        shutdown: CancellationToken,
        request_timeout: Duration,
    ) -> Self {
        let discovery = controller.discovery().clone();
        Self {
            controller,
            store,
            discovery,
            shutdown,
            request_timeout,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

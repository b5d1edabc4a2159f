// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Route handlers.

use std::future::Future;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use runwarden_core::discovery::{QuotaSnapshot, RunnerRecord};
use runwarden_core::{AdmissionRequest, Domain, Error, Scope, ScopeKey, TargetView};

use crate::AppState;
use crate::error::ApiError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/target", post(create_target))
        .route("/target/{id}", get(get_target).delete(delete_target))
        .route("/target/{id}/runners", get(list_runners))
        .route("/quota/{owner}", get(org_quota))
        .route("/quota/{owner}/{repo}", get(repo_quota))
}

/// Run `op` under the request deadline and a child of the shutdown token.
async fn with_deadline<F, Fut, T>(state: &AppState, op: F) -> Result<T, Error>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let token = state.shutdown.child_token();
    match tokio::time::timeout(state.request_timeout, op(token.clone())).await {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            Err(Error::Cancelled)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = matches!(
        tokio::time::timeout(state.request_timeout, state.store.health_check()).await,
        Ok(Ok(()))
    );
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

async fn create_target(
    State(state): State<AppState>,
    body: Result<Json<AdmissionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TargetView>), ApiError> {
    let Json(request) = body?;
    let controller = &state.controller;
    let target = with_deadline(&state, |cancel| async move {
        controller.admit(request, &cancel).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(target)))
}

async fn get_target(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TargetView>, ApiError> {
    let Path(id) = id?;
    let controller = &state.controller;
    let target = with_deadline(&state, |cancel| async move {
        controller.get_target(id, &cancel).await
    })
    .await?;

    Ok(Json(target))
}

async fn delete_target(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let controller = &state.controller;
    with_deadline(&state, |cancel| async move {
        controller.retire(id, &cancel).await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunnersResponse {
    pub target_id: Uuid,
    pub total_count: usize,
    pub runners: Vec<RunnerRecord>,
}

async fn list_runners(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RunnersResponse>, ApiError> {
    let Path(id) = id?;
    let controller = &state.controller;
    let runners = with_deadline(&state, |cancel| async move {
        controller.list_runners(id, &cancel).await
    })
    .await?;

    Ok(Json(RunnersResponse {
        target_id: id,
        total_count: runners.len(),
        runners: runners.to_vec(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct QuotaQuery {
    pub domain: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub scope: String,
    pub domain: Option<String>,
    #[serde(flatten)]
    pub quota: QuotaSnapshot,
}

async fn org_quota(
    State(state): State<AppState>,
    owner: Result<Path<String>, PathRejection>,
    query: Result<Query<QuotaQuery>, QueryRejection>,
) -> Result<Json<QuotaResponse>, ApiError> {
    let Path(owner) = owner?;
    let Query(query) = query?;
    quota(&state, &owner, query.domain.as_deref())
}

async fn repo_quota(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<QuotaQuery>, QueryRejection>,
) -> Result<Json<QuotaResponse>, ApiError> {
    let Path((owner, repo)) = path?;
    let Query(query) = query?;
    quota(&state, &format!("{}/{}", owner, repo), query.domain.as_deref())
}

fn quota(
    state: &AppState,
    scope: &str,
    domain: Option<&str>,
) -> Result<Json<QuotaResponse>, ApiError> {
    let scope = Scope::parse(scope).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let domain = Domain::parse(domain).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let key = ScopeKey::new(domain, scope);

    let quota = state
        .discovery
        .quota_tracker()
        .get_quota(&key)
        .ok_or_else(|| ApiError::not_found(format!("no quota recorded for {}", key)))?;

    Ok(Json(QuotaResponse {
        scope: key.scope.to_string(),
        domain: key.domain.as_str().map(str::to_string),
        quota,
    }))
}

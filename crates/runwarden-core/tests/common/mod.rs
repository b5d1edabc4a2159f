// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for runwarden-core integration tests.
//!
//! Provides a TestContext wiring an in-memory SQLite store and a scripted
//! runner platform into an AdmissionController.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use runwarden_core::discovery::mock::{MockConnector, MockPlatform};
use runwarden_core::discovery::{DiscoveryCache, ManualClock};
use runwarden_core::store::{SqliteTargetStore, StoreError, TargetStore};
use runwarden_core::{AdmissionController, Domain, Scope, Target, TargetStatus};

/// Controller plus handles on everything behind it.
pub struct TestContext {
    pub controller: AdmissionController,
    pub store: Arc<SqliteTargetStore>,
    pub connector: Arc<MockConnector>,
    pub cache: Arc<DiscoveryCache>,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    /// Context whose platform lists no runners.
    pub async fn new() -> Self {
        Self::with_connector(MockConnector::new(Arc::new(MockPlatform::new()))).await
    }

    /// Context using the given connector.
    pub async fn with_connector(connector: MockConnector) -> Self {
        let store = Arc::new(
            SqliteTargetStore::in_memory()
                .await
                .expect("in-memory sqlite store"),
        );
        let connector = Arc::new(connector);
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(DiscoveryCache::with_clock(
            Duration::from_secs(1),
            clock.clone(),
        ));

        let controller =
            AdmissionController::new(store.clone(), connector.clone(), cache.clone());

        Self {
            controller,
            store,
            connector,
            cache,
            clock,
        }
    }

    /// The scripted platform behind the connector.
    pub fn platform(&self) -> &Arc<MockPlatform> {
        self.connector.platform()
    }
}

/// Fresh in-memory SQLite store.
pub async fn sqlite_store() -> SqliteTargetStore {
    SqliteTargetStore::in_memory()
        .await
        .expect("in-memory sqlite store")
}

/// An active target for `scope` on the hosted platform.
pub fn active_target(scope: &str) -> Target {
    Target::new_active(
        Scope::parse(scope).expect("valid scope"),
        Domain::hosted(),
        runwarden_core::Credential::new("tok-valid"),
        Utc::now(),
    )
}

/// Store whose every call fails with a backend-style error.
#[derive(Debug, Default)]
pub struct FailingStore;

fn broken(operation: &'static str) -> StoreError {
    StoreError::Backend {
        operation,
        source: sqlx::Error::PoolTimedOut,
    }
}

#[async_trait]
impl TargetStore for FailingStore {
    async fn create(&self, _target: &Target) -> Result<(), StoreError> {
        Err(broken("create"))
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Target, StoreError> {
        Err(broken("get_by_id"))
    }

    async fn get_by_scope(&self, _domain: &Domain, _scope: &Scope) -> Result<Target, StoreError> {
        Err(broken("get_by_scope"))
    }

    async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
        Err(broken("delete"))
    }

    async fn update_status(
        &self,
        _id: Uuid,
        _status: TargetStatus,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Err(broken("update_status"))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(broken("health_check"))
    }
}

/// Store that never answers, for cancellation tests.
#[derive(Debug, Default)]
pub struct StalledStore;

#[async_trait]
impl TargetStore for StalledStore {
    async fn create(&self, _target: &Target) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Target, StoreError> {
        std::future::pending().await
    }

    async fn get_by_scope(&self, _domain: &Domain, _scope: &Scope) -> Result<Target, StoreError> {
        std::future::pending().await
    }

    async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn update_status(
        &self,
        _id: Uuid,
        _status: TargetStatus,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        std::future::pending().await
    }
}

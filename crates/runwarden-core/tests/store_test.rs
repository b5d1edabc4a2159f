// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage contract tests.
//!
//! Run against in-memory SQLite. The PostgreSQL backend is exercised by the
//! same checks when TEST_DATABASE_URL is set.

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{active_target, sqlite_store};
use runwarden_core::store::{PostgresTargetStore, StoreError, TargetStore};
use runwarden_core::{Credential, Domain, Scope, Target, TargetStatus};

async fn check_create_and_read(store: &dyn TargetStore) {
    let target = active_target(&format!("octo-{}/repo", Uuid::new_v4().simple()));
    store.create(&target).await.unwrap();

    let by_id = store.get_by_id(target.id).await.unwrap();
    assert_eq!(by_id.scope, target.scope);
    assert_eq!(by_id.status, TargetStatus::Active);
    assert_eq!(by_id.credential.expose(), "tok-valid");
    assert!(by_id.domain.is_hosted());

    let by_scope = store
        .get_by_scope(&Domain::hosted(), &target.scope)
        .await
        .unwrap();
    assert_eq!(by_scope.id, target.id);
}

async fn check_duplicate_scope_conflicts(store: &dyn TargetStore) {
    let scope = format!("octo-{}", Uuid::new_v4().simple());
    store.create(&active_target(&scope)).await.unwrap();

    let err = store.create(&active_target(&scope)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict), "got {:?}", err);
}

#[tokio::test]
async fn test_create_and_read_back() {
    let store = sqlite_store().await;
    check_create_and_read(&store).await;
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let store = sqlite_store().await;

    assert!(matches!(
        store.get_by_id(Uuid::new_v4()).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store
            .get_by_scope(&Domain::hosted(), &Scope::parse("octo").unwrap())
            .await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.delete(Uuid::new_v4()).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store
            .update_status(Uuid::new_v4(), TargetStatus::Deleted, Utc::now())
            .await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_same_scope_conflicts_on_same_domain_only() {
    let store = sqlite_store().await;
    check_duplicate_scope_conflicts(&store).await;

    let hosted = active_target("octo/repo");
    store.create(&hosted).await.unwrap();

    let mut ghes = active_target("octo/repo");
    ghes.domain = Domain::parse(Some("https://ghe.example.com")).unwrap();
    store.create(&ghes).await.unwrap();

    let found = store
        .get_by_scope(&ghes.domain, &ghes.scope)
        .await
        .unwrap();
    assert_eq!(found.id, ghes.id);
    assert_eq!(found.domain.as_str(), Some("https://ghe.example.com"));
}

#[tokio::test]
async fn test_update_status_stamps_updated_at_only() {
    let store = sqlite_store().await;
    let target = active_target("octo/repo");
    store.create(&target).await.unwrap();

    let later = target.updated_at + Duration::minutes(5);
    store
        .update_status(target.id, TargetStatus::Deleted, later)
        .await
        .unwrap();

    let updated = store.get_by_id(target.id).await.unwrap();
    assert_eq!(updated.status, TargetStatus::Deleted);
    assert_eq!(updated.created_at, target.created_at);
    assert_eq!(updated.updated_at, later);
}

#[tokio::test]
async fn test_delete_removes_record() {
    let store = sqlite_store().await;
    let target = active_target("octo");
    store.create(&target).await.unwrap();

    store.delete(target.id).await.unwrap();

    assert!(matches!(
        store.get_by_id(target.id).await,
        Err(StoreError::NotFound)
    ));
    // The scope is free again.
    store.create(&active_target("octo")).await.unwrap();
}

#[tokio::test]
async fn test_values_are_bound_not_interpolated() {
    let store = sqlite_store().await;
    let hostile = "https://ghe.example.com/'); DROP TABLE targets; --";

    let target = Target::new_active(
        Scope::parse("octo/repo").unwrap(),
        Domain::from_storage(hostile),
        Credential::new("tok' OR '1'='1"),
        Utc::now(),
    );
    store.create(&target).await.unwrap();

    let found = store
        .get_by_scope(&Domain::from_storage(hostile), &target.scope)
        .await
        .unwrap();
    assert_eq!(found.domain.as_str(), Some(hostile));
    assert_eq!(found.credential.expose(), "tok' OR '1'='1");

    // The table survived and the hosted slot is untouched.
    assert!(matches!(
        store.get_by_scope(&Domain::hosted(), &target.scope).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_health_check() {
    let store = sqlite_store().await;
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn test_postgres_backend() {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let store = PostgresTargetStore::connect(&database_url).await.unwrap();
    store.health_check().await.unwrap();
    check_create_and_read(&store).await;
    check_duplicate_scope_conflicts(&store).await;
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed target store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use crate::scope::{Domain, Scope};
use crate::target::{Target, TargetStatus};

use super::{StoreError, TargetRow, TargetStore};

/// SQLite-backed target store.
#[derive(Debug, Clone)]
pub struct SqliteTargetStore {
    pool: SqlitePool,
}

impl SqliteTargetStore {
    /// Create a store from an existing pool. Migrations are not applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` (e.g. `sqlite:.data/runwarden.db`), creating
    /// the file if needed, and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::from_sqlx("connect", e))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::from_sqlx("connect", e))?;

        crate::migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// Private in-memory database, mainly for tests and local runs.
    ///
    /// A single connection is kept open for the life of the pool since the
    /// database lives inside it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::from_sqlx("connect", e))?;

        crate::migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TargetStore for SqliteTargetStore {
    async fn create(&self, target: &Target) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, scope, domain, credential, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(target.id.to_string())
        .bind(target.scope.to_string())
        .bind(target.domain.storage_key())
        .bind(target.credential.expose())
        .bind(target.status.as_str())
        .bind(target.created_at)
        .bind(target.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("create", e))?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Target, StoreError> {
        let row = sqlx::query_as::<_, TargetRow>(
            r#"
            SELECT id, scope, domain, credential, status, created_at, updated_at
            FROM targets
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("get_by_id", e))?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn get_by_scope(&self, domain: &Domain, scope: &Scope) -> Result<Target, StoreError> {
        let row = sqlx::query_as::<_, TargetRow>(
            r#"
            SELECT id, scope, domain, credential, status, created_at, updated_at
            FROM targets
            WHERE domain = ? AND scope = ?
            "#,
        )
        .bind(domain.storage_key())
        .bind(scope.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("get_by_scope", e))?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM targets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TargetStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE targets
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("update_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("health_check", e))?;
        Ok(())
    }
}

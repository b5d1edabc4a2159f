// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed target store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::scope::{Domain, Scope};
use crate::target::{Target, TargetStatus};

use super::{StoreError, TargetRow, TargetStore};

/// PostgreSQL-backed target store.
#[derive(Debug, Clone)]
pub struct PostgresTargetStore {
    pool: PgPool,
}

impl PostgresTargetStore {
    /// Create a store from an existing pool. Migrations are not applied.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::from_sqlx("connect", e))?;

        crate::migrations::run_postgres(&pool).await?;

        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TargetStore for PostgresTargetStore {
    async fn create(&self, target: &Target) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, scope, domain, credential, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
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
            WHERE id = $1
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
            WHERE domain = $1 AND scope = $2
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
        let result = sqlx::query("DELETE FROM targets WHERE id = $1")
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
            SET status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(updated_at)
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

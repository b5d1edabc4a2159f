// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage contract for targets and its SQL backends.
//!
//! The contract carries no business logic. Uniqueness of `(domain, scope)`
//! is enforced by the database's unique index and surfaces as
//! [`StoreError::Conflict`]; a missing row is [`StoreError::NotFound`], an
//! expected outcome that callers branch on.
//!
//! All statements are static SQL with bound parameters.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresTargetStore;
pub use self::sqlite::SqliteTargetStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::scope::{Domain, Scope};
use crate::target::{Credential, Target, TargetStatus};

/// Errors from the storage contract.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No record matches.
    #[error("target not found")]
    NotFound,

    /// The `(domain, scope)` pair is already taken.
    #[error("a target already exists for this scope")]
    Conflict,

    /// A stored row could not be turned back into a [`Target`].
    #[error("stored target '{id}' is malformed: {reason}")]
    Corrupt {
        /// Row identifier.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The database rejected or failed the statement.
    #[error("database error during '{operation}': {source}")]
    Backend {
        /// Contract operation.
        operation: &'static str,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Schema migration failed.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The database URL names an engine without a backend.
    #[error("unsupported database url scheme '{0}'")]
    UnsupportedUrl(String),
}

impl StoreError {
    /// Classify a driver error for `operation`.
    pub(crate) fn from_sqlx(operation: &'static str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Backend {
                operation,
                source: err,
            },
        }
    }
}

/// Persistence interface for targets.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert a new target. Fails with [`StoreError::Conflict`] when the
    /// `(domain, scope)` pair is already taken.
    async fn create(&self, target: &Target) -> Result<(), StoreError>;

    /// Fetch a target by identifier.
    async fn get_by_id(&self, id: Uuid) -> Result<Target, StoreError>;

    /// Fetch the target registered for `(domain, scope)`, whatever its status.
    async fn get_by_scope(&self, domain: &Domain, scope: &Scope) -> Result<Target, StoreError>;

    /// Remove a target record entirely.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Set the status of a target and stamp `updated_at`.
    async fn update_status(
        &self,
        id: Uuid,
        status: TargetStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Check that the backend answers queries.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Row shape shared by both backends.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TargetRow {
    pub id: String,
    pub scope: String,
    pub domain: String,
    pub credential: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TargetRow> for Target {
    type Error = StoreError;

    fn try_from(row: TargetRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(e.to_string()))?;
        let scope = Scope::parse(&row.scope).map_err(|e| corrupt(e.to_string()))?;
        let status = row
            .status
            .parse::<TargetStatus>()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(Target {
            id,
            scope,
            domain: Domain::from_storage(&row.domain),
            credential: Credential::new(row.credential),
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Open the backend named by `database_url` and apply migrations.
///
/// `postgres://` and `postgresql://` select PostgreSQL, `sqlite:` selects SQLite.
pub async fn connect(database_url: &str) -> Result<Arc<dyn TargetStore>, StoreError> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok(Arc::new(PostgresTargetStore::connect(database_url).await?))
    } else if database_url.starts_with("sqlite:") {
        Ok(Arc::new(SqliteTargetStore::connect(database_url).await?))
    } else {
        let scheme = database_url.split(':').next().unwrap_or_default();
        Err(StoreError::UnsupportedUrl(scheme.to_string()))
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded `targets` schema.
//!
//! Each backend keeps its own copy under `migrations/<engine>/` because the
//! column types differ (`TIMESTAMPTZ` on PostgreSQL, ISO-8601 `TEXT` on
//! SQLite). Both create the same shape:
//!
//! | column                      | contents                                      |
//! |-----------------------------|-----------------------------------------------|
//! | `id`                        | UUID v4 as text, primary key                  |
//! | `scope`                     | `owner` or `owner/repo`                       |
//! | `domain`                    | normalized platform URL, `''` for hosted      |
//! | `credential`                | access token                                  |
//! | `status`                    | `active` or `deleted`                         |
//! | `created_at`, `updated_at`  | UTC timestamps                                |
//!
//! A unique index on `(domain, scope)` is what keeps one target per scope
//! per platform. Storing the hosted platform as `''` rather than `NULL`
//! keeps it under that index. Stores apply the schema when they open a
//! pool, so callers never run these directly.

use sqlx::migrate::{MigrateError, Migrator};

static POSTGRES: Migrator = sqlx::migrate!("./migrations/postgresql");

static SQLITE: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Bring a PostgreSQL database up to the current `targets` schema.
pub(crate) async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Bring a SQLite database up to the current `targets` schema.
pub(crate) async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cancellation for storage and remote calls.
//!
//! Storage and platform futures are raced against a [`CancellationToken`].
//! Dropping the losing future aborts the in-flight query or HTTP request.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Marker returned when the token fired before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Run `fut` until it completes or `cancel` fires, whichever comes first.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, Cancelled>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Target record and lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::scope::{Domain, Scope};

/// Lifecycle status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TargetStatus {
    /// Registered and in use.
    Active,
    /// Soft-deleted; the record and its identifier are kept for reactivation.
    Deleted,
}

/// Allowed status changes, keyed by current status.
const TRANSITIONS: &[(TargetStatus, &[TargetStatus])] = &[
    (TargetStatus::Active, &[TargetStatus::Deleted]),
    (TargetStatus::Deleted, &[TargetStatus::Active]),
];

impl TargetStatus {
    /// Status string as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    /// Statuses reachable from this one.
    pub fn allowed_next(self) -> &'static [TargetStatus] {
        TRANSITIONS
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, next)| *next)
            .unwrap_or(&[])
    }

    /// Check whether `next` is reachable from this status.
    pub fn can_transition_to(self, next: TargetStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Whether a target in this status holds its `(domain, scope)` slot.
    ///
    /// Everything except `Deleted` occupies the slot.
    pub fn occupies_scope(self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string read from storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown target status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TargetStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Platform access credential. Zeroed on drop and never printed.
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// Wrap a raw secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// The raw secret, for authenticating outgoing requests and persistence.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Stable, non-reversible identifier for this credential.
    ///
    /// Used to partition cached discovery results per credential.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..16])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// A persisted binding of one scope to one credential.
#[derive(Debug, Clone)]
pub struct Target {
    /// Globally unique identifier, never reused for another scope.
    pub id: Uuid,
    /// Organization or owner/repository.
    pub scope: Scope,
    /// Platform instance.
    pub domain: Domain,
    /// Access credential.
    pub credential: Credential,
    /// Lifecycle status.
    pub status: TargetStatus,
    /// When the target was registered.
    pub created_at: DateTime<Utc>,
    /// When the target last changed.
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// Build a fresh `Active` target with a new identifier.
    pub fn new_active(
        scope: Scope,
        domain: Domain,
        credential: Credential,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            domain,
            credential,
            status: TargetStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Client-visible view with the credential left out.
    pub fn view(&self) -> TargetView {
        TargetView {
            id: self.id,
            scope: self.scope.to_string(),
            domain: self.domain.as_str().map(str::to_string),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized target returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetView {
    /// Target identifier.
    pub id: Uuid,
    /// Scope string.
    pub scope: String,
    /// Platform domain, absent for the hosted platform.
    pub domain: Option<String>,
    /// Lifecycle status.
    pub status: TargetStatus,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last change time.
    pub updated_at: DateTime<Utc>,
}

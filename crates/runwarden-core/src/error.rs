// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for runwarden-core.
//!
//! [`Error`] is what the admission controller reports. Every variant has a
//! stable machine-readable code (see [`Error::error_code`]) that the HTTP
//! boundary puts into its error body.

use thiserror::Error;

use crate::cancel::Cancelled;
use crate::discovery::DiscoveryError;
use crate::store::StoreError;
use crate::target::TargetStatus;

/// Admission and lookup errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The scope/credential pair is not usable against the runner platform.
    #[error("{message}")]
    ValidationFailed {
        /// Client-facing explanation.
        message: String,
        /// The remote failure behind the rejection.
        #[source]
        source: DiscoveryError,
    },

    /// A non-deleted target already occupies the scope.
    #[error("{scope} is already registered, current status is {status}")]
    AlreadyRegistered {
        /// The contested scope.
        scope: String,
        /// Status of the target holding the scope.
        status: TargetStatus,
    },

    /// The requested status change is not in the transition table.
    #[error("Target cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: TargetStatus,
        /// Requested status.
        to: TargetStatus,
    },

    /// A runner platform call made on behalf of a stored target failed.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence failed.
    #[error("Storage error during '{operation}'")]
    Storage {
        /// Storage contract operation that failed.
        operation: &'static str,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// The caller's deadline passed or its cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap a store failure with the contract operation that produced it.
    pub fn storage(operation: &'static str, source: StoreError) -> Self {
        Self::Storage { operation, source }
    }

    /// Machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Discovery(_) => "DISCOVERY_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether the caller caused the failure (as opposed to the server or a dependency).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::ValidationFailed { .. }
                | Self::AlreadyRegistered { .. }
                | Self::InvalidTransition { .. }
                | Self::NotFound(_)
        )
    }
}

impl From<Cancelled> for Error {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Result type using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let test_cases = vec![
            (Error::InvalidInput("scope".to_string()), "INVALID_INPUT"),
            (
                Error::ValidationFailed {
                    message: "bad token".to_string(),
                    source: DiscoveryError::Unauthorized,
                },
                "VALIDATION_FAILED",
            ),
            (
                Error::AlreadyRegistered {
                    scope: "octo/repo".to_string(),
                    status: TargetStatus::Active,
                },
                "ALREADY_REGISTERED",
            ),
            (
                Error::InvalidTransition {
                    from: TargetStatus::Deleted,
                    to: TargetStatus::Deleted,
                },
                "INVALID_TRANSITION",
            ),
            (
                Error::Discovery(DiscoveryError::RateLimited { reset_at: None }),
                "DISCOVERY_ERROR",
            ),
            (Error::NotFound("target".to_string()), "NOT_FOUND"),
            (
                Error::storage("create", StoreError::Conflict),
                "STORAGE_ERROR",
            ),
            (Error::Cancelled, "CANCELLED"),
        ];

        for (error, expected_code) in test_cases {
            assert_eq!(
                error.error_code(),
                expected_code,
                "Error {:?} should have code {}",
                error,
                expected_code
            );
        }
    }

    #[test]
    fn test_already_registered_message_carries_status() {
        let err = Error::AlreadyRegistered {
            scope: "octo/repo".to_string(),
            status: TargetStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "octo/repo is already registered, current status is active"
        );
    }

    #[test]
    fn test_storage_error_hides_backend_details() {
        let err = Error::storage(
            "get_by_scope",
            StoreError::Corrupt {
                id: "abc".to_string(),
                reason: "column status holds 'zzz'".to_string(),
            },
        );
        assert_eq!(err.to_string(), "Storage error during 'get_by_scope'");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        let err: Error = Cancelled.into();
        assert!(matches!(err, Error::Cancelled));
        assert!(!err.is_client_error());
    }
}

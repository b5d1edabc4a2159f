// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP error responses.
//!
//! Every failure is rendered as
//! `{"error": {"reason": "<CODE>", "message": "<text>"}}`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use runwarden_core::Error;

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Machine-readable reason.
    pub reason: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "reason": self.reason,
                "message": self.message,
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let reason = err.error_code();
        match &err {
            Error::InvalidInput(_)
            | Error::ValidationFailed { .. }
            | Error::InvalidTransition { .. } => {
                debug!(reason, error = %err, "Rejected request");
                Self::new(StatusCode::BAD_REQUEST, reason, err.to_string())
            }
            Error::AlreadyRegistered { .. } => {
                Self::new(StatusCode::CONFLICT, reason, err.to_string())
            }
            Error::NotFound(_) => Self::new(StatusCode::NOT_FOUND, reason, err.to_string()),
            Error::Discovery(_) => {
                debug!(reason, error = %err, "Runner platform call failed");
                Self::new(StatusCode::BAD_GATEWAY, reason, err.to_string())
            }
            Error::Cancelled => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                reason,
                "request was cancelled or timed out",
            ),
            _ => {
                error!(reason, error = ?err, "Internal error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, reason, "internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "Malformed request body");
        Self::bad_request("json decode error")
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runwarden_core::discovery::DiscoveryError;
    use runwarden_core::store::StoreError;
    use runwarden_core::TargetStatus;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (Error::InvalidInput("scope".into()), StatusCode::BAD_REQUEST),
            (
                Error::AlreadyRegistered {
                    scope: "octo".into(),
                    status: TargetStatus::Active,
                },
                StatusCode::CONFLICT,
            ),
            (Error::NotFound("target".into()), StatusCode::NOT_FOUND),
            (Error::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (
                Error::Discovery(DiscoveryError::Unauthorized),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::storage("create", StoreError::Conflict),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = ApiError::from(Error::storage(
            "get_by_scope",
            StoreError::Corrupt {
                id: "abc".into(),
                reason: "column status holds 'zzz'".into(),
            },
        ));
        assert_eq!(err.reason, "STORAGE_ERROR");
        assert_eq!(err.message, "internal server error");
    }
}

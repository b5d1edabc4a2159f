// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Target admission.
//!
//! [`AdmissionController::admit`] takes a request through four steps:
//!
//! 1. validate the scope, domain and credential syntax;
//! 2. prove the credential against the runner platform (scope probe, then a
//!    runner listing through the discovery cache);
//! 3. deduplicate against storage, creating a new target, rejecting an
//!    occupied scope or reactivating a deleted target in place;
//! 4. read the resulting target back and return its sanitized view.
//!
//! Nothing is persisted unless step 2 succeeds. Uniqueness under concurrent
//! admissions relies on the store's unique index, not on a lock here. Each
//! remote and storage call is raced against the caller's cancellation token.
//!
//! Reactivation flips the status of the existing record and nothing else; the
//! credential stored at first admission stays in place.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cancel::cancellable;
use crate::discovery::{DiscoveryCache, DiscoveryError, PlatformConnector, RunnerRecord};
use crate::error::{Error, Result};
use crate::scope::{Domain, Scope, ScopeError};
use crate::store::{StoreError, TargetStore};
use crate::target::{Credential, Target, TargetStatus, TargetView};

/// An admission request as received at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionRequest {
    /// `owner` or `owner/repository`.
    pub scope: String,
    /// Self-managed platform URL; absent or blank for the hosted platform.
    #[serde(default)]
    pub domain: Option<String>,
    /// Platform access credential.
    pub credential: Credential,
}

/// A request that passed syntax validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// Parsed scope.
    pub scope: Scope,
    /// Parsed platform domain.
    pub domain: Domain,
    /// Non-blank credential.
    pub credential: Credential,
}

impl AdmissionRequest {
    /// Build a request.
    pub fn new(scope: impl Into<String>, domain: Option<&str>, credential: &str) -> Self {
        Self {
            scope: scope.into(),
            domain: domain.map(str::to_string),
            credential: Credential::new(credential),
        }
    }

    /// Check syntax without touching the network or storage.
    pub fn validate(&self) -> Result<ValidatedRequest> {
        let invalid = |e: ScopeError| Error::InvalidInput(e.to_string());
        let scope = Scope::parse(self.scope.trim()).map_err(invalid)?;
        let domain = Domain::parse(self.domain.as_deref()).map_err(invalid)?;

        if self.credential.is_blank() {
            return Err(Error::InvalidInput("credential must not be empty".to_string()));
        }

        Ok(ValidatedRequest {
            scope,
            domain,
            credential: self.credential.clone(),
        })
    }
}

/// Client-facing explanation for a failed live probe.
fn rejection(scope: &Scope, err: DiscoveryError) -> Error {
    let message = match err.root() {
        DiscoveryError::Unauthorized => {
            "credential was rejected by the runner platform".to_string()
        }
        DiscoveryError::ScopeNotFound { .. } => {
            format!("scope {} is invalid (maybe, it is not found)", scope)
        }
        DiscoveryError::RateLimited { .. } => {
            "runner platform rate limit is exhausted, retry after it resets".to_string()
        }
        DiscoveryError::InvalidEndpoint(_) => "domain does not point to a usable API".to_string(),
        _ => "failed to get list of registered runners (maybe, invalid scope or credential?)"
            .to_string(),
    };

    Error::ValidationFailed {
        message,
        source: err,
    }
}

/// Admits targets and serves lookups and soft-deletes on them.
pub struct AdmissionController {
    store: Arc<dyn TargetStore>,
    connector: Arc<dyn PlatformConnector>,
    discovery: Arc<DiscoveryCache>,
}

impl AdmissionController {
    /// Create a controller.
    pub fn new(
        store: Arc<dyn TargetStore>,
        connector: Arc<dyn PlatformConnector>,
        discovery: Arc<DiscoveryCache>,
    ) -> Self {
        Self {
            store,
            connector,
            discovery,
        }
    }

    /// The discovery cache used for live probes.
    pub fn discovery(&self) -> &Arc<DiscoveryCache> {
        &self.discovery
    }

    /// Admit a scope/credential pair and return the resulting target.
    pub async fn admit(
        &self,
        request: AdmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<TargetView> {
        let request = request.validate()?;
        let scope = &request.scope;

        self.probe(&request, cancel).await?;

        let lookup = cancellable(cancel, self.store.get_by_scope(&request.domain, scope)).await?;

        let id = match lookup {
            Err(StoreError::NotFound) => {
                debug!(scope = %scope, domain = %request.domain, "No target for scope, creating");
                self.create(&request, cancel).await?
            }
            Err(e) => {
                error!(scope = %scope, error = %e, "Failed to look up target by scope");
                return Err(Error::storage("get_by_scope", e));
            }
            Ok(existing) if existing.status.occupies_scope() => {
                info!(
                    scope = %scope,
                    target_id = %existing.id,
                    status = %existing.status,
                    "Scope is already registered"
                );
                return Err(Error::AlreadyRegistered {
                    scope: scope.to_string(),
                    status: existing.status,
                });
            }
            Ok(existing) => self.reactivate(&existing, cancel).await?,
        };

        let target = self.read_back(id, cancel).await?;
        info!(
            scope = %scope,
            target_id = %target.id,
            status = %target.status,
            "Target admitted"
        );
        Ok(target.view())
    }

    /// Fetch a target by identifier.
    pub async fn get_target(&self, id: Uuid, cancel: &CancellationToken) -> Result<TargetView> {
        self.load(id, cancel).await.map(|target| target.view())
    }

    /// Runners currently registered for an active target, seen through its
    /// stored credential. Served from the discovery cache while fresh.
    pub async fn list_runners(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Arc<[RunnerRecord]>> {
        let target = self.load(id, cancel).await?;
        if target.status != TargetStatus::Active {
            return Err(Error::InvalidInput(format!(
                "target {} is {}, runners are only listed for active targets",
                id, target.status
            )));
        }

        let platform = self
            .connector
            .connect(&target.domain, &target.credential)
            .map_err(|e| {
                warn!(target_id = %id, error = %e, "Failed to create platform client");
                Error::Discovery(e)
            })?;
        let client = self
            .discovery
            .client(platform, &target.domain, &target.credential);

        cancellable(cancel, self.discovery.cached_list_runners(&client, &target.scope))
            .await?
            .map_err(|e| {
                warn!(target_id = %id, scope = %target.scope, error = %e, "Failed to list runners");
                Error::Discovery(e)
            })
    }

    async fn load(&self, id: Uuid, cancel: &CancellationToken) -> Result<Target> {
        match cancellable(cancel, self.store.get_by_id(id)).await? {
            Ok(target) => Ok(target),
            Err(StoreError::NotFound) => {
                debug!(target_id = %id, "Target not found");
                Err(Error::NotFound(format!("target {}", id)))
            }
            Err(e) => {
                error!(target_id = %id, error = %e, "Failed to load target");
                Err(Error::storage("get_by_id", e))
            }
        }
    }

    /// Soft-delete a target, freeing its scope for a later reactivation.
    pub async fn retire(&self, id: Uuid, cancel: &CancellationToken) -> Result<TargetView> {
        let current = self.get_target(id, cancel).await?;

        if !current.status.can_transition_to(TargetStatus::Deleted) {
            return Err(Error::InvalidTransition {
                from: current.status,
                to: TargetStatus::Deleted,
            });
        }

        self.set_status(id, TargetStatus::Deleted, cancel).await?;
        let target = self.read_back(id, cancel).await?;
        info!(target_id = %id, scope = %target.scope, "Target deleted");
        Ok(target.view())
    }

    /// Prove the credential can see the scope and list its runners.
    async fn probe(&self, request: &ValidatedRequest, cancel: &CancellationToken) -> Result<()> {
        let scope = &request.scope;

        let platform = self
            .connector
            .connect(&request.domain, &request.credential)
            .map_err(|e| {
                warn!(scope = %scope, error = %e, "Failed to create platform client");
                rejection(scope, e)
            })?;

        cancellable(cancel, platform.probe_scope(scope))
            .await?
            .map_err(|e| {
                warn!(scope = %scope, error = %e, "Scope probe failed");
                rejection(scope, e)
            })?;

        let client = self
            .discovery
            .client(platform, &request.domain, &request.credential);
        let runners = cancellable(cancel, self.discovery.cached_list_runners(&client, scope))
            .await?
            .map_err(|e| {
                warn!(scope = %scope, error = %e, "Failed to get list of registered runners");
                rejection(scope, e)
            })?;

        debug!(scope = %scope, runners = runners.len(), "Credential verified");
        Ok(())
    }

    async fn create(&self, request: &ValidatedRequest, cancel: &CancellationToken) -> Result<Uuid> {
        let target = Target::new_active(
            request.scope.clone(),
            request.domain.clone(),
            request.credential.clone(),
            Utc::now(),
        );

        match cancellable(cancel, self.store.create(&target)).await? {
            Ok(()) => Ok(target.id),
            Err(StoreError::Conflict) => {
                // Lost a race with a concurrent admission of the same scope.
                let status = self.current_status(request, cancel).await?;
                info!(scope = %request.scope, status = %status, "Scope registered concurrently");
                Err(Error::AlreadyRegistered {
                    scope: request.scope.to_string(),
                    status,
                })
            }
            Err(e) => {
                error!(scope = %request.scope, error = %e, "Failed to create target");
                Err(Error::storage("create", e))
            }
        }
    }

    /// Status of the target holding the scope, `Active` if it cannot be read.
    async fn current_status(
        &self,
        request: &ValidatedRequest,
        cancel: &CancellationToken,
    ) -> Result<TargetStatus> {
        let status = cancellable(cancel, self.store.get_by_scope(&request.domain, &request.scope))
            .await?
            .ok()
            .map(|t| t.status)
            .filter(|s| s.occupies_scope())
            .unwrap_or(TargetStatus::Active);
        Ok(status)
    }

    async fn reactivate(&self, existing: &Target, cancel: &CancellationToken) -> Result<Uuid> {
        if !existing.status.can_transition_to(TargetStatus::Active) {
            return Err(Error::InvalidTransition {
                from: existing.status,
                to: TargetStatus::Active,
            });
        }

        self.set_status(existing.id, TargetStatus::Active, cancel).await?;
        info!(scope = %existing.scope, target_id = %existing.id, "Reactivated deleted target");
        Ok(existing.id)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TargetStatus,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancellable(cancel, self.store.update_status(id, status, Utc::now()))
            .await?
            .map_err(|e| {
                error!(
                    target_id = %id,
                    status = %status,
                    error = %e,
                    "Failed to update target status"
                );
                Error::storage("update_status", e)
            })
    }

    async fn read_back(&self, id: Uuid, cancel: &CancellationToken) -> Result<Target> {
        cancellable(cancel, self.store.get_by_id(id))
            .await?
            .map_err(|e| {
                error!(target_id = %id, error = %e, "Failed to read target back");
                Error::storage("get_by_id", e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_org_and_repo() {
        let org = AdmissionRequest::new("octo", None, "tok").validate().unwrap();
        assert!(org.scope.is_organization());
        assert!(org.domain.is_hosted());

        let repo = AdmissionRequest::new("octo/repo", Some("https://ghe.example.com/"), "tok")
            .validate()
            .unwrap();
        assert_eq!(repo.scope.repo(), Some("repo"));
        assert_eq!(repo.domain.as_str(), Some("https://ghe.example.com"));
    }

    #[test]
    fn test_validate_rejects_malformed_input() {
        let cases = vec![
            AdmissionRequest::new("", None, "tok"),
            AdmissionRequest::new("octo/repo/extra", None, "tok"),
            AdmissionRequest::new("octo/", None, "tok"),
            AdmissionRequest::new("octo/repo", Some("ghe.example.com"), "tok"),
            AdmissionRequest::new("octo/repo", None, "   "),
        ];

        for request in cases {
            let err = request.validate().unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(_)),
                "{:?} should be invalid input, got {:?}",
                request,
                err
            );
        }
    }

    #[test]
    fn test_request_deserializes_and_hides_credential() {
        let request: AdmissionRequest = serde_json::from_str(
            r#"{"scope": "octo/repo", "credential": "ghp_secret"}"#,
        )
        .unwrap();

        assert_eq!(request.scope, "octo/repo");
        assert!(request.domain.is_none());
        assert_eq!(request.credential.expose(), "ghp_secret");
        assert!(!format!("{:?}", request).contains("ghp_secret"));
    }

    #[test]
    fn test_rejection_messages() {
        let scope = Scope::parse("octo/repo").unwrap();

        let err = rejection(
            &scope,
            DiscoveryError::ScopeNotFound {
                scope: "octo/repo".to_string(),
            },
        );
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert!(err.to_string().contains("octo/repo"));

        let nested = rejection(
            &scope,
            DiscoveryError::Listing {
                scope: "octo/repo".to_string(),
                page: 2,
                source: Box::new(DiscoveryError::Unauthorized),
            },
        );
        assert_eq!(
            nested.to_string(),
            "credential was rejected by the runner platform"
        );
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner discovery.
//!
//! [`DiscoveryClient`] walks every page of a scope's runner listing and
//! returns the complete, ordered set or an error, never a partial set.
//! [`DiscoveryCache`] puts a short per-scope cache in front of it and owns the
//! [`QuotaTracker`] that each fetched page reports to.
//!
//! The remote platform is reached through [`PlatformClient`], obtained from a
//! [`PlatformConnector`] for a given domain and credential. The GitHub REST
//! implementation lives in [`github`]; [`mock`] provides a scripted platform
//! for tests.

pub mod cache;
pub mod github;
pub mod mock;

pub use self::cache::{
    Clock, DEFAULT_PURGE_INTERVAL, DiscoveryCache, ManualClock, QuotaTracker, SystemClock,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::scope::{Domain, Scope, ScopeKey};
use crate::target::Credential;

/// How long a discovery result is served from cache by default.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1);

/// Errors from the runner platform.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The credential was rejected.
    #[error("credential rejected by the runner platform")]
    Unauthorized,

    /// The organization or repository does not exist (or is invisible to the credential).
    #[error("scope '{scope}' not found on the runner platform")]
    ScopeNotFound {
        /// The missing scope.
        scope: String,
    },

    /// The API quota for this credential is exhausted.
    #[error("rate limit exhausted")]
    RateLimited {
        /// When the quota resets, if reported.
        reset_at: Option<DateTime<Utc>>,
    },

    /// Unexpected HTTP status.
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request path.
        endpoint: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The platform API base URL could not be built.
    #[error("invalid platform endpoint: {0}")]
    InvalidEndpoint(String),

    /// No runner carries the requested name.
    #[error("runner '{name}' not found")]
    RunnerNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A page of a runner listing failed; earlier pages were discarded.
    #[error("listing runners for {scope} failed on page {page}: {source}")]
    Listing {
        /// Scope being listed.
        scope: String,
        /// Page that failed.
        page: u32,
        /// The page failure.
        #[source]
        source: Box<DiscoveryError>,
    },
}

impl DiscoveryError {
    /// Innermost error, looking through [`DiscoveryError::Listing`].
    pub fn root(&self) -> &DiscoveryError {
        match self {
            Self::Listing { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A runner registered under a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerRecord {
    /// Platform-assigned identifier.
    pub id: i64,
    /// Runner name.
    pub name: String,
    /// Operating system reported by the runner.
    #[serde(default)]
    pub os: String,
    /// `online` / `offline`.
    #[serde(default)]
    pub status: String,
    /// Whether a job is running on it.
    #[serde(default)]
    pub busy: bool,
    /// Label names.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Most recent rate-limit state observed for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Calls remaining in the current window.
    pub remaining: u64,
    /// Window size, when reported.
    pub limit: Option<u64>,
    /// When the window resets.
    pub reset_at: DateTime<Utc>,
}

/// One page of a runner listing.
#[derive(Debug, Clone, Default)]
pub struct RunnerPage {
    /// Runners on this page, in platform order.
    pub runners: Vec<RunnerRecord>,
    /// Next page number, absent on the last page.
    pub next_page: Option<u32>,
    /// Quota reported with this page.
    pub quota: Option<QuotaSnapshot>,
}

/// Authenticated access to the runner platform for one credential.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Confirm the organization or repository exists and is visible.
    async fn probe_scope(&self, scope: &Scope) -> Result<(), DiscoveryError>;

    /// Fetch page `page` (1-based) of the scope's runner listing.
    ///
    /// Organization scopes use the organization listing, repository scopes
    /// the repository listing.
    async fn list_runner_page(&self, scope: &Scope, page: u32)
    -> Result<RunnerPage, DiscoveryError>;
}

/// Builds authenticated [`PlatformClient`]s.
pub trait PlatformConnector: Send + Sync {
    /// Client for `domain` authenticated with `credential`.
    fn connect(
        &self,
        domain: &Domain,
        credential: &Credential,
    ) -> Result<Arc<dyn PlatformClient>, DiscoveryError>;
}

/// Pages through a scope's runner listing with one client.
///
/// Obtain one from [`DiscoveryCache::client`] so page quotas reach the
/// shared [`QuotaTracker`].
pub struct DiscoveryClient {
    platform: Arc<dyn PlatformClient>,
    domain: Domain,
    principal: String,
    quota: Arc<QuotaTracker>,
}

impl DiscoveryClient {
    /// Create a client. `principal` identifies the credential for caching.
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        domain: Domain,
        principal: String,
        quota: Arc<QuotaTracker>,
    ) -> Self {
        Self {
            platform,
            domain,
            principal,
            quota,
        }
    }

    /// Platform instance this client talks to.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Credential identity used to partition cache entries.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// The underlying platform client.
    pub fn platform(&self) -> &Arc<dyn PlatformClient> {
        &self.platform
    }

    /// List every runner registered under `scope`.
    ///
    /// Follows pagination until the platform reports no next page. Each
    /// page's quota is recorded before the next page is requested. Any page
    /// failure fails the whole listing.
    pub async fn list_runners(&self, scope: &Scope) -> Result<Vec<RunnerRecord>, DiscoveryError> {
        let key = ScopeKey::new(self.domain.clone(), scope.clone());
        let mut runners = Vec::new();
        let mut page = 1;

        loop {
            debug!(
                scope = %key,
                page,
                fetched = runners.len(),
                "Fetching runner page"
            );

            let fetched = self
                .platform
                .list_runner_page(scope, page)
                .await
                .map_err(|e| DiscoveryError::Listing {
                    scope: key.to_string(),
                    page,
                    source: Box::new(e),
                })?;

            if let Some(quota) = fetched.quota {
                self.quota.record_quota(&key, quota);
            }
            runners.extend(fetched.runners);

            match fetched.next_page {
                Some(next) if next > page => page = next,
                Some(next) => {
                    return Err(DiscoveryError::Listing {
                        scope: key.to_string(),
                        page,
                        source: Box::new(DiscoveryError::Decode(format!(
                            "next page {} does not advance past {}",
                            next, page
                        ))),
                    });
                }
                None => break,
            }
        }

        debug!(scope = %key, count = runners.len(), "Listed runners");
        Ok(runners)
    }
}

/// Find a runner by name, ignoring ASCII case.
///
/// An empty listing and a listing without the name both yield
/// [`DiscoveryError::RunnerNotFound`].
pub fn find_runner<'a>(
    runners: &'a [RunnerRecord],
    name: &str,
) -> Result<&'a RunnerRecord, DiscoveryError> {
    runners
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| DiscoveryError::RunnerNotFound {
            name: name.to_string(),
        })
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Discovery cache and quota tracker.
//!
//! Both are process-wide maps owned by one [`DiscoveryCache`] and shared by
//! `Arc`. No lock is held across an await: a miss releases the map before
//! fetching, so concurrent misses for one key may each fetch and the last
//! insert wins. Freshness comes from the TTL alone.
//!
//! Every miss sweeps expired entries before inserting, and
//! [`DiscoveryCache::run_janitor`] sweeps periodically while the cache is idle.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    DiscoveryClient, DiscoveryError, PlatformClient, QuotaSnapshot, RunnerRecord, find_runner,
};
use crate::scope::{Domain, Scope, ScopeKey};
use crate::target::Credential;

/// How often the janitor sweeps expired entries by default.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(10);

/// Monotonic time source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Last observed quota per scope.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    snapshots: DashMap<ScopeKey, QuotaSnapshot>,
}

impl QuotaTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot for `key`.
    pub fn record_quota(&self, key: &ScopeKey, snapshot: QuotaSnapshot) {
        self.snapshots.insert(key.clone(), snapshot);
    }

    /// Most recent snapshot for `key`, if any call has reported one.
    pub fn get_quota(&self, key: &ScopeKey) -> Option<QuotaSnapshot> {
        self.snapshots.get(key).map(|entry| *entry)
    }
}

/// Cache key: a scope on one platform instance, as seen by one credential.
///
/// Results are partitioned by credential so a credential never proves
/// itself with another credential's cached listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    scope: ScopeKey,
    principal: String,
}

#[derive(Debug)]
struct CacheEntry {
    runners: Arc<[RunnerRecord]>,
    expires_at: Instant,
}

/// Short-lived cache of runner listings.
#[derive(Debug)]
pub struct DiscoveryCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    quota: Arc<QuotaTracker>,
}

impl DiscoveryCache {
    /// Cache with the given TTL on the wall clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Cache with the given TTL and time source.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            quota: Arc::new(QuotaTracker::new()),
        }
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The tracker every client built by this cache reports to.
    pub fn quota_tracker(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    /// Discovery client over `platform`, wired to this cache's quota tracker.
    pub fn client(
        &self,
        platform: Arc<dyn PlatformClient>,
        domain: &Domain,
        credential: &Credential,
    ) -> DiscoveryClient {
        DiscoveryClient::new(
            platform,
            domain.clone(),
            credential.fingerprint(),
            self.quota.clone(),
        )
    }

    /// List runners for `scope`, served from cache while the entry is fresh.
    ///
    /// The returned slice is shared and immutable; copy it to modify.
    pub async fn cached_list_runners(
        &self,
        client: &DiscoveryClient,
        scope: &Scope,
    ) -> Result<Arc<[RunnerRecord]>, DiscoveryError> {
        let key = CacheKey {
            scope: ScopeKey::new(client.domain().clone(), scope.clone()),
            principal: client.principal().to_string(),
        };

        let now = self.clock.now();
        let hit = self
            .entries
            .get(&key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.runners.clone());

        if let Some(runners) = hit {
            debug!(scope = %key.scope, count = runners.len(), "Used cached list of runners");
            return Ok(runners);
        }

        let runners: Arc<[RunnerRecord]> = client.list_runners(scope).await?.into();

        self.purge_expired();
        self.entries.insert(
            key,
            CacheEntry {
                runners: runners.clone(),
                expires_at: self.clock.now() + self.ttl,
            },
        );

        Ok(runners)
    }

    /// Look up a runner by name (case-insensitive) in the scope's listing.
    pub async fn runner_exists(
        &self,
        client: &DiscoveryClient,
        scope: &Scope,
        name: &str,
    ) -> Result<RunnerRecord, DiscoveryError> {
        let runners = self.cached_list_runners(client, scope).await?;
        find_runner(&runners, name).cloned()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired entries every `period` until `shutdown` fires.
    pub async fn run_janitor(&self, period: Duration, shutdown: CancellationToken) {
        let period = period.max(Duration::from_millis(1));

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Discovery cache janitor stopped");
                    break;
                }
                _ = tokio::time::sleep(period) => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        debug!(removed, remaining = self.len(), "Purged expired runner listings");
                    }
                }
            }
        }
    }

    /// Number of entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

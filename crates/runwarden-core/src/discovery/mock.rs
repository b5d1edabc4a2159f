// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runner platform for testing.
//!
//! A scripted platform that serves fixed runner pages without any network
//! access, plus a connector that hands it out or rejects chosen credentials.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{
    DiscoveryError, PlatformClient, PlatformConnector, QuotaSnapshot, RunnerPage, RunnerRecord,
};
use crate::scope::{Domain, Scope};
use crate::target::Credential;

/// Scripted runner platform.
#[derive(Debug, Default)]
pub struct MockPlatform {
    pages: Vec<Vec<RunnerRecord>>,
    /// Page number (1-based) that answers with a 502.
    pub fail_on_page: Option<u32>,
    /// If true, every scope probe reports the scope as missing.
    pub scope_missing: bool,
    list_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MockPlatform {
    /// Quota window reported with every page.
    pub const QUOTA_LIMIT: u64 = 5000;

    /// Platform whose listing has no runners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform serving one page per entry, runners named as given.
    pub fn with_pages(pages: Vec<Vec<&str>>) -> Self {
        let mut next_id = 0;
        let pages = pages
            .into_iter()
            .map(|names| {
                names
                    .into_iter()
                    .map(|name| {
                        next_id += 1;
                        Self::runner(next_id, name)
                    })
                    .collect()
            })
            .collect();

        Self {
            pages,
            ..Self::default()
        }
    }

    /// Make page `page` fail.
    pub fn failing_on_page(mut self, page: u32) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Make every scope probe fail with `ScopeNotFound`.
    pub fn with_missing_scope(mut self) -> Self {
        self.scope_missing = true;
        self
    }

    /// An idle online runner.
    pub fn runner(id: i64, name: &str) -> RunnerRecord {
        RunnerRecord {
            id,
            name: name.to_string(),
            os: "linux".to_string(),
            status: "online".to_string(),
            busy: false,
            labels: vec!["self-hosted".to_string()],
        }
    }

    /// Number of page fetches served (including failed ones).
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of scope probes served.
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn probe_scope(&self, scope: &Scope) -> Result<(), DiscoveryError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.scope_missing {
            return Err(DiscoveryError::ScopeNotFound {
                scope: scope.to_string(),
            });
        }
        Ok(())
    }

    async fn list_runner_page(
        &self,
        _scope: &Scope,
        page: u32,
    ) -> Result<RunnerPage, DiscoveryError> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;

        if self.fail_on_page == Some(page) {
            return Err(DiscoveryError::Status {
                status: 502,
                endpoint: format!("mock/page/{}", page),
            });
        }

        let index = page.saturating_sub(1) as usize;
        let runners = self.pages.get(index).cloned().unwrap_or_default();
        let next_page = (index + 1 < self.pages.len()).then_some(page + 1);

        Ok(RunnerPage {
            runners,
            next_page,
            quota: Some(QuotaSnapshot {
                remaining: Self::QUOTA_LIMIT.saturating_sub(call),
                limit: Some(Self::QUOTA_LIMIT),
                reset_at: Utc::now() + Duration::hours(1),
            }),
        })
    }
}

/// Connector that hands out a shared [`MockPlatform`].
#[derive(Debug)]
pub struct MockConnector {
    platform: Arc<MockPlatform>,
    rejected: HashSet<String>,
    connects: AtomicUsize,
}

impl MockConnector {
    /// Connector accepting every credential.
    pub fn new(platform: Arc<MockPlatform>) -> Self {
        Self {
            platform,
            rejected: HashSet::new(),
            connects: AtomicUsize::new(0),
        }
    }

    /// Reject `credential` with `Unauthorized`.
    pub fn rejecting(mut self, credential: &str) -> Self {
        self.rejected.insert(credential.to_string());
        self
    }

    /// The shared platform.
    pub fn platform(&self) -> &Arc<MockPlatform> {
        &self.platform
    }

    /// Number of clients handed out.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl PlatformConnector for MockConnector {
    fn connect(
        &self,
        _domain: &Domain,
        credential: &Credential,
    ) -> Result<Arc<dyn PlatformClient>, DiscoveryError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(credential.expose()) {
            return Err(DiscoveryError::Unauthorized);
        }
        Ok(self.platform.clone())
    }
}

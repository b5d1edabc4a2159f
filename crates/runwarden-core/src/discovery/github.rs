// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GitHub REST implementation of the runner platform.
//!
//! Hosted GitHub is reached at [`DEFAULT_API_URL`]; a domain qualifier `D`
//! (GitHub Enterprise Server) is reached at `D/api/v3/`.
//!
//! | Scope | Probe | Listing |
//! |-------|-------|---------|
//! | `owner` | `GET orgs/{owner}` | `GET orgs/{owner}/actions/runners` |
//! | `owner/repo` | `GET repos/{owner}/{repo}` | `GET repos/{owner}/{repo}/actions/runners` |
//!
//! Pagination follows the `Link: <...>; rel="next"` header. Quota comes from
//! the `X-RateLimit-*` headers of every response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, LINK};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{
    DiscoveryError, PlatformClient, PlatformConnector, QuotaSnapshot, RunnerPage, RunnerRecord,
};
use crate::scope::{Domain, Scope};
use crate::target::Credential;

/// Hosted GitHub API base.
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

/// Runners requested per page (the API maximum).
pub const PER_PAGE: u32 = 100;

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Builds [`GitHubClient`]s sharing one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct GitHubConnector {
    http: reqwest::Client,
    hosted_api: Url,
}

impl GitHubConnector {
    /// Connector for the hosted API at `hosted_api`, with a per-call `timeout`.
    pub fn new(hosted_api: Url, timeout: Duration) -> Result<Self, DiscoveryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("runwarden/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            hosted_api: with_trailing_slash(hosted_api),
        })
    }

    /// API base URL for `domain`.
    pub fn api_base(&self, domain: &Domain) -> Result<Url, DiscoveryError> {
        match domain.as_str() {
            None => Ok(self.hosted_api.clone()),
            Some(host) => {
                let raw = format!("{}/api/v3/", host.trim_end_matches('/'));
                Url::parse(&raw).map_err(|e| DiscoveryError::InvalidEndpoint(e.to_string()))
            }
        }
    }
}

impl PlatformConnector for GitHubConnector {
    fn connect(
        &self,
        domain: &Domain,
        credential: &Credential,
    ) -> Result<Arc<dyn PlatformClient>, DiscoveryError> {
        if credential.is_blank() {
            return Err(DiscoveryError::Unauthorized);
        }

        Ok(Arc::new(GitHubClient {
            http: self.http.clone(),
            base: self.api_base(domain)?,
            credential: credential.clone(),
        }))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// GitHub API client authenticated with one credential.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
    credential: Credential,
}

impl GitHubClient {
    async fn get(
        &self,
        path: &str,
        scope: &Scope,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, DiscoveryError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| DiscoveryError::InvalidEndpoint(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(self.credential.expose())
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let quota = parse_quota(response.headers());
        debug!(%status, path, "Runner platform returned an error status");

        Err(match status {
            StatusCode::UNAUTHORIZED => DiscoveryError::Unauthorized,
            StatusCode::NOT_FOUND => DiscoveryError::ScopeNotFound {
                scope: scope.to_string(),
            },
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if quota.is_none_or(|q| q.remaining == 0) =>
            {
                DiscoveryError::RateLimited {
                    reset_at: quota.map(|q| q.reset_at),
                }
            }
            other => DiscoveryError::Status {
                status: other.as_u16(),
                endpoint: path.to_string(),
            },
        })
    }
}

fn scope_path(scope: &Scope) -> String {
    match scope.repo() {
        None => format!("orgs/{}", scope.owner()),
        Some(repo) => format!("repos/{}/{}", scope.owner(), repo),
    }
}

#[derive(Debug, Deserialize)]
struct RunnersResponse {
    #[serde(default)]
    runners: Vec<GitHubRunner>,
}

#[derive(Debug, Deserialize)]
struct GitHubRunner {
    id: i64,
    name: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    busy: bool,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

impl From<GitHubRunner> for RunnerRecord {
    fn from(r: GitHubRunner) -> Self {
        Self {
            id: r.id,
            name: r.name,
            os: r.os,
            status: r.status,
            busy: r.busy,
            labels: r.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[async_trait]
impl PlatformClient for GitHubClient {
    async fn probe_scope(&self, scope: &Scope) -> Result<(), DiscoveryError> {
        self.get(&scope_path(scope), scope, &[]).await?;
        Ok(())
    }

    async fn list_runner_page(
        &self,
        scope: &Scope,
        page: u32,
    ) -> Result<RunnerPage, DiscoveryError> {
        let path = format!("{}/actions/runners", scope_path(scope));
        let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];

        let response = self.get(&path, scope, &query).await?;
        let quota = parse_quota(response.headers());
        let next_page = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        let body: RunnersResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Decode(e.to_string()))?;

        Ok(RunnerPage {
            runners: body.runners.into_iter().map(RunnerRecord::from).collect(),
            next_page,
            quota,
        })
    }
}

/// Read the `X-RateLimit-*` headers.
pub fn parse_quota(headers: &HeaderMap) -> Option<QuotaSnapshot> {
    let number = |name: &str| -> Option<u64> { headers.get(name)?.to_str().ok()?.parse().ok() };

    let remaining = number("x-ratelimit-remaining")?;
    let reset = number("x-ratelimit-reset")?;
    let reset_at = DateTime::<Utc>::from_timestamp(i64::try_from(reset).ok()?, 0)?;

    Some(QuotaSnapshot {
        remaining,
        limit: number("x-ratelimit-limit"),
        reset_at,
    })
}

/// Page number of the `rel="next"` entry of a `Link` header.
pub fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let (target, params) = part.trim().split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }

        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let url = Url::parse(url).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}

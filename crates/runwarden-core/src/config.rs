// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for runwarden.

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::discovery::DEFAULT_CACHE_TTL;
use crate::discovery::github::DEFAULT_API_URL;

/// Runwarden configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (`postgres://...` or `sqlite:...`)
    pub database_url: String,
    /// HTTP server address
    pub http_addr: SocketAddr,
    /// Base URL of the hosted platform API
    pub github_api_url: Url,
    /// How long a discovery result is served from cache
    pub discovery_cache_ttl: Duration,
    /// Deadline for a single admission request, storage and remote calls included
    pub request_timeout: Duration,
    /// Timeout for each individual remote API call
    pub http_client_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("RUNWARDEN_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("RUNWARDEN_DATABASE_URL or DATABASE_URL"))?;

        let port: u16 = std::env::var("RUNWARDEN_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let github_api_url = std::env::var("RUNWARDEN_GITHUB_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let github_api_url = Url::parse(&github_api_url)
            .map_err(|_| ConfigError::InvalidUrl("RUNWARDEN_GITHUB_API_URL"))?;

        let discovery_cache_ttl = duration_var(
            "RUNWARDEN_DISCOVERY_CACHE_TTL_MS",
            DEFAULT_CACHE_TTL,
            Duration::from_millis,
        )?;
        let request_timeout = duration_var(
            "RUNWARDEN_REQUEST_TIMEOUT_SECS",
            Duration::from_secs(30),
            Duration::from_secs,
        )?;
        let http_client_timeout = duration_var(
            "RUNWARDEN_HTTP_CLIENT_TIMEOUT_SECS",
            Duration::from_secs(10),
            Duration::from_secs,
        )?;

        Ok(Self {
            database_url,
            http_addr,
            github_api_url,
            discovery_cache_ttl,
            request_timeout,
            http_client_timeout,
        })
    }
}

fn duration_var(
    name: &'static str,
    default: Duration,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(unit)
            .map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// A numeric variable could not be parsed.
    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),
    /// A URL variable could not be parsed.
    #[error("Invalid URL in {0}")]
    InvalidUrl(&'static str),
}

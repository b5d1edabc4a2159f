// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scope and platform domain parsing.
//!
//! A scope is either an organization (`octo`) or an owner/repository pair
//! (`octo/repo`). The domain qualifier selects a self-managed platform
//! instance; when absent the hosted platform is meant.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Reasons a scope or domain string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ScopeError {
    /// The scope is empty.
    #[error("scope must not be empty")]
    Empty,
    /// An owner or repository component is empty.
    #[error("scope '{0}' has an empty component")]
    EmptyComponent(String),
    /// More than `owner/repository`.
    #[error("scope '{0}' must be 'owner' or 'owner/repository'")]
    TooManySegments(String),
    /// A component contains something other than letters, digits, '-', '_' or '.'.
    #[error("scope '{scope}' contains invalid character {found:?}")]
    InvalidCharacter {
        /// The offending scope.
        scope: String,
        /// First invalid character.
        found: char,
    },
    /// `.` and `..` are not names.
    #[error("scope '{0}' contains a relative path component")]
    RelativeComponent(String),
    /// The domain qualifier is not a bare absolute http(s) URL.
    #[error("domain '{0}' must be a bare absolute http(s) URL")]
    InvalidDomain(String),
}

/// An organization, or an owner/repository pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    owner: String,
    repo: Option<String>,
}

impl Scope {
    /// Parse `owner` or `owner/repository`.
    pub fn parse(raw: &str) -> Result<Self, ScopeError> {
        if raw.is_empty() {
            return Err(ScopeError::Empty);
        }

        let mut parts = raw.split('/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next();
        if parts.next().is_some() {
            return Err(ScopeError::TooManySegments(raw.to_string()));
        }

        validate_component(raw, owner)?;
        if let Some(repo) = repo {
            validate_component(raw, repo)?;
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.map(str::to_string),
        })
    }

    /// Owner (organization or user) component.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository component, absent for organization scopes.
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    /// Whether this scope names a whole organization.
    pub fn is_organization(&self) -> bool {
        self.repo.is_none()
    }
}

fn validate_component(scope: &str, component: &str) -> Result<(), ScopeError> {
    if component.is_empty() {
        return Err(ScopeError::EmptyComponent(scope.to_string()));
    }
    if component == "." || component == ".." {
        return Err(ScopeError::RelativeComponent(scope.to_string()));
    }
    if let Some(found) = component
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ScopeError::InvalidCharacter {
            scope: scope.to_string(),
            found,
        });
    }
    Ok(())
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repo {
            Some(repo) => write!(f, "{}/{}", self.owner, repo),
            None => f.write_str(&self.owner),
        }
    }
}

/// Platform instance qualifier. `None` is the hosted platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Domain(Option<String>);

impl Domain {
    /// The hosted platform.
    pub fn hosted() -> Self {
        Self(None)
    }

    /// Parse an optional qualifier. Blank input means the hosted platform.
    ///
    /// The qualifier must be a bare http(s) URL (no query, fragment or
    /// userinfo). Spellings of the same server yield the same domain.
    pub fn parse(raw: Option<&str>) -> Result<Self, ScopeError> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Self::hosted());
        };

        let url = Url::parse(raw).map_err(|_| ScopeError::InvalidDomain(raw.to_string()))?;
        let plain_origin = url.query().is_none()
            && url.fragment().is_none()
            && url.username().is_empty()
            && url.password().is_none();
        let web_host = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
        if !web_host || !plain_origin {
            return Err(ScopeError::InvalidDomain(raw.to_string()));
        }

        // Serialized form: lower-case scheme and host, default port dropped.
        Ok(Self(Some(url.as_str().trim_end_matches('/').to_string())))
    }

    /// Rebuild from the stored column value (empty string for hosted).
    pub fn from_storage(value: &str) -> Self {
        if value.is_empty() {
            Self::hosted()
        } else {
            Self(Some(value.to_string()))
        }
    }

    /// Value persisted in the `domain` column.
    ///
    /// The hosted platform is stored as the empty string so the
    /// `(domain, scope)` unique index covers it as well.
    pub fn storage_key(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    /// The qualifier, if any.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Whether this is the hosted platform.
    pub fn is_hosted(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("hosted"))
    }
}

/// A scope on a particular platform instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    /// Platform instance.
    pub domain: Domain,
    /// Scope on that instance.
    pub scope: Scope,
}

impl ScopeKey {
    /// Create a key.
    pub fn new(domain: Domain, scope: Scope) -> Self {
        Self { domain, scope }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.scope, self.domain)
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runwarden Core - Target Admission and Runner Discovery
//!
//! This crate owns the registration lifecycle of CI targets (an organization
//! or a single repository bound to an access credential) and the discovery of
//! the runners currently registered under a target's scope.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      runwarden-server (HTTP boundary)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         AdmissionController                              │
//! │   validate input ─► live probe ─► dedup lookup ─► create / reactivate    │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           │ cached_list_runners                          │ create / get / update
//!           ▼                                              ▼
//! ┌───────────────────────────┐                ┌───────────────────────────┐
//! │  DiscoveryCache (1s TTL)  │                │       TargetStore         │
//! │  QuotaTracker             │                │  (PostgreSQL / SQLite)    │
//! └───────────────────────────┘                └───────────────────────────┘
//!           │
//!           ▼
//! ┌───────────────────────────┐
//! │  DiscoveryClient          │──────► GitHub REST API (hosted or GHES)
//! │  (pagination)             │
//! └───────────────────────────┘
//! ```
//!
//! # Target Status State Machine
//!
//! ```text
//!      admit (new scope)
//!            │
//!            ▼
//!      ┌──────────┐   retire    ┌──────────┐
//!      │  ACTIVE  │────────────►│ DELETED  │
//!      └──────────┘◄────────────└──────────┘
//!                     admit
//!              (same identifier reused)
//! ```
//!
//! # Modules
//!
//! - [`admission`]: Target admission controller
//! - [`cancel`]: Cancellation helper shared by storage and remote calls
//! - [`config`]: Configuration from environment variables
//! - [`discovery`]: Runner discovery client, cache and quota tracker
//! - [`error`]: Error taxonomy for admission and lookups
//! - [`scope`]: Scope and platform domain parsing
//! - [`store`]: Storage contract and SQL backends
//! - [`target`]: Target record, status transitions and credentials

#![deny(missing_docs)]

/// Target admission controller.
pub mod admission;

/// Cancellation helper for storage and remote calls.
pub mod cancel;

/// Configuration loaded from environment variables.
pub mod config;

/// Runner discovery: platform client, pagination, cache and quota tracking.
pub mod discovery;

/// Error types for admission and lookups.
pub mod error;

mod migrations;

/// Scope and platform domain parsing.
pub mod scope;

/// Storage contract for targets and its SQL backends.
pub mod store;

/// Target record and lifecycle status.
pub mod target;

pub use admission::{AdmissionController, AdmissionRequest};
pub use config::Config;
pub use error::{Error, Result};
pub use scope::{Domain, Scope, ScopeKey};
pub use target::{Credential, Target, TargetStatus, TargetView};

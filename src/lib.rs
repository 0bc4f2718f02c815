//! Ledgerbook - change tracking for a multi-tenant bookkeeping service
//!
//! Records every successful create, update and delete of a tenant's business
//! records as an immutable audit entry, and reads that history back with
//! owner scoping, filtering, pagination and statistics.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `audit`: Entry model, capture middleware, entity resolver, background
//!   writer, audit stores and the query service
//! - `api`: Transport-agnostic history endpoints
//! - `storage`: JSON file storage for the tracked business records
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `cli`: Command handlers for the `ledgerbook` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerbook::audit::{AuditPipeline, EntityResolver, JsonlAuditStore};
//! use ledgerbook::config::{LedgerPaths, Settings};
//!
//! let paths = LedgerPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let store = Arc::new(JsonlAuditStore::new(paths.audit_log()));
//! let pipeline = AuditPipeline::start(store, EntityResolver::new(), &settings);
//! ```

pub mod api;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod storage;

pub use error::{LedgerError, LedgerResult};

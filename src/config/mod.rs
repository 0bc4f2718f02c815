//! Configuration module for Ledgerbook
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence
//! - Audit queue, query and logging preferences

pub mod paths;
pub mod settings;

pub use paths::LedgerPaths;
pub use settings::Settings;

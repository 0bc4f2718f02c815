//! Storage layer for Ledgerbook
//!
//! Provides JSON file storage with atomic writes for the business records
//! whose mutations are tracked. Audit entries live in [`crate::audit`].

pub mod documents;
pub mod file_io;

pub use documents::{DocumentFetcher, DocumentStore};
pub use file_io::{read_json, write_json_atomic};

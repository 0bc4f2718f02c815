//! Audit entry storage
//!
//! Append-only persistence for [`AuditEntry`] records. Every read takes the
//! owner as a required argument and applies it before any other filter, so
//! no query shape can reach another tenant's entries.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::entry::{AuditAction, AuditEntry, EntityType, NewAuditEntry};
use crate::error::{LedgerError, LedgerResult};

/// Optional criteria applied after the owner scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub action: Option<AuditAction>,
    pub entity_id: Option<String>,
    /// Case-insensitive substring of `metadata.description`
    pub search: Option<String>,
    /// Inclusive lower bound on `timestamp`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Filter limited to a timestamp range
    pub fn between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    /// Check the non-owner criteria against an entry
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if self.entity_type.is_some_and(|t| t != entry.entity_type) {
            return false;
        }
        if self.action.is_some_and(|a| a != entry.action) {
            return false;
        }
        if let Some(id) = &self.entity_id {
            if &entry.entity_id != id {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !entry.metadata.description.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if self.from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.timestamp > to) {
            return false;
        }
        true
    }
}

/// Scope check shared by all backends: owner first, then the filter
pub(crate) fn owner_scoped<'a>(
    entries: impl Iterator<Item = &'a AuditEntry>,
    owner: &'a str,
    filter: &'a AuditFilter,
) -> impl Iterator<Item = &'a AuditEntry> {
    entries
        .filter(move |e| e.owner == owner)
        .filter(move |e| filter.matches(e))
}

/// Persistence backend for audit entries
///
/// No operation updates or removes an entry once appended.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a new entry, stamping its id and timestamp
    async fn append(&self, entry: NewAuditEntry) -> LedgerResult<AuditEntry>;

    /// Entries of `owner` matching `filter`, in insertion order
    async fn find(&self, owner: &str, filter: &AuditFilter) -> LedgerResult<Vec<AuditEntry>>;

    /// The entry with `id` if it exists and belongs to `owner`
    async fn find_by_id(&self, owner: &str, id: Uuid) -> LedgerResult<Option<AuditEntry>>;

    /// Number of entries of `owner` matching `filter`
    async fn count(&self, owner: &str, filter: &AuditFilter) -> LedgerResult<usize> {
        Ok(self.find(owner, filter).await?.len())
    }
}

/// In-memory audit store
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across all owners
    pub fn len(&self) -> LedgerResult<usize> {
        let entries = self.entries.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> LedgerResult<AuditEntry> {
        let mut entries = self.entries.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let entry = entry.into_entry(Utc::now());
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn find(&self, owner: &str, filter: &AuditFilter) -> LedgerResult<Vec<AuditEntry>> {
        let entries = self.entries.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(owner_scoped(entries.iter(), owner, filter).cloned().collect())
    }

    async fn find_by_id(&self, owner: &str, id: Uuid) -> LedgerResult<Option<AuditEntry>> {
        let entries = self.entries.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries
            .iter()
            .find(|e| e.id == id && e.owner == owner)
            .cloned())
    }

    async fn count(&self, owner: &str, filter: &AuditFilter) -> LedgerResult<usize> {
        let entries = self.entries.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(owner_scoped(entries.iter(), owner, filter).count())
    }
}

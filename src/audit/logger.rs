//! File-backed audit store
//!
//! Writes audit entries to a line-delimited JSON file (JSONL), one complete
//! entry per line, flushed after each write. The file is only ever appended.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::entry::{AuditEntry, NewAuditEntry};
use super::store::{owner_scoped, AuditFilter, AuditStore};
use crate::error::{LedgerError, LedgerResult};

/// Audit store backed by an append-only JSONL file
///
/// All file work for the async trait methods runs on Tokio's blocking pool.
pub struct JsonlAuditStore {
    log: Arc<LogFile>,
}

/// The log file and the lock serializing appends to it
struct LogFile {
    log_path: PathBuf,
    /// Serializes appends so concurrent writers never interleave lines
    write_lock: Mutex<()>,
}

impl JsonlAuditStore {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log: Arc::new(LogFile {
                log_path,
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log.log_path
    }

    /// Check if the audit log file exists
    pub fn exists(&self) -> bool {
        self.log.log_path.exists()
    }

    /// Read every entry in the file, oldest first
    ///
    /// Blocks the calling thread; async callers go through [`AuditStore`].
    pub fn read_all(&self) -> LedgerResult<Vec<AuditEntry>> {
        self.log.read_all()
    }

    async fn read_all_blocking(&self) -> LedgerResult<Vec<AuditEntry>> {
        let log = Arc::clone(&self.log);
        tokio::task::spawn_blocking(move || log.read_all()).await?
    }
}

impl LogFile {
    fn write_line(&self, entry: &AuditEntry) -> LedgerResult<()> {
        let _guard = self.write_lock.lock().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire audit log lock: {}", e))
        })?;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Io(format!("Failed to create audit log directory: {}", e)))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| LedgerError::Io(format!("Failed to open audit log: {}", e)))?;

        let json = serde_json::to_string(entry)
            .map_err(|e| LedgerError::Json(format!("Failed to serialize audit entry: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| LedgerError::Io(format!("Failed to write audit entry: {}", e)))?;

        file.flush()
            .map_err(|e| LedgerError::Io(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    fn read_all(&self) -> LedgerResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| LedgerError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                LedgerError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                LedgerError::Json(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> LedgerResult<AuditEntry> {
        let entry = entry.into_entry(Utc::now());
        let log = Arc::clone(&self.log);
        let entry =
            tokio::task::spawn_blocking(move || log.write_line(&entry).map(|()| entry)).await??;

        debug!(
            id = %entry.id,
            owner = %entry.owner,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "Audit entry appended"
        );

        Ok(entry)
    }

    async fn find(&self, owner: &str, filter: &AuditFilter) -> LedgerResult<Vec<AuditEntry>> {
        let all = self.read_all_blocking().await?;
        Ok(owner_scoped(all.iter(), owner, filter).cloned().collect())
    }

    async fn find_by_id(&self, owner: &str, id: Uuid) -> LedgerResult<Option<AuditEntry>> {
        Ok(self
            .read_all_blocking()
            .await?
            .into_iter()
            .find(|e| e.id == id && e.owner == owner))
    }
}

//! Background persistence of audit entries
//!
//! Entries are handed to a bounded queue drained by a single task that
//! appends them to the [`AuditStore`]. Submission never waits: when the
//! queue is full (or the task has stopped) the newest entry is dropped,
//! logged and counted. Persistence failures are logged and counted, never
//! retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::entry::NewAuditEntry;
use super::store::AuditStore;

enum WriterMessage {
    Persist(NewAuditEntry),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    persisted: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the writer's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterStats {
    /// Entries handed to `submit`
    pub submitted: u64,
    /// Entries the store accepted
    pub persisted: u64,
    /// Entries rejected because the queue was full or closed
    pub dropped: u64,
    /// Entries the store failed to write
    pub failed: u64,
}

/// What happened to a submitted entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    Dropped,
}

/// Handle for submitting entries to the persistence task
#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<WriterMessage>,
    counters: Arc<Counters>,
}

impl AuditWriter {
    /// Start the persistence task on the current Tokio runtime
    ///
    /// The task stops once every `AuditWriter` clone is dropped and the queue
    /// has drained; await the returned handle to wait for that.
    pub fn spawn(store: Arc<dyn AuditStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());

        let handle = tokio::spawn(run_writer(store, rx, Arc::clone(&counters)));
        info!(capacity = capacity.max(1), "Audit writer started");

        (Self { tx, counters }, handle)
    }

    /// Queue an entry for persistence without waiting
    pub fn submit(&self, entry: NewAuditEntry) -> SubmitOutcome {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        match self.tx.try_send(WriterMessage::Persist(entry)) {
            Ok(()) => SubmitOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(WriterMessage::Persist(entry))) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    owner = %entry.owner,
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    "Audit queue full, dropping entry"
                );
                SubmitOutcome::Dropped
            }
            Err(e) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Audit writer unavailable, dropping entry");
                SubmitOutcome::Dropped
            }
        }
    }

    /// Wait until every entry queued before this call has been handled
    ///
    /// Returns `false` if the persistence task is no longer running.
    pub async fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriterMessage::Flush(ack_tx)).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_writer(
    store: Arc<dyn AuditStore>,
    mut rx: mpsc::Receiver<WriterMessage>,
    counters: Arc<Counters>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            WriterMessage::Persist(entry) => {
                let (owner, entity_type, entity_id) =
                    (entry.owner.clone(), entry.entity_type, entry.entity_id.clone());

                match store.append(entry).await {
                    Ok(stored) => {
                        counters.persisted.fetch_add(1, Ordering::Relaxed);
                        debug!(id = %stored.id, action = %stored.action, "Audit entry persisted");
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        error!(
                            owner = %owner,
                            entity_type = %entity_type,
                            entity_id = %entity_id,
                            error = %e,
                            "Failed to persist audit entry"
                        );
                    }
                }
            }
            WriterMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    info!("Audit writer stopped");
}

//! Wiring of the capture and query sides around one audit store

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::capture::CaptureMiddleware;
use super::query::AuditQueryService;
use super::resolver::EntityResolver;
use super::store::AuditStore;
use super::writer::{AuditWriter, WriterStats};
use crate::config::Settings;

/// Running change-tracking subsystem
///
/// Must be started inside a Tokio runtime because it spawns the writer task.
pub struct AuditPipeline {
    capture: CaptureMiddleware,
    query: AuditQueryService,
    writer_task: JoinHandle<()>,
}

impl AuditPipeline {
    pub fn start(store: Arc<dyn AuditStore>, resolver: EntityResolver, settings: &Settings) -> Self {
        let (writer, writer_task) = AuditWriter::spawn(Arc::clone(&store), settings.audit.queue_capacity);
        let capture =
            CaptureMiddleware::new(Arc::new(resolver), writer).with_enabled(settings.audit.enabled);
        let query = AuditQueryService::new(store).with_stats_window(settings.query.stats_window_days);

        info!(enabled = settings.audit.enabled, "Audit pipeline started");

        Self {
            capture,
            query,
            writer_task,
        }
    }

    pub fn capture(&self) -> &CaptureMiddleware {
        &self.capture
    }

    pub fn query(&self) -> &AuditQueryService {
        &self.query
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.capture.writer().stats()
    }

    /// Wait for every entry queued so far to be handled
    pub async fn flush(&self) -> bool {
        self.capture.writer().flush().await
    }

    /// Drain the queue and stop the writer
    ///
    /// Clones of the capture middleware handed out earlier keep the writer
    /// alive; drop them first or this waits for them.
    pub async fn shutdown(self) -> WriterStats {
        let stats_source = self.capture.writer().clone();
        self.flush().await;
        drop(self.capture);

        let stats = stats_source.stats();
        drop(stats_source);
        if let Err(e) = self.writer_task.await {
            warn!(error = %e, "Audit writer task ended abnormally");
        }

        info!(
            persisted = stats.persisted,
            dropped = stats.dropped,
            failed = stats.failed,
            "Audit pipeline stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::capture::{HandlerResult, MutationContext};
    use crate::audit::store::MemoryAuditStore;
    use crate::audit::EntityType;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_capture_and_shutdown() {
        let store = Arc::new(MemoryAuditStore::new());
        let pipeline = AuditPipeline::start(store.clone(), EntityResolver::new(), &Settings::default());

        pipeline
            .capture()
            .run(MutationContext::create("U1", EntityType::Category), |_| async {
                HandlerResult::created(json!({"category": {"id": "K1", "name": "Fuel"}}))
            })
            .await;

        let stats = pipeline.shutdown().await;
        assert_eq!(stats.persisted, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disabled_by_settings() {
        let store = Arc::new(MemoryAuditStore::new());
        let mut settings = Settings::default();
        settings.audit.enabled = false;
        let pipeline = AuditPipeline::start(store.clone(), EntityResolver::new(), &settings);

        pipeline
            .capture()
            .run(MutationContext::create("U1", EntityType::Category), |_| async {
                HandlerResult::created(json!({"id": "K1"}))
            })
            .await;

        assert!(pipeline.flush().await);
        assert!(store.is_empty().unwrap());
        assert_eq!(pipeline.writer_stats().submitted, 0);
    }
}

//! Change capture around mutating requests
//!
//! Each mutating request passes through a short, linear sequence:
//!
//! 1. [`CaptureMiddleware::begin`] fetches the record's current state for
//!    updates and deletes (a missing record is not an error).
//! 2. The business handler runs and produces a [`HandlerResult`].
//! 3. [`PendingCapture::complete`] checks the status against the action's
//!    success code, builds the entry from the handler's result and queues it
//!    for persistence.
//!
//! Nothing here can change the handler's status or body. Every problem ends
//! in a logged [`CaptureSkip`] or a dropped entry, never in an error for the
//! caller. Step 3 does not await, so once the handler has produced its
//! result the capture finishes even if the caller has gone away.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::entry::{AuditAction, Changes, EntityType, EntryMetadata, NewAuditEntry};
use super::extract::{record_id, unwrap_envelope};
use super::resolver::EntityResolver;
use super::writer::{AuditWriter, SubmitOutcome};

/// Why a mutation produced no audit entry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureSkip {
    #[error("{action} {entity_type} answered {actual}, expected {expected}")]
    UnexpectedStatus {
        action: AuditAction,
        entity_type: EntityType,
        expected: u16,
        actual: u16,
    },

    #[error("no identifier found for {action} {entity_type}")]
    MissingIdentifier {
        action: AuditAction,
        entity_type: EntityType,
    },

    #[error("response body for {action} {entity_type} is not a record")]
    UnrecognizedBody {
        action: AuditAction,
        entity_type: EntityType,
    },

    #[error("{action} {entity_type} {entity_id} has neither old nor new state")]
    EmptyChanges {
        action: AuditAction,
        entity_type: EntityType,
        entity_id: String,
    },
}

/// Request-scoped facts the capture stage needs, set up before the handler runs
#[derive(Debug, Clone, PartialEq)]
pub struct MutationContext {
    /// Authenticated tenant, trusted as given
    pub owner: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    /// Identifier from the request path (updates and deletes)
    pub entity_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl MutationContext {
    pub fn create(owner: impl Into<String>, entity_type: EntityType) -> Self {
        Self::new(owner, AuditAction::Create, entity_type, None)
    }

    pub fn update(owner: impl Into<String>, entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::new(owner, AuditAction::Update, entity_type, Some(id.into()))
    }

    pub fn delete(owner: impl Into<String>, entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::new(owner, AuditAction::Delete, entity_type, Some(id.into()))
    }

    fn new(
        owner: impl Into<String>,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: Option<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            action,
            entity_type,
            entity_id,
            user_agent: None,
            ip_address: None,
        }
    }

    /// Attach the caller's user agent and address
    pub fn with_client(mut self, user_agent: Option<String>, ip_address: Option<String>) -> Self {
        self.user_agent = user_agent;
        self.ip_address = ip_address;
        self
    }

    fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            user_agent: self.user_agent.clone(),
            ip_address: self.ip_address.clone(),
            description: String::new(),
        }
    }
}

/// Status code and structured body produced by a business handler
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResult {
    pub status: u16,
    pub body: Value,
}

impl HandlerResult {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn created(body: Value) -> Self {
        Self::new(201, body)
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }
}

/// What the capture stage did with one mutation
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Entry handed to the writer
    Queued,
    /// Entry built but rejected by a full or stopped queue
    Dropped,
    /// No entry built
    Skipped(CaptureSkip),
    /// Capture turned off by configuration
    Disabled,
}

/// Build the entry for a finished mutation
///
/// `original` is the state fetched before the handler ran, if any.
pub fn build_entry(
    ctx: &MutationContext,
    original: Option<Value>,
    result: &HandlerResult,
    envelope_key: &str,
) -> Result<NewAuditEntry, CaptureSkip> {
    let expected = ctx.action.success_status();
    if result.status != expected {
        return Err(CaptureSkip::UnexpectedStatus {
            action: ctx.action,
            entity_type: ctx.entity_type,
            expected,
            actual: result.status,
        });
    }

    let unrecognized = || CaptureSkip::UnrecognizedBody {
        action: ctx.action,
        entity_type: ctx.entity_type,
    };
    let missing_id = || CaptureSkip::MissingIdentifier {
        action: ctx.action,
        entity_type: ctx.entity_type,
    };

    let (entity_id, changes) = match ctx.action {
        AuditAction::Create => {
            let record = unwrap_envelope(&result.body, envelope_key).ok_or_else(unrecognized)?;
            let entity_id = record_id(record).ok_or_else(missing_id)?;
            (
                entity_id,
                Changes {
                    old: None,
                    new: Some(record.clone()),
                },
            )
        }
        AuditAction::Update => {
            let record = unwrap_envelope(&result.body, envelope_key).ok_or_else(unrecognized)?;
            let entity_id = ctx
                .entity_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .or_else(|| record_id(record))
                .ok_or_else(missing_id)?;
            (
                entity_id,
                Changes {
                    old: original,
                    new: Some(record.clone()),
                },
            )
        }
        AuditAction::Delete => {
            let entity_id = ctx.entity_id.clone().ok_or_else(missing_id)?;
            (
                entity_id,
                Changes {
                    old: original,
                    new: None,
                },
            )
        }
    };

    NewAuditEntry::new(
        ctx.owner.clone(),
        ctx.action,
        ctx.entity_type,
        entity_id,
        changes,
        ctx.metadata(),
    )
}

/// Capture stage shared by every mutating route
#[derive(Clone)]
pub struct CaptureMiddleware {
    resolver: Arc<EntityResolver>,
    writer: AuditWriter,
    enabled: bool,
}

impl CaptureMiddleware {
    pub fn new(resolver: Arc<EntityResolver>, writer: AuditWriter) -> Self {
        Self {
            resolver,
            writer,
            enabled: true,
        }
    }

    /// Turn capture on or off; when off, mutations pass through untouched
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn writer(&self) -> &AuditWriter {
        &self.writer
    }

    /// Start capturing a mutation, fetching its prior state when needed
    pub async fn begin(&self, ctx: MutationContext) -> PendingCapture {
        let original = match (&ctx.entity_id, self.enabled && ctx.action.needs_original()) {
            (Some(id), true) => self.resolver.resolve(ctx.entity_type, id, &ctx.owner).await,
            _ => None,
        };

        PendingCapture {
            envelope_key: self.resolver.envelope_key(ctx.entity_type).to_string(),
            writer: self.enabled.then(|| self.writer.clone()),
            ctx,
            original,
        }
    }

    /// Run `handler` with capture around it and return its result unchanged
    pub async fn run<F, Fut>(&self, ctx: MutationContext, handler: F) -> HandlerResult
    where
        F: FnOnce(MutationContext) -> Fut,
        Fut: Future<Output = HandlerResult>,
    {
        let pending = self.begin(ctx).await;
        let result = handler(pending.context().clone()).await;
        pending.complete(&result);
        result
    }
}

/// A mutation whose handler has not produced its result yet
pub struct PendingCapture {
    ctx: MutationContext,
    original: Option<Value>,
    envelope_key: String,
    writer: Option<AuditWriter>,
}

impl PendingCapture {
    pub fn context(&self) -> &MutationContext {
        &self.ctx
    }

    /// State fetched before the handler ran
    pub fn original(&self) -> Option<&Value> {
        self.original.as_ref()
    }

    /// Observe the handler's result and queue the entry on success
    pub fn complete(self, result: &HandlerResult) -> CaptureOutcome {
        let Some(writer) = self.writer else {
            return CaptureOutcome::Disabled;
        };

        let entry = match build_entry(&self.ctx, self.original, result, &self.envelope_key) {
            Ok(entry) => entry,
            Err(skip @ CaptureSkip::UnexpectedStatus { .. }) => {
                debug!(owner = %self.ctx.owner, reason = %skip, "Mutation not recorded");
                return CaptureOutcome::Skipped(skip);
            }
            Err(skip) => {
                warn!(
                    owner = %self.ctx.owner,
                    action = %self.ctx.action,
                    entity_type = %self.ctx.entity_type,
                    reason = %skip,
                    "Skipping audit entry"
                );
                return CaptureOutcome::Skipped(skip);
            }
        };

        match writer.submit(entry) {
            SubmitOutcome::Queued => CaptureOutcome::Queued,
            SubmitOutcome::Dropped => CaptureOutcome::Dropped,
        }
    }
}

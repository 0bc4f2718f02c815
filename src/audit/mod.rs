//! Change tracking for tenant business records
//!
//! Every successful create, update and delete against a tracked record type
//! produces one immutable [`AuditEntry`] holding the before/after snapshots.
//!
//! # Architecture
//!
//! - [`CaptureMiddleware`] wraps a mutation handler. Before the handler runs
//!   it asks the [`EntityResolver`] for the record's current state; after the
//!   handler returns it builds a [`NewAuditEntry`] from the outcome and hands
//!   it to the [`AuditWriter`] without waiting.
//! - [`AuditWriter`] drains a bounded queue into an [`AuditStore`]. A full
//!   queue drops the newest entry; the client response is never affected.
//! - [`AuditQueryService`] reads a tenant's history back: paged listing,
//!   single lookup and aggregate statistics.
//! - [`AuditPipeline`] wires all of the above around one store.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerbook::audit::{AuditPipeline, EntityType, HandlerResult, MutationContext};
//!
//! let pipeline = AuditPipeline::start(store, resolver, &settings);
//!
//! let response = pipeline
//!     .capture()
//!     .run(MutationContext::update("U1", EntityType::Expense, "E1"), |ctx| async move {
//!         // apply the change
//!         HandlerResult::ok(updated_expense)
//!     })
//!     .await;
//! ```

mod capture;
pub mod diff;
mod entry;
pub mod extract;
mod logger;
mod pipeline;
mod query;
mod resolver;
mod store;
mod writer;

pub use capture::{
    build_entry, CaptureMiddleware, CaptureOutcome, CaptureSkip, HandlerResult, MutationContext,
    PendingCapture,
};
pub use diff::{field_changes, summarize, FieldChange};
pub use entry::{
    describe, AuditAction, AuditEntry, Changes, EntityType, EntryMetadata, NewAuditEntry,
};
pub use logger::JsonlAuditStore;
pub use pipeline::AuditPipeline;
pub use query::{
    AuditPage, AuditQueryService, AuditStats, DailyCount, PageRequest, SortOrder,
};
pub use resolver::{EntityFetcher, EntityResolver};
pub use store::{AuditFilter, AuditStore, MemoryAuditStore};
pub use writer::{AuditWriter, SubmitOutcome, WriterStats};

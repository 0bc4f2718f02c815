//! Entity-type registry for pre-mutation lookups
//!
//! Maps each entity-type tag to its envelope key and a tenant-scoped
//! "fetch current state by id" capability. Lookups never fail: unknown
//! tags, missing records and storage errors all come back as `None`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::EntityType;
use crate::error::LedgerResult;
use crate::storage::{DocumentFetcher, DocumentStore};

/// Fetch one record of a single entity type, scoped to its owner
///
/// Implementations must not return records belonging to another owner.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    async fn fetch_by_id(&self, id: &str, owner: &str) -> LedgerResult<Option<Value>>;
}

#[derive(Clone)]
struct Registration {
    envelope_key: String,
    fetcher: Arc<dyn EntityFetcher>,
}

/// Registry of entity types known to the capture stage
#[derive(Clone, Default)]
pub struct EntityResolver {
    registrations: HashMap<EntityType, Registration>,
}

impl EntityResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every built-in entity type against one document store
    pub fn with_documents(store: Arc<DocumentStore>) -> Self {
        let mut resolver = Self::new();
        for entity_type in EntityType::ALL {
            resolver.register(
                entity_type,
                entity_type.default_envelope_key(),
                Arc::new(DocumentFetcher::new(Arc::clone(&store), entity_type)),
            );
        }
        resolver
    }

    /// Register or replace the mapping for one entity type
    pub fn register(
        &mut self,
        entity_type: EntityType,
        envelope_key: impl Into<String>,
        fetcher: Arc<dyn EntityFetcher>,
    ) {
        let envelope_key = envelope_key.into();
        debug!(entity_type = %entity_type, envelope_key = %envelope_key, "Registering entity type");
        self.registrations.insert(
            entity_type,
            Registration {
                envelope_key,
                fetcher,
            },
        );
    }

    pub fn is_registered(&self, entity_type: EntityType) -> bool {
        self.registrations.contains_key(&entity_type)
    }

    /// Envelope key for an entity type, falling back to its default key
    pub fn envelope_key(&self, entity_type: EntityType) -> &str {
        self.registrations
            .get(&entity_type)
            .map(|r| r.envelope_key.as_str())
            .unwrap_or_else(|| entity_type.default_envelope_key())
    }

    /// Current stored state of a record, or `None`
    pub async fn resolve(&self, entity_type: EntityType, id: &str, owner: &str) -> Option<Value> {
        let Some(registration) = self.registrations.get(&entity_type) else {
            debug!(entity_type = %entity_type, "No fetcher registered for entity type");
            return None;
        };

        match registration.fetcher.fetch_by_id(id, owner).await {
            Ok(Some(record)) if belongs_to_other_owner(&record, owner) => {
                warn!(
                    entity_type = %entity_type,
                    entity_id = %id,
                    owner = %owner,
                    "Fetcher returned a record owned by another tenant, ignoring it"
                );
                None
            }
            Ok(found) => {
                if found.is_none() {
                    debug!(entity_type = %entity_type, entity_id = %id, "No prior state found");
                }
                found
            }
            Err(e) => {
                warn!(
                    entity_type = %entity_type,
                    entity_id = %id,
                    owner = %owner,
                    error = %e,
                    "Failed to resolve prior state"
                );
                None
            }
        }
    }

    /// Same as [`resolve`](Self::resolve) for a raw tag; unknown tags resolve to `None`
    pub async fn resolve_tag(&self, tag: &str, id: &str, owner: &str) -> Option<Value> {
        match tag.parse::<EntityType>() {
            Ok(entity_type) => self.resolve(entity_type, id, owner).await,
            Err(_) => {
                debug!(tag = %tag, "Unknown entity type tag");
                None
            }
        }
    }
}

/// A record carrying an explicit, different `owner` field
fn belongs_to_other_owner(record: &Value, owner: &str) -> bool {
    record
        .get("owner")
        .and_then(Value::as_str)
        .is_some_and(|o| o != owner)
}

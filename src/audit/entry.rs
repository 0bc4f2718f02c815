//! Audit entry data structures
//!
//! Defines the action and entity-type tags, the before/after change pair,
//! and the persisted entry itself.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::capture::CaptureSkip;
use crate::error::LedgerError;

/// Mutating operations that are recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub const ALL: [AuditAction; 3] = [AuditAction::Create, AuditAction::Update, AuditAction::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }

    /// Status code a business handler answers with when this action succeeds
    pub fn success_status(&self) -> u16 {
        match self {
            AuditAction::Create => 201,
            AuditAction::Update | AuditAction::Delete => 200,
        }
    }

    /// Whether the pre-mutation state is fetched before the handler runs
    pub fn needs_original(&self) -> bool {
        !matches!(self, AuditAction::Create)
    }

    fn past_tense(&self) -> &'static str {
        match self {
            AuditAction::Create => "Created",
            AuditAction::Update => "Updated",
            AuditAction::Delete => "Deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            _ => Err(LedgerError::Validation(format!(
                "Invalid action: '{}'. Valid actions: CREATE, UPDATE, DELETE",
                s
            ))),
        }
    }
}

/// Business record kinds whose mutations are tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Expense,
    Income,
    CustomerPayment,
    Customer,
    Employee,
    Landlord,
    Project,
    Category,
}

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        EntityType::Expense,
        EntityType::Income,
        EntityType::CustomerPayment,
        EntityType::Customer,
        EntityType::Employee,
        EntityType::Landlord,
        EntityType::Project,
        EntityType::Category,
    ];

    /// Tag used on routes, in queries and in stored entries
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Expense => "expense",
            EntityType::Income => "income",
            EntityType::CustomerPayment => "customer-payment",
            EntityType::Customer => "customer",
            EntityType::Employee => "employee",
            EntityType::Landlord => "landlord",
            EntityType::Project => "project",
            EntityType::Category => "category",
        }
    }

    /// Key a handler nests the record under in an enveloped response body
    pub fn default_envelope_key(&self) -> &'static str {
        match self {
            EntityType::CustomerPayment => "customerPayment",
            other => other.as_str(),
        }
    }

    /// Human-readable name used in entry descriptions
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::CustomerPayment => "customer payment",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| LedgerError::Validation(format!("Unknown entity type: '{}'", s)))
    }
}

/// State of the record before and after the mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    /// Absent for creations
    pub old: Option<Value>,
    /// Absent for deletions
    pub new: Option<Value>,
}

/// Request context stored alongside the change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub description: String,
}

/// An entry built by the capture stage and not yet persisted
///
/// The store assigns `id` and `timestamp` when it appends the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub owner: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub changes: Changes,
    pub metadata: EntryMetadata,
}

impl NewAuditEntry {
    /// Build an entry, enforcing a non-empty identifier and at least one snapshot
    ///
    /// `metadata.description` is always replaced by the fixed template for
    /// the action, entity type and identifier.
    pub fn new(
        owner: impl Into<String>,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        changes: Changes,
        metadata: EntryMetadata,
    ) -> Result<Self, CaptureSkip> {
        let entity_id = entity_id.into();
        if entity_id.trim().is_empty() {
            return Err(CaptureSkip::MissingIdentifier {
                action,
                entity_type,
            });
        }
        if changes.old.is_none() && changes.new.is_none() {
            return Err(CaptureSkip::EmptyChanges {
                action,
                entity_type,
                entity_id,
            });
        }

        let description = describe(action, entity_type, &entity_id);
        Ok(Self {
            owner: owner.into(),
            action,
            entity_type,
            entity_id,
            changes,
            metadata: EntryMetadata {
                description,
                ..metadata
            },
        })
    }

    /// Stamp the entry with its identity and persistence time
    pub fn into_entry(self, timestamp: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            owner: self.owner,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            changes: self.changes,
            metadata: self.metadata,
            timestamp,
        }
    }
}

/// One immutable record of a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub owner: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub changes: Changes,
    pub metadata: EntryMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Fixed description template, e.g. "Updated expense with ID E1"
pub fn describe(action: AuditAction, entity_type: EntityType, entity_id: &str) -> String {
    format!(
        "{} {} with ID {}",
        action.past_tense(),
        entity_type.label(),
        entity_id
    )
}

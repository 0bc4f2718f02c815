//! Owner-scoped document collections for business records
//!
//! Stores each entity type as a JSON collection of free-form records that
//! carry an `id` and an `owner`. Every lookup is scoped by owner. When opened
//! on a data directory, each mutation rewrites the collection file atomically.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::file_io::{read_json, write_json_atomic};
use crate::audit::extract::record_id;
use crate::audit::{EntityFetcher, EntityType};
use crate::config::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};

/// Serializable collection file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CollectionData {
    records: Vec<Value>,
}

/// Document store shared by business handlers and the entity resolver
pub struct DocumentStore {
    paths: Option<LedgerPaths>,
    collections: RwLock<HashMap<EntityType, Vec<Value>>>,
}

impl DocumentStore {
    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            paths: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Open the store on a data directory and load every collection
    pub fn open(paths: LedgerPaths) -> LedgerResult<Self> {
        paths.ensure_directories()?;
        let store = Self {
            paths: Some(paths),
            collections: RwLock::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    /// Reload all collections from disk
    pub fn load(&self) -> LedgerResult<()> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };

        let mut loaded = HashMap::new();
        for entity_type in EntityType::ALL {
            let data: CollectionData = read_json(paths.entity_file(entity_type))?;
            loaded.insert(entity_type, data.records);
        }

        let mut collections = self.collections.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        *collections = loaded;
        Ok(())
    }

    fn save(&self, entity_type: EntityType, records: &[Value]) -> LedgerResult<()> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };
        let data = CollectionData {
            records: records.to_vec(),
        };
        write_json_atomic(paths.entity_file(entity_type), &data)
    }

    /// Get one record by id, only if it belongs to `owner`
    pub fn get(&self, entity_type: EntityType, owner: &str, id: &str) -> LedgerResult<Option<Value>> {
        let collections = self.collections.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(collections
            .get(&entity_type)
            .and_then(|records| records.iter().find(|r| is_match(r, owner, id)))
            .cloned())
    }

    /// All records of one type belonging to `owner`
    pub fn list(&self, entity_type: EntityType, owner: &str) -> LedgerResult<Vec<Value>> {
        let collections = self.collections.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(collections
            .get(&entity_type)
            .map(|records| records.iter().filter(|r| owned_by(r, owner)).cloned().collect())
            .unwrap_or_default())
    }

    /// Insert a new record, assigning an id when it has none
    pub fn insert(&self, entity_type: EntityType, owner: &str, record: Value) -> LedgerResult<Value> {
        let Value::Object(mut fields) = record else {
            return Err(LedgerError::Validation(format!(
                "{} record must be a JSON object",
                entity_type
            )));
        };

        if record_id(&Value::Object(fields.clone())).is_none() {
            fields.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        fields.insert("owner".into(), Value::String(owner.to_string()));
        let record = Value::Object(fields);

        self.modify(entity_type, |records| {
            records.push(record.clone());
            Some(record)
        })
        .map(|inserted| inserted.unwrap_or_default())
    }

    /// Merge `patch` into an existing record; `id` and `owner` cannot change
    pub fn update(
        &self,
        entity_type: EntityType,
        owner: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> LedgerResult<Option<Value>> {
        self.modify(entity_type, |records| {
            let record = records.iter_mut().find(|r| is_match(r, owner, id))?;
            if let Value::Object(fields) = record {
                for (key, value) in patch {
                    if key != "id" && key != "_id" && key != "owner" {
                        fields.insert(key, value);
                    }
                }
            }
            Some(record.clone())
        })
    }

    /// Remove a record, returning it if it existed
    pub fn remove(&self, entity_type: EntityType, owner: &str, id: &str) -> LedgerResult<Option<Value>> {
        self.modify(entity_type, |records| {
            let index = records.iter().position(|r| is_match(r, owner, id))?;
            Some(records.remove(index))
        })
    }

    /// Apply `change` to a copy of one collection and keep it only once saved
    ///
    /// `change` returns `None` when there is nothing to change.
    fn modify<F>(&self, entity_type: EntityType, change: F) -> LedgerResult<Option<Value>>
    where
        F: FnOnce(&mut Vec<Value>) -> Option<Value>,
    {
        let mut collections = self.collections.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let mut records = collections.get(&entity_type).cloned().unwrap_or_default();
        let Some(changed) = change(&mut records) else {
            return Ok(None);
        };
        self.save(entity_type, &records)?;
        collections.insert(entity_type, records);

        Ok(Some(changed))
    }
}

fn owned_by(record: &Value, owner: &str) -> bool {
    record.get("owner").and_then(Value::as_str) == Some(owner)
}

fn is_match(record: &Value, owner: &str, id: &str) -> bool {
    owned_by(record, owner) && record_id(record).as_deref() == Some(id)
}

/// Resolver capability for one entity type backed by a [`DocumentStore`]
pub struct DocumentFetcher {
    store: Arc<DocumentStore>,
    entity_type: EntityType,
}

impl DocumentFetcher {
    pub fn new(store: Arc<DocumentStore>, entity_type: EntityType) -> Self {
        Self { store, entity_type }
    }
}

#[async_trait]
impl EntityFetcher for DocumentFetcher {
    async fn fetch_by_id(&self, id: &str, owner: &str) -> LedgerResult<Option<Value>> {
        let store = Arc::clone(&self.store);
        let entity_type = self.entity_type;
        let (id, owner) = (id.to_string(), owner.to_string());
        tokio::task::spawn_blocking(move || store.get(entity_type, &owner, &id)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_insert_assigns_id_and_owner() {
        let store = DocumentStore::in_memory();
        let record = store
            .insert(EntityType::Expense, "U1", json!({"description": "Cement", "amount": 5000}))
            .unwrap();

        assert!(record_id(&record).is_some());
        assert_eq!(record["owner"], "U1");
    }

    #[test]
    fn test_insert_keeps_existing_id() {
        let store = DocumentStore::in_memory();
        let record = store
            .insert(EntityType::Expense, "U1", json!({"id": "E1", "amount": 5000}))
            .unwrap();
        assert_eq!(record["id"], "E1");
    }

    #[test]
    fn test_insert_rejects_non_objects() {
        let store = DocumentStore::in_memory();
        let err = store.insert(EntityType::Expense, "U1", json!([1, 2])).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_get_is_owner_scoped() {
        let store = DocumentStore::in_memory();
        store.insert(EntityType::Customer, "U1", json!({"id": "C1"})).unwrap();

        assert!(store.get(EntityType::Customer, "U1", "C1").unwrap().is_some());
        assert!(store.get(EntityType::Customer, "U2", "C1").unwrap().is_none());
        assert!(store.get(EntityType::Employee, "U1", "C1").unwrap().is_none());
    }

    #[test]
    fn test_update_merges_and_protects_identity() {
        let store = DocumentStore::in_memory();
        store
            .insert(EntityType::Expense, "U1", json!({"id": "E1", "amount": 5000}))
            .unwrap();

        let patch = json!({"amount": 6000, "owner": "U2", "id": "X"});
        let updated = store
            .update(EntityType::Expense, "U1", "E1", patch.as_object().unwrap().clone())
            .unwrap()
            .unwrap();

        assert_eq!(updated["amount"], 6000);
        assert_eq!(updated["owner"], "U1");
        assert_eq!(updated["id"], "E1");
        assert!(store
            .update(EntityType::Expense, "U2", "E1", Map::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_remove() {
        let store = DocumentStore::in_memory();
        store.insert(EntityType::Project, "U1", json!({"id": "P1"})).unwrap();

        assert!(store.remove(EntityType::Project, "U2", "P1").unwrap().is_none());
        assert!(store.remove(EntityType::Project, "U1", "P1").unwrap().is_some());
        assert!(store.list(EntityType::Project, "U1").unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_open() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());

        {
            let store = DocumentStore::open(paths.clone()).unwrap();
            store
                .insert(EntityType::CustomerPayment, "U1", json!({"id": "P1", "amount": 250}))
                .unwrap();
        }

        assert!(paths.entity_file(EntityType::CustomerPayment).exists());
        let reopened = DocumentStore::open(paths).unwrap();
        let record = reopened.get(EntityType::CustomerPayment, "U1", "P1").unwrap().unwrap();
        assert_eq!(record["amount"], 250);
    }

    #[test]
    fn test_failed_save_leaves_collection_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let store = DocumentStore::open(paths.clone()).unwrap();
        store
            .insert(EntityType::Expense, "U1", json!({"id": "E1", "amount": 5000}))
            .unwrap();

        // A plain file where the data directory should be makes every save fail
        std::fs::remove_dir_all(paths.data_dir()).unwrap();
        std::fs::write(paths.data_dir(), "not a directory").unwrap();

        assert!(store
            .insert(EntityType::Expense, "U1", json!({"id": "E2"}))
            .is_err());
        assert!(store.get(EntityType::Expense, "U1", "E2").unwrap().is_none());

        let patch = json!({"amount": 6000});
        assert!(store
            .update(EntityType::Expense, "U1", "E1", patch.as_object().unwrap().clone())
            .is_err());
        assert!(store.remove(EntityType::Expense, "U1", "E1").is_err());

        let kept = store.get(EntityType::Expense, "U1", "E1").unwrap().unwrap();
        assert_eq!(kept["amount"], 5000);
    }

    #[tokio::test]
    async fn test_fetcher_reads_through_store() {
        let store = Arc::new(DocumentStore::in_memory());
        store.insert(EntityType::Income, "U1", json!({"id": "I1", "amount": 90})).unwrap();

        let fetcher = DocumentFetcher::new(Arc::clone(&store), EntityType::Income);
        assert_eq!(fetcher.fetch_by_id("I1", "U1").await.unwrap().unwrap()["amount"], 90);
        assert!(fetcher.fetch_by_id("I1", "U2").await.unwrap().is_none());
    }
}

// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into MigrationEngine for tests.
// MockSourceReader and MockWarehouse live in their own files; the smaller
// doubles and the aggregate builder live here.

mod source;
mod warehouse;

pub use source::MockSourceReader;
pub use warehouse::MockWarehouse;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parse::models::{ClassSchema, FieldSchema, SchemaUpdate};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collections::CollectionStore;
use crate::engine::{EngineOptions, MigrationEngine};
use crate::entity::EntityType;
use crate::identity::IdentityStore;
use crate::media::MediaStore;
use crate::notify::Notifier;
use crate::run::{MigrationStatus, RunStore};

// =============================================================================
// Mock Identity Map
// =============================================================================

/// In-memory append-only ledger. Rows keep insertion order; lookups take the
/// newest matching row, like the Postgres-backed map.
pub struct MockIdentityMap {
    entries: Arc<Mutex<Vec<(Uuid, EntityType, i64, i64)>>>,
}

impl MockIdentityMap {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seed a mapping, e.g. the organization anchor a run needs up front.
    pub fn with_mapping(self, family: Uuid, entity: EntityType, old_id: i64, new_id: i64) -> Self {
        self.entries
            .lock()
            .unwrap()
            .push((family, entity, old_id, new_id));
        self
    }

    /// Every recorded mapping, oldest first.
    pub fn mappings(&self) -> Vec<(Uuid, EntityType, i64, i64)> {
        self.entries.lock().unwrap().clone()
    }

    /// Newest mapping for the key, without the warehouse existence gate.
    pub fn mapped(&self, family: Uuid, entity: EntityType, old_id: i64) -> Option<i64> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(f, e, old, _)| *f == family && *e == entity && *old == old_id)
            .map(|(_, _, _, new)| *new)
    }

    pub fn mapping_count(&self, entity: EntityType) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _, _)| *e == entity)
            .count()
    }
}

#[async_trait]
impl IdentityStore for MockIdentityMap {
    async fn record(
        &self,
        family: Uuid,
        entity: EntityType,
        old_id: i64,
        new_id: i64,
    ) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .push((family, entity, old_id, new_id));
        Ok(())
    }

    async fn resolve(&self, family: Uuid, entity: EntityType, old_id: i64) -> Result<Option<i64>> {
        Ok(self.mapped(family, entity, old_id))
    }

    async fn clear(&self, family: Uuid) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|(f, entity, _, _)| *f != family || *entity == EntityType::Organization);
        Ok(())
    }
}

impl Default for MockIdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Mock Media Store
// =============================================================================

pub struct MockMediaStore {
    responses: Arc<Mutex<Vec<String>>>,
    imports: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            imports: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Queue an exact re-hosted URL to return for the next import.
    pub fn with_response(self, url: &str) -> Self {
        self.responses.lock().unwrap().push(url.to_string());
        self
    }

    /// Every import fails; callers are expected to keep or drop the original.
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Get all URLs that were imported
    pub fn imports(&self) -> Vec<String> {
        self.imports.lock().unwrap().clone()
    }

    /// Check if a URL was imported
    pub fn was_imported(&self, url: &str) -> bool {
        self.imports.lock().unwrap().iter().any(|u| u == url)
    }

    pub fn import_count(&self) -> usize {
        self.imports.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn import(&self, url: &str) -> Result<String> {
        self.imports.lock().unwrap().push(url.to_string());

        if self.fail {
            bail!("media store unavailable");
        }

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            Ok(responses.remove(0))
        } else {
            let file = url.rsplit('/').next().unwrap_or(url);
            Ok(format!("https://dest-store.s3.amazonaws.com/{file}"))
        }
    }
}

impl Default for MockMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

/// Arguments captured from a collection-imported notification
#[derive(Debug, Clone)]
pub struct NotifyCallArgs {
    pub org: i64,
    pub collection: String,
    pub ok: bool,
    pub detail: String,
}

pub struct MockNotifier {
    calls: Arc<Mutex<Vec<NotifyCallArgs>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn notifications(&self) -> Vec<NotifyCallArgs> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a collection completion was reported
    pub fn was_notified(&self, collection: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|call| call.collection == collection)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn collection_imported(&self, org: i64, collection: &str, ok: bool, detail: &str) {
        self.calls.lock().unwrap().push(NotifyCallArgs {
            org,
            collection: collection.to_string(),
            ok,
            detail: detail.to_string(),
        });
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Mock Collection Store
// =============================================================================

/// Canned Parse-style store: schemas and objects keyed by class name, plus
/// capture of every purge, schema write and batch insert.
pub struct MockCollectionStore {
    schemas: Arc<Mutex<HashMap<String, ClassSchema>>>,
    objects: Arc<Mutex<HashMap<String, Vec<Map<String, Value>>>>>,
    purged: Arc<Mutex<Vec<String>>>,
    created_schemas: Arc<Mutex<Vec<SchemaUpdate>>>,
    schema_updates: Arc<Mutex<Vec<SchemaUpdate>>>,
    inserted: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl MockCollectionStore {
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(Mutex::new(HashMap::new())),
            objects: Arc::new(Mutex::new(HashMap::new())),
            purged: Arc::new(Mutex::new(Vec::new())),
            created_schemas: Arc::new(Mutex::new(Vec::new())),
            schema_updates: Arc::new(Mutex::new(Vec::new())),
            inserted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Declare a class from (field name, Parse type) pairs.
    pub fn with_class(self, class: &str, fields: &[(&str, &str)]) -> Self {
        let mut declared = BTreeMap::new();
        for (name, field_type) in fields {
            declared.insert(
                (*name).to_string(),
                FieldSchema {
                    field_type: (*field_type).to_string(),
                    target_class: None,
                    required: None,
                    default_value: None,
                },
            );
        }
        self.schemas.lock().unwrap().insert(
            class.to_string(),
            ClassSchema {
                class_name: class.to_string(),
                fields: declared,
                indexes: None,
            },
        );
        self
    }

    /// Add a full schema as the server would return it.
    pub fn with_schema(self, schema: ClassSchema) -> Self {
        self.schemas
            .lock()
            .unwrap()
            .insert(schema.class_name.clone(), schema);
        self
    }

    pub fn with_rows(self, class: &str, rows: Vec<Map<String, Value>>) -> Self {
        self.objects.lock().unwrap().insert(class.to_string(), rows);
        self
    }

    pub fn purged(&self) -> Vec<String> {
        self.purged.lock().unwrap().clone()
    }

    /// Check if a class was purged
    pub fn was_purged(&self, class: &str) -> bool {
        self.purged.lock().unwrap().iter().any(|c| c == class)
    }

    pub fn created_schemas(&self) -> Vec<SchemaUpdate> {
        self.created_schemas.lock().unwrap().clone()
    }

    pub fn schema_updates(&self) -> Vec<SchemaUpdate> {
        self.schema_updates.lock().unwrap().clone()
    }

    /// Every batch handed to `insert_rows`, in order.
    pub fn insert_batches(&self) -> Vec<(String, Vec<Value>)> {
        self.inserted.lock().unwrap().clone()
    }

    /// All objects inserted into a class, flattened across batches.
    pub fn inserted_rows(&self, class: &str) -> Vec<Value> {
        self.inserted
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == class)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }
}

#[async_trait]
impl CollectionStore for MockCollectionStore {
    async fn schema(&self, class: &str) -> Result<Option<ClassSchema>> {
        Ok(self.schemas.lock().unwrap().get(class).cloned())
    }

    async fn count(&self, class: &str) -> Result<i64> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(class)
            .map_or(0, |rows| rows.len() as i64))
    }

    async fn rows(&self, class: &str, limit: i64, skip: i64) -> Result<Vec<Map<String, Value>>> {
        let rows = self
            .objects
            .lock()
            .unwrap()
            .get(class)
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn purge(&self, class: &str) -> Result<bool> {
        self.purged.lock().unwrap().push(class.to_string());
        let known = self.schemas.lock().unwrap().contains_key(class);
        self.objects.lock().unwrap().remove(class);
        Ok(known)
    }

    async fn create_schema(&self, update: &SchemaUpdate) -> Result<()> {
        self.created_schemas.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn update_schema(&self, update: &SchemaUpdate) -> Result<()> {
        self.schema_updates.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn insert_rows(&self, class: &str, rows: Vec<Value>) -> Result<()> {
        // Inserted objects land in the object map so counts see them.
        {
            let mut objects = self.objects.lock().unwrap();
            let entry = objects.entry(class.to_string()).or_default();
            for row in &rows {
                if let Value::Object(map) = row {
                    entry.push(map.clone());
                }
            }
        }
        self.inserted.lock().unwrap().push((class.to_string(), rows));
        Ok(())
    }
}

impl Default for MockCollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Mock Run Store
// =============================================================================

pub struct MockRunStore {
    transitions: Arc<Mutex<Vec<(Uuid, MigrationStatus)>>>,
}

impl MockRunStore {
    pub fn new() -> Self {
        Self {
            transitions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn transitions(&self) -> Vec<(Uuid, MigrationStatus)> {
        self.transitions.lock().unwrap().clone()
    }

    /// Status history of one run, oldest first.
    pub fn statuses(&self, run: Uuid) -> Vec<MigrationStatus> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == run)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn last_status(&self, run: Uuid) -> Option<MigrationStatus> {
        self.statuses(run).last().copied()
    }
}

#[async_trait]
impl RunStore for MockRunStore {
    async fn mark(&self, run_id: Uuid, status: MigrationStatus) -> Result<()> {
        self.transitions.lock().unwrap().push((run_id, status));
        Ok(())
    }
}

impl Default for MockRunStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub source: Arc<MockSourceReader>,
    pub identity: Arc<MockIdentityMap>,
    pub warehouse: Arc<MockWarehouse>,
    pub media: Arc<MockMediaStore>,
    pub notifier: Arc<MockNotifier>,
    pub runs: Arc<MockRunStore>,
    pub source_collections: Option<Arc<MockCollectionStore>>,
    pub dest_collections: Option<Arc<MockCollectionStore>>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            source: Arc::new(MockSourceReader::new()),
            identity: Arc::new(MockIdentityMap::new()),
            warehouse: Arc::new(MockWarehouse::new()),
            media: Arc::new(MockMediaStore::new()),
            notifier: Arc::new(MockNotifier::new()),
            runs: Arc::new(MockRunStore::new()),
            source_collections: None,
            dest_collections: None,
        }
    }

    /// Set a mock source reader
    pub fn mock_source(mut self, source: MockSourceReader) -> Self {
        self.source = Arc::new(source);
        self
    }

    /// Set a mock identity map
    pub fn mock_identity(mut self, identity: MockIdentityMap) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    /// Set a mock warehouse
    pub fn mock_warehouse(mut self, warehouse: MockWarehouse) -> Self {
        self.warehouse = Arc::new(warehouse);
        self
    }

    /// Set a mock media store
    pub fn mock_media(mut self, media: MockMediaStore) -> Self {
        self.media = Arc::new(media);
        self
    }

    /// Set a mock notifier
    pub fn mock_notifier(mut self, notifier: MockNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Set a mock run store
    pub fn mock_runs(mut self, runs: MockRunStore) -> Self {
        self.runs = Arc::new(runs);
        self
    }

    /// Set the source and destination collection stores
    pub fn mock_collections(mut self, source: MockCollectionStore, dest: MockCollectionStore) -> Self {
        self.source_collections = Some(Arc::new(source));
        self.dest_collections = Some(Arc::new(dest));
        self
    }

    /// Convert into a MigrationEngine for testing
    pub fn into_engine(self, options: EngineOptions) -> MigrationEngine {
        let engine = MigrationEngine::new(
            self.source,
            self.identity,
            self.warehouse,
            self.media,
            self.notifier,
            self.runs,
            options,
        );
        match (self.source_collections, self.dest_collections) {
            (Some(source), Some(dest)) => engine.with_collection_stores(source, dest),
            _ => engine,
        }
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

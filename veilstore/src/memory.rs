//! In-memory reference store.
//!
//! [`MemoryStore`] implements the [`Store`] collaborator the way a versioned
//! record store behaves: schemas are declared per version before opening,
//! registered schema extensions run on every declaration, ready handlers run
//! on open, and caller CRUD goes through installed table hooks. Volatile;
//! intended for tests and examples.

use crate::error::{Error, StoreError};
use crate::record::Record;
use crate::schema::{SchemaExtension, StoreSpec, TableSchema};
use crate::store::{ReadyHandler, Store, TableHooks};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Default)]
struct Table {
    schema: Option<TableSchema>,
    rows: Vec<(Value, Record)>,
    next_key: u64,
}

#[derive(Default)]
struct State {
    open: bool,
    versions: BTreeMap<u32, StoreSpec>,
    extensions: Vec<Arc<dyn SchemaExtension>>,
    tables: BTreeMap<String, Table>,
    hooks: HashMap<String, Arc<dyn TableHooks>>,
    ready_handlers: Vec<Arc<dyn ReadyHandler>>,
}

impl State {
    fn declare(&mut self, version: u32, mut spec: StoreSpec) -> Result<(), StoreError> {
        if self.open {
            return Err(StoreError::Schema(format!(
                "cannot declare version {version} while the store is open"
            )));
        }
        if version == 0 {
            return Err(StoreError::Schema("schema versions start at 1".into()));
        }

        for extension in &self.extensions {
            extension.extend(&mut spec);
        }
        for (name, table_spec) in &spec {
            TableSchema::parse(name.as_str(), table_spec)?;
        }
        self.versions.entry(version).or_default().extend(spec);
        Ok(())
    }

    fn commit_schema(&mut self) -> Result<(), StoreError> {
        let mut merged = StoreSpec::new();
        for spec in self.versions.values() {
            merged.extend(spec.iter().map(|(name, spec)| (name.clone(), spec.clone())));
        }

        for (name, spec) in merged {
            let schema = TableSchema::parse(name.as_str(), &spec)?;
            self.tables.entry(name).or_default().schema = Some(schema);
        }
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&Table, StoreError> {
        if !self.open {
            return Err(StoreError::NotOpen);
        }
        self.tables
            .get(name)
            .filter(|table| table.schema.is_some())
            .ok_or_else(|| StoreError::NotFound(format!("table {name}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, StoreError> {
        self.table(name)?;
        self.tables.get_mut(name).ok_or_else(|| StoreError::NotFound(format!("table {name}")))
    }

    fn schema(&self, name: &str) -> Result<TableSchema, StoreError> {
        self.table(name)?
            .schema
            .clone()
            .ok_or_else(|| StoreError::NotFound(format!("table {name}")))
    }
}

impl Table {
    /// Resolves the key of a record about to be written, generating one for
    /// auto-increment tables.
    fn assign_key(&mut self, record: &mut Record) -> Result<Value, StoreError> {
        let (key_field, auto_increment, table) = match &self.schema {
            Some(schema) => (
                schema.primary_key().name().to_string(),
                schema.primary_key().auto_increment(),
                schema.name().to_string(),
            ),
            None => return Err(StoreError::NotFound("table schema".into())),
        };

        if let Some(key) = record.get(&key_field).filter(|key| !key.is_null()) {
            if let Some(explicit) = key.as_u64() {
                self.next_key = self.next_key.max(explicit);
            }
            return Ok(key.clone());
        }
        if !auto_increment {
            return Err(StoreError::Constraint(format!("record for {table} has no primary key")));
        }

        self.next_key = self
            .next_key
            .checked_add(1)
            .ok_or_else(|| StoreError::Constraint(format!("key space exhausted in {table}")))?;
        let key = Value::from(self.next_key);
        if !key_field.is_empty() {
            record.insert(key_field, key.clone());
        }
        Ok(key)
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.rows.iter().position(|(row_key, _)| row_key == key)
    }
}

/// Volatile, versioned record store.
///
/// # Example
///
/// ```
/// use veilstore::memory::MemoryStore;
/// use veilstore::store::Store;
///
/// let store = MemoryStore::new();
/// store.declare(1, &[("users", "++id, email")]).unwrap();
/// assert_eq!(store.version(), 1);
/// ```
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty, closed store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declares (or extends) the table specs of a schema version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Schema` if the store is open, the version is 0 or
    /// a spec does not parse.
    pub fn declare(&self, version: u32, stores: &[(&str, &str)]) -> Result<(), StoreError> {
        let spec = stores.iter().map(|(name, spec)| ((*name).to_string(), (*spec).to_string()));
        self.state().declare(version, spec.collect())
    }

    /// Returns `true` while the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().open
    }

    /// Opens the store and runs every ready handler in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first ready-handler error (the store is closed again), or
    /// `Error::Store` if the declared schema does not parse.
    pub async fn open(&self) -> Result<(), Error> {
        let handlers = {
            let mut state = self.state();
            if state.open {
                return Ok(());
            }
            state.commit_schema()?;
            state.open = true;
            state.hooks.clear();
            state.ready_handlers.clone()
        };
        debug!(handlers = handlers.len(), "store opened");

        for handler in handlers {
            if let Err(err) = handler.on_ready(self).await {
                self.close();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns a fresh closed store over a copy of this store's records, the
    /// way a new process opening the same persisted data would see it.
    ///
    /// Schema declarations, extensions, hooks and ready handlers are not
    /// carried over; tables become visible again once redeclared.
    #[must_use]
    pub fn reload(&self) -> Self {
        let state = self.state();
        let tables = state
            .tables
            .iter()
            .map(|(name, table)| {
                let copy = Table { schema: None, rows: table.rows.clone(), next_key: table.next_key };
                (name.clone(), copy)
            })
            .collect();
        Self { state: Mutex::new(State { tables, ..State::default() }) }
    }

    /// Closes the store, detaching every table hook.
    pub fn close(&self) {
        let mut state = self.state();
        state.open = false;
        state.hooks.clear();
    }

    /// Creates a record, running the table's creating hook.
    ///
    /// Returns the primary key of the new record.
    ///
    /// # Errors
    ///
    /// Hook errors are returned unchanged. Store errors: `NotOpen`,
    /// `NotFound` for unknown tables, `Constraint` for missing or duplicate
    /// keys.
    pub async fn add(&self, table: &str, mut record: Record) -> Result<Value, Error> {
        let (key, hooks) = {
            let mut state = self.state();
            let hooks = state.hooks.get(table).cloned();
            let entry = state.table_mut(table)?;
            let key = entry.assign_key(&mut record)?;
            if entry.position(&key).is_some() {
                return Err(StoreError::Constraint(format!("duplicate key {key} in {table}")).into());
            }
            (key, hooks)
        };

        if let Some(hooks) = hooks {
            hooks.creating(&mut record)?;
        }
        record.compact();

        let mut state = self.state();
        let entry = state.table_mut(table)?;
        if entry.position(&key).is_some() {
            return Err(StoreError::Constraint(format!("duplicate key {key} in {table}")).into());
        }
        entry.rows.push((key.clone(), record));
        Ok(key)
    }

    /// Reads a record by key, running the table's reading hook.
    ///
    /// # Errors
    ///
    /// Hook errors are returned unchanged; `NotOpen`/`NotFound` for the table.
    pub async fn get(&self, table: &str, key: &Value) -> Result<Option<Record>, Error> {
        let (stored, hooks) = {
            let state = self.state();
            let entry = state.table(table)?;
            let stored = entry.position(key).map(|i| entry.rows[i].1.clone());
            (stored, state.hooks.get(table).cloned())
        };

        match (stored, hooks) {
            (Some(record), Some(hooks)) => Ok(Some(hooks.reading(record)?)),
            (stored, _) => Ok(stored),
        }
    }

    /// Reads every record of a table in insertion order, through the reading hook.
    ///
    /// # Errors
    ///
    /// Hook errors are returned unchanged; `NotOpen`/`NotFound` for the table.
    pub async fn all(&self, table: &str) -> Result<Vec<Record>, Error> {
        let (rows, hooks) = {
            let state = self.state();
            let rows: Vec<Record> =
                state.table(table)?.rows.iter().map(|(_, record)| record.clone()).collect();
            (rows, state.hooks.get(table).cloned())
        };

        match hooks {
            Some(hooks) => rows.into_iter().map(|record| hooks.reading(record)).collect(),
            None => Ok(rows),
        }
    }

    /// Applies a partial modification to a record, running the updating hook.
    ///
    /// The hook runs with the store locked, so concurrent updates of one
    /// record are applied one after the other.
    ///
    /// Returns `false` if no record has the given key.
    ///
    /// # Errors
    ///
    /// Hook errors are returned unchanged. `Constraint` if the instruction
    /// tries to change the primary key.
    pub async fn update(&self, table: &str, key: &Value, modifications: Record) -> Result<bool, Error> {
        let mut state = self.state();
        let schema = state.schema(table)?;
        let hooks = state.hooks.get(table).cloned();
        let entry = state.table_mut(table)?;
        let Some(index) = entry.position(key) else {
            return Ok(false);
        };

        let instruction = match hooks {
            Some(hooks) => {
                hooks.updating(&modifications, &entry.rows[index].1)?.unwrap_or(modifications)
            }
            None => modifications,
        };

        let key_field = schema.primary_key().name();
        if !key_field.is_empty() && instruction.get(key_field).is_some_and(|new| new != key) {
            return Err(StoreError::Constraint(format!("cannot change primary key of {table}")).into());
        }

        entry.rows[index].1.apply(&instruction);
        Ok(true)
    }

    /// Returns the stored representation of a record, bypassing hooks.
    ///
    /// # Errors
    ///
    /// `NotOpen`/`NotFound` for the table.
    pub fn raw(&self, table: &str, key: &Value) -> Result<Option<Record>, StoreError> {
        let state = self.state();
        let entry = state.table(table)?;
        Ok(entry.position(key).map(|i| entry.rows[i].1.clone()))
    }

    /// Number of records in a table.
    ///
    /// # Errors
    ///
    /// `NotOpen`/`NotFound` for the table.
    pub fn count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(self.state().table(table)?.rows.len())
    }

    /// Returns `true` if hooks are attached to `table`.
    #[must_use]
    pub fn has_hooks(&self, table: &str) -> bool {
        self.state().hooks.contains_key(table)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn version(&self) -> u32 {
        self.state().versions.keys().next_back().copied().unwrap_or(0)
    }

    fn extend_schema(&self, extension: Arc<dyn SchemaExtension>) {
        self.state().extensions.push(extension);
    }

    fn touch_schema(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        match state.versions.keys().next_back().copied() {
            Some(version) => state.declare(version, StoreSpec::new()),
            None => Ok(()),
        }
    }

    fn tables(&self) -> Vec<TableSchema> {
        self.state().tables.values().filter_map(|table| table.schema.clone()).collect()
    }

    fn table(&self, name: &str) -> Result<TableSchema, StoreError> {
        self.state().schema(name)
    }

    fn install_hooks(&self, table: &str, hooks: Arc<dyn TableHooks>) -> Result<(), StoreError> {
        let mut state = self.state();
        state.table(table)?;
        state.hooks.insert(table.to_string(), hooks);
        Ok(())
    }

    fn on_ready(&self, handler: Arc<dyn ReadyHandler>) {
        self.state().ready_handlers.push(handler);
    }

    async fn last(&self, table: &str) -> Result<Option<Record>, StoreError> {
        let state = self.state();
        Ok(state.table(table)?.rows.last().map(|(_, record)| record.clone()))
    }

    async fn clear(&self, table: &str) -> Result<(), StoreError> {
        self.state().table_mut(table)?.rows.clear();
        Ok(())
    }

    async fn put(&self, table: &str, mut record: Record) -> Result<(), StoreError> {
        let mut state = self.state();
        let entry = state.table_mut(table)?;
        let key = entry.assign_key(&mut record)?;
        record.compact();
        match entry.position(&key) {
            Some(index) => entry.rows[index].1 = record,
            None => entry.rows.push((key, record)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::hooks::EncryptionHooks;
    use crate::provider::EncryptionProvider;
    use crate::test_support::{record, SealingProvider};
    use serde_json::{json, Map};
    use std::time::Duration;

    struct Upper;

    impl TableHooks for Upper {
        fn creating(&self, record: &mut Record) -> Result<(), Error> {
            if let Some(name) = record.get("name").and_then(Value::as_str).map(str::to_uppercase) {
                record.insert("name", name);
            }
            Ok(())
        }

        fn updating(&self, _: &Record, _: &Record) -> Result<Option<Record>, Error> {
            Ok(None)
        }

        fn reading(&self, mut record: Record) -> Result<Record, Error> {
            record.insert("read", true);
            Ok(record)
        }
    }

    async fn opened(specs: &[(&str, &str)]) -> MemoryStore {
        let store = MemoryStore::new();
        store.declare(1, specs).unwrap();
        store.open().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_auto_increment_keys() {
        let store = opened(&[("users", "++id")]).await;

        let first = store.add("users", record(json!({"name": "a"}))).await.unwrap();
        let second = store.add("users", record(json!({"name": "b"}))).await.unwrap();

        assert_eq!(first, json!(1));
        assert_eq!(second, json!(2));
        assert_eq!(store.raw("users", &second).unwrap().unwrap().get("id"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_keys_rejected() {
        let store = opened(&[("notes", "uuid")]).await;

        let err = store.add("notes", record(json!({"body": "x"}))).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Constraint(_))));

        store.add("notes", record(json!({"uuid": "n1"}))).await.unwrap();
        let err = store.add("notes", record(json!({"uuid": "n1"}))).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_hooks_run_on_caller_crud() {
        let store = opened(&[("users", "++id")]).await;
        store.install_hooks("users", Arc::new(Upper)).unwrap();

        let key = store.add("users", record(json!({"name": "ada"}))).await.unwrap();

        assert_eq!(store.raw("users", &key).unwrap().unwrap().get("name"), Some(&json!("ADA")));
        let read = store.get("users", &key).await.unwrap().unwrap();
        assert_eq!(read.get("read"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_update_applies_absent_as_delete() {
        let store = opened(&[("users", "++id")]).await;
        let key = store.add("users", record(json!({"a": 1, "b": 2}))).await.unwrap();

        let mut modifications = record(json!({"b": 3}));
        modifications.mark_absent("a");
        assert!(store.update("users", &key, modifications).await.unwrap());

        let stored = store.raw("users", &key).unwrap().unwrap();
        assert_eq!(Value::Object(stored.to_object()), json!({"id": 1, "b": 3}));
        assert!(!store.update("users", &json!(42), Record::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_increment_reports_exhausted_key_space() {
        let store = opened(&[("t", "++id")]).await;
        store.add("t", record(json!({"id": u64::MAX}))).await.unwrap();

        let err = store.add("t", record(json!({"x": 1}))).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Constraint(ref msg)) if msg.contains("exhausted")));
        assert_eq!(store.count("t").unwrap(), 1);
    }

    // Sealing provider that lingers in `encrypt`, widening the window in which
    // two updates of the same record could interleave.
    struct SlowSealing(SealingProvider);

    impl EncryptionProvider for SlowSealing {
        fn encrypt(&self, payload: &Map<String, Value>) -> Result<Value, ProviderError> {
            std::thread::sleep(Duration::from_millis(50));
            self.0.encrypt(payload)
        }

        fn decrypt(&self, blob: &Value) -> Result<Map<String, Value>, ProviderError> {
            self.0.decrypt(blob)
        }
    }

    #[test]
    fn test_concurrent_updates_of_one_record_are_not_lost() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store = runtime.block_on(opened(&[("items", "++id")]));
        let schema = store.table("items").unwrap();
        let provider = Arc::new(SlowSealing(SealingProvider::default()));
        store.install_hooks("items", Arc::new(EncryptionHooks::new(schema, provider))).unwrap();
        let key = runtime.block_on(store.add("items", record(json!({"a": 1, "b": 2})))).unwrap();

        std::thread::scope(|scope| {
            for modification in [json!({"a": 10}), json!({"b": 20})] {
                let (store, key) = (&store, &key);
                scope.spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                    runtime.block_on(store.update("items", key, record(modification))).unwrap()
                });
            }
        });

        let read = runtime.block_on(store.get("items", &key)).unwrap().unwrap();
        assert_eq!(Value::Object(read.to_object()), json!({"id": 1, "a": 10, "b": 20}));
    }

    #[tokio::test]
    async fn test_update_cannot_change_primary_key() {
        let store = opened(&[("users", "++id")]).await;
        let key = store.add("users", record(json!({"a": 1}))).await.unwrap();

        let err = store.update("users", &key, record(json!({"id": 7}))).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_declare_rejected_once_open() {
        let store = opened(&[("users", "++id")]).await;

        assert!(matches!(store.declare(2, &[("posts", "++id")]), Err(StoreError::Schema(_))));
        assert!(store.touch_schema().is_err());
    }

    #[tokio::test]
    async fn test_extensions_apply_on_later_declarations() {
        struct AddAudit;
        impl SchemaExtension for AddAudit {
            fn extend(&self, stores: &mut StoreSpec) {
                stores.entry("audit".into()).or_insert_with(|| "++id".into());
            }
        }

        let store = MemoryStore::new();
        store.declare(1, &[("users", "++id")]).unwrap();
        store.extend_schema(Arc::new(AddAudit));
        store.touch_schema().unwrap();
        store.open().await.unwrap();

        let names: Vec<_> = store.tables().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["audit", "users"]);
    }

    #[tokio::test]
    async fn test_unknown_table_and_closed_store() {
        let store = opened(&[("users", "++id")]).await;
        assert!(matches!(store.table("missing"), Err(StoreError::NotFound(_))));

        store.close();
        assert!(matches!(store.count("users"), Err(StoreError::NotOpen)));
        assert!(!store.has_hooks("users"));
    }

    #[tokio::test]
    async fn test_reload_keeps_rows_but_not_declarations() {
        let store = opened(&[("users", "++id")]).await;
        store.add("users", record(json!({"a": 1}))).await.unwrap();

        let reloaded = store.reload();
        assert_eq!(reloaded.version(), 0);
        assert!(!reloaded.is_open());

        reloaded.declare(1, &[("users", "++id")]).unwrap();
        reloaded.open().await.unwrap();
        assert_eq!(reloaded.count("users").unwrap(), 1);
        let key = reloaded.add("users", record(json!({"a": 2}))).await.unwrap();
        assert_eq!(key, json!(2));
    }

    #[tokio::test]
    async fn test_put_last_and_clear() {
        let store = opened(&[("settings", "++id")]).await;

        store.put("settings", record(json!({"v": 1}))).await.unwrap();
        store.put("settings", record(json!({"v": 2}))).await.unwrap();
        assert_eq!(store.last("settings").await.unwrap().unwrap().get("v"), Some(&json!(2)));

        store.clear("settings").await.unwrap();
        assert_eq!(store.last("settings").await.unwrap(), None);
    }
}

//! Adapter over the SQLite authoritative store.
//!
//! SQLite calls are synchronous, so every store operation runs on the
//! blocking pool.

use crate::adapter::{Adapter, Creatable, Deletable, Updatable};
use crate::error::{ApplyError, ApplyResult, LoadError, PermanentKind, SyncError, SyncResult};
use async_trait::async_trait;
use ssot_model::{Attributes, Handle, IdentityKey, Record, RecordType, Registry, Snapshot};
use ssot_storage::{LocalStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// CRUD access to one bound table.
struct LocalTable {
    store: LocalStore,
    record_type: Arc<RecordType>,
}

pub struct LocalAdapter {
    name: String,
    registry: Registry,
    store: LocalStore,
    tables: HashMap<String, LocalTable>,
}

impl LocalAdapter {
    /// Every registered type must have a table binding that covers all its fields.
    pub fn new(
        name: impl Into<String>,
        registry: Registry,
        store: LocalStore,
    ) -> SyncResult<Self> {
        let mut tables = HashMap::new();
        for record_type in registry.iter() {
            let binding = store
                .binding(record_type.name())
                .map_err(|e| SyncError::Config(e.to_string()))?;
            if let Some(field) = record_type
                .fields()
                .find(|f| binding.column_for(f.name()).is_none())
            {
                return Err(SyncError::Config(format!(
                    "table `{}` has no column for `{}.{}`",
                    binding.table(),
                    record_type.name(),
                    field.name()
                )));
            }
            tables.insert(
                record_type.name().to_string(),
                LocalTable {
                    store: store.clone(),
                    record_type: Arc::clone(record_type),
                },
            );
        }
        Ok(Self {
            name: name.into(),
            registry,
            store,
            tables,
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn load(&self) -> Result<Snapshot, LoadError> {
        let mut snapshot = Snapshot::new(&self.name);
        for record_type in self.registry.iter() {
            let store = self.store.clone();
            let name = record_type.name().to_string();
            let rows = tokio::task::spawn_blocking(move || store.fetch(&name))
                .await
                .map_err(|e| LoadError::Task(e.to_string()))??;

            let count = rows.len();
            for row in rows {
                let record = Record::from_raw(record_type, &row.raw)?;
                snapshot.add(record, Some(Handle::from(row.key)))?;
            }
            debug!(adapter = %self.name, record_type = record_type.name(), count, "loaded table");
        }
        info!(adapter = %self.name, records = snapshot.total_len(), "local snapshot loaded");
        Ok(snapshot)
    }

    fn creatable(&self, record_type: &str) -> Option<&dyn Creatable> {
        self.tables.get(record_type).map(|t| t as &dyn Creatable)
    }

    fn updatable(&self, record_type: &str) -> Option<&dyn Updatable> {
        self.tables.get(record_type).map(|t| t as &dyn Updatable)
    }

    fn deletable(&self, record_type: &str) -> Option<&dyn Deletable> {
        self.tables.get(record_type).map(|t| t as &dyn Deletable)
    }
}

impl LocalTable {
    async fn run<T, F>(&self, op: F) -> ApplyResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalStore, &str) -> Result<T, StorageError> + Send + 'static,
    {
        let store = self.store.clone();
        let name = self.record_type.name().to_string();
        let result = tokio::task::spawn_blocking(move || op(&store, &name))
            .await
            .map_err(|e| {
                ApplyError::permanent(PermanentKind::Other, format!("store task failed: {e}"))
            })?;
        result.map_err(ApplyError::from)
    }
}

fn row_key(handle: &Handle) -> ApplyResult<i64> {
    handle.as_str().parse().map_err(|_| {
        ApplyError::permanent(
            PermanentKind::MissingHandle,
            format!("`{handle}` is not a local row key"),
        )
    })
}

#[async_trait]
impl Creatable for LocalTable {
    async fn create(&self, identity: &IdentityKey, attributes: &Attributes) -> ApplyResult<Handle> {
        let mut values = attributes.clone();
        for (field, value) in identity.fields() {
            values.insert(field.to_string(), value.clone());
        }
        let key = self.run(move |store, name| store.insert(name, &values)).await?;
        Ok(Handle::from(key))
    }
}

#[async_trait]
impl Updatable for LocalTable {
    async fn update(&self, handle: &Handle, changed: &Attributes) -> ApplyResult<()> {
        let key = row_key(handle)?;
        let changed = changed.clone();
        self.run(move |store, name| store.update(name, key, &changed)).await
    }
}

#[async_trait]
impl Deletable for LocalTable {
    async fn delete(&self, handle: &Handle) -> ApplyResult<()> {
        let key = row_key(handle)?;
        self.run(move |store, name| store.delete(name, key)).await
    }
}

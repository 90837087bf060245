use super::client::RemoteClient;
use super::collection::{CollectionSpec, RemoteCollection};
use crate::adapter::{Adapter, Creatable, Deletable, Updatable};
use crate::error::{LoadError, SyncError, SyncResult};
use async_trait::async_trait;
use ssot_model::{Registry, Snapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Adapter over a remote REST API, one collection per record type.
pub struct RemoteAdapter {
    name: String,
    registry: Registry,
    collections: HashMap<String, RemoteCollection>,
}

impl RemoteAdapter {
    /// Every registered type needs exactly one collection spec.
    pub fn new(
        name: impl Into<String>,
        registry: Registry,
        client: Arc<RemoteClient>,
        specs: Vec<CollectionSpec>,
    ) -> SyncResult<Self> {
        let mut collections = HashMap::new();
        for spec in specs {
            let record_type = registry.require(&spec.record_type)?;
            if !spec.path.starts_with('/') || !spec.path.ends_with('/') {
                return Err(SyncError::Config(format!(
                    "collection path for `{}` must start and end with `/`, got `{}`",
                    spec.record_type, spec.path
                )));
            }
            if let Some(field) = spec
                .wire_names
                .keys()
                .find(|field| record_type.field(field).is_none())
            {
                return Err(SyncError::Config(format!(
                    "rename of undeclared field `{}.{field}`",
                    spec.record_type
                )));
            }
            let name = spec.record_type.clone();
            let collection = RemoteCollection {
                record_type: Arc::clone(record_type),
                client: Arc::clone(&client),
                spec,
            };
            if collections.insert(name.clone(), collection).is_some() {
                return Err(SyncError::Config(format!("duplicate collection for `{name}`")));
            }
        }

        if let Some(missing) = registry
            .names()
            .into_iter()
            .find(|n| !collections.contains_key(*n))
        {
            return Err(SyncError::Config(format!("no remote collection bound for `{missing}`")));
        }

        Ok(Self {
            name: name.into(),
            registry,
            collections,
        })
    }
}

#[async_trait]
impl Adapter for RemoteAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn load(&self) -> Result<Snapshot, LoadError> {
        let mut snapshot = Snapshot::new(&self.name);
        for record_type in self.registry.iter() {
            let Some(collection) = self.collections.get(record_type.name()) else {
                continue;
            };
            for item in collection.fetch_all().await? {
                let (record, handle) = collection.decode(&item)?;
                snapshot.add(record, Some(handle))?;
            }
        }
        info!(adapter = %self.name, records = snapshot.total_len(), "remote snapshot loaded");
        Ok(snapshot)
    }

    fn creatable(&self, record_type: &str) -> Option<&dyn Creatable> {
        self.collections.get(record_type).map(|c| c as &dyn Creatable)
    }

    fn updatable(&self, record_type: &str) -> Option<&dyn Updatable> {
        self.collections.get(record_type).map(|c| c as &dyn Updatable)
    }

    fn deletable(&self, record_type: &str) -> Option<&dyn Deletable> {
        self.collections.get(record_type).map(|c| c as &dyn Deletable)
    }
}

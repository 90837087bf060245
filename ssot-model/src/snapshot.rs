use crate::error::{ModelError, ModelResult};
use crate::record::{IdentityKey, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Adapter-internal reference to a stored record (remote id, row id).
///
/// Enough to address the record for update or delete without resolving its
/// identity key again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for Handle {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Handle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A loaded record and, when the backing system has one, its handle.
#[derive(Debug, Clone)]
pub struct Entry {
    pub record: Record,
    pub handle: Option<Handle>,
}

/// Every record loaded from one system in one pass, indexed by
/// (record type, identity key).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    name: String,
    types: BTreeMap<String, HashMap<IdentityKey, Entry>>,
}

impl Snapshot {
    /// Creates an empty snapshot labelled with the adapter name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a record. A second record with the same identity key for the
    /// same record type is rejected and leaves the snapshot unchanged.
    pub fn add(&mut self, record: Record, handle: Option<Handle>) -> ModelResult<()> {
        let index = self.types.entry(record.record_type().to_string()).or_default();
        if index.contains_key(record.identity()) {
            return Err(ModelError::DuplicateIdentity {
                record_type: record.record_type().to_string(),
                snapshot: self.name.clone(),
                key: record.identity().to_string(),
            });
        }
        index.insert(record.identity().clone(), Entry { record, handle });
        Ok(())
    }

    pub fn get(&self, record_type: &str, key: &IdentityKey) -> Option<&Entry> {
        self.types.get(record_type).and_then(|index| index.get(key))
    }

    pub fn contains(&self, record_type: &str, key: &IdentityKey) -> bool {
        self.get(record_type, key).is_some()
    }

    /// Entries of one record type, in no particular order.
    pub fn entries(&self, record_type: &str) -> impl Iterator<Item = &Entry> {
        self.types.get(record_type).into_iter().flat_map(|index| index.values())
    }

    /// Identity keys of one record type, in no particular order.
    pub fn keys(&self, record_type: &str) -> impl Iterator<Item = &IdentityKey> {
        self.types.get(record_type).into_iter().flat_map(|index| index.keys())
    }

    pub fn len(&self, record_type: &str) -> usize {
        self.types.get(record_type).map_or(0, HashMap::len)
    }

    pub fn total_len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Record type names that have at least one entry slot.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

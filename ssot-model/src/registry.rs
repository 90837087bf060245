use crate::error::{ModelError, ModelResult};
use crate::record_type::RecordType;
use std::sync::Arc;

/// The ordered set of top-level record types taking part in a sync.
///
/// Declaration order matters: the orchestrator diffs and applies types in
/// this order, so referenced types (VLAN groups) must come before the types
/// that reference them (VLANs).
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: Vec<Arc<RecordType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type at the end of the declaration order.
    pub fn register(&mut self, record_type: RecordType) -> ModelResult<()> {
        if self.get(record_type.name()).is_some() {
            return Err(ModelError::schema(
                record_type.name(),
                "record type is already registered",
            ));
        }
        self.types.push(Arc::new(record_type));
        Ok(())
    }

    /// Builder-style [`Registry::register`].
    pub fn with(mut self, record_type: RecordType) -> ModelResult<Self> {
        self.register(record_type)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordType>> {
        self.types.iter().find(|t| t.name() == name)
    }

    /// Like [`Registry::get`] but fails for unregistered names.
    pub fn require(&self, name: &str) -> ModelResult<&Arc<RecordType>> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownRecordType(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RecordType>> {
        self.types.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Restricts the registry to an inclusion list, keeping declaration order.
    ///
    /// `None` keeps every type. Unknown names are rejected rather than ignored
    /// so a typo in host configuration cannot silently skip a type.
    pub fn select(&self, include: Option<&[String]>) -> ModelResult<Registry> {
        let Some(include) = include else {
            return Ok(self.clone());
        };
        for name in include {
            self.require(name)?;
        }
        Ok(Registry {
            types: self
                .types
                .iter()
                .filter(|t| include.iter().any(|name| name == t.name()))
                .cloned()
                .collect(),
        })
    }
}

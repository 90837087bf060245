//! Adapter and per-record-type capability traits.
//!
//! An adapter loads a full [`Snapshot`] of its system. A target adapter
//! additionally exposes, per record type, the CRUD capabilities it supports.
//! A missing capability turns every operation of that kind into a permanent
//! `unsupported` failure instead of a compile-time requirement.

use crate::error::{ApplyResult, LoadError};
use async_trait::async_trait;
use ssot_model::{Attributes, Handle, IdentityKey, Registry, Snapshot};

/// Creates records of one type.
#[async_trait]
pub trait Creatable: Send + Sync {
    /// Creates the record and returns its native handle.
    async fn create(&self, identity: &IdentityKey, attributes: &Attributes) -> ApplyResult<Handle>;
}

/// Updates records of one type.
#[async_trait]
pub trait Updatable: Send + Sync {
    /// Writes only the changed attributes.
    async fn update(&self, handle: &Handle, changed: &Attributes) -> ApplyResult<()>;
}

/// Deletes records of one type.
#[async_trait]
pub trait Deletable: Send + Sync {
    async fn delete(&self, handle: &Handle) -> ApplyResult<()>;
}

/// One side of a sync: the local store or the remote system.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Record types this adapter can load.
    fn registry(&self) -> &Registry;

    /// Loads every registered record type into a fresh snapshot.
    async fn load(&self) -> Result<Snapshot, LoadError>;

    fn creatable(&self, _record_type: &str) -> Option<&dyn Creatable> {
        None
    }

    fn updatable(&self, _record_type: &str) -> Option<&dyn Updatable> {
        None
    }

    fn deletable(&self, _record_type: &str) -> Option<&dyn Deletable> {
        None
    }
}

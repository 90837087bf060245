//! Snapshot-and-reconcile sync engine.
//!
//! Makes a target system a faithful mirror of a source system for a set of
//! record types. Either side can be the SQLite authoritative store or a
//! remote REST API; the engine only sees [`Adapter`]s.
//!
//! # Sync run
//!
//! 1. **Load**: both adapters load full snapshots, concurrently
//! 2. **Diff**: per record type, in declaration order, classify every
//!    identity key as create / update / delete / unchanged
//! 3. **Apply**: unless dry-run, push the change set into the target:
//!    creates, then updates, then deletes, each bucket on a bounded worker
//!    pool with per-record failure isolation and transient-error retry
//! 4. **Report**: per-type counts plus every isolated failure
//!
//! Load failures abort the run before anything is applied. Apply failures
//! never abort it.
//!
//! # Example
//!
//! ```no_run
//! use ssot_model::schemas;
//! use ssot_sync::remote::{self, RemoteAdapter, RemoteClient};
//! use ssot_sync::{LocalAdapter, RemoteConfig, SyncConfig, SyncJob};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = schemas::vlan_registry()?;
//! let store = ssot_storage::vlan::open("ssot.db")?;
//! let client = Arc::new(RemoteClient::new(&RemoteConfig::new("https://netbox.example.com", "token"))?);
//!
//! let source = LocalAdapter::new("local", registry.clone(), store)?;
//! let target = RemoteAdapter::new("netbox", registry.clone(), client, remote::vlan_collections())?;
//!
//! let report = SyncJob::new(registry, source, target, SyncConfig::default())
//!     .run(false)
//!     .await?;
//! println!("{} failures", report.failures().len());
//! # Ok(())
//! # }
//! ```

mod adapter;
mod apply;
mod cancel;
mod config;
mod diff;
mod error;
mod local;
mod orchestrator;
pub mod remote;
mod report;

pub use adapter::{Adapter, Creatable, Deletable, Updatable};
pub use apply::{ApplyEngine, TypeApply};
pub use cancel::{cancellation, CancelHandle, CancelSignal};
pub use config::{AuthScheme, RemoteConfig, RetryConfig, SyncConfig};
pub use diff::{diff, ChangeSet, CreateOp, DeleteOp, FieldChange, UpdateOp};
pub use error::{
    ApplyError, ApplyResult, LoadError, PermanentKind, RemoteError, Side, SyncError, SyncResult,
};
pub use local::LocalAdapter;
pub use orchestrator::SyncJob;
pub use report::{ApplyFailure, Operation, SyncReport, TypeCounts, TypeReport};

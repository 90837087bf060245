//! SQLite storage layer for the ssot sync engine.
//!
//! The local store is the authoritative side of a sync. Each record type is
//! mapped onto one table by a [`TableBinding`]:
//! - plain columns hold field values directly
//! - foreign columns hold an internal row id and are dereferenced to the
//!   referenced row's natural key on read, and resolved back from the
//!   natural key to a row id on write
//!
//! Reads produce raw JSON objects shaped like the remote API's items
//! (`{"group": {"id": 3, "name": "eng"}}`), so one resolution routine in
//! `ssot-model` serves both sides of a sync.

mod binding;
mod error;
mod store;
pub mod vlan;

pub use binding::{ColumnBinding, TableBinding};
pub use error::{StorageError, StorageResult};
pub use store::{LocalStore, StoredRow};

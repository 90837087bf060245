//! Tables and bindings for the built-in VLAN record types.

use crate::binding::TableBinding;
use crate::error::StorageResult;
use crate::store::LocalStore;
use ssot_model::schemas::{VLAN, VLAN_GROUP};
use std::path::Path;

/// Schema for VLAN groups, statuses and VLANs.
pub const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS vlan_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS statuses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS vlans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vid INTEGER NOT NULL CHECK (vid BETWEEN 1 AND 4094),
        name TEXT NOT NULL DEFAULT '',
        group_id INTEGER REFERENCES vlan_groups(id),
        status_id INTEGER REFERENCES statuses(id),
        description TEXT NOT NULL DEFAULT ''
    );

    INSERT OR IGNORE INTO statuses (name) VALUES ('Active'), ('Reserved'), ('Deprecated');
";

/// `vlan_group` ↔ `vlan_groups`.
pub fn vlan_group_binding() -> TableBinding {
    TableBinding::new(VLAN_GROUP, "vlan_groups")
        .plain("name", "name")
        .plain("description", "description")
}

/// `vlan` ↔ `vlans`, with group and status dereferenced by name.
pub fn vlan_binding() -> TableBinding {
    TableBinding::new(VLAN, "vlans")
        .plain("vid", "vid")
        .foreign("group__name", "group_id", "vlan_groups", "name")
        .plain("name", "name")
        .plain("description", "description")
        .foreign("status__name", "status_id", "statuses", "name")
}

/// Opens a store at `path` with the VLAN schema and bindings installed.
pub fn open(path: impl AsRef<Path>) -> StorageResult<LocalStore> {
    install(LocalStore::open(path)?)
}

/// In-memory variant of [`open`].
pub fn open_in_memory() -> StorageResult<LocalStore> {
    install(LocalStore::open_in_memory()?)
}

fn install(store: LocalStore) -> StorageResult<LocalStore> {
    store.execute_batch(SCHEMA_SQL)?;
    store
        .with_binding(vlan_group_binding())?
        .with_binding(vlan_binding())
}

//! Built-in record types for VLAN synchronization.
//!
//! Two top-level types, declared in dependency order: VLAN groups first, so
//! groups created in a run exist before VLANs that reference them by name.

use crate::error::ModelResult;
use crate::field::FieldDef;
use crate::record_type::RecordType;
use crate::registry::Registry;

pub const VLAN_GROUP: &str = "vlan_group";
pub const VLAN: &str = "vlan";

/// `vlan_group`: identified by name.
pub fn vlan_group() -> ModelResult<RecordType> {
    RecordType::builder(VLAN_GROUP)
        .identifier(FieldDef::required("name"))
        .attribute(FieldDef::optional("description").with_default(""))
        .build()
}

/// `vlan`: identified by VLAN id plus the name of its (optional) group.
pub fn vlan() -> ModelResult<RecordType> {
    RecordType::builder(VLAN)
        .identifier(FieldDef::required("vid"))
        .identifier(FieldDef::optional("group__name"))
        .attribute(FieldDef::optional("name").with_default(""))
        .attribute(FieldDef::optional("description").with_default(""))
        .attribute(FieldDef::optional("status__name"))
        .build()
}

/// Registry holding both VLAN types in dependency order.
pub fn vlan_registry() -> ModelResult<Registry> {
    Registry::new().with(vlan_group()?)?.with(vlan()?)
}

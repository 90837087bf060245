//! Remote REST system (Netbox/Nautobot style API).
//!
//! Collections are paginated with a `results` array and an absolute or
//! relative `next` URL. Related entities come back as nested objects, so
//! dereferenced fields like `group__name` resolve against
//! `{"group": {"name": ...}}`.

mod adapter;
mod client;
mod collection;

pub use adapter::RemoteAdapter;
pub use client::RemoteClient;
pub use collection::CollectionSpec;

use ssot_model::schemas;

/// IPAM VLAN group endpoint.
pub const VLAN_GROUPS_PATH: &str = "/api/ipam/vlan-groups/";
/// IPAM VLAN endpoint.
pub const VLANS_PATH: &str = "/api/ipam/vlans/";

/// Collection bindings for [`schemas::vlan_registry`].
///
/// The VLAN status is an API choice: read as `status.label` and written as
/// the lower-cased `status` value.
pub fn vlan_collections() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec::new(schemas::VLAN_GROUP, VLAN_GROUPS_PATH),
        CollectionSpec::new(schemas::VLAN, VLANS_PATH).choice("status__name", "status"),
    ]
}

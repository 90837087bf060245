//! Record model for the ssot sync engine.
//!
//! Defines the typed form that records from two heterogeneous systems are
//! projected into before they are compared:
//! - [`FieldValue`]: a hashable scalar value (null, bool, integer, text)
//! - [`FieldDef`]: one declared field, possibly dereferenced through a related entity
//! - [`RecordType`]: the static schema of one synchronizable entity
//! - [`Registry`]: the ordered set of top-level record types of a sync
//! - [`Record`] / [`IdentityKey`]: one entity instance and its natural key
//! - [`Snapshot`]: every record loaded from one system in one pass
//!
//! Identity and equality are always computed over natural keys (for example a
//! VLAN group's name), never over storage-internal ids. Internal ids only
//! survive as opaque [`Handle`]s attached to snapshot entries.

mod error;
mod field;
mod record;
mod record_type;
mod registry;
mod resolve;
pub mod schemas;
mod snapshot;
mod value;

pub use error::{ModelError, ModelResult};
pub use field::{FieldDef, FOREIGN_SEPARATOR};
pub use record::{Attributes, IdentityKey, Record};
pub use record_type::{RecordType, RecordTypeBuilder};
pub use registry::Registry;
pub use resolve::resolve_field;
pub use snapshot::{Entry, Handle, Snapshot};
pub use value::FieldValue;

//! Per-type snapshot comparison.
//!
//! Identity keys present only in the source become creates, keys present
//! only in the target become deletes, and keys present in both become
//! updates when any declared attribute differs after normalization. Each
//! bucket is sorted by identity key so a change set is deterministic for
//! the same inputs.

use crate::report::TypeCounts;
use serde::Serialize;
use ssot_model::{Attributes, FieldValue, Handle, IdentityKey, Record, RecordType, Snapshot};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub old: FieldValue,
    pub new: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOp {
    pub identity: IdentityKey,
    /// Every declared attribute, defaults applied.
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOp {
    pub identity: IdentityKey,
    /// Target handle, when the target snapshot carried one.
    pub handle: Option<Handle>,
    pub changes: BTreeMap<String, FieldChange>,
}

impl UpdateOp {
    /// The new values of the changed attributes only.
    pub fn changed_attributes(&self) -> Attributes {
        self.changes
            .iter()
            .map(|(field, change)| (field.clone(), change.new.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOp {
    pub identity: IdentityKey,
    pub handle: Option<Handle>,
}

/// Everything needed to make the target's records of one type match the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub record_type: String,
    pub create: Vec<CreateOp>,
    pub update: Vec<UpdateOp>,
    pub delete: Vec<DeleteOp>,
    pub unchanged: Vec<IdentityKey>,
}

impl ChangeSet {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            create: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
            unchanged: Vec::new(),
        }
    }

    /// No writes required.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    /// Counts a successful apply of this change set would produce.
    pub fn planned_counts(&self) -> TypeCounts {
        TypeCounts {
            created: self.create.len(),
            updated: self.update.len(),
            deleted: self.delete.len(),
            unchanged: self.unchanged.len(),
            skipped: 0,
        }
    }
}

/// Computes the change set for one record type.
///
/// Handles in the result always come from the target snapshot.
pub fn diff(source: &Snapshot, target: &Snapshot, record_type: &RecordType) -> ChangeSet {
    let name = record_type.name();
    let mut changes = ChangeSet::new(name);

    for entry in source.entries(name) {
        let identity = entry.record.identity();
        match target.get(name, identity) {
            None => changes.create.push(CreateOp {
                identity: identity.clone(),
                attributes: declared_attributes(record_type, &entry.record),
            }),
            Some(existing) => {
                let fields = compare(record_type, &entry.record, &existing.record);
                if fields.is_empty() {
                    changes.unchanged.push(identity.clone());
                } else {
                    changes.update.push(UpdateOp {
                        identity: identity.clone(),
                        handle: existing.handle.clone(),
                        changes: fields,
                    });
                }
            }
        }
    }

    for entry in target.entries(name) {
        if !source.contains(name, entry.record.identity()) {
            changes.delete.push(DeleteOp {
                identity: entry.record.identity().clone(),
                handle: entry.handle.clone(),
            });
        }
    }

    changes.create.sort_by(|a, b| a.identity.cmp(&b.identity));
    changes.update.sort_by(|a, b| a.identity.cmp(&b.identity));
    changes.delete.sort_by(|a, b| a.identity.cmp(&b.identity));
    changes.unchanged.sort();
    changes
}

fn normalized(record_type: &RecordType, record: &Record, field: &str) -> FieldValue {
    let raw = record.attribute(field).cloned().unwrap_or_default();
    match record_type.attribute(field) {
        Some(def) => def.normalize(raw),
        None => raw,
    }
}

fn declared_attributes(record_type: &RecordType, record: &Record) -> Attributes {
    record_type
        .attributes()
        .iter()
        .map(|def| (def.name().to_string(), normalized(record_type, record, def.name())))
        .collect()
}

fn compare(record_type: &RecordType, source: &Record, target: &Record) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    for def in record_type.attributes() {
        let new = normalized(record_type, source, def.name());
        let old = normalized(record_type, target, def.name());
        if new != old {
            changes.insert(def.name().to_string(), FieldChange { old, new });
        }
    }
    changes
}

use crate::value::FieldValue;
use serde::{Deserialize, Serialize};

/// Separator between path segments of a dereferenced foreign field.
///
/// `group__name` reads as "the `name` of the related `group`".
pub const FOREIGN_SEPARATOR: &str = "__";

/// Declaration of one identifier or attribute field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    name: String,
    optional: bool,
    default: FieldValue,
}

impl FieldDef {
    /// A field that must be present (and non-null) in every raw record.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            default: FieldValue::Null,
        }
    }

    /// A field that may be absent; absence resolves to `Null`.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
            default: FieldValue::Null,
        }
    }

    /// Makes the field optional with an explicit empty value.
    ///
    /// Absent and null inputs both resolve to `default`, so a source that
    /// omits the field and a source that sends the empty value agree.
    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.optional = true;
        self.default = default.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> &FieldValue {
        &self.default
    }

    /// Path segments through related entities, e.g. `["group", "name"]`.
    pub fn path(&self) -> Vec<&str> {
        self.name.split(FOREIGN_SEPARATOR).collect()
    }

    /// True when the field is read through a related entity.
    pub fn is_dereferenced(&self) -> bool {
        self.name.contains(FOREIGN_SEPARATOR)
    }

    /// Name of the directly related entity for dereferenced fields.
    pub fn relation(&self) -> Option<&str> {
        self.name
            .split_once(FOREIGN_SEPARATOR)
            .map(|(relation, _)| relation)
    }

    /// Maps null to the declared default.
    pub fn normalize(&self, value: FieldValue) -> FieldValue {
        if value.is_null() {
            self.default.clone()
        } else {
            value
        }
    }
}

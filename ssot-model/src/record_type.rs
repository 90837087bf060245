use crate::error::{ModelError, ModelResult};
use crate::field::{FieldDef, FOREIGN_SEPARATOR};
use std::collections::HashSet;

/// Static schema of one synchronizable entity.
///
/// Identifier fields together form the natural key; attribute fields are the
/// mutable payload compared by the diff engine. Both lists keep their
/// declaration order. Construction goes through [`RecordType::builder`],
/// which rejects empty identifier or attribute sets and overlapping field
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    identifiers: Vec<FieldDef>,
    attributes: Vec<FieldDef>,
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            identifiers: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifiers(&self) -> &[FieldDef] {
        &self.identifiers
    }

    pub fn attributes(&self) -> &[FieldDef] {
        &self.attributes
    }

    pub fn identifier(&self, name: &str) -> Option<&FieldDef> {
        self.identifiers.iter().find(|f| f.name() == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldDef> {
        self.attributes.iter().find(|f| f.name() == name)
    }

    /// Looks up a field in either list.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.identifier(name).or_else(|| self.attribute(name))
    }

    /// Identifier and attribute fields, identifiers first.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.identifiers.iter().chain(self.attributes.iter())
    }
}

/// Builder returned by [`RecordType::builder`].
#[derive(Debug, Clone)]
pub struct RecordTypeBuilder {
    name: String,
    identifiers: Vec<FieldDef>,
    attributes: Vec<FieldDef>,
}

impl RecordTypeBuilder {
    pub fn identifier(mut self, field: FieldDef) -> Self {
        self.identifiers.push(field);
        self
    }

    pub fn attribute(mut self, field: FieldDef) -> Self {
        self.attributes.push(field);
        self
    }

    /// Validates the declaration.
    pub fn build(self) -> ModelResult<RecordType> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ModelError::schema(&self.name, "name must not be empty"));
        }
        if self.identifiers.is_empty() {
            return Err(ModelError::schema(name, "at least one identifier is required"));
        }

        let mut seen = HashSet::new();
        for field in self.identifiers.iter().chain(self.attributes.iter()) {
            if field.path().iter().any(|segment| segment.is_empty()) {
                return Err(ModelError::schema(
                    name,
                    format!(
                        "field `{}` has an empty segment around `{FOREIGN_SEPARATOR}`",
                        field.name()
                    ),
                ));
            }
            if !seen.insert(field.name()) {
                return Err(ModelError::schema(
                    name,
                    format!("field `{}` is declared more than once", field.name()),
                ));
            }
        }

        if self.attributes.is_empty() {
            return Err(ModelError::schema(name, "at least one attribute is required"));
        }

        Ok(RecordType {
            name: name.to_string(),
            identifiers: self.identifiers,
            attributes: self.attributes,
        })
    }
}

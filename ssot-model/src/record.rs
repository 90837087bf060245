use crate::error::{ModelError, ModelResult};
use crate::record_type::RecordType;
use crate::resolve::resolve_field;
use crate::value::FieldValue;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Attribute values keyed by field name.
pub type Attributes = BTreeMap<String, FieldValue>;

/// Resolved identifier values, in the record type's declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(Vec<(String, FieldValue)>);

impl IdentityKey {
    /// Builds a key from `(field, value)` pairs taken in declaration order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One instance of a [`RecordType`].
///
/// The identity is fixed at construction; attributes may change. Equality and
/// hashing only consider the record type name and the identity key.
#[derive(Debug, Clone)]
pub struct Record {
    record_type: String,
    identity: IdentityKey,
    attributes: Attributes,
}

impl Record {
    /// Builds a record from already-resolved values.
    ///
    /// Missing optional fields take their declared default; names that the
    /// record type does not declare in the matching list are rejected.
    pub fn new<I, A, K, V>(record_type: &RecordType, identifiers: I, attributes: A) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        A: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let given_ids = collect_known(record_type, identifiers, |name| {
            record_type.identifier(name).is_some()
        })?;
        let given_attrs = collect_known(record_type, attributes, |name| {
            record_type.attribute(name).is_some()
        })?;

        let mut identity = Vec::with_capacity(record_type.identifiers().len());
        for field in record_type.identifiers() {
            let value = given_ids.get(field.name()).cloned().unwrap_or_default();
            identity.push((field.name().to_string(), finish(record_type, field, value)?));
        }

        let mut attrs = Attributes::new();
        for field in record_type.attributes() {
            let value = given_attrs.get(field.name()).cloned().unwrap_or_default();
            attrs.insert(field.name().to_string(), finish(record_type, field, value)?);
        }

        Ok(Self {
            record_type: record_type.name().to_string(),
            identity: IdentityKey(identity),
            attributes: attrs,
        })
    }

    /// Projects a raw JSON object from a backing system into a record,
    /// dereferencing foreign fields through nested related objects.
    pub fn from_raw(
        record_type: &RecordType,
        raw: &serde_json::Map<String, serde_json::Value>,
    ) -> ModelResult<Self> {
        let mut identity = Vec::with_capacity(record_type.identifiers().len());
        for field in record_type.identifiers() {
            let value = resolve_field(record_type.name(), field, raw)?;
            identity.push((field.name().to_string(), value));
        }

        let mut attributes = Attributes::new();
        for field in record_type.attributes() {
            let value = resolve_field(record_type.name(), field, raw)?;
            attributes.insert(field.name().to_string(), value);
        }

        Ok(Self {
            record_type: record_type.name().to_string(),
            identity: IdentityKey(identity),
            attributes,
        })
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn identity(&self) -> &IdentityKey {
        &self.identity
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldValue> {
        self.attributes.get(name)
    }

    /// Replaces one attribute value, normalized against its declaration.
    pub fn set_attribute(
        &mut self,
        record_type: &RecordType,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> ModelResult<()> {
        let field = record_type
            .attribute(name)
            .ok_or_else(|| ModelError::UnknownField {
                record_type: record_type.name().to_string(),
                field: name.to_string(),
            })?;
        let value = finish(record_type, field, value.into())?;
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Flat JSON object of identifiers followed by attributes.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in self.identity.fields() {
            map.insert(name.to_string(), value.to_json());
        }
        for (name, value) in &self.attributes {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.record_type == other.record_type && self.identity == other.identity
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record_type.hash(state);
        self.identity.hash(state);
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.record_type, self.identity)
    }
}

fn collect_known<K, V>(
    record_type: &RecordType,
    pairs: impl IntoIterator<Item = (K, V)>,
    declared: impl Fn(&str) -> bool,
) -> ModelResult<BTreeMap<String, FieldValue>>
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    let mut values = BTreeMap::new();
    for (name, value) in pairs {
        let name = name.into();
        if !declared(&name) {
            return Err(ModelError::UnknownField {
                record_type: record_type.name().to_string(),
                field: name,
            });
        }
        values.insert(name, value.into());
    }
    Ok(values)
}

fn finish(
    record_type: &RecordType,
    field: &crate::field::FieldDef,
    value: FieldValue,
) -> ModelResult<FieldValue> {
    let value = field.normalize(value);
    if value.is_null() && !field.is_optional() {
        return Err(ModelError::malformed(
            record_type.name(),
            field.name(),
            "is required but missing",
        ));
    }
    Ok(value)
}

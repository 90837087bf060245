//! Projection of raw JSON objects onto declared fields.

use crate::error::{ModelError, ModelResult};
use crate::field::FieldDef;
use crate::value::FieldValue;
use serde_json::{Map, Value};

/// Resolves one declared field from a raw record.
///
/// Dereferenced fields (`group__name`) are looked up either under their flat
/// name or by walking nested related objects (`{"group": {"name": ..}}`).
/// An absent or null related entity resolves to the field default when the
/// field is optional. A related entity that is present but lacks its natural
/// key is malformed: the reference points at something that cannot be named.
pub fn resolve_field(
    record_type: &str,
    field: &FieldDef,
    raw: &Map<String, Value>,
) -> ModelResult<FieldValue> {
    if field.is_dereferenced() {
        if let Some(flat) = raw.get(field.name()) {
            return scalar(record_type, field, flat);
        }
    }

    let path = field.path();
    let Some((last, relations)) = path.split_last() else {
        return Err(ModelError::malformed(record_type, field.name(), "has no path"));
    };

    let mut current = raw;
    for relation in relations {
        match current.get(*relation) {
            None | Some(Value::Null) => {
                return absent(
                    record_type,
                    field,
                    format!("references a missing `{relation}`"),
                );
            }
            Some(Value::Object(related)) => current = related,
            Some(other) => {
                return Err(ModelError::malformed(
                    record_type,
                    field.name(),
                    format!("expected `{relation}` to be an object, found {other}"),
                ));
            }
        }
    }

    match current.get(*last) {
        None | Some(Value::Null) if field.is_dereferenced() => Err(ModelError::malformed(
            record_type,
            field.name(),
            format!("references a related entity without `{last}`"),
        )),
        None | Some(Value::Null) => absent(record_type, field, "is required but missing".into()),
        Some(value) => scalar(record_type, field, value),
    }
}

fn absent(record_type: &str, field: &FieldDef, reason: String) -> ModelResult<FieldValue> {
    if field.is_optional() {
        Ok(field.default_value().clone())
    } else {
        Err(ModelError::malformed(record_type, field.name(), reason))
    }
}

fn scalar(record_type: &str, field: &FieldDef, value: &Value) -> ModelResult<FieldValue> {
    let resolved = FieldValue::from_json(value).ok_or_else(|| {
        ModelError::malformed(
            record_type,
            field.name(),
            format!("has unsupported value {value}"),
        )
    })?;
    if resolved.is_null() {
        return absent(record_type, field, "is required but null".into());
    }
    Ok(field.normalize(resolved))
}

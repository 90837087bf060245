use crate::binding::{ColumnBinding, TableBinding};
use crate::error::{StorageError, StorageResult};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use ssot_model::{Attributes, FieldValue, FOREIGN_SEPARATOR};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// One stored row: its primary key and its raw JSON projection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub key: i64,
    pub raw: Map<String, Value>,
}

/// SQLite-backed authoritative store.
///
/// Cloning shares the underlying connection.
#[derive(Debug, Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    bindings: Arc<HashMap<String, TableBinding>>,
}

impl LocalStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            bindings: Arc::new(HashMap::new()),
        })
    }

    /// Registers the table binding for one record type.
    pub fn with_binding(mut self, binding: TableBinding) -> StorageResult<Self> {
        binding.validate()?;
        Arc::make_mut(&mut self.bindings).insert(binding.record_type().to_string(), binding);
        Ok(self)
    }

    pub fn binding(&self, record_type: &str) -> StorageResult<&TableBinding> {
        self.bindings
            .get(record_type)
            .ok_or_else(|| StorageError::UnknownRecordType(record_type.to_string()))
    }

    /// Runs raw SQL, used for schema setup and seeding.
    pub fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Reads every row bound to `record_type`, foreign columns dereferenced.
    ///
    /// A foreign id is projected as `{"id": .., "<key>": ..}` under the
    /// relation name; the key is left out when the referenced row is gone.
    pub fn fetch(&self, record_type: &str) -> StorageResult<Vec<StoredRow>> {
        let binding = self.binding(record_type)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&binding.select_sql())?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let key: i64 = row.get(0)?;
            let mut raw = Map::new();
            raw.insert("id".to_string(), Value::from(key));

            let mut idx = 1;
            for column in binding.columns() {
                match column {
                    ColumnBinding::Plain { field, .. } => {
                        raw.insert(field.clone(), to_json(row.get_ref(idx)?)?);
                        idx += 1;
                    }
                    ColumnBinding::Foreign { field, .. } => {
                        let foreign_id = to_json(row.get_ref(idx)?)?;
                        let natural_key = to_json(row.get_ref(idx + 1)?)?;
                        idx += 2;

                        let (relation, key_field) =
                            field.split_once(FOREIGN_SEPARATOR).ok_or_else(|| {
                                StorageError::InvalidBinding(format!("`{field}` is not a foreign field"))
                            })?;
                        let related = if foreign_id.is_null() {
                            Value::Null
                        } else {
                            let mut related = Map::new();
                            related.insert("id".to_string(), foreign_id);
                            if !natural_key.is_null() {
                                related.insert(key_field.to_string(), natural_key);
                            }
                            Value::Object(related)
                        };
                        raw.insert(relation.to_string(), related);
                    }
                }
            }
            out.push(StoredRow { key, raw });
        }

        debug!(record_type, rows = out.len(), "fetched rows");
        Ok(out)
    }

    /// Inserts a row from field values and returns its key.
    pub fn insert(&self, record_type: &str, values: &Attributes) -> StorageResult<i64> {
        let binding = self.binding(record_type)?;
        let conn = self.lock()?;
        let (columns, params) = bind_values(&conn, binding, values)?;

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", binding.table())
        } else {
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                binding.table(),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        conn.execute(&sql, params_from_iter(params.iter()))?;
        let key = conn.last_insert_rowid();
        debug!(record_type, key, "inserted row");
        Ok(key)
    }

    /// Overwrites the given fields of one row.
    pub fn update(&self, record_type: &str, key: i64, values: &Attributes) -> StorageResult<()> {
        let binding = self.binding(record_type)?;
        let conn = self.lock()?;

        if values.is_empty() {
            let exists = conn
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE id = ?1", binding.table()),
                    [key],
                    |_| Ok(()),
                )
                .optional()?;
            return exists.ok_or_else(|| not_found(record_type, key));
        }

        let (columns, mut params) = bind_values(&conn, binding, values)?;
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            binding.table(),
            assignments.join(", "),
            columns.len() + 1
        );
        params.push(SqlValue::Integer(key));

        if conn.execute(&sql, params_from_iter(params.iter()))? == 0 {
            return Err(not_found(record_type, key));
        }
        debug!(record_type, key, fields = columns.len(), "updated row");
        Ok(())
    }

    /// Deletes one row.
    pub fn delete(&self, record_type: &str, key: i64) -> StorageResult<()> {
        let binding = self.binding(record_type)?;
        let conn = self.lock()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", binding.table());
        if conn.execute(&sql, [key])? == 0 {
            return Err(not_found(record_type, key));
        }
        debug!(record_type, key, "deleted row");
        Ok(())
    }

    /// Number of rows bound to `record_type`.
    pub fn count(&self, record_type: &str) -> StorageResult<usize> {
        let binding = self.binding(record_type)?;
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", binding.table()),
            [],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StorageError::InvalidData(format!("row count {count}")))
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn not_found(record_type: &str, key: i64) -> StorageError {
    StorageError::NotFound {
        record_type: record_type.to_string(),
        key,
    }
}

/// Maps field values onto columns, resolving foreign natural keys to ids.
fn bind_values(
    conn: &Connection,
    binding: &TableBinding,
    values: &Attributes,
) -> StorageResult<(Vec<String>, Vec<SqlValue>)> {
    let mut columns = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());

    for (field, value) in values {
        let column = binding
            .column_for(field)
            .ok_or_else(|| StorageError::UnboundField {
                record_type: binding.record_type().to_string(),
                field: field.clone(),
            })?;

        let param = match column {
            ColumnBinding::Plain { .. } => to_sql(value),
            ColumnBinding::Foreign { .. } if value.is_null() => SqlValue::Null,
            ColumnBinding::Foreign {
                table, key_column, ..
            } => {
                let id: Option<i64> = conn
                    .query_row(
                        &format!("SELECT id FROM {table} WHERE {key_column} = ?1"),
                        [to_sql(value)],
                        |row| row.get(0),
                    )
                    .optional()?;
                let id = id.ok_or_else(|| StorageError::UnresolvedReference {
                    record_type: binding.record_type().to_string(),
                    field: field.clone(),
                    value: value.to_string(),
                })?;
                SqlValue::Integer(id)
            }
        };
        columns.push(column.column().to_string());
        params.push(param);
    }

    Ok((columns, params))
}

fn to_sql(value: &FieldValue) -> SqlValue {
    match value {
        FieldValue::Null => SqlValue::Null,
        FieldValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        FieldValue::Int(i) => SqlValue::Integer(*i),
        FieldValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn to_json(value: ValueRef<'_>) -> StorageResult<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::from(i)),
        ValueRef::Real(f) => Ok(serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|e| StorageError::InvalidData(format!("non-UTF-8 text: {e}"))),
        ValueRef::Blob(_) => Err(StorageError::InvalidData(
            "blob columns cannot be synchronized".to_string(),
        )),
    }
}

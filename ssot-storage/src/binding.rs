use crate::error::{StorageError, StorageResult};
use ssot_model::FOREIGN_SEPARATOR;

/// How one field maps onto a table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnBinding {
    /// The column holds the field value.
    Plain { field: String, column: String },
    /// The column holds the `id` of a row in `table`; the field is that
    /// row's `key_column`.
    Foreign {
        field: String,
        column: String,
        table: String,
        key_column: String,
    },
}

impl ColumnBinding {
    pub fn field(&self) -> &str {
        match self {
            Self::Plain { field, .. } | Self::Foreign { field, .. } => field,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Plain { column, .. } | Self::Foreign { column, .. } => column,
        }
    }
}

/// Maps one record type onto one table with an integer `id` primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    record_type: String,
    table: String,
    columns: Vec<ColumnBinding>,
}

impl TableBinding {
    pub fn new(record_type: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Binds a field to a column of the same table.
    pub fn plain(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.push(ColumnBinding::Plain {
            field: field.into(),
            column: column.into(),
        });
        self
    }

    /// Binds a dereferenced field (`group__name`) to a foreign-id column.
    pub fn foreign(
        mut self,
        field: impl Into<String>,
        column: impl Into<String>,
        table: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        self.columns.push(ColumnBinding::Foreign {
            field: field.into(),
            column: column.into(),
            table: table.into(),
            key_column: key_column.into(),
        });
        self
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnBinding] {
        &self.columns
    }

    pub fn column_for(&self, field: &str) -> Option<&ColumnBinding> {
        self.columns.iter().find(|c| c.field() == field)
    }

    /// SQL names are interpolated into statements, so they are restricted
    /// to plain identifiers.
    pub(crate) fn validate(&self) -> StorageResult<()> {
        check_ident(&self.table)?;
        if self.columns.is_empty() {
            return Err(StorageError::InvalidBinding(format!(
                "{} binds no columns",
                self.record_type
            )));
        }
        for column in &self.columns {
            check_ident(column.column())?;
            if let ColumnBinding::Foreign {
                field,
                table,
                key_column,
                ..
            } = column
            {
                check_ident(table)?;
                check_ident(key_column)?;
                if field.matches(FOREIGN_SEPARATOR).count() != 1 {
                    return Err(StorageError::InvalidBinding(format!(
                        "foreign field `{field}` must dereference exactly one relation"
                    )));
                }
            }
        }
        Ok(())
    }

    /// `SELECT` over the table with one `LEFT JOIN` per foreign column.
    ///
    /// Output columns: `id`, then per binding either the plain value or the
    /// foreign id followed by the referenced natural key.
    pub(crate) fn select_sql(&self) -> String {
        let mut outputs = vec!["t.id".to_string()];
        let mut joins = String::new();
        for (i, column) in self.columns.iter().enumerate() {
            match column {
                ColumnBinding::Plain { column, .. } => outputs.push(format!("t.{column}")),
                ColumnBinding::Foreign {
                    column,
                    table,
                    key_column,
                    ..
                } => {
                    outputs.push(format!("t.{column}"));
                    outputs.push(format!("j{i}.{key_column}"));
                    joins.push_str(&format!(" LEFT JOIN {table} j{i} ON j{i}.id = t.{column}"));
                }
            }
        }
        format!(
            "SELECT {} FROM {} t{} ORDER BY t.id",
            outputs.join(", "),
            self.table,
            joins
        )
    }
}

fn check_ident(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidBinding(format!(
            "`{name}` is not a valid SQL identifier"
        )))
    }
}

//! Name/value rows and row mapping.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use serde::Serialize;
use std::collections::HashMap;

/// The raw shape of a query result: column names (taken once from the
/// statement description) and positional values per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Map every row into a [`Row`] keyed by column name.
    ///
    /// Every column is included, the last one too. A row whose arity differs
    /// from the column list is a decode error.
    pub fn into_rows(self) -> OrmResult<Vec<Row>> {
        let Self { columns, rows } = self;
        rows.into_iter()
            .map(|values| Row::from_parts(&columns, values))
            .collect()
    }

    /// First column of the first row, if any.
    pub fn into_scalar(self) -> Option<Value> {
        self.rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
    }
}

/// One result record: column name to [`Value`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    fields: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(columns: &[String], values: Vec<Value>) -> OrmResult<Self> {
        if columns.len() != values.len() {
            return Err(OrmError::decode(
                columns.last().map_or("<none>", String::as_str),
                format!(
                    "row has {} value(s) for {} column(s)",
                    values.len(),
                    columns.len()
                ),
            ));
        }
        let fields = columns.iter().cloned().zip(values).collect();
        Ok(Self { fields })
    }

    /// Set a column value, returning the builder.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Typed access, returning `OrmError::Decode` on a missing column or a
    /// kind mismatch.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .fields
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column not present in row"))?;
        T::from_value(value).map_err(|e| match e {
            OrmError::Decode { message, .. } => OrmError::decode(column, message),
            other => OrmError::decode(column, other.to_string()),
        })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_map(self) -> HashMap<String, Value> {
        self.fields
    }
}

impl From<HashMap<String, Value>> for Row {
    fn from(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }
}

/// Trait for converting a [`Row`] into a domain record.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

// Parser module: the dump tokenizer (tuples + scalars), the INSERT router
// and CREATE TABLE column discovery.

pub mod insert;
pub mod lexer;
pub mod schema;
pub mod tuple;

use crate::error::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

/// Ordered column names of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(Error::EmptySchema(name));
        }
        Ok(Self { name, columns })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// One field of a tuple. Unquoted literals (numbers, keywords) stay as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Text(String),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Text(s) => Some(s),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

/// A tuple zipped against its table's columns.
///
/// Only constructible when the value count equals the column count; anything
/// else is a parse artifact and never becomes a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<TableSchema>,
    values: Vec<ScalarValue>,
}

impl Record {
    pub fn new(schema: Arc<TableSchema>, values: Vec<ScalarValue>) -> Option<Self> {
        if values.len() != schema.len() {
            return None;
        }
        Some(Self { schema, values })
    }

    pub fn table(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<ScalarValue> {
        self.values
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.schema.column_index(column).map(|i| &self.values[i])
    }

    /// Text value of a column; `None` for Null or a missing column.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(ScalarValue::as_text)
    }

    /// (column, value) pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

// Serialized as a JSON object whose keys follow column order, so repeated runs
// produce byte-identical lines.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

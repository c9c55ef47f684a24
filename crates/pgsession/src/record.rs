//! Decoded result rows.

use crate::value::{DataMap, Value};
use serde::{Deserialize, Serialize};

/// How the cursor decodes rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowShape {
    /// Name-addressable rows, columns kept in result order.
    #[default]
    Named,
    /// Index-only rows.
    Positional,
}

/// Result column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Postgres type name (e.g. `int4`, `text`).
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

impl From<&tokio_postgres::Column> for ColumnMeta {
    fn from(col: &tokio_postgres::Column) -> Self {
        Self::new(col.name(), col.type_().name())
    }
}

/// One decoded row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Named(DataMap),
    Positional(Vec<Value>),
}

impl Record {
    /// Build a record in the given shape from column metadata and row values.
    pub fn decode(shape: RowShape, columns: &[ColumnMeta], values: Vec<Value>) -> Self {
        match shape {
            RowShape::Named => Record::Named(
                columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .zip(values)
                    .collect(),
            ),
            RowShape::Positional => Record::Positional(values),
        }
    }

    /// Look up a column by name. Always `None` for positional rows.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            Record::Named(map) => map.get(column),
            Record::Positional(_) => None,
        }
    }

    /// Look up a column by position.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        match self {
            Record::Named(map) => map.values().nth(idx),
            Record::Positional(values) => values.get(idx),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Record::Named(map) => map.len(),
            Record::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_map(&self) -> Option<&DataMap> {
        match self {
            Record::Named(map) => Some(map),
            Record::Positional(_) => None,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Record::Named(map) => map.into_values(),
            Record::Positional(values) => values,
        }
    }

    /// True when every column of `data` is present in this record with an equal value.
    pub fn matches(&self, data: &DataMap) -> bool {
        data.iter().all(|(k, v)| self.get(k) == Some(v))
    }
}

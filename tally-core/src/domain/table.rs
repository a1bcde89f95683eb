//! Raw tabular data as produced by the CSV reader

use std::collections::HashMap;

/// One data row: column name -> raw text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    values: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Value of an optional column; `None` when no column is configured or
    /// the row does not have it
    pub fn get_opt(&self, column: Option<&str>) -> Option<&str> {
        column.and_then(|c| self.get(c))
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }
}

/// Ordered rows plus the header order (used for display only)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub column_names: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(column_names: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { column_names, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::types::RowValues;

/// A row mapping returned by `next` / `results`.
///
/// Column names are shared by every row of the same execution; equality compares names and
/// values in column order.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows of one execution)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

impl DbRow {
    /// Create a row from shared column names and its values.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            values,
            column_index,
        }
    }

    /// Create a row reusing a column index built by [`DbRow::index_for`].
    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    pub(crate) fn index_for(column_names: &[String]) -> Arc<HashMap<String, usize>> {
        Arc::new(index_columns(column_names))
    }

    /// Build a row from `(column, value)` pairs.
    #[must_use]
    pub fn from_pairs<K: Into<String>, V: Into<RowValues>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let (names, values): (Vec<String>, Vec<RowValues>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).unzip();
        Self::new(Arc::new(names), values)
    }

    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column/value pairs in column order.
    pub fn to_pairs(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Render the row as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .to_pairs()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl PartialEq for DbRow {
    fn eq(&self, other: &Self) -> bool {
        self.column_names == other.column_names && self.values == other.values
    }
}

fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

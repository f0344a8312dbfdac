use std::collections::VecDeque;
use std::sync::Arc;

use crate::types::RowValues;

use super::row::DbRow;

/// Buffered result of one execution of a statement handle.
///
/// Rows are materialised when the statement runs and handed out in order; the count reported
/// for the execution does not change as rows are consumed.
#[derive(Debug, Clone, Default)]
pub struct ResultCursor {
    rows: VecDeque<DbRow>,
    row_count: i64,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<std::collections::HashMap<String, usize>>>,
}

impl ResultCursor {
    /// Cursor for a statement that produced rows.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>) -> Self {
        let column_index = DbRow::index_for(&column_names);
        Self {
            rows: VecDeque::new(),
            row_count: 0,
            column_names: Some(Arc::new(column_names)),
            column_index: Some(column_index),
        }
    }

    /// Cursor for a statement that only changed rows.
    #[must_use]
    pub fn affected(row_count: i64) -> Self {
        Self {
            row_count,
            ..Self::default()
        }
    }

    /// Append one row; the row count follows the number of rows produced.
    pub fn push_values(&mut self, values: Vec<RowValues>) {
        if let (Some(names), Some(index)) = (&self.column_names, &self.column_index) {
            self.rows
                .push_back(DbRow::with_index(Arc::clone(names), Arc::clone(index), values));
            self.row_count += 1;
        }
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Rows returned or affected by the execution.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Rows not yet fetched.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn fetch_next(&mut self) -> Option<DbRow> {
        self.rows.pop_front()
    }

    /// Drain every row not yet fetched.
    pub fn fetch_all(&mut self) -> Vec<DbRow> {
        self.rows.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_all_returns_rows_after_next() {
        let mut cursor = ResultCursor::with_columns(vec!["v".into()]);
        for i in 1..=3 {
            cursor.push_values(vec![RowValues::Int(i)]);
        }
        assert_eq!(cursor.row_count(), 3);
        let first = cursor.fetch_next().map(|r| r.values);
        assert_eq!(first, Some(vec![RowValues::Int(1)]));
        let rest: Vec<_> = cursor.fetch_all().into_iter().map(|r| r.values).collect();
        assert_eq!(rest, vec![vec![RowValues::Int(2)], vec![RowValues::Int(3)]]);
        assert!(cursor.fetch_next().is_none());
        assert_eq!(cursor.row_count(), 3);
    }

    #[test]
    fn affected_cursor_has_no_rows() {
        let mut cursor = ResultCursor::affected(4);
        assert_eq!(cursor.row_count(), 4);
        assert!(cursor.fetch_all().is_empty());
    }
}

use rusqlite::Connection;
use rusqlite::types::Value;

use crate::error::DriverError;
use crate::results::ResultCursor;
use crate::types::{BoundParam, RowValues};

use super::params::bound_to_sqlite_value;

/// Extract a `RowValues` from a `SQLite` row.
///
/// Integers in columns declared `BOOL`/`BOOLEAN` come back as `Bool`.
///
/// # Errors
/// Returns `DriverError` if the value cannot be read.
pub fn sqlite_extract_value(
    row: &rusqlite::Row,
    idx: usize,
    decl_type: Option<&str>,
) -> Result<RowValues, DriverError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) if is_bool_decl(decl_type) => RowValues::Bool(i != 0),
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

fn is_bool_decl(decl_type: Option<&str>) -> bool {
    decl_type.is_some_and(|t| t.eq_ignore_ascii_case("bool") || t.eq_ignore_ascii_case("boolean"))
}

/// Run `sql` as a cached prepared statement with `bindings` and buffer what it produced.
///
/// Statements with result columns report the number of rows returned; others report the rows
/// they changed.
///
/// # Errors
/// Returns `DriverError` if preparation, binding or stepping fails, or if a binding names a
/// parameter the statement does not declare.
pub fn run_statement(
    conn: &Connection,
    sql: &str,
    bindings: &[BoundParam],
) -> Result<ResultCursor, DriverError> {
    let mut stmt = conn.prepare_cached(sql)?;
    for param in bindings {
        let idx = stmt
            .parameter_index(&param.name)?
            .ok_or_else(|| DriverError::undefined_parameter(&param.name))?;
        stmt.raw_bind_parameter(idx, bound_to_sqlite_value(param))?;
    }

    if stmt.column_count() == 0 {
        let before = conn.total_changes();
        stmt.raw_execute()?;
        let changed = conn.total_changes().saturating_sub(before);
        return Ok(ResultCursor::affected(
            i64::try_from(changed).unwrap_or(i64::MAX),
        ));
    }

    let decl_types: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|col| col.decl_type().map(str::to_string))
        .collect();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();

    let mut cursor = ResultCursor::with_columns(column_names);
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(decl_types.len());
        for (idx, decl_type) in decl_types.iter().enumerate() {
            values.push(sqlite_extract_value(row, idx, decl_type.as_deref())?);
        }
        cursor.push_values(values);
    }
    Ok(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, str_field TEXT, bool_field BOOLEAN, int_field INTEGER);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn inserts_report_changes_and_selects_report_rows() {
        let conn = conn();
        let insert = "INSERT INTO t (str_field, bool_field) VALUES (:s, :b)";
        let cursor = run_statement(
            &conn,
            insert,
            &[
                BoundParam::new("s", "a".into()),
                BoundParam::new("b", true.into()),
            ],
        )
        .unwrap();
        assert_eq!(cursor.row_count(), 1);

        let mut cursor = run_statement(&conn, "SELECT str_field, bool_field FROM t", &[]).unwrap();
        assert_eq!(cursor.row_count(), 1);
        let row = cursor.fetch_next().unwrap();
        assert_eq!(row.get("str_field"), Some(&RowValues::Text("a".into())));
        assert_eq!(row.get("bool_field"), Some(&RowValues::Bool(true)));
    }

    #[test]
    fn ddl_reports_zero_changes() {
        let conn = conn();
        run_statement(&conn, "INSERT INTO t (int_field) VALUES (1)", &[]).unwrap();
        let cursor = run_statement(&conn, "CREATE TABLE u (x INTEGER)", &[]).unwrap();
        assert_eq!(cursor.row_count(), 0);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let conn = conn();
        let err = run_statement(
            &conn,
            "SELECT * FROM t WHERE id = :id",
            &[BoundParam::new("nope", 1.into())],
        )
        .unwrap_err();
        assert_eq!(err.info.sqlstate, "HY093");
    }
}

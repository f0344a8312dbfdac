use rusqlite::types::Value;

use crate::types::{BoundParam, ParamType, RowValues};

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert a bound parameter honouring its storage type.
///
/// SQLite has no boolean storage class, so `Bool` is stored as INTEGER 0/1.
#[must_use]
pub fn bound_to_sqlite_value(param: &BoundParam) -> Value {
    match (param.ty, &param.value) {
        (ParamType::Null, _) => Value::Null,
        (ParamType::Bool, RowValues::Bool(b)) => Value::Integer(i64::from(*b)),
        (_, value) => row_value_to_sqlite_value(value),
    }
}

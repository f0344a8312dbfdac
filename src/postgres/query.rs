use std::error::Error;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Statement;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

use crate::error::DriverError;
use crate::results::ResultCursor;
use crate::types::RowValues;

type DecodeError = Box<dyn Error + Sync + Send>;

/// One decoded column value.
///
/// Accepts every column type: the mapped ones become their natural `RowValues`, `numeric`,
/// `uuid`, `time`, `interval` and network addresses render as text, arrays become JSON arrays,
/// and anything else is read as text when its wire form is UTF-8 or as a blob otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PgCell(pub RowValues);

impl<'a> FromSql<'a> for PgCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        let value = match *ty {
            Type::INT2 => RowValues::Int(i64::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => RowValues::Int(i64::from(i32::from_sql(ty, raw)?)),
            Type::INT8 => RowValues::Int(i64::from_sql(ty, raw)?),
            Type::OID => RowValues::Int(i64::from(u32::from_sql(ty, raw)?)),
            Type::CHAR => RowValues::Int(i64::from(i8::from_sql(ty, raw)?)),
            Type::FLOAT4 => RowValues::Float(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => RowValues::Float(f64::from_sql(ty, raw)?),
            Type::BOOL => RowValues::Bool(bool::from_sql(ty, raw)?),
            Type::TIMESTAMP => RowValues::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => {
                RowValues::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc())
            }
            Type::DATE => {
                RowValues::Timestamp(NaiveDateTime::from(NaiveDate::from_sql(ty, raw)?))
            }
            Type::TIME => RowValues::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::INTERVAL => RowValues::Text(interval_text(raw)?),
            Type::NUMERIC => RowValues::Text(Decimal::from_sql(ty, raw)?.to_string()),
            Type::UUID => RowValues::Text(Uuid::from_sql(ty, raw)?.to_string()),
            Type::INET | Type::CIDR => RowValues::Text(inet_text(ty, raw)?),
            Type::JSON | Type::JSONB => RowValues::JSON(Value::from_sql(ty, raw)?),
            Type::BYTEA => RowValues::Blob(Vec::<u8>::from_sql(ty, raw)?),
            _ if <String as FromSql>::accepts(ty) => RowValues::Text(String::from_sql(ty, raw)?),
            _ => match ty.kind() {
                Kind::Array(_) => RowValues::JSON(Value::Array(
                    Vec::<PgCell>::from_sql(ty, raw)?
                        .iter()
                        .map(|cell| cell.0.to_json())
                        .collect(),
                )),
                Kind::Domain(inner) => return PgCell::from_sql(inner, raw),
                _ => match std::str::from_utf8(raw) {
                    Ok(text) => RowValues::Text(text.to_string()),
                    Err(_) => RowValues::Blob(raw.to_vec()),
                },
            },
        };
        Ok(PgCell(value))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, DecodeError> {
        Ok(PgCell(RowValues::Null))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn be_bytes<const N: usize>(raw: &[u8], at: usize) -> Result<[u8; N], DecodeError> {
    raw.get(at..at + N)
        .ok_or_else(|| DecodeError::from("truncated value"))?
        .try_into()
        .map_err(DecodeError::from)
}

fn plural(n: i32, unit: &str) -> String {
    if n == 1 || n == -1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Render a binary `interval` the way the server's default output style does,
/// e.g. `1 year 2 mons 3 days 04:05:06`.
fn interval_text(raw: &[u8]) -> Result<String, DecodeError> {
    let micros = i64::from_be_bytes(be_bytes(raw, 0)?);
    let days = i32::from_be_bytes(be_bytes(raw, 8)?);
    let months = i32::from_be_bytes(be_bytes(raw, 12)?);

    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(plural(months / 12, "year"));
    }
    if months % 12 != 0 {
        parts.push(plural(months % 12, "mon"));
    }
    if days != 0 {
        parts.push(plural(days, "day"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if frac != 0 {
            clock.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    Ok(parts.join(" "))
}

/// Render a binary `inet`/`cidr` as `address[/bits]`; `inet` host addresses omit the mask.
fn inet_text(ty: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    let header: [u8; 4] = be_bytes(raw, 0)?;
    let bits = header[1];
    let addr = &raw[4..];
    let (ip, max_bits) = match addr.len() {
        4 => (IpAddr::from(be_bytes::<4>(addr, 0)?), 32),
        16 => (IpAddr::from(be_bytes::<16>(addr, 0)?), 128),
        n => return Err(format!("unexpected address length {n}").into()),
    };
    if *ty == Type::INET && bits == max_bits {
        Ok(ip.to_string())
    } else {
        Ok(format!("{ip}/{bits}"))
    }
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `DriverError` if the column cannot be decoded.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, DriverError> {
    Ok(row.try_get::<_, PgCell>(idx)?.0)
}

/// Buffer the rows of a query, naming columns from the statement metadata.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_cursor(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultCursor, DriverError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut cursor = ResultCursor::with_columns(column_names);
    for row in rows {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(postgres_extract_value(row, idx)?);
        }
        cursor.push_values(values);
    }
    Ok(cursor)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn interval(micros: i64, days: i32, months: i32) -> Vec<u8> {
        let mut raw = micros.to_be_bytes().to_vec();
        raw.extend_from_slice(&days.to_be_bytes());
        raw.extend_from_slice(&months.to_be_bytes());
        raw
    }

    #[test]
    fn intervals_render_like_the_server() {
        let raw = interval(4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000, 3, 14);
        assert_eq!(interval_text(&raw).unwrap(), "1 year 2 mons 3 days 04:05:06");
        assert_eq!(interval_text(&interval(0, 1, 0)).unwrap(), "1 day");
        assert_eq!(interval_text(&interval(0, 0, 0)).unwrap(), "00:00:00");
        assert_eq!(interval_text(&interval(-1_500_000, 0, 0)).unwrap(), "-00:00:01.5");
        assert!(interval_text(&[0, 1]).is_err());
    }

    #[test]
    fn network_addresses_keep_their_mask() {
        let host = [2u8, 32, 0, 4, 10, 0, 0, 1];
        assert_eq!(inet_text(&Type::INET, &host).unwrap(), "10.0.0.1");
        let net = [2u8, 24, 1, 4, 10, 0, 0, 0];
        assert_eq!(inet_text(&Type::CIDR, &net).unwrap(), "10.0.0.0/24");
    }

    #[test]
    fn unmapped_types_decode_without_failing() {
        let numeric = Decimal::new(150, 2);
        let mut raw = tokio_util::bytes::BytesMut::new();
        tokio_postgres::types::ToSql::to_sql(&numeric, &Type::NUMERIC, &mut raw).unwrap();
        assert_eq!(
            PgCell::from_sql(&Type::NUMERIC, &raw).unwrap(),
            PgCell(RowValues::Text("1.50".into()))
        );

        let id = Uuid::from_u128(0x1234);
        assert_eq!(
            PgCell::from_sql(&Type::UUID, id.as_bytes()).unwrap(),
            PgCell(RowValues::Text(id.to_string()))
        );

        assert_eq!(
            PgCell::from_sql(&Type::UNKNOWN, b"label").unwrap(),
            PgCell(RowValues::Text("label".into()))
        );
        assert_eq!(
            PgCell::from_sql(&Type::TS_VECTOR, &[0xff, 0xfe]).unwrap(),
            PgCell(RowValues::Blob(vec![0xff, 0xfe]))
        );
        assert_eq!(PgCell::from_sql_null(&Type::INT4).unwrap(), PgCell(RowValues::Null));
    }
}

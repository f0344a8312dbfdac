use std::error::Error;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;
use uuid::Uuid;

use crate::types::RowValues;

type EncodeResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// A bound value encoded against the parameter type the server inferred for its placeholder.
///
/// Numbers are narrowed or widened to the column's numeric width (`numeric` included), text is
/// parsed for typed placeholders, and any scalar can be sent to a text-typed placeholder. Combinations with no faithful encoding fail the execution.
#[derive(Debug)]
pub struct PgValue<'a>(pub &'a RowValues);

fn mismatch(value: &RowValues, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot encode {value:?} as postgres type {ty}").into()
}

fn is_text(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

#[allow(clippy::cast_precision_loss)]
fn encode_int(value: i64, ty: &Type, out: &mut bytes::BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::INT8 => value.to_sql(ty, out),
        Type::OID => u32::try_from(value)?.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(value).to_sql(ty, out),
        Type::BOOL => (value != 0).to_sql(ty, out),
        _ if is_text(ty) => value.to_string().to_sql(ty, out),
        _ => Err(mismatch(&RowValues::Int(value), ty)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode_float(value: f64, ty: &Type, out: &mut bytes::BytesMut) -> EncodeResult {
    match *ty {
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => value.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(value)?.to_sql(ty, out),
        _ if is_text(ty) => value.to_string().to_sql(ty, out),
        _ => Err(mismatch(&RowValues::Float(value), ty)),
    }
}

/// Text is sent as is to text placeholders and parsed for the others, so `"007"` reaches an
/// integer column as 7 and a text column unchanged.
fn encode_text(value: &str, ty: &Type, out: &mut bytes::BytesMut) -> EncodeResult {
    let trimmed = value.trim();
    match *ty {
        _ if is_text(ty) => value.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            encode_int(trimmed.parse::<i64>()?, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => encode_float(trimmed.parse::<f64>()?, ty, out),
        Type::NUMERIC => trimmed
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(trimmed))?
            .to_sql(ty, out),
        Type::UUID => Uuid::parse_str(trimmed)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<JsonValue>(value)?.to_sql(ty, out),
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => {
            let ts = RowValues::Text(trimmed.to_string())
                .as_timestamp()
                .ok_or_else(|| mismatch(&RowValues::Text(value.to_string()), ty))?;
            PgValue(&RowValues::Timestamp(ts)).to_sql(ty, out)
        }
        Type::BOOL => match value.to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => true.to_sql(ty, out),
            "f" | "false" | "n" | "no" | "off" | "0" => false.to_sql(ty, out),
            _ => Err(mismatch(&RowValues::Text(value.to_string()), ty)),
        },
        _ => Err(mismatch(&RowValues::Text(value.to_string()), ty)),
    }
}

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> EncodeResult {
        match self.0 {
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::Int(i) => encode_int(*i, ty, out),
            RowValues::Float(f) => encode_float(*f, ty, out),
            RowValues::Text(s) => encode_text(s, ty, out),
            RowValues::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => encode_int(i64::from(*b), ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ if is_text(ty) => dt.format("%F %T%.f").to_string().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            RowValues::JSON(value) => match *ty {
                Type::JSON | Type::JSONB => value.to_sql(ty, out),
                _ if is_text(ty) => value.to_string().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            RowValues::Blob(bytes) => match *ty {
                Type::BYTEA => bytes.to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Compatibility depends on the value, so it is checked in `to_sql`.
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &RowValues, ty: &Type) -> Result<Vec<u8>, String> {
        let mut out = bytes::BytesMut::new();
        match PgValue(value).to_sql(ty, &mut out) {
            Ok(IsNull::No) => Ok(out.to_vec()),
            Ok(IsNull::Yes) => Ok(Vec::new()),
            Err(e) => Err(e.to_string()),
        }
    }

    #[test]
    fn ints_follow_column_width() {
        assert_eq!(encode(&RowValues::Int(10), &Type::INT4).unwrap(), 10i32.to_be_bytes());
        assert_eq!(encode(&RowValues::Int(10), &Type::INT8).unwrap(), 10i64.to_be_bytes());
        assert_eq!(encode(&RowValues::Int(10), &Type::INT2).unwrap(), 10i16.to_be_bytes());
        assert!(encode(&RowValues::Int(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn scalars_go_to_text_placeholders() {
        assert_eq!(encode(&RowValues::Int(7), &Type::TEXT).unwrap(), b"7");
        assert_eq!(encode(&RowValues::Bool(true), &Type::VARCHAR).unwrap(), b"true");
        assert_eq!(
            encode(&RowValues::Text("value".into()), &Type::TEXT).unwrap(),
            b"value"
        );
    }

    #[test]
    fn bools_and_nulls() {
        assert_eq!(encode(&RowValues::Bool(true), &Type::BOOL).unwrap(), [1u8]);
        assert_eq!(encode(&RowValues::Text("off".into()), &Type::BOOL).unwrap(), [0u8]);
        assert!(encode(&RowValues::Null, &Type::INT4).unwrap().is_empty());
    }

    #[test]
    fn text_is_parsed_for_typed_placeholders() {
        assert_eq!(
            encode(&RowValues::Text("007".into()), &Type::INT4).unwrap(),
            7i32.to_be_bytes()
        );
        assert_eq!(
            encode(&RowValues::Text("1.50".into()), &Type::FLOAT8).unwrap(),
            1.5f64.to_be_bytes()
        );
        assert_eq!(encode(&RowValues::Text("007".into()), &Type::TEXT).unwrap(), b"007");
    }

    #[test]
    fn numbers_and_text_encode_into_numeric() {
        let numeric = |value: Decimal| {
            let mut out = bytes::BytesMut::new();
            value.to_sql(&Type::NUMERIC, &mut out).unwrap();
            out.to_vec()
        };
        assert_eq!(
            encode(&RowValues::Int(10), &Type::NUMERIC).unwrap(),
            numeric(Decimal::from(10))
        );
        assert_eq!(
            encode(&RowValues::Text("1.50".into()), &Type::NUMERIC).unwrap(),
            numeric(Decimal::new(150, 2))
        );
        assert_eq!(
            encode(&RowValues::Text("1e3".into()), &Type::NUMERIC).unwrap(),
            numeric(Decimal::from_scientific("1e3").unwrap())
        );
        assert!(encode(&RowValues::Float(2.5), &Type::NUMERIC).is_ok());
    }

    #[test]
    fn uuid_text_encodes_as_uuid() {
        let id = Uuid::from_u128(7);
        assert_eq!(
            encode(&RowValues::Text(id.to_string()), &Type::UUID).unwrap(),
            id.as_bytes()
        );
    }

    #[test]
    fn incompatible_values_fail() {
        assert!(encode(&RowValues::Blob(vec![1]), &Type::INT4).is_err());
        assert!(encode(&RowValues::Text("abc".into()), &Type::INT4).is_err());
    }
}

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or bound as statement parameters.
///
/// The same enum is used by every backend so callers never branch on driver types:
/// ```rust
/// use sql_statement_cache::prelude::*;
///
/// let params = NamedParams::new()
///     .with("id", RowValues::Int(1))
///     .with("name", RowValues::Text("alice".into()))
///     .with("active", RowValues::Bool(true));
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Render the value as JSON (timestamps as `%F %T%.f` text, blobs as byte arrays).
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::from(s.as_str()),
            RowValues::Bool(b) => JsonValue::from(*b),
            RowValues::Timestamp(dt) => JsonValue::from(dt.format("%F %T%.f").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Storage type requested from the driver when a parameter is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamType {
    Null,
    Int,
    Bool,
    Str,
}

impl ParamType {
    /// Infer the storage type of a parameter value.
    ///
    /// The checks run in a fixed order: NULL first, then anything numeric-looking (numbers and
    /// numeric text), then booleans, and everything else binds as a string.
    #[must_use]
    pub fn infer(value: &RowValues) -> Self {
        match value {
            RowValues::Null => ParamType::Null,
            RowValues::Int(_) | RowValues::Float(_) => ParamType::Int,
            RowValues::Text(s) if is_numeric(s) => ParamType::Int,
            RowValues::Bool(_) => ParamType::Bool,
            _ => ParamType::Str,
        }
    }
}

/// Whether `s` looks like a number: optional surrounding whitespace, optional sign, digits with
/// an optional fraction and exponent.
#[must_use]
pub fn is_numeric(s: &str) -> bool {
    let s = s.trim();
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.is_none_or(all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.is_none_or(str::is_empty) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && all_digits(exp)
        }
    }
}

/// A named parameter after type inference, ready to hand to a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Placeholder name including its `:` prefix.
    pub name: String,
    pub value: RowValues,
    pub ty: ParamType,
}

impl BoundParam {
    /// Infer the type of `value` and coerce it to that type.
    ///
    /// Numeric text bound as `Int` becomes `Int` only when the text is the integer's canonical
    /// rendering, so the stored value reads back unchanged. Other numeric text (`"007"`,
    /// `"1.50"`, `"1e3"`) keeps its `Int` type but is sent as text and left to the database to
    /// convert for numeric columns.
    #[must_use]
    pub fn new(name: &str, value: RowValues) -> Self {
        let ty = ParamType::infer(&value);
        let value = match (ty, value) {
            (ParamType::Int, RowValues::Text(s)) => match s.parse::<i64>() {
                Ok(i) if i.to_string() == s => RowValues::Int(i),
                _ => RowValues::Text(s),
            },
            (_, value) => value,
        };
        Self {
            name: placeholder_name(name),
            value,
            ty,
        }
    }
}

/// Normalise a parameter name to its `:name` placeholder form.
#[must_use]
pub fn placeholder_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

/// Ordered mapping from placeholder name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams(Vec<(String, RowValues)>);

impl NamedParams {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add (or replace) a parameter. The name may be given with or without its `:` prefix.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<RowValues>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<RowValues>) {
        let value = value.into();
        let key = placeholder_name(name);
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| placeholder_name(n) == key) {
            slot.1 = value;
        } else {
            self.0.push((name.to_string(), value));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Infer and coerce every entry, preserving order.
    #[must_use]
    pub fn to_bound(&self) -> Vec<BoundParam> {
        self.0
            .iter()
            .map(|(name, value)| BoundParam::new(name, value.clone()))
            .collect()
    }
}

impl<K: AsRef<str>, V: Into<RowValues>, const N: usize> From<[(K, V); N]> for NamedParams {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<RowValues>> FromIterator<(K, V)> for NamedParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = NamedParams::new();
        for (name, value) in iter {
            params.insert(name.as_ref(), value);
        }
        params
    }
}

/// Extended error descriptor: SQLSTATE, driver-specific code and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub sqlstate: String,
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl ErrorInfo {
    /// SQLSTATE for "no error".
    pub const SUCCESS: &'static str = "00000";

    #[must_use]
    pub fn new(sqlstate: &str, code: Option<i64>, message: Option<String>) -> Self {
        Self {
            sqlstate: sqlstate.to_string(),
            code,
            message,
        }
    }

    /// Descriptor of an operation that did not fail.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Self::SUCCESS, None, None)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.sqlstate != Self::SUCCESS
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::none()
    }
}

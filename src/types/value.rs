//! Values transferred in and out of column buffers.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt;

use super::SqlNumeric;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    /// Exact numeric.
    Numeric(SqlNumeric),
    /// Character data (narrow or wide buffers).
    Text(String),
    /// Binary data.
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::SmallInt(_) => "smallint",
            Value::Integer(_) => "integer",
            Value::BigInt(_) => "bigint",
            Value::Real(_) => "real",
            Value::Double(_) => "double",
            Value::Numeric(_) => "numeric",
            Value::Text(_) => "text",
            Value::Binary(_) => "binary",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Try to convert to i64. Only integral kinds convert.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(*v as i64),
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            Value::Numeric(n) if n.scale <= 0 => {
                let whole = n.rescale(n.precision, 0)?;
                i64::try_from(whole.mantissa()).ok()
            }
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::SmallInt(v) => Some(*v as f64),
            Value::Integer(v) => Some(*v as f64),
            Value::BigInt(v) => Some(*v as f64),
            Value::Real(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Numeric(n) => Some(n.to_f64()),
            _ => None,
        }
    }

    /// Try to get the value as a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    /// Try to get the value as a timestamp.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    /// SQL comparison. NULL and incomparable kinds yield `None`.
    ///
    /// Numeric kinds compare by value across widths.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Binary(a), Value::Binary(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Date(_) | Value::Timestamp(_), Value::Date(_) | Value::Timestamp(_)) => {
                Some(self.as_timestamp()?.cmp(&other.as_timestamp()?))
            }
            _ => match (self.to_i64(), other.to_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => self.to_f64()?.partial_cmp(&other.to_f64()?),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Numeric(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Binary(b) => write!(f, "<BINARY: {} bytes>", b.len()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

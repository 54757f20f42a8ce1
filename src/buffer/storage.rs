//! Fixed storage cells behind a column buffer.
//!
//! Array kinds are allocated once with their final size (including one
//! terminator unit for character kinds) and are only ever written in place.

use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{BufferType, SqlNumeric, Value};

#[derive(Debug, Clone)]
pub(crate) enum Storage {
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Numeric(SqlNumeric),
    Char(BytesMut),
    WChar(Vec<u16>),
    Binary(BytesMut),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Storage {
    /// Allocate zeroed storage; `units` is the column size for array kinds.
    pub(crate) fn allocate(buffer_type: BufferType, units: usize) -> Self {
        match buffer_type {
            BufferType::SmallInt => Storage::SmallInt(0),
            BufferType::Integer => Storage::Integer(0),
            BufferType::BigInt => Storage::BigInt(0),
            BufferType::Real => Storage::Real(0.0),
            BufferType::Double => Storage::Double(0.0),
            BufferType::Numeric => Storage::Numeric(SqlNumeric::default()),
            BufferType::Char => Storage::Char(BytesMut::zeroed(units + 1)),
            BufferType::WChar => Storage::WChar(vec![0; units + 1]),
            BufferType::Binary => Storage::Binary(BytesMut::zeroed(units)),
            BufferType::Date => Storage::Date(NaiveDate::default()),
            BufferType::Time => Storage::Time(NaiveTime::default()),
            BufferType::Timestamp => Storage::Timestamp(NaiveDateTime::default()),
        }
    }

    pub(crate) fn buffer_type(&self) -> BufferType {
        match self {
            Storage::SmallInt(_) => BufferType::SmallInt,
            Storage::Integer(_) => BufferType::Integer,
            Storage::BigInt(_) => BufferType::BigInt,
            Storage::Real(_) => BufferType::Real,
            Storage::Double(_) => BufferType::Double,
            Storage::Numeric(_) => BufferType::Numeric,
            Storage::Char(_) => BufferType::Char,
            Storage::WChar(_) => BufferType::WChar,
            Storage::Binary(_) => BufferType::Binary,
            Storage::Date(_) => BufferType::Date,
            Storage::Time(_) => BufferType::Time,
            Storage::Timestamp(_) => BufferType::Timestamp,
        }
    }

    /// Size of the storage in bytes.
    pub(crate) fn byte_size(&self) -> usize {
        match self {
            Storage::Char(b) | Storage::Binary(b) => b.len(),
            Storage::WChar(w) => w.len() * 2,
            other => other.buffer_type().element_size(),
        }
    }

    /// Address of the first byte; stable for the lifetime of the buffer.
    pub(crate) fn as_ptr(&self) -> *const u8 {
        match self {
            Storage::SmallInt(v) => v as *const i16 as *const u8,
            Storage::Integer(v) => v as *const i32 as *const u8,
            Storage::BigInt(v) => v as *const i64 as *const u8,
            Storage::Real(v) => v as *const f32 as *const u8,
            Storage::Double(v) => v as *const f64 as *const u8,
            Storage::Numeric(v) => v as *const SqlNumeric as *const u8,
            Storage::Char(b) | Storage::Binary(b) => b.as_ptr(),
            Storage::WChar(w) => w.as_ptr() as *const u8,
            Storage::Date(v) => v as *const NaiveDate as *const u8,
            Storage::Time(v) => v as *const NaiveTime as *const u8,
            Storage::Timestamp(v) => v as *const NaiveDateTime as *const u8,
        }
    }

    /// Write a value already converted to this storage kind.
    ///
    /// Returns the new length indicator, or `None` if the kinds differ.
    /// Capacity must have been checked by the caller.
    pub(crate) fn write(&mut self, value: Value) -> Option<i64> {
        let indicator = match (self, value) {
            (Storage::SmallInt(cell), Value::SmallInt(v)) => {
                *cell = v;
                2
            }
            (Storage::Integer(cell), Value::Integer(v)) => {
                *cell = v;
                4
            }
            (Storage::BigInt(cell), Value::BigInt(v)) => {
                *cell = v;
                8
            }
            (Storage::Real(cell), Value::Real(v)) => {
                *cell = v;
                4
            }
            (Storage::Double(cell), Value::Double(v)) => {
                *cell = v;
                8
            }
            (Storage::Numeric(cell), Value::Numeric(v)) => {
                *cell = v;
                BufferType::Numeric.element_size() as i64
            }
            (Storage::Char(b), Value::Text(s)) => {
                let bytes = s.as_bytes();
                b[..bytes.len()].copy_from_slice(bytes);
                b[bytes.len()] = 0;
                bytes.len() as i64
            }
            (Storage::WChar(w), Value::Text(s)) => {
                let mut len = 0;
                for (slot, unit) in w.iter_mut().zip(s.encode_utf16()) {
                    *slot = unit;
                    len += 1;
                }
                w[len] = 0;
                (len * 2) as i64
            }
            (Storage::Binary(b), Value::Binary(v)) => {
                b[..v.len()].copy_from_slice(&v);
                v.len() as i64
            }
            (Storage::Date(cell), Value::Date(v)) => {
                *cell = v;
                6
            }
            (Storage::Time(cell), Value::Time(v)) => {
                *cell = v;
                6
            }
            (Storage::Timestamp(cell), Value::Timestamp(v)) => {
                *cell = v;
                16
            }
            _ => return None,
        };
        Some(indicator)
    }

    /// Read the value given a non-null length indicator.
    pub(crate) fn read(&self, indicator: i64, nts: bool) -> Value {
        match self {
            Storage::SmallInt(v) => Value::SmallInt(*v),
            Storage::Integer(v) => Value::Integer(*v),
            Storage::BigInt(v) => Value::BigInt(*v),
            Storage::Real(v) => Value::Real(*v),
            Storage::Double(v) => Value::Double(*v),
            Storage::Numeric(v) => Value::Numeric(*v),
            Storage::Char(b) => {
                let data = &b[..b.len() - 1];
                let len = if nts {
                    data.iter().position(|&c| c == 0).unwrap_or(data.len())
                } else {
                    (indicator.max(0) as usize).min(data.len())
                };
                Value::Text(String::from_utf8_lossy(&data[..len]).into_owned())
            }
            Storage::WChar(w) => {
                let data = &w[..w.len() - 1];
                let len = if nts {
                    data.iter().position(|&c| c == 0).unwrap_or(data.len())
                } else {
                    (indicator.max(0) as usize / 2).min(data.len())
                };
                Value::Text(String::from_utf16_lossy(&data[..len]))
            }
            Storage::Binary(b) => {
                let len = (indicator.max(0) as usize).min(b.len());
                Value::Binary(b[..len].to_vec())
            }
            Storage::Date(v) => Value::Date(*v),
            Storage::Time(v) => Value::Time(*v),
            Storage::Timestamp(v) => Value::Timestamp(*v),
        }
    }
}

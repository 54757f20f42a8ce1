//! Column buffers: one typed storage cell plus its length/null indicator.
//!
//! A buffer is shared between the application, the table that registered it
//! and every statement it is bound to through a [`ColumnBufferPtr`]. Binding
//! never copies: a fetch writes straight into the cell the application reads,
//! and executing a prepared statement reads the cell the application wrote.

mod storage;

use std::cell::RefCell;
use std::rc::Rc;

use crate::constants::{SQL_NTS, SQL_NULL_DATA};
use crate::error::{Error, Result};
use crate::flags::ColumnFlags;
use crate::types::{BufferType, ColumnInfo, Sql2BufferTypeMap, SqlNumeric, Value};

use storage::Storage;

/// Shared handle to a column buffer.
pub type ColumnBufferPtr = Rc<RefCell<ColumnBuffer>>;

/// Storage and metadata of one column.
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    query_name: String,
    sql_type: i16,
    column_size: usize,
    decimal_digits: i16,
    flags: ColumnFlags,
    indicator: i64,
    storage: Storage,
}

impl ColumnBuffer {
    /// Create a buffer of `buffer_type`.
    ///
    /// Array kinds are sized from `column_size` (characters or bytes) and
    /// reserve one extra terminator unit for character data. New buffers are
    /// NULL.
    pub fn new(
        buffer_type: BufferType,
        query_name: impl Into<String>,
        sql_type: i16,
        column_size: usize,
        decimal_digits: i16,
        flags: ColumnFlags,
    ) -> Result<Self> {
        let query_name = query_name.into();
        if buffer_type.is_array() && column_size == 0 {
            return Err(Error::illegal_argument(format!(
                "Column '{}' of type {} needs a column size",
                query_name, buffer_type
            )));
        }
        Ok(Self {
            query_name,
            sql_type,
            column_size,
            decimal_digits,
            flags,
            indicator: SQL_NULL_DATA,
            storage: Storage::allocate(buffer_type, column_size),
        })
    }

    /// Create a buffer for a catalog column using `type_map`.
    ///
    /// Fails with `NotSupported` if the map has no buffer type for the
    /// column's SQL type. Catalog nullability adds `NULLABLE` to `flags`.
    pub fn for_column(
        info: &ColumnInfo,
        type_map: &dyn Sql2BufferTypeMap,
        flags: ColumnFlags,
    ) -> Result<Self> {
        let buffer_type = type_map
            .buffer_type(info.sql_type)
            .ok_or_else(|| Error::NotSupported {
                sql_type: info.sql_type,
                column: info.column_name.clone(),
            })?;
        Self::with_buffer_type(info, buffer_type, flags)
    }

    /// Create a buffer for a catalog column with an already resolved buffer type.
    pub fn with_buffer_type(
        info: &ColumnInfo,
        buffer_type: BufferType,
        mut flags: ColumnFlags,
    ) -> Result<Self> {
        if info.nullable.allows_null() {
            flags |= ColumnFlags::NULLABLE;
        }
        Self::new(
            buffer_type,
            info.query_name(),
            info.sql_type,
            info.column_size,
            info.decimal_digits,
            flags,
        )
    }

    /// Wrap into a shared handle.
    pub fn into_ptr(self) -> ColumnBufferPtr {
        Rc::new(RefCell::new(self))
    }

    /// Name used for this column inside generated SQL.
    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn sql_type(&self) -> i16 {
        self.sql_type
    }

    pub fn buffer_type(&self) -> BufferType {
        self.storage.buffer_type()
    }

    /// C data type code used when binding.
    pub fn c_type(&self) -> i16 {
        self.buffer_type().c_type()
    }

    pub fn column_size(&self) -> usize {
        self.column_size
    }

    pub fn decimal_digits(&self) -> i16 {
        self.decimal_digits
    }

    /// Size of the storage in bytes, terminator included.
    pub fn buffer_size(&self) -> usize {
        self.storage.byte_size()
    }

    /// Address of the storage. Stays the same for the lifetime of the buffer.
    pub fn data_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: ColumnFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_primary_key(&self) -> bool {
        self.has_flag(ColumnFlags::PRIMARY_KEY)
    }

    /// Flags change only through the owning table, which refuses while open.
    pub(crate) fn set_flags(&mut self, flags: ColumnFlags) {
        self.flags = flags;
    }

    pub fn length_indicator(&self) -> i64 {
        self.indicator
    }

    /// Set the length indicator: a byte length, `SQL_NULL_DATA` or `SQL_NTS`.
    pub fn set_length_indicator(&mut self, indicator: i64) -> Result<()> {
        if indicator < 0 && indicator != SQL_NULL_DATA && indicator != SQL_NTS {
            return Err(Error::illegal_argument(format!(
                "Invalid length indicator {} for column '{}'",
                indicator, self.query_name
            )));
        }
        if indicator > self.data_capacity_bytes() as i64 {
            return Err(Error::ValueTooLong {
                column: self.query_name.clone(),
                len: indicator as usize,
                capacity: self.data_capacity_bytes(),
            });
        }
        self.indicator = indicator;
        Ok(())
    }

    pub fn set_null(&mut self) {
        self.indicator = SQL_NULL_DATA;
    }

    pub fn is_null(&self) -> bool {
        self.indicator == SQL_NULL_DATA
    }

    /// Mark the character data as null terminated.
    pub fn set_nts(&mut self) {
        self.indicator = SQL_NTS;
    }

    /// Current value; `Value::Null` if the indicator says NULL.
    pub fn value(&self) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        self.storage.read(self.indicator, self.indicator == SQL_NTS)
    }

    /// Write `value` into the storage and update the indicator.
    ///
    /// Integral values convert between widths when they fit, integral and
    /// floating values convert to doubles and numerics, and numerics are
    /// rescaled to the column's decimal digits. Character and binary values
    /// must fit the capacity fixed at construction.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            self.set_null();
            return Ok(());
        }
        let converted = self.convert(value)?;
        let found = converted.kind();
        match self.storage.write(converted) {
            Some(indicator) => {
                self.indicator = indicator;
                Ok(())
            }
            None => Err(self.mismatch(found)),
        }
    }

    fn mismatch(&self, found: impl Into<String>) -> Error {
        Error::TypeMismatch {
            column: self.query_name.clone(),
            expected: self.buffer_type().to_string(),
            found: found.into(),
        }
    }

    fn data_capacity_bytes(&self) -> usize {
        let buffer_type = self.buffer_type();
        if buffer_type.is_array() {
            self.column_size * buffer_type.element_size()
        } else {
            buffer_type.element_size()
        }
    }

    fn check_capacity(&self, units: usize) -> Result<()> {
        if units > self.column_size {
            return Err(Error::ValueTooLong {
                column: self.query_name.clone(),
                len: units,
                capacity: self.column_size,
            });
        }
        Ok(())
    }

    fn convert(&self, value: Value) -> Result<Value> {
        let out_of_range = |value: &Value| self.mismatch(format!("out of range {} {}", value.kind(), value));
        let integral = |value: &Value| value.to_i64().ok_or_else(|| self.mismatch(value.kind()));
        let floating = |value: &Value| value.to_f64().ok_or_else(|| self.mismatch(value.kind()));

        let converted = match self.buffer_type() {
            BufferType::SmallInt => {
                let v = integral(&value)?;
                Value::SmallInt(i16::try_from(v).map_err(|_| out_of_range(&value))?)
            }
            BufferType::Integer => {
                let v = integral(&value)?;
                Value::Integer(i32::try_from(v).map_err(|_| out_of_range(&value))?)
            }
            BufferType::BigInt => Value::BigInt(integral(&value)?),
            BufferType::Real => Value::Real(floating(&value)? as f32),
            BufferType::Double => Value::Double(floating(&value)?),
            BufferType::Numeric => {
                let precision = self.column_size.clamp(1, 38) as u8;
                let scale = self.decimal_digits as i8;
                let numeric = match &value {
                    Value::Numeric(n) => n.rescale(precision, scale),
                    other => match other.to_i64() {
                        Some(i) => SqlNumeric::from_mantissa(i as i128, precision, 0)
                            .rescale(precision, scale),
                        None => {
                            let scaled = (floating(other)? * 10f64.powi(scale as i32)).round();
                            if !scaled.is_finite() || scaled.abs() >= i128::MAX as f64 {
                                return Err(out_of_range(&value));
                            }
                            Some(SqlNumeric::from_mantissa(scaled as i128, precision, scale))
                        }
                    },
                }
                .ok_or_else(|| out_of_range(&value))?;
                if numeric.digits() > precision as u32 {
                    return Err(Error::ValueTooLong {
                        column: self.query_name.clone(),
                        len: numeric.digits() as usize,
                        capacity: precision as usize,
                    });
                }
                Value::Numeric(numeric)
            }
            BufferType::Char => match value {
                Value::Text(s) => {
                    self.check_capacity(s.len())?;
                    Value::Text(s)
                }
                other => return Err(self.mismatch(other.kind())),
            },
            BufferType::WChar => match value {
                Value::Text(s) => {
                    self.check_capacity(s.encode_utf16().count())?;
                    Value::Text(s)
                }
                other => return Err(self.mismatch(other.kind())),
            },
            BufferType::Binary => match value {
                Value::Binary(b) => {
                    self.check_capacity(b.len())?;
                    Value::Binary(b)
                }
                other => return Err(self.mismatch(other.kind())),
            },
            BufferType::Date => Value::Date(
                value
                    .as_date()
                    .ok_or_else(|| self.mismatch(value.kind()))?,
            ),
            BufferType::Time => match value {
                Value::Time(t) => Value::Time(t),
                Value::Timestamp(ts) => Value::Time(ts.time()),
                other => return Err(self.mismatch(other.kind())),
            },
            BufferType::Timestamp => Value::Timestamp(
                value
                    .as_timestamp()
                    .ok_or_else(|| self.mismatch(value.kind()))?,
            ),
        };
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::types::{DefaultSql2BufferMap, Nullability};
    use chrono::NaiveDate;

    fn varchar(size: usize) -> ColumnBuffer {
        ColumnBuffer::new(BufferType::Char, "NAME", SQL_VARCHAR, size, 0, ColumnFlags::SELECT).unwrap()
    }

    #[test]
    fn test_new_buffer_is_null() {
        let buffer = varchar(10);
        assert!(buffer.is_null());
        assert_eq!(buffer.value(), Value::Null);
        assert_eq!(buffer.buffer_size(), 11);
        assert_eq!(buffer.c_type(), SQL_C_CHAR);
    }

    #[test]
    fn test_null_round_trip() {
        let mut buffer = varchar(10);
        buffer.set_value(Value::from("abc")).unwrap();
        assert!(!buffer.is_null());
        buffer.set_null();
        assert!(buffer.is_null());
        buffer.set_length_indicator(2).unwrap();
        assert!(!buffer.is_null());
        assert_eq!(buffer.value(), Value::from("ab"));
    }

    #[test]
    fn test_nts_reads_up_to_terminator() {
        let mut buffer = varchar(10);
        buffer.set_value(Value::from("hello")).unwrap();
        buffer.set_nts();
        assert_eq!(buffer.length_indicator(), SQL_NTS);
        assert_eq!(buffer.value(), Value::from("hello"));
    }

    #[test]
    fn test_char_capacity_is_fixed() {
        let mut buffer = varchar(4);
        let ptr = buffer.data_ptr();
        buffer.set_value(Value::from("abcd")).unwrap();
        assert_eq!(buffer.length_indicator(), 4);
        let err = buffer.set_value(Value::from("abcde")).unwrap_err();
        assert!(matches!(err, Error::ValueTooLong { len: 5, capacity: 4, .. }));
        assert_eq!(buffer.data_ptr(), ptr);
        assert_eq!(buffer.value(), Value::from("abcd"));
    }

    #[test]
    fn test_wchar_indicator_counts_bytes() {
        let mut buffer =
            ColumnBuffer::new(BufferType::WChar, "W", SQL_WVARCHAR, 5, 0, ColumnFlags::empty()).unwrap();
        assert_eq!(buffer.buffer_size(), 12);
        buffer.set_value(Value::from("héllo")).unwrap();
        assert_eq!(buffer.length_indicator(), 10);
        assert_eq!(buffer.value(), Value::from("héllo"));
    }

    #[test]
    fn test_integral_conversions() {
        let mut buffer =
            ColumnBuffer::new(BufferType::SmallInt, "S", SQL_SMALLINT, 0, 0, ColumnFlags::empty()).unwrap();
        buffer.set_value(Value::BigInt(12)).unwrap();
        assert_eq!(buffer.value(), Value::SmallInt(12));
        assert_eq!(buffer.length_indicator(), 2);
        let err = buffer.set_value(Value::BigInt(100_000)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(buffer.set_value(Value::from("12")).is_err());
    }

    #[test]
    fn test_numeric_rescales_to_decimal_digits() {
        let mut buffer =
            ColumnBuffer::new(BufferType::Numeric, "N", SQL_NUMERIC, 10, 2, ColumnFlags::empty()).unwrap();
        buffer.set_value(Value::Integer(7)).unwrap();
        assert_eq!(buffer.value().to_string(), "7.00");
        buffer.set_value(Value::Double(3.14159)).unwrap();
        assert_eq!(buffer.value().to_string(), "3.14");
    }

    #[test]
    fn test_numeric_precision_enforced() {
        let mut buffer =
            ColumnBuffer::new(BufferType::Numeric, "N", SQL_NUMERIC, 5, 2, ColumnFlags::empty()).unwrap();
        buffer.set_value(Value::Integer(999)).unwrap();
        assert_eq!(buffer.value().to_string(), "999.00");
        let err = buffer.set_value(Value::Integer(1_000_000)).unwrap_err();
        assert!(matches!(err, Error::ValueTooLong { len: 9, capacity: 5, .. }));
        assert!(buffer.set_value(Value::Double(1.0e300)).is_err());
        assert_eq!(buffer.value().to_string(), "999.00");

        let mut wide =
            ColumnBuffer::new(BufferType::Numeric, "W", SQL_NUMERIC, 38, 30, ColumnFlags::empty()).unwrap();
        let err = wide.set_value(Value::Integer(1_000_000_000)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        wide.set_value(Value::Integer(12_345_678)).unwrap();
        assert!(wide.value().to_string().starts_with("12345678."));
    }

    #[test]
    fn test_timestamp_accepts_date() {
        let mut buffer = ColumnBuffer::new(
            BufferType::Timestamp,
            "TS",
            SQL_TYPE_TIMESTAMP,
            0,
            0,
            ColumnFlags::empty(),
        )
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        buffer.set_value(Value::Date(date)).unwrap();
        assert_eq!(buffer.value().as_date(), Some(date));
    }

    #[test]
    fn test_for_column_unsupported() {
        let info = ColumnInfo::new("T", "G", SQL_GUID, 36, 0, Nullability::Nullable);
        let err = ColumnBuffer::for_column(&info, &DefaultSql2BufferMap::new(), ColumnFlags::SELECT)
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported { sql_type: SQL_GUID, .. }));
    }

    #[test]
    fn test_for_column_adds_nullable() {
        let info = ColumnInfo::new("T", "ID", SQL_INTEGER, 10, 0, Nullability::Nullable);
        let buffer =
            ColumnBuffer::for_column(&info, &DefaultSql2BufferMap::new(), ColumnFlags::SELECT).unwrap();
        assert!(buffer.has_flag(ColumnFlags::NULLABLE | ColumnFlags::SELECT));
        assert_eq!(buffer.buffer_type(), BufferType::Integer);

        let info = ColumnInfo::new("T", "ID", SQL_INTEGER, 10, 0, Nullability::NoNulls);
        let buffer =
            ColumnBuffer::for_column(&info, &DefaultSql2BufferMap::new(), ColumnFlags::SELECT).unwrap();
        assert!(!buffer.has_flag(ColumnFlags::NULLABLE));
    }

    #[test]
    fn test_invalid_indicator() {
        let mut buffer = varchar(3);
        assert!(buffer.set_length_indicator(-7).is_err());
        assert!(buffer.set_length_indicator(4).is_err());
        assert!(buffer.set_length_indicator(SQL_NTS).is_ok());
    }

    #[test]
    fn test_array_needs_size() {
        let err = ColumnBuffer::new(BufferType::Binary, "B", SQL_BINARY, 0, 0, ColumnFlags::empty())
            .unwrap_err();
        assert!(matches!(err, Error::IllegalArgument { .. }));
    }
}

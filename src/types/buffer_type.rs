//! In-memory buffer kinds and the SQL type to buffer type mapping.
//!
//! Every buffer kind corresponds to exactly one C data type code. The mapping
//! from the SQL type a database reports to the buffer kind used to hold it is
//! pluggable through [`Sql2BufferTypeMap`].

use std::collections::HashMap;
use std::fmt;

use crate::constants::*;
use crate::error::{Error, Result};

/// Storage kind of a column buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// `SQL_C_SSHORT` - 16 bit signed integer.
    SmallInt,
    /// `SQL_C_SLONG` - 32 bit signed integer.
    Integer,
    /// `SQL_C_SBIGINT` - 64 bit signed integer.
    BigInt,
    /// `SQL_C_FLOAT` - single precision float.
    Real,
    /// `SQL_C_DOUBLE` - double precision float.
    Double,
    /// `SQL_C_NUMERIC` - exact numeric struct.
    Numeric,
    /// `SQL_C_CHAR` - narrow character array.
    Char,
    /// `SQL_C_WCHAR` - UTF-16 character array.
    WChar,
    /// `SQL_C_BINARY` - byte array.
    Binary,
    /// `SQL_C_TYPE_DATE`.
    Date,
    /// `SQL_C_TYPE_TIME`.
    Time,
    /// `SQL_C_TYPE_TIMESTAMP`.
    Timestamp,
}

impl BufferType {
    /// Create from a C data type code.
    pub fn from_c_type(c_type: i16) -> Result<Self> {
        match c_type {
            SQL_C_SSHORT => Ok(BufferType::SmallInt),
            SQL_C_SLONG => Ok(BufferType::Integer),
            SQL_C_SBIGINT => Ok(BufferType::BigInt),
            SQL_C_FLOAT => Ok(BufferType::Real),
            SQL_C_DOUBLE => Ok(BufferType::Double),
            SQL_C_NUMERIC => Ok(BufferType::Numeric),
            SQL_C_CHAR => Ok(BufferType::Char),
            SQL_C_WCHAR => Ok(BufferType::WChar),
            SQL_C_BINARY => Ok(BufferType::Binary),
            SQL_C_TYPE_DATE => Ok(BufferType::Date),
            SQL_C_TYPE_TIME => Ok(BufferType::Time),
            SQL_C_TYPE_TIMESTAMP => Ok(BufferType::Timestamp),
            _ => Err(Error::illegal_argument(format!(
                "C type {} has no buffer type",
                c_type
            ))),
        }
    }

    /// The C data type code passed to the driver when binding.
    pub fn c_type(&self) -> i16 {
        match self {
            BufferType::SmallInt => SQL_C_SSHORT,
            BufferType::Integer => SQL_C_SLONG,
            BufferType::BigInt => SQL_C_SBIGINT,
            BufferType::Real => SQL_C_FLOAT,
            BufferType::Double => SQL_C_DOUBLE,
            BufferType::Numeric => SQL_C_NUMERIC,
            BufferType::Char => SQL_C_CHAR,
            BufferType::WChar => SQL_C_WCHAR,
            BufferType::Binary => SQL_C_BINARY,
            BufferType::Date => SQL_C_TYPE_DATE,
            BufferType::Time => SQL_C_TYPE_TIME,
            BufferType::Timestamp => SQL_C_TYPE_TIMESTAMP,
        }
    }

    /// Whether the buffer is an array sized from the column size.
    pub fn is_array(&self) -> bool {
        matches!(self, BufferType::Char | BufferType::WChar | BufferType::Binary)
    }

    /// Whether the buffer holds character data.
    pub fn is_character(&self) -> bool {
        matches!(self, BufferType::Char | BufferType::WChar)
    }

    /// Size in bytes of one element (the whole value for scalar kinds).
    pub fn element_size(&self) -> usize {
        match self {
            BufferType::SmallInt => 2,
            BufferType::Integer => 4,
            BufferType::BigInt => 8,
            BufferType::Real => 4,
            BufferType::Double => 8,
            BufferType::Numeric => 19,
            BufferType::Char | BufferType::Binary => 1,
            BufferType::WChar => 2,
            BufferType::Date => 6,
            BufferType::Time => 6,
            BufferType::Timestamp => 16,
        }
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferType::SmallInt => "SQL_C_SSHORT",
            BufferType::Integer => "SQL_C_SLONG",
            BufferType::BigInt => "SQL_C_SBIGINT",
            BufferType::Real => "SQL_C_FLOAT",
            BufferType::Double => "SQL_C_DOUBLE",
            BufferType::Numeric => "SQL_C_NUMERIC",
            BufferType::Char => "SQL_C_CHAR",
            BufferType::WChar => "SQL_C_WCHAR",
            BufferType::Binary => "SQL_C_BINARY",
            BufferType::Date => "SQL_C_TYPE_DATE",
            BufferType::Time => "SQL_C_TYPE_TIME",
            BufferType::Timestamp => "SQL_C_TYPE_TIMESTAMP",
        };
        write!(f, "{}", name)
    }
}

/// Maps SQL type codes reported by the database to buffer types.
///
/// Returning `None` means the SQL type cannot be held in any buffer; callers
/// decide whether that skips the column or fails.
pub trait Sql2BufferTypeMap: fmt::Debug {
    /// Buffer type used for values of `sql_type`.
    fn buffer_type(&self, sql_type: i16) -> Option<BufferType>;
}

/// Default mapping with optional per-type overrides.
#[derive(Debug, Clone, Default)]
pub struct DefaultSql2BufferMap {
    overrides: HashMap<i16, BufferType>,
}

impl DefaultSql2BufferMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the buffer type for a SQL type.
    pub fn register(&mut self, sql_type: i16, buffer_type: BufferType) {
        self.overrides.insert(sql_type, buffer_type);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_type(mut self, sql_type: i16, buffer_type: BufferType) -> Self {
        self.register(sql_type, buffer_type);
        self
    }

    fn default_buffer_type(sql_type: i16) -> Option<BufferType> {
        match sql_type {
            SQL_SMALLINT | SQL_TINYINT | SQL_BIT => Some(BufferType::SmallInt),
            SQL_INTEGER => Some(BufferType::Integer),
            SQL_BIGINT => Some(BufferType::BigInt),
            SQL_REAL => Some(BufferType::Real),
            SQL_FLOAT | SQL_DOUBLE => Some(BufferType::Double),
            SQL_NUMERIC | SQL_DECIMAL => Some(BufferType::Numeric),
            SQL_CHAR | SQL_VARCHAR | SQL_LONGVARCHAR => Some(BufferType::Char),
            SQL_WCHAR | SQL_WVARCHAR | SQL_WLONGVARCHAR => Some(BufferType::WChar),
            SQL_BINARY | SQL_VARBINARY | SQL_LONGVARBINARY => Some(BufferType::Binary),
            SQL_DATE | SQL_TYPE_DATE => Some(BufferType::Date),
            SQL_TIME | SQL_TYPE_TIME => Some(BufferType::Time),
            SQL_TIMESTAMP | SQL_TYPE_TIMESTAMP => Some(BufferType::Timestamp),
            _ => None,
        }
    }
}

impl Sql2BufferTypeMap for DefaultSql2BufferMap {
    fn buffer_type(&self, sql_type: i16) -> Option<BufferType> {
        self.overrides
            .get(&sql_type)
            .copied()
            .or_else(|| Self::default_buffer_type(sql_type))
    }
}

/// Maps every character SQL type to wide character buffers.
#[derive(Debug, Clone, Default)]
pub struct WCharSql2BufferMap {
    inner: DefaultSql2BufferMap,
}

impl WCharSql2BufferMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sql2BufferTypeMap for WCharSql2BufferMap {
    fn buffer_type(&self, sql_type: i16) -> Option<BufferType> {
        match self.inner.buffer_type(sql_type)? {
            BufferType::Char => Some(BufferType::WChar),
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map() {
        let map = DefaultSql2BufferMap::new();
        assert_eq!(map.buffer_type(SQL_INTEGER), Some(BufferType::Integer));
        assert_eq!(map.buffer_type(SQL_VARCHAR), Some(BufferType::Char));
        assert_eq!(map.buffer_type(SQL_WVARCHAR), Some(BufferType::WChar));
        assert_eq!(map.buffer_type(SQL_DECIMAL), Some(BufferType::Numeric));
        assert_eq!(map.buffer_type(SQL_TYPE_TIMESTAMP), Some(BufferType::Timestamp));
        assert_eq!(map.buffer_type(SQL_GUID), None);
    }

    #[test]
    fn test_override() {
        let map = DefaultSql2BufferMap::new()
            .with_type(SQL_DECIMAL, BufferType::Double)
            .with_type(SQL_GUID, BufferType::Char);
        assert_eq!(map.buffer_type(SQL_DECIMAL), Some(BufferType::Double));
        assert_eq!(map.buffer_type(SQL_GUID), Some(BufferType::Char));
        assert_eq!(map.buffer_type(SQL_NUMERIC), Some(BufferType::Numeric));
    }

    #[test]
    fn test_wchar_map() {
        let map = WCharSql2BufferMap::new();
        assert_eq!(map.buffer_type(SQL_VARCHAR), Some(BufferType::WChar));
        assert_eq!(map.buffer_type(SQL_BIGINT), Some(BufferType::BigInt));
        assert_eq!(map.buffer_type(SQL_GUID), None);
    }

    #[test]
    fn test_c_type_round_trip() {
        assert_eq!(BufferType::Integer.c_type(), SQL_C_SLONG);
        assert_eq!(BufferType::from_c_type(SQL_C_SBIGINT).unwrap(), BufferType::BigInt);
        assert!(BufferType::from_c_type(1234).is_err());
        assert!(BufferType::Char.is_array());
        assert!(!BufferType::Timestamp.is_array());
        assert_eq!(format!("{}", BufferType::WChar), "SQL_C_WCHAR");
    }
}

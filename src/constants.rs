//! Call-level interface constants.
//!
//! Values follow the ODBC 3.x headers so drivers and catalog metadata can be
//! passed through unchanged.

// SQL data types
pub const SQL_UNKNOWN_TYPE: i16 = 0;
pub const SQL_CHAR: i16 = 1;
pub const SQL_NUMERIC: i16 = 2;
pub const SQL_DECIMAL: i16 = 3;
pub const SQL_INTEGER: i16 = 4;
pub const SQL_SMALLINT: i16 = 5;
pub const SQL_FLOAT: i16 = 6;
pub const SQL_REAL: i16 = 7;
pub const SQL_DOUBLE: i16 = 8;
pub const SQL_DATE: i16 = 9;
pub const SQL_TIME: i16 = 10;
pub const SQL_TIMESTAMP: i16 = 11;
pub const SQL_VARCHAR: i16 = 12;
pub const SQL_TYPE_DATE: i16 = 91;
pub const SQL_TYPE_TIME: i16 = 92;
pub const SQL_TYPE_TIMESTAMP: i16 = 93;
pub const SQL_LONGVARCHAR: i16 = -1;
pub const SQL_BINARY: i16 = -2;
pub const SQL_VARBINARY: i16 = -3;
pub const SQL_LONGVARBINARY: i16 = -4;
pub const SQL_BIGINT: i16 = -5;
pub const SQL_TINYINT: i16 = -6;
pub const SQL_BIT: i16 = -7;
pub const SQL_WCHAR: i16 = -8;
pub const SQL_WVARCHAR: i16 = -9;
pub const SQL_WLONGVARCHAR: i16 = -10;
pub const SQL_GUID: i16 = -11;

// C data types
pub const SQL_C_CHAR: i16 = SQL_CHAR;
pub const SQL_C_WCHAR: i16 = SQL_WCHAR;
pub const SQL_C_NUMERIC: i16 = SQL_NUMERIC;
pub const SQL_C_FLOAT: i16 = SQL_REAL;
pub const SQL_C_DOUBLE: i16 = SQL_DOUBLE;
pub const SQL_C_BINARY: i16 = SQL_BINARY;
pub const SQL_C_SSHORT: i16 = -15;
pub const SQL_C_SLONG: i16 = -16;
pub const SQL_C_SBIGINT: i16 = -25;
pub const SQL_C_TYPE_DATE: i16 = SQL_TYPE_DATE;
pub const SQL_C_TYPE_TIME: i16 = SQL_TYPE_TIME;
pub const SQL_C_TYPE_TIMESTAMP: i16 = SQL_TYPE_TIMESTAMP;

// Return codes
pub const SQL_SUCCESS: i16 = 0;
pub const SQL_SUCCESS_WITH_INFO: i16 = 1;
pub const SQL_NEED_DATA: i16 = 99;
pub const SQL_NO_DATA: i16 = 100;
pub const SQL_ERROR: i16 = -1;
pub const SQL_INVALID_HANDLE: i16 = -2;

// Length / indicator sentinels
pub const SQL_NULL_DATA: i64 = -1;
pub const SQL_NTS: i64 = -3;

// Nullability as reported by the catalog
pub const SQL_NO_NULLS: i16 = 0;
pub const SQL_NULLABLE: i16 = 1;
pub const SQL_NULLABLE_UNKNOWN: i16 = 2;

/// Maximum decimal digits an `SQL_NUMERIC_STRUCT` can hold.
pub const SQL_MAX_NUMERIC_LEN: usize = 16;

//! SQL type mapping, catalog records and transferable values.

mod buffer_type;
mod catalog;
mod numeric;
mod value;

pub use buffer_type::{BufferType, DefaultSql2BufferMap, Sql2BufferTypeMap, WCharSql2BufferMap};
pub use catalog::{ColumnInfo, Nullability, SqlTypeInfo, TableInfo};
pub use numeric::SqlNumeric;
pub use value::Value;

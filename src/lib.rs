//! Table access over a call-level SQL interface
//!
//! Binds typed column buffers to the statements a database table needs:
//! one scrollable select, a COUNT(*) query, and prepared INSERT, UPDATE and
//! DELETE statements keyed on the primary key. Buffers are shared with the
//! application, so fetching a row fills the cells the application reads and
//! executing a write sends the cells the application filled.
//!
//! Drivers plug in through the [`driver::Driver`] and
//! [`driver::StatementHandle`] traits. The [`memory`] driver runs the
//! generated SQL against tables held in memory.
//!
//! # Example
//!
//! ```
//! use odbc_table::constants::{SQL_INTEGER, SQL_VARCHAR};
//! use odbc_table::memory::MemoryDriver;
//! use odbc_table::{Database, OpenParams, Result, Table, TableAccessFlags, Value};
//!
//! fn main() -> Result<()> {
//!     let driver = MemoryDriver::new();
//!     driver
//!         .create_table("PEOPLE")
//!         .column("ID", SQL_INTEGER, 10, 0, false)
//!         .column("NAME", SQL_VARCHAR, 40, 0, true)
//!         .primary_key(["ID"])
//!         .build();
//!     let db = Database::open(driver)?;
//!
//!     let mut people = Table::new();
//!     people.init(&db, TableAccessFlags::ALL, "PEOPLE")?;
//!     people.open(OpenParams::new())?;
//!     assert_eq!(people.insert_sql(), Some("INSERT INTO PEOPLE (ID,NAME) VALUES(?,?)"));
//!
//!     for (id, name) in [(1, "Ada"), (2, "Grace")] {
//!         people.set_column_value(0, Value::Integer(id))?;
//!         people.set_column_value(1, Value::from(name))?;
//!         people.insert()?;
//!     }
//!     assert_eq!(people.count("")?, 2);
//!
//!     people.select("", "ID DESC")?;
//!     while people.select_next()? {
//!         println!("{} {}", people.column_value(0)?, people.column_value(1)?);
//!     }
//!
//!     people.close()
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod constants;
pub mod database;
pub mod driver;
pub mod error;
pub mod flags;
pub mod memory;
pub mod statement;
pub mod table;
pub mod types;

// Re-export main types
pub use buffer::{ColumnBuffer, ColumnBufferPtr};
pub use config::OpenParams;
pub use database::{Database, DatabaseProduct};
pub use driver::{Driver, FetchOrientation, SqlReturn, StatementHandle};
pub use error::{Diagnostic, Error, Result};
pub use flags::{ColumnFlags, TableAccessFlags, TableOpenFlags, TablePrivileges};
pub use statement::ExecutableStatement;
pub use table::{ColumnOwnership, Table, TableName, TableTarget};
pub use types::{
    BufferType, ColumnInfo, DefaultSql2BufferMap, Nullability, Sql2BufferTypeMap, SqlNumeric,
    SqlTypeInfo, TableInfo, Value, WCharSql2BufferMap,
};

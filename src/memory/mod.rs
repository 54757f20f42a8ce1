//! In-memory data source implementing the [`Driver`] interface.
//!
//! Understands the SQL subset this crate generates (single-table SELECT with
//! WHERE and ORDER BY, COUNT(*), INSERT, UPDATE, DELETE, `?` parameters) and
//! reports failures through SQLSTATE diagnostics like a real driver would.
//! Cloned drivers share one store, so a test can keep a clone to inspect rows
//! after handing the driver to a [`Database`](crate::Database).
//!
//! ```
//! use odbc_table::constants::{SQL_INTEGER, SQL_VARCHAR};
//! use odbc_table::memory::MemoryDriver;
//!
//! let driver = MemoryDriver::new();
//! driver
//!     .create_table("ITEMS")
//!     .column("ID", SQL_INTEGER, 10, 0, false)
//!     .column("NAME", SQL_VARCHAR, 32, 0, true)
//!     .primary_key(["ID"])
//!     .build();
//! assert_eq!(driver.row_count("ITEMS"), Some(0));
//! ```

mod engine;
mod lexer;
mod parser;
mod statement;

use std::cell::RefCell;
use std::rc::Rc;

use crate::constants::*;
use crate::driver::{Driver, StatementHandle};
use crate::error::{Error, Result};
use crate::flags::TablePrivileges;
use crate::types::{ColumnInfo, Nullability, SqlTypeInfo, TableInfo, Value};

use engine::{MemoryTable, Store};
use statement::MemoryStatement;

const DEFAULT_DBMS_NAME: &str = "Memory";

/// Driver over tables held in memory.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    store: Rc<RefCell<Store>>,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    /// Create an empty data source in autocommit mode.
    pub fn new() -> Self {
        Self {
            store: Rc::new(RefCell::new(Store {
                tables: Vec::new(),
                dbms_name: DEFAULT_DBMS_NAME.to_string(),
                type_infos: default_type_infos(),
                autocommit: true,
                snapshot: None,
            })),
        }
    }

    /// Report a different DBMS name, e.g. `EXCEL` to trigger desktop driver handling.
    pub fn with_dbms_name(self, name: impl Into<String>) -> Self {
        self.store.borrow_mut().dbms_name = name.into();
        self
    }

    /// Replace the SQL types reported as supported.
    pub fn with_type_infos(self, type_infos: Vec<SqlTypeInfo>) -> Self {
        self.store.borrow_mut().type_infos = type_infos;
        self
    }

    /// Start defining a table. `build()` replaces any table of the same name.
    pub fn create_table(&self, name: impl Into<String>) -> MemoryTableBuilder {
        MemoryTableBuilder {
            store: Rc::clone(&self.store),
            info: TableInfo::new(name, "TABLE"),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            privileges: TablePrivileges::all(),
        }
    }

    /// Remove a table. Returns whether it existed.
    pub fn drop_table(&self, query_name: &str) -> bool {
        let mut store = self.store.borrow_mut();
        let before = store.tables.len();
        store
            .tables
            .retain(|t| !t.info.query_name().eq_ignore_ascii_case(query_name));
        before != store.tables.len()
    }

    /// Append a row without privilege checks; values are in column order.
    pub fn insert_row(&self, query_name: &str, values: Vec<Value>) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let table = store
            .tables
            .iter_mut()
            .find(|t| t.info.query_name().eq_ignore_ascii_case(query_name))
            .ok_or_else(|| Error::not_found(format!("table '{}'", query_name)))?;
        if values.len() != table.columns.len() {
            return Err(Error::illegal_argument(format!(
                "Table '{}' has {} columns, got {} values",
                query_name,
                table.columns.len(),
                values.len()
            )));
        }
        table.rows.push(values);
        Ok(())
    }

    /// Rows of a table in insertion order.
    pub fn rows(&self, query_name: &str) -> Option<Vec<Vec<Value>>> {
        self.store
            .borrow()
            .table(query_name)
            .ok()
            .map(|t| t.rows.clone())
    }

    pub fn row_count(&self, query_name: &str) -> Option<usize> {
        self.store
            .borrow()
            .table(query_name)
            .ok()
            .map(|t| t.rows.len())
    }
}

/// Builder returned by [`MemoryDriver::create_table`].
#[derive(Debug)]
pub struct MemoryTableBuilder {
    store: Rc<RefCell<Store>>,
    info: TableInfo,
    columns: Vec<ColumnInfo>,
    primary_keys: Vec<String>,
    privileges: TablePrivileges,
}

impl MemoryTableBuilder {
    /// Append a column.
    pub fn column(
        mut self,
        name: impl Into<String>,
        sql_type: i16,
        column_size: usize,
        decimal_digits: i16,
        nullable: bool,
    ) -> Self {
        let nullable = if nullable {
            Nullability::Nullable
        } else {
            Nullability::NoNulls
        };
        let mut info = ColumnInfo::new(
            self.info.name.clone(),
            name,
            sql_type,
            column_size,
            decimal_digits,
            nullable,
        );
        info.ordinal_position = self.columns.len() as u16 + 1;
        info.type_name = type_name(sql_type).to_string();
        self.columns.push(info);
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.info.schema = Some(schema.into());
        self
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.info.catalog = Some(catalog.into());
        self
    }

    pub fn table_type(mut self, table_type: impl Into<String>) -> Self {
        self.info.table_type = table_type.into();
        self
    }

    /// Primary key columns in key sequence.
    pub fn primary_key<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.primary_keys = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Privileges granted to the connected user. Defaults to all.
    pub fn privileges(mut self, privileges: TablePrivileges) -> Self {
        self.privileges = privileges;
        self
    }

    /// Register the table with the driver.
    pub fn build(self) {
        let query_name = self.info.query_name();
        let mut store = self.store.borrow_mut();
        store
            .tables
            .retain(|t| !t.info.query_name().eq_ignore_ascii_case(&query_name));
        tracing::debug!(table = %query_name, columns = self.columns.len(), "memory table created");
        store.tables.push(MemoryTable {
            info: self.info,
            columns: self.columns,
            primary_keys: self.primary_keys,
            privileges: self.privileges,
            rows: Vec::new(),
        });
    }
}

impl Driver for MemoryDriver {
    fn alloc_statement(&self) -> Result<Box<dyn StatementHandle>> {
        Ok(Box::new(MemoryStatement::new(Rc::clone(&self.store))))
    }

    fn dbms_name(&self) -> String {
        self.store.borrow().dbms_name.clone()
    }

    fn tables(
        &self,
        name: Option<&str>,
        schema: Option<&str>,
        catalog: Option<&str>,
        table_type: Option<&str>,
    ) -> Result<Vec<TableInfo>> {
        let store = self.store.borrow();
        let matches_part = |pattern: Option<&str>, value: Option<&str>| match pattern {
            None => true,
            Some(pattern) => like(pattern, value.unwrap_or_default()),
        };
        Ok(store
            .tables
            .iter()
            .map(|t| &t.info)
            .filter(|info| matches_part(name, Some(info.name.as_str())))
            .filter(|info| matches_part(schema, info.schema.as_deref()))
            .filter(|info| matches_part(catalog, info.catalog.as_deref()))
            .filter(|info| match table_type {
                None => true,
                Some(types) => types
                    .split(',')
                    .map(|t| t.trim().trim_matches('\''))
                    .any(|t| t.eq_ignore_ascii_case(&info.table_type)),
            })
            .cloned()
            .collect())
    }

    fn columns(&self, table: &TableInfo) -> Result<Vec<ColumnInfo>> {
        let store = self.store.borrow();
        let table = find(&store, table)?;
        Ok(table.columns.clone())
    }

    fn primary_keys(&self, table: &TableInfo) -> Result<Vec<String>> {
        let store = self.store.borrow();
        Ok(find(&store, table)?.primary_keys.clone())
    }

    fn table_privileges(&self, table: &TableInfo) -> Result<TablePrivileges> {
        let store = self.store.borrow();
        Ok(find(&store, table)?.privileges)
    }

    fn type_info(&self) -> Result<Vec<SqlTypeInfo>> {
        Ok(self.store.borrow().type_infos.clone())
    }

    fn set_autocommit(&self, enabled: bool) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.autocommit = enabled;
        if enabled {
            store.snapshot = None;
        } else {
            store.take_snapshot();
        }
        Ok(())
    }

    fn end_transaction(&self, commit: bool) -> Result<()> {
        let mut store = self.store.borrow_mut();
        if store.autocommit {
            return Ok(());
        }
        if commit {
            store.take_snapshot();
        } else {
            store.restore_snapshot();
        }
        tracing::debug!(commit, "memory transaction ended");
        Ok(())
    }
}

fn find<'a>(store: &'a Store, table: &TableInfo) -> Result<&'a MemoryTable> {
    store
        .table(&table.query_name())
        .map_err(|_| Error::not_found(format!("table '{}'", table.query_name())))
}

/// Case-insensitive LIKE with `%` and `_` wildcards.
fn like(pattern: &str, value: &str) -> bool {
    fn matches(pattern: &[char], value: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some((&'%', rest)) => (0..=value.len()).any(|i| matches(rest, &value[i..])),
            Some((&'_', rest)) => !value.is_empty() && matches(rest, &value[1..]),
            Some((c, rest)) => match value.split_first() {
                Some((v, value_rest)) => {
                    c.to_lowercase().eq(v.to_lowercase()) && matches(rest, value_rest)
                }
                None => false,
            },
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();
    matches(&pattern, &value)
}

fn type_name(sql_type: i16) -> &'static str {
    match sql_type {
        SQL_SMALLINT => "SMALLINT",
        SQL_INTEGER => "INTEGER",
        SQL_BIGINT => "BIGINT",
        SQL_REAL => "REAL",
        SQL_FLOAT => "FLOAT",
        SQL_DOUBLE => "DOUBLE",
        SQL_NUMERIC => "NUMERIC",
        SQL_DECIMAL => "DECIMAL",
        SQL_CHAR => "CHAR",
        SQL_VARCHAR => "VARCHAR",
        SQL_WCHAR => "NCHAR",
        SQL_WVARCHAR => "NVARCHAR",
        SQL_BINARY => "BINARY",
        SQL_VARBINARY => "VARBINARY",
        SQL_TYPE_DATE | SQL_DATE => "DATE",
        SQL_TYPE_TIME | SQL_TIME => "TIME",
        SQL_TYPE_TIMESTAMP | SQL_TIMESTAMP => "TIMESTAMP",
        SQL_GUID => "UNIQUEIDENTIFIER",
        _ => "UNKNOWN",
    }
}

fn default_type_infos() -> Vec<SqlTypeInfo> {
    [
        (SQL_SMALLINT, 5),
        (SQL_INTEGER, 10),
        (SQL_BIGINT, 19),
        (SQL_REAL, 7),
        (SQL_FLOAT, 15),
        (SQL_DOUBLE, 15),
        (SQL_NUMERIC, 38),
        (SQL_DECIMAL, 38),
        (SQL_CHAR, 8000),
        (SQL_VARCHAR, 8000),
        (SQL_WCHAR, 4000),
        (SQL_WVARCHAR, 4000),
        (SQL_BINARY, 8000),
        (SQL_VARBINARY, 8000),
        (SQL_TYPE_DATE, 10),
        (SQL_TYPE_TIME, 8),
        (SQL_TYPE_TIMESTAMP, 23),
    ]
    .into_iter()
    .map(|(sql_type, size)| SqlTypeInfo::new(type_name(sql_type), sql_type, size))
    .collect()
}

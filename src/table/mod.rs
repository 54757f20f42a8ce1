//! Table: binds column buffers to the statements one database table needs.
//!
//! # States
//!
//! A table is created unbound, then bound once to a database and a target by
//! [`Table::init`]. [`Table::open`] resolves the catalog identity, builds the
//! column buffers (or uses the ones registered with [`Table::set_column`]),
//! allocates one statement per requested capability and binds the buffers.
//! [`Table::close`] releases everything the open acquired. A failed open does
//! the same before returning the error, leaving the table initialized.
//!
//! # Example
//!
//! ```
//! use odbc_table::constants::{SQL_INTEGER, SQL_VARCHAR};
//! use odbc_table::memory::MemoryDriver;
//! use odbc_table::{Database, OpenParams, Table, TableAccessFlags, Value};
//!
//! # fn main() -> odbc_table::Result<()> {
//! let driver = MemoryDriver::new();
//! driver
//!     .create_table("ITEMS")
//!     .column("ID", SQL_INTEGER, 10, 0, false)
//!     .column("NAME", SQL_VARCHAR, 32, 0, true)
//!     .primary_key(["ID"])
//!     .build();
//! let db = Database::open(driver)?;
//!
//! let mut table = Table::new();
//! table.init(&db, TableAccessFlags::ALL, "ITEMS")?;
//! table.open(OpenParams::new())?;
//!
//! table.set_column_value(0, Value::Integer(1))?;
//! table.set_column_value(1, Value::from("bolt"))?;
//! table.insert()?;
//!
//! table.select("", "")?;
//! assert!(table.select_next()?);
//! assert_eq!(table.column_value(1)?, Value::from("bolt"));
//! # Ok(())
//! # }
//! ```

mod sql;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::buffer::{ColumnBuffer, ColumnBufferPtr};
use crate::config::OpenParams;
use crate::constants::SQL_BIGINT;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::flags::{ColumnFlags, TableAccessFlags, TableOpenFlags};
use crate::statement::ExecutableStatement;
use crate::types::{BufferType, Sql2BufferTypeMap, TableInfo, Value};

/// Catalog search criteria identifying a table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableName {
    pub name: String,
    pub schema: Option<String>,
    pub catalog: Option<String>,
    pub table_type: Option<String>,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_table_type(mut self, table_type: impl Into<String>) -> Self {
        self.table_type = Some(table_type.into());
        self
    }
}

/// What a table is bound to: search criteria or an already known identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableTarget {
    Name(TableName),
    Info(TableInfo),
}

impl From<&str> for TableTarget {
    fn from(name: &str) -> Self {
        TableTarget::Name(TableName::new(name))
    }
}

impl From<String> for TableTarget {
    fn from(name: String) -> Self {
        TableTarget::Name(TableName::new(name))
    }
}

impl From<TableName> for TableTarget {
    fn from(name: TableName) -> Self {
        TableTarget::Name(name)
    }
}

impl From<TableInfo> for TableTarget {
    fn from(info: TableInfo) -> Self {
        TableTarget::Info(info)
    }
}

/// Who created a column buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOwnership {
    /// Created from the catalog by `open()`; dropped by `close()`.
    Owned,
    /// Registered by the application; survives `close()`.
    Borrowed,
}

#[derive(Debug, Clone)]
struct ColumnEntry {
    buffer: ColumnBufferPtr,
    ownership: ColumnOwnership,
    /// Flags `open()` added to the buffer; cleared again on release.
    added_flags: ColumnFlags,
}

impl ColumnEntry {
    fn mark_primary_key(&mut self) {
        let mut buffer = self.buffer.borrow_mut();
        if !buffer.is_primary_key() {
            let flags = buffer.flags() | ColumnFlags::PRIMARY_KEY;
            buffer.set_flags(flags);
            self.added_flags |= ColumnFlags::PRIMARY_KEY;
        }
    }
}

/// Generated SQL of the prepared statements.
#[derive(Debug, Clone, Default)]
struct GeneratedSql {
    select_fields: String,
    insert: Option<String>,
    update_pk: Option<String>,
    delete_pk: Option<String>,
}

/// A database table and the statements operating on it.
pub struct Table<'db> {
    db: Option<&'db Database>,
    access: TableAccessFlags,
    target: Option<TableName>,
    info: Option<TableInfo>,
    type_map: Option<Rc<dyn Sql2BufferTypeMap>>,
    columns: BTreeMap<u16, ColumnEntry>,
    open_flags: TableOpenFlags,
    is_open: bool,

    select: ExecutableStatement,
    count: ExecutableStatement,
    insert: ExecutableStatement,
    update_pk: ExecutableStatement,
    delete_pk: ExecutableStatement,
    count_buffer: Option<ColumnBufferPtr>,
    sql: GeneratedSql,
}

impl fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("target", &self.target)
            .field("info", &self.info)
            .field("access", &self.access)
            .field("open_flags", &self.open_flags)
            .field("is_open", &self.is_open)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Table<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'db> Table<'db> {
    /// Create an unbound table.
    pub fn new() -> Self {
        Self {
            db: None,
            access: TableAccessFlags::empty(),
            target: None,
            info: None,
            type_map: None,
            columns: BTreeMap::new(),
            open_flags: TableOpenFlags::empty(),
            is_open: false,
            select: ExecutableStatement::new(),
            count: ExecutableStatement::new(),
            insert: ExecutableStatement::new(),
            update_pk: ExecutableStatement::new(),
            delete_pk: ExecutableStatement::new(),
            count_buffer: None,
            sql: GeneratedSql::default(),
        }
    }

    /// Bind the table to `db`, its access flags and its target. Allowed once.
    pub fn init(
        &mut self,
        db: &'db Database,
        access: TableAccessFlags,
        target: impl Into<TableTarget>,
    ) -> Result<()> {
        if self.db.is_some() {
            return Err(Error::illegal_argument("Table is already initialized"));
        }
        if !db.is_open() {
            return Err(Error::illegal_argument("Database is not open"));
        }
        match target.into() {
            TableTarget::Name(name) => {
                if name.name.is_empty() {
                    return Err(Error::illegal_argument("Table name must not be empty"));
                }
                self.target = Some(name);
            }
            TableTarget::Info(info) => {
                self.target = Some(TableName {
                    name: info.name.clone(),
                    schema: info.schema.clone(),
                    catalog: info.catalog.clone(),
                    table_type: Some(info.table_type.clone()).filter(|t| !t.is_empty()),
                });
                self.info = Some(info);
            }
        }
        self.db = Some(db);
        self.access = access;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.db.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Catalog identity; known after `open()` or when initialized from a `TableInfo`.
    pub fn table_info(&self) -> Option<&TableInfo> {
        self.info.as_ref()
    }

    pub fn access_flags(&self) -> TableAccessFlags {
        self.access
    }

    pub fn has_access_flag(&self, flag: TableAccessFlags) -> bool {
        self.access.contains(flag)
    }

    /// Flags the table was opened with, including forced portability flags.
    pub fn open_flags(&self) -> TableOpenFlags {
        self.open_flags
    }

    fn ensure_closed(&self, what: &str) -> Result<()> {
        if self.is_open {
            return Err(Error::illegal_argument(format!(
                "Cannot {} while the table is open",
                what
            )));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open {
            return Err(Error::illegal_argument("Table is not open"));
        }
        Ok(())
    }

    fn ensure_access(&self, flag: TableAccessFlags) -> Result<()> {
        self.ensure_open()?;
        if !self.access.contains(flag) {
            return Err(Error::illegal_argument(format!(
                "Table was not opened with {:?} access",
                flag
            )));
        }
        Ok(())
    }

    pub fn set_access_flags(&mut self, access: TableAccessFlags) -> Result<()> {
        self.ensure_closed("change access flags")?;
        self.access = access;
        Ok(())
    }

    /// Mapping used for auto-created columns instead of the database one.
    pub fn set_sql2buffer_type_map(&mut self, type_map: Rc<dyn Sql2BufferTypeMap>) -> Result<()> {
        self.ensure_closed("change the type map")?;
        self.type_map = Some(type_map);
        Ok(())
    }

    /// Register an application buffer for the column at `index`.
    ///
    /// Registered columns replace catalog discovery on `open()`.
    pub fn set_column(&mut self, index: u16, buffer: ColumnBufferPtr) -> Result<()> {
        self.ensure_closed("register columns")?;
        if self.columns.contains_key(&index) {
            return Err(Error::illegal_argument(format!(
                "A column is already registered at index {}",
                index
            )));
        }
        if buffer.borrow().query_name().is_empty() {
            return Err(Error::illegal_argument(format!(
                "Column at index {} has an empty query name",
                index
            )));
        }
        self.columns.insert(
            index,
            ColumnEntry {
                buffer,
                ownership: ColumnOwnership::Borrowed,
                added_flags: ColumnFlags::empty(),
            },
        );
        Ok(())
    }

    /// Remove all registered columns.
    pub fn clear_columns(&mut self) -> Result<()> {
        self.ensure_closed("clear columns")?;
        self.columns.clear();
        Ok(())
    }

    fn entry(&self, index: u16) -> Result<&ColumnEntry> {
        self.columns.get(&index).ok_or_else(|| {
            Error::illegal_argument(format!("No column at index {}", index))
        })
    }

    pub fn set_column_flag(&mut self, index: u16, flag: ColumnFlags) -> Result<()> {
        self.ensure_closed("change column flags")?;
        let mut buffer = self.entry(index)?.buffer.borrow_mut();
        let flags = buffer.flags() | flag;
        buffer.set_flags(flags);
        Ok(())
    }

    pub fn clear_column_flag(&mut self, index: u16, flag: ColumnFlags) -> Result<()> {
        self.ensure_closed("change column flags")?;
        let mut buffer = self.entry(index)?.buffer.borrow_mut();
        let flags = buffer.flags() - flag;
        buffer.set_flags(flags);
        Ok(())
    }

    pub fn set_column_flags(&mut self, index: u16, flags: ColumnFlags) -> Result<()> {
        self.ensure_closed("change column flags")?;
        self.entry(index)?.buffer.borrow_mut().set_flags(flags);
        Ok(())
    }

    pub fn column_ownership(&self, index: u16) -> Result<ColumnOwnership> {
        Ok(self.entry(index)?.ownership)
    }

    /// Open the table.
    ///
    /// On failure everything acquired so far is released and the error is
    /// returned unchanged.
    pub fn open(&mut self, params: OpenParams) -> Result<()> {
        let db = self
            .db
            .ok_or_else(|| Error::illegal_argument("Table is not initialized"))?;
        if self.is_open {
            return Err(Error::illegal_argument("Table is already open"));
        }
        if !db.is_open() {
            return Err(Error::illegal_argument("Database is not open"));
        }

        let mut flags = params.flags;
        if db.dbms().is_desktop_file() {
            tracing::debug!(dbms = %db.dbms_name(), "desktop driver: forward-only cursors, no primary key query");
            flags |= TableOpenFlags::FORWARD_ONLY_CURSORS | TableOpenFlags::DO_NOT_QUERY_PRIMARY_KEYS;
        }
        self.open_flags = flags;

        match self.open_steps(db, flags, &params) {
            Ok(()) => {
                self.is_open = true;
                tracing::info!(
                    table = %self.query_name(),
                    access = ?self.access,
                    columns = self.columns.len(),
                    "table opened"
                );
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "table open failed, unwinding");
                self.release();
                Err(e)
            }
        }
    }

    fn open_steps(&mut self, db: &'db Database, flags: TableOpenFlags, params: &OpenParams) -> Result<()> {
        self.resolve_info(db, flags)?;
        let info = self
            .info
            .clone()
            .ok_or_else(|| Error::generic("Table info not resolved"))?;

        if self.columns.is_empty() {
            self.create_columns(db, &info, flags)?;
        }

        if let Some(indexes) = &params.primary_keys {
            for index in indexes {
                self.columns
                    .get_mut(index)
                    .ok_or_else(|| Error::illegal_argument(format!("No column at index {}", index)))?
                    .mark_primary_key();
            }
        } else if !flags.contains(TableOpenFlags::DO_NOT_QUERY_PRIMARY_KEYS) {
            let keys = db.read_table_primary_keys(&info)?;
            for entry in self.columns.values_mut() {
                let is_key = {
                    let buffer = entry.buffer.borrow();
                    keys.iter().any(|k| k.eq_ignore_ascii_case(buffer.query_name()))
                };
                if is_key {
                    entry.mark_primary_key();
                }
            }
        }

        self.validate_columns(db, flags)?;

        if flags.contains(TableOpenFlags::CHECK_PRIVILEGES) {
            let granted = db.read_table_privileges(&info)?;
            let missing = self.access.required_privileges() - granted;
            if !missing.is_empty() {
                return Err(Error::MissingTablePrivilege {
                    table: info.query_name(),
                    missing,
                });
            }
        }

        self.allocate_statements(db, flags, params)?;
        self.bind_select()?;
        self.prepare_key_statements()?;
        self.prepare_insert()?;
        Ok(())
    }

    fn resolve_info(&mut self, db: &Database, flags: TableOpenFlags) -> Result<()> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| Error::illegal_argument("Table is not initialized"))?;
        let search = |name: &TableName| {
            db.find_one_table(
                &name.name,
                name.schema.as_deref(),
                name.catalog.as_deref(),
                name.table_type.as_deref(),
            )
        };
        if self.info.is_none() || flags.contains(TableOpenFlags::CHECK_EXISTANCE) {
            self.info = Some(search(&target)?);
        }
        Ok(())
    }

    fn create_columns(&mut self, db: &Database, info: &TableInfo, flags: TableOpenFlags) -> Result<()> {
        let type_map = self
            .type_map
            .clone()
            .unwrap_or_else(|| db.sql2buffer_type_map());
        let default_flags = ColumnFlags::from_access(self.access);
        for (position, column) in db.read_table_column_info(info)?.iter().enumerate() {
            let index = u16::try_from(position)
                .map_err(|_| Error::illegal_argument("Too many columns"))?;
            let buffer = match type_map.buffer_type(column.sql_type) {
                Some(buffer_type) => ColumnBuffer::with_buffer_type(column, buffer_type, default_flags)?,
                None if flags.contains(TableOpenFlags::SKIP_UNSUPPORTED_COLUMNS) => {
                    tracing::warn!(
                        table = %info.query_name(),
                        column = %column.column_name,
                        sql_type = column.sql_type,
                        "skipping column with unsupported SQL type"
                    );
                    continue;
                }
                None => {
                    return Err(Error::NotSupported {
                        sql_type: column.sql_type,
                        column: column.column_name.clone(),
                    })
                }
            };
            self.columns.insert(
                index,
                ColumnEntry {
                    buffer: buffer.into_ptr(),
                    ownership: ColumnOwnership::Owned,
                    added_flags: ColumnFlags::empty(),
                },
            );
        }
        tracing::debug!(table = %info.query_name(), columns = self.columns.len(), "columns created from catalog");
        Ok(())
    }

    fn validate_columns(&self, db: &Database, flags: TableOpenFlags) -> Result<()> {
        for (&index, entry) in &self.columns {
            let buffer = entry.buffer.borrow();
            let ungranted = buffer.flags().ungranted(self.access);
            if !ungranted.is_empty() {
                return Err(Error::InvalidColumnFlags {
                    column: buffer.query_name().to_string(),
                    index,
                    flag: ungranted,
                    access: self.access,
                });
            }
            if entry.ownership == ColumnOwnership::Borrowed
                && !flags.contains(TableOpenFlags::IGNORE_DB_TYPE_INFOS)
                && !db.is_sql_type_supported(buffer.sql_type())
            {
                return Err(Error::NotSupported {
                    sql_type: buffer.sql_type(),
                    column: buffer.query_name().to_string(),
                });
            }
        }
        if self
            .access
            .intersects(TableAccessFlags::UPDATE_PK | TableAccessFlags::DELETE_PK)
            && !self.columns.values().any(|e| e.buffer.borrow().is_primary_key())
        {
            return Err(Error::illegal_argument(format!(
                "Table '{}' needs primary key columns for {:?} access",
                self.query_name(),
                self.access & (TableAccessFlags::UPDATE_PK | TableAccessFlags::DELETE_PK)
            )));
        }
        Ok(())
    }

    fn allocate_statements(&mut self, db: &Database, flags: TableOpenFlags, params: &OpenParams) -> Result<()> {
        if self.access.contains(TableAccessFlags::SELECT) {
            self.select
                .init(db, flags.contains(TableOpenFlags::FORWARD_ONLY_CURSORS))?;
            if let Some(timeout) = params.query_timeout {
                self.select.set_query_timeout(timeout)?;
            }
            self.count.init(db, true)?;
            let count_buffer =
                ColumnBuffer::new(BufferType::BigInt, "COUNT(*)", SQL_BIGINT, 19, 0, ColumnFlags::SELECT)?
                    .into_ptr();
            self.count.bind_column(&count_buffer, 1)?;
            self.count_buffer = Some(count_buffer);
        }
        if self.access.contains(TableAccessFlags::INSERT) {
            self.insert.init(db, true)?;
        }
        if self.access.contains(TableAccessFlags::UPDATE_PK) {
            self.update_pk.init(db, true)?;
        }
        if self.access.contains(TableAccessFlags::DELETE_PK) {
            self.delete_pk.init(db, true)?;
        }
        Ok(())
    }

    fn buffers_with(&self, flag: ColumnFlags) -> Vec<ColumnBufferPtr> {
        self.columns
            .values()
            .filter(|e| e.buffer.borrow().has_flag(flag))
            .map(|e| Rc::clone(&e.buffer))
            .collect()
    }

    fn bind_select(&mut self) -> Result<()> {
        if !self.access.contains(TableAccessFlags::SELECT) {
            return Ok(());
        }
        let buffers = self.buffers_with(ColumnFlags::SELECT);
        let names: Vec<String> = buffers.iter().map(|b| b.borrow().query_name().to_string()).collect();
        for (ordinal, buffer) in (1u16..).zip(&buffers) {
            self.select.bind_column(buffer, ordinal)?;
        }
        self.sql.select_fields = sql::field_list(names.iter().map(String::as_str));
        tracing::debug!(fields = %self.sql.select_fields, "select columns bound");
        Ok(())
    }

    fn prepare_key_statements(&mut self) -> Result<()> {
        let table = self.query_name();
        let keys = self.buffers_with(ColumnFlags::PRIMARY_KEY);
        let key_names: Vec<String> = keys.iter().map(|b| b.borrow().query_name().to_string()).collect();

        if self.access.contains(TableAccessFlags::UPDATE_PK) {
            let set: Vec<ColumnBufferPtr> = self
                .buffers_with(ColumnFlags::UPDATE)
                .into_iter()
                .filter(|b| !b.borrow().is_primary_key())
                .collect();
            if set.is_empty() {
                tracing::warn!(table = %table, "no updatable non-key columns, update by primary key unavailable");
            } else {
                let set_names: Vec<String> = set.iter().map(|b| b.borrow().query_name().to_string()).collect();
                let text = sql::update_pk(
                    &table,
                    set_names.iter().map(String::as_str),
                    key_names.iter().map(String::as_str),
                );
                self.update_pk.prepare(&text)?;
                for (ordinal, buffer) in (1u16..).zip(set.iter().chain(&keys)) {
                    self.update_pk.bind_parameter(buffer, ordinal)?;
                }
                tracing::debug!(sql = %text, "update by primary key prepared");
                self.sql.update_pk = Some(text);
            }
        }

        if self.access.contains(TableAccessFlags::DELETE_PK) {
            let text = sql::delete_pk(&table, key_names.iter().map(String::as_str));
            self.delete_pk.prepare(&text)?;
            for (ordinal, buffer) in (1u16..).zip(&keys) {
                self.delete_pk.bind_parameter(buffer, ordinal)?;
            }
            tracing::debug!(sql = %text, "delete by primary key prepared");
            self.sql.delete_pk = Some(text);
        }
        Ok(())
    }

    fn prepare_insert(&mut self) -> Result<()> {
        if !self.access.contains(TableAccessFlags::INSERT) {
            return Ok(());
        }
        let buffers = self.buffers_with(ColumnFlags::INSERT);
        if buffers.is_empty() {
            tracing::warn!(table = %self.query_name(), "no insertable columns, insert unavailable");
            return Ok(());
        }
        let names: Vec<String> = buffers.iter().map(|b| b.borrow().query_name().to_string()).collect();
        let text = sql::insert(&self.query_name(), names.iter().map(String::as_str));
        self.insert.prepare(&text)?;
        for (ordinal, buffer) in (1u16..).zip(&buffers) {
            self.insert.bind_parameter(buffer, ordinal)?;
        }
        tracing::debug!(sql = %text, "insert prepared");
        self.sql.insert = Some(text);
        Ok(())
    }

    /// Free statements and drop auto-created columns.
    fn release(&mut self) {
        self.select.free();
        self.count.free();
        self.insert.free();
        self.update_pk.free();
        self.delete_pk.free();
        self.count_buffer = None;
        self.columns
            .retain(|_, entry| entry.ownership == ColumnOwnership::Borrowed);
        for entry in self.columns.values_mut() {
            if !entry.added_flags.is_empty() {
                let mut buffer = entry.buffer.borrow_mut();
                let flags = buffer.flags() - entry.added_flags;
                buffer.set_flags(flags);
                entry.added_flags = ColumnFlags::empty();
            }
        }
        self.sql = GeneratedSql::default();
        self.is_open = false;
    }

    /// Close the table. Registered columns stay; auto-created ones are dropped.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.release();
        tracing::info!(table = %self.query_name(), "table closed");
        Ok(())
    }

    fn query_name(&self) -> String {
        match (&self.info, &self.target) {
            (Some(info), _) => info.query_name(),
            (None, Some(target)) => target.name.clone(),
            (None, None) => String::new(),
        }
    }

    /// Comma separated field list of the select statement.
    pub fn select_fields(&self) -> &str {
        &self.sql.select_fields
    }

    pub fn insert_sql(&self) -> Option<&str> {
        self.sql.insert.as_deref()
    }

    pub fn update_pk_sql(&self) -> Option<&str> {
        self.sql.update_pk.as_deref()
    }

    pub fn delete_pk_sql(&self) -> Option<&str> {
        self.sql.delete_pk.as_deref()
    }

    /// Run `SELECT <fields> FROM <table> [WHERE ..] [ORDER BY ..]`.
    ///
    /// Empty `where_clause` or `order_by` omit the clause.
    pub fn select(&mut self, where_clause: &str, order_by: &str) -> Result<()> {
        self.ensure_access(TableAccessFlags::SELECT)?;
        let text = sql::select(&self.sql.select_fields, &self.query_name(), where_clause, order_by);
        tracing::debug!(sql = %text, "select");
        self.select.execute_direct(&text)
    }

    /// Run a full SELECT whose result columns match the bound select columns.
    pub fn select_by_sql_stmt(&mut self, sql: &str) -> Result<()> {
        self.ensure_access(TableAccessFlags::SELECT)?;
        self.select.execute_direct(sql)
    }

    fn select_statement(&mut self) -> Result<&mut ExecutableStatement> {
        self.ensure_access(TableAccessFlags::SELECT)?;
        Ok(&mut self.select)
    }

    /// Fetch the next row. `Ok(false)` past the last row.
    pub fn select_next(&mut self) -> Result<bool> {
        self.select_statement()?.select_next()
    }

    pub fn select_prev(&mut self) -> Result<bool> {
        self.select_statement()?.select_prior()
    }

    pub fn select_first(&mut self) -> Result<bool> {
        self.select_statement()?.select_first()
    }

    pub fn select_last(&mut self) -> Result<bool> {
        self.select_statement()?.select_last()
    }

    pub fn select_absolute(&mut self, position: i64) -> Result<bool> {
        self.select_statement()?.select_absolute(position)
    }

    pub fn select_relative(&mut self, offset: i64) -> Result<bool> {
        self.select_statement()?.select_relative(offset)
    }

    pub fn select_close(&mut self) -> Result<()> {
        self.select_statement()?.select_close()
    }

    /// Number of rows matching `where_clause`; empty counts all rows.
    pub fn count(&mut self, where_clause: &str) -> Result<u64> {
        self.ensure_access(TableAccessFlags::SELECT)?;
        let text = sql::count(&self.query_name(), where_clause);
        self.count.execute_direct(&text)?;
        let fetched = self.count.select_next();
        let close = self.count.select_close();
        if !fetched? {
            return Err(Error::generic(format!("{} returned no row", text)));
        }
        close?;
        let value = self
            .count_buffer
            .as_ref()
            .map(|b| b.borrow().value())
            .unwrap_or(Value::Null);
        let count = value
            .to_i64()
            .ok_or_else(|| Error::generic(format!("{} returned {}", text, value)))?;
        u64::try_from(count).map_err(|_| Error::generic(format!("{} returned {}", text, count)))
    }

    /// Insert the current values of the insert columns.
    pub fn insert(&mut self) -> Result<()> {
        self.ensure_access(TableAccessFlags::INSERT)?;
        if !self.insert.is_prepared() {
            return Err(Error::illegal_argument("Table has no insertable columns"));
        }
        self.insert.execute_prepared()
    }

    /// Update the row identified by the primary key buffers.
    ///
    /// Returns `Ok(false)` if no row matched and `fail_on_no_data` is unset.
    pub fn update(&mut self, fail_on_no_data: bool) -> Result<bool> {
        self.ensure_access(TableAccessFlags::UPDATE_PK)?;
        if !self.update_pk.is_prepared() {
            return Err(Error::illegal_argument("Table has no updatable non-key columns"));
        }
        self.update_pk.execute_prepared_with(fail_on_no_data)
    }

    /// Delete the row identified by the primary key buffers.
    pub fn delete(&mut self, fail_on_no_data: bool) -> Result<bool> {
        self.ensure_access(TableAccessFlags::DELETE_PK)?;
        self.delete_pk.execute_prepared_with(fail_on_no_data)
    }

    /// Update all rows matching `where_clause` with the values of the
    /// non-key update columns.
    pub fn update_where(&mut self, where_clause: &str, fail_on_no_data: bool) -> Result<bool> {
        self.ensure_access(TableAccessFlags::UPDATE_WHERE)?;
        if where_clause.is_empty() {
            return Err(Error::illegal_argument("update_where needs a WHERE clause"));
        }
        let db = self
            .db
            .ok_or_else(|| Error::illegal_argument("Table is not initialized"))?;
        let buffers: Vec<ColumnBufferPtr> = self
            .buffers_with(ColumnFlags::UPDATE)
            .into_iter()
            .filter(|b| !b.borrow().is_primary_key())
            .collect();
        if buffers.is_empty() {
            return Err(Error::illegal_argument("Table has no updatable non-key columns"));
        }
        let names: Vec<String> = buffers.iter().map(|b| b.borrow().query_name().to_string()).collect();
        let text = sql::update_where(&self.query_name(), names.iter().map(String::as_str), where_clause);

        let mut stmt = ExecutableStatement::new();
        stmt.init(db, true)?;
        stmt.prepare(&text)?;
        for (ordinal, buffer) in (1u16..).zip(&buffers) {
            stmt.bind_parameter(buffer, ordinal)?;
        }
        let result = stmt.execute_prepared_with(fail_on_no_data);
        stmt.free();
        result
    }

    /// Delete all rows matching `where_clause`.
    pub fn delete_where(&mut self, where_clause: &str, fail_on_no_data: bool) -> Result<bool> {
        self.ensure_access(TableAccessFlags::DELETE_WHERE)?;
        if where_clause.is_empty() {
            return Err(Error::illegal_argument("delete_where needs a WHERE clause"));
        }
        let db = self
            .db
            .ok_or_else(|| Error::illegal_argument("Table is not initialized"))?;
        let text = sql::delete_where(&self.query_name(), where_clause);
        let mut stmt = ExecutableStatement::new();
        stmt.init(db, true)?;
        let result = stmt.execute_direct_with(&text, fail_on_no_data);
        stmt.free();
        result
    }

    /// Shared handle to the buffer at `index`.
    pub fn column_buffer(&self, index: u16) -> Result<ColumnBufferPtr> {
        Ok(Rc::clone(&self.entry(index)?.buffer))
    }

    /// Like [`column_buffer`](Self::column_buffer), failing with `NullValue`
    /// if the buffer currently holds NULL.
    pub fn non_null_column_buffer(&self, index: u16) -> Result<ColumnBufferPtr> {
        let buffer = self.column_buffer(index)?;
        if buffer.borrow().is_null() {
            return Err(Error::NullValue {
                column: buffer.borrow().query_name().to_string(),
                index,
            });
        }
        Ok(buffer)
    }

    /// Value at `index`, with character trimming per the open flags.
    pub fn column_value(&self, index: u16) -> Result<Value> {
        let value = self.entry(index)?.buffer.borrow().value();
        let trim_left = self.open_flags.contains(TableOpenFlags::CHAR_TRIM_LEFT);
        let trim_right = self.open_flags.contains(TableOpenFlags::CHAR_TRIM_RIGHT);
        Ok(match value {
            Value::Text(s) if trim_left || trim_right => {
                let s = if trim_left { s.trim_start() } else { s.as_str() };
                let s = if trim_right { s.trim_end() } else { s };
                Value::Text(s.to_string())
            }
            other => other,
        })
    }

    pub fn set_column_value(&self, index: u16, value: Value) -> Result<()> {
        self.entry(index)?.buffer.borrow_mut().set_value(value)
    }

    pub fn set_column_null(&self, index: u16) -> Result<()> {
        self.entry(index)?.buffer.borrow_mut().set_null();
        Ok(())
    }

    pub fn is_column_null(&self, index: u16) -> Result<bool> {
        Ok(self.entry(index)?.buffer.borrow().is_null())
    }

    pub fn is_column_nullable(&self, index: u16) -> Result<bool> {
        Ok(self.entry(index)?.buffer.borrow().has_flag(ColumnFlags::NULLABLE))
    }

    pub fn set_column_nts(&self, index: u16) -> Result<()> {
        self.entry(index)?.buffer.borrow_mut().set_nts();
        Ok(())
    }

    pub fn set_column_length_indicator(&self, index: u16, indicator: i64) -> Result<()> {
        self.entry(index)?
            .buffer
            .borrow_mut()
            .set_length_indicator(indicator)
    }

    /// Buffers flagged `PRIMARY_KEY`, in index order.
    pub fn primary_key_column_buffers(&self) -> Vec<ColumnBufferPtr> {
        self.buffers_with(ColumnFlags::PRIMARY_KEY)
    }

    /// Index of the column with the given query name (case-insensitive).
    pub fn column_index(&self, query_name: &str) -> Result<u16> {
        self.columns
            .iter()
            .find(|(_, e)| e.buffer.borrow().query_name().eq_ignore_ascii_case(query_name))
            .map(|(&index, _)| index)
            .ok_or_else(|| Error::not_found(format!("column '{}'", query_name)))
    }

    pub fn column_indexes(&self) -> Vec<u16> {
        self.columns.keys().copied().collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

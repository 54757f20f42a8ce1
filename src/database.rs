//! Database facade over an open connection handle.
//!
//! Tables use it for catalog lookups, SQL type support checks and statement
//! allocation. Transactions are managed here; tables track none.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::driver::{Driver, StatementHandle};
use crate::error::{Error, Result};
use crate::flags::TablePrivileges;
use crate::types::{ColumnInfo, DefaultSql2BufferMap, Sql2BufferTypeMap, SqlTypeInfo, TableInfo};

/// DBMS families that need portability workarounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProduct {
    /// Excel workbooks through the desktop file driver.
    Excel,
    /// Access databases through the desktop file driver.
    Access,
    Other,
}

impl DatabaseProduct {
    /// Classify a DBMS name as reported by the driver.
    pub fn from_dbms_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        if upper.contains("EXCEL") {
            DatabaseProduct::Excel
        } else if upper.contains("ACCESS") {
            DatabaseProduct::Access
        } else {
            DatabaseProduct::Other
        }
    }

    /// Desktop file drivers support neither scrollable cursors nor primary key queries.
    pub fn is_desktop_file(&self) -> bool {
        matches!(self, DatabaseProduct::Excel | DatabaseProduct::Access)
    }
}

/// An open database.
pub struct Database {
    driver: Option<Box<dyn Driver>>,
    dbms_name: String,
    product: DatabaseProduct,
    type_infos: Vec<SqlTypeInfo>,
    type_map: Rc<dyn Sql2BufferTypeMap>,
    autocommit: Cell<bool>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("open", &self.is_open())
            .field("dbms_name", &self.dbms_name)
            .field("product", &self.product)
            .field("type_infos", &self.type_infos.len())
            .finish()
    }
}

impl Database {
    /// Open a database on a connected driver.
    ///
    /// Reads the DBMS identity and the supported SQL types once.
    pub fn open(driver: impl Driver + 'static) -> Result<Self> {
        let dbms_name = driver.dbms_name();
        let type_infos = driver.type_info()?;
        let product = DatabaseProduct::from_dbms_name(&dbms_name);
        tracing::info!(dbms = %dbms_name, ?product, types = type_infos.len(), "database opened");
        Ok(Self {
            driver: Some(Box::new(driver)),
            dbms_name,
            product,
            type_infos,
            type_map: Rc::new(DefaultSql2BufferMap::new()),
            autocommit: Cell::new(true),
        })
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    /// Close the database, releasing the connection handle.
    pub fn close(&mut self) {
        if self.driver.take().is_some() {
            tracing::info!(dbms = %self.dbms_name, "database closed");
        }
    }

    fn driver(&self) -> Result<&dyn Driver> {
        self.driver
            .as_deref()
            .ok_or_else(|| Error::illegal_argument("Database is not open"))
    }

    pub fn dbms_name(&self) -> &str {
        &self.dbms_name
    }

    pub fn dbms(&self) -> DatabaseProduct {
        self.product
    }

    /// Mapping used to create buffers for auto-discovered columns.
    pub fn sql2buffer_type_map(&self) -> Rc<dyn Sql2BufferTypeMap> {
        Rc::clone(&self.type_map)
    }

    pub fn set_sql2buffer_type_map(&mut self, type_map: Rc<dyn Sql2BufferTypeMap>) {
        self.type_map = type_map;
    }

    /// SQL types reported by the data source.
    pub fn sql_type_infos(&self) -> &[SqlTypeInfo] {
        &self.type_infos
    }

    pub fn is_sql_type_supported(&self, sql_type: i16) -> bool {
        self.type_infos.iter().any(|info| info.sql_type == sql_type)
    }

    pub(crate) fn alloc_statement(&self) -> Result<Box<dyn StatementHandle>> {
        self.driver()?.alloc_statement()
    }

    /// All tables matching the search criteria.
    pub fn find_tables(
        &self,
        name: Option<&str>,
        schema: Option<&str>,
        catalog: Option<&str>,
        table_type: Option<&str>,
    ) -> Result<Vec<TableInfo>> {
        self.driver()?.tables(name, schema, catalog, table_type)
    }

    /// The single table matching the search criteria.
    ///
    /// Fails with `NotFound` on zero matches and `AmbiguousTable` on several.
    pub fn find_one_table(
        &self,
        name: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
        table_type: Option<&str>,
    ) -> Result<TableInfo> {
        let mut tables = self.find_tables(Some(name), schema, catalog, table_type)?;
        match tables.len() {
            0 => Err(Error::not_found(format!("table '{}'", name))),
            1 => Ok(tables.remove(0)),
            count => Err(Error::AmbiguousTable {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// Columns of a table in ordinal order.
    pub fn read_table_column_info(&self, table: &TableInfo) -> Result<Vec<ColumnInfo>> {
        self.driver()?.columns(table)
    }

    /// Primary key column names of a table.
    pub fn read_table_primary_keys(&self, table: &TableInfo) -> Result<Vec<String>> {
        self.driver()?.primary_keys(table)
    }

    pub fn read_table_privileges(&self, table: &TableInfo) -> Result<TablePrivileges> {
        self.driver()?.table_privileges(table)
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit.get()
    }

    pub fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.driver()?.set_autocommit(enabled)?;
        self.autocommit.set(enabled);
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.driver()?.end_transaction(true)
    }

    pub fn rollback(&self) -> Result<()> {
        self.driver()?.end_transaction(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::memory::MemoryDriver;

    fn driver() -> MemoryDriver {
        let driver = MemoryDriver::new();
        driver
            .create_table("ORDERS")
            .column("ID", SQL_INTEGER, 10, 0, false)
            .primary_key(["ID"])
            .build();
        driver
            .create_table("ORDER_LINES")
            .column("ID", SQL_INTEGER, 10, 0, false)
            .build();
        driver
    }

    #[test]
    fn test_product_from_name() {
        assert_eq!(DatabaseProduct::from_dbms_name("EXCEL"), DatabaseProduct::Excel);
        assert_eq!(
            DatabaseProduct::from_dbms_name("Microsoft Access"),
            DatabaseProduct::Access
        );
        assert_eq!(
            DatabaseProduct::from_dbms_name("PostgreSQL"),
            DatabaseProduct::Other
        );
        assert!(DatabaseProduct::Excel.is_desktop_file());
    }

    #[test]
    fn test_find_one_table() {
        let db = Database::open(driver()).unwrap();
        let info = db.find_one_table("ORDERS", None, None, None).unwrap();
        assert_eq!(info.name, "ORDERS");

        let err = db.find_one_table("MISSING", None, None, None).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = db.find_one_table("ORDER%", None, None, None).unwrap_err();
        assert!(matches!(err, Error::AmbiguousTable { count: 2, .. }));
    }

    #[test]
    fn test_catalog_reads() {
        let db = Database::open(driver()).unwrap();
        let info = db.find_one_table("ORDERS", None, None, None).unwrap();
        let columns = db.read_table_column_info(&info).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(db.read_table_primary_keys(&info).unwrap(), vec!["ID"]);
        assert!(db.is_sql_type_supported(SQL_INTEGER));
        assert!(!db.is_sql_type_supported(SQL_GUID));
    }

    #[test]
    fn test_closed_database_rejects_calls() {
        let mut db = Database::open(driver()).unwrap();
        db.close();
        assert!(!db.is_open());
        assert!(db.find_tables(None, None, None, None).is_err());
        assert!(db.alloc_statement().is_err());
    }
}

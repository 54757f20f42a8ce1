//! Executable statement owning one statement handle.
//!
//! # Lifecycle
//!
//! 1. Allocated by `init()`
//! 2. Prepared with `?` markers via `prepare()`, or run ad hoc via `execute_direct()`
//! 3. Buffers bound via `bind_parameter()` (after prepare) and `bind_column()`
//! 4. Rows navigated via `select_next()` and friends
//! 5. Cursor closed via `select_close()`, handle released via `free()`

use std::time::Duration;

use crate::buffer::ColumnBufferPtr;
use crate::database::Database;
use crate::driver::{check, FetchOrientation, SqlReturn, StatementHandle};
use crate::error::{Error, Result};

/// One statement handle through its full life.
#[derive(Default)]
pub struct ExecutableStatement {
    /// Driver handle; `None` until `init()` and after `free()`.
    handle: Option<Box<dyn StatementHandle>>,
    /// SQL text of the last `prepare()`.
    sql: Option<String>,
    /// Whether the cursor was requested scrollable.
    scrollable: bool,
    /// Whether an execute left a cursor that was not closed yet.
    cursor_open: bool,
}

impl std::fmt::Debug for ExecutableStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableStatement")
            .field("initialized", &self.is_initialized())
            .field("sql", &self.sql)
            .field("scrollable", &self.scrollable)
            .field("cursor_open", &self.cursor_open)
            .finish()
    }
}

impl ExecutableStatement {
    /// Create an unallocated statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the statement handle on `db`.
    ///
    /// Scrollable cursors are requested unless `forward_only` is set.
    pub fn init(&mut self, db: &Database, forward_only: bool) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::illegal_argument("Statement is already initialized"));
        }
        let mut handle = db.alloc_statement()?;
        let ret = handle.set_scrollable(!forward_only);
        check(ret, &*handle, || {
            format!("SQLSetStmtAttr(SQL_ATTR_CURSOR_SCROLLABLE, {})", !forward_only)
        })?;
        tracing::debug!(forward_only, "statement allocated");
        self.handle = Some(handle);
        self.scrollable = !forward_only;
        self.sql = None;
        self.cursor_open = false;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_prepared(&self) -> bool {
        self.sql.is_some()
    }

    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    pub fn has_open_cursor(&self) -> bool {
        self.cursor_open
    }

    /// SQL text of the prepared statement.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Release the statement handle. Bindings go with it.
    pub fn free(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!(sql = ?self.sql, "statement freed");
        }
        self.sql = None;
        self.cursor_open = false;
        self.scrollable = false;
    }

    fn handle_mut(&mut self) -> Result<&mut Box<dyn StatementHandle>> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::illegal_argument("Statement is not initialized"))
    }

    /// Pass a query timeout through to the driver.
    pub fn set_query_timeout(&mut self, timeout: Duration) -> Result<()> {
        let seconds = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        let handle = self.handle_mut()?;
        let ret = handle.set_query_timeout(seconds);
        check(ret, &**handle, || {
            format!("SQLSetStmtAttr(SQL_ATTR_QUERY_TIMEOUT, {})", seconds)
        })?;
        Ok(())
    }

    /// Prepare SQL containing `?` parameter markers.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.close_open_cursor()?;
        let handle = self.handle_mut()?;
        let ret = handle.prepare(sql);
        check(ret, &**handle, || format!("SQLPrepare(\"{}\")", sql))?;
        tracing::debug!(sql, "statement prepared");
        self.sql = Some(sql.to_string());
        Ok(())
    }

    /// Execute the prepared statement; "no data" is an error.
    pub fn execute_prepared(&mut self) -> Result<()> {
        self.execute_prepared_with(true).map(|_| ())
    }

    /// Execute the prepared statement.
    ///
    /// Returns `Ok(false)` if the statement affected no rows and
    /// `fail_on_no_data` is unset.
    pub fn execute_prepared_with(&mut self, fail_on_no_data: bool) -> Result<bool> {
        if !self.is_prepared() {
            return Err(Error::illegal_argument("Statement is not prepared"));
        }
        self.close_open_cursor()?;
        let sql = self.sql.clone().unwrap_or_default();
        let handle = self.handle_mut()?;
        let ret = handle.execute();
        self.finish_execute(ret, fail_on_no_data, || format!("SQLExecute(\"{}\")", sql))
    }

    /// Execute ad hoc SQL; "no data" is an error.
    pub fn execute_direct(&mut self, sql: &str) -> Result<()> {
        self.execute_direct_with(sql, true).map(|_| ())
    }

    /// Execute ad hoc SQL with the same "no data" handling as
    /// [`execute_prepared_with`](Self::execute_prepared_with).
    pub fn execute_direct_with(&mut self, sql: &str, fail_on_no_data: bool) -> Result<bool> {
        self.close_open_cursor()?;
        let handle = self.handle_mut()?;
        let ret = handle.exec_direct(sql);
        tracing::debug!(sql, %ret, "executed direct");
        self.finish_execute(ret, fail_on_no_data, || format!("SQLExecDirect(\"{}\")", sql))
    }

    fn finish_execute(
        &mut self,
        ret: SqlReturn,
        fail_on_no_data: bool,
        context: impl FnOnce() -> String,
    ) -> Result<bool> {
        let handle = self.handle_mut()?;
        if ret == SqlReturn::NoData && !fail_on_no_data {
            return Ok(false);
        }
        check(ret, &**handle, context)?;
        self.cursor_open = handle.num_result_cols() > 0;
        Ok(true)
    }

    /// Bind `buffer` to the 1-based parameter marker `ordinal`.
    ///
    /// Must follow `prepare()`: drivers may derive parameter metadata from
    /// the prepared text.
    pub fn bind_parameter(&mut self, buffer: &ColumnBufferPtr, ordinal: u16) -> Result<()> {
        if !self.is_prepared() {
            return Err(Error::illegal_argument(format!(
                "Cannot bind parameter {} of an unprepared statement",
                ordinal
            )));
        }
        let name = buffer.borrow().query_name().to_string();
        let handle = self.handle_mut()?;
        let ret = handle.bind_parameter(ordinal, buffer.clone());
        check(ret, &**handle, || {
            format!("SQLBindParameter({}, '{}')", ordinal, name)
        })?;
        tracing::debug!(ordinal, column = %name, "parameter bound");
        Ok(())
    }

    /// Bind `buffer` to the 1-based result column `ordinal`.
    pub fn bind_column(&mut self, buffer: &ColumnBufferPtr, ordinal: u16) -> Result<()> {
        let name = buffer.borrow().query_name().to_string();
        let handle = self.handle_mut()?;
        let ret = handle.bind_column(ordinal, buffer.clone());
        check(ret, &**handle, || format!("SQLBindCol({}, '{}')", ordinal, name))?;
        tracing::debug!(ordinal, column = %name, "column bound");
        Ok(())
    }

    fn fetch(&mut self, orientation: FetchOrientation) -> Result<bool> {
        let handle = self.handle_mut()?;
        let ret = handle.fetch_scroll(orientation);
        tracing::trace!(?orientation, %ret, "fetch");
        if ret == SqlReturn::NoData {
            return Ok(false);
        }
        check(ret, &**handle, || {
            format!("SQLFetchScroll({:?})", orientation)
        })?;
        Ok(true)
    }

    /// Fetch the next row. `Ok(false)` past the last row.
    pub fn select_next(&mut self) -> Result<bool> {
        self.fetch(FetchOrientation::Next)
    }

    pub fn select_prior(&mut self) -> Result<bool> {
        self.fetch(FetchOrientation::Prior)
    }

    pub fn select_first(&mut self) -> Result<bool> {
        self.fetch(FetchOrientation::First)
    }

    pub fn select_last(&mut self) -> Result<bool> {
        self.fetch(FetchOrientation::Last)
    }

    /// Fetch the 1-based row `position`; negative counts from the end.
    pub fn select_absolute(&mut self, position: i64) -> Result<bool> {
        self.fetch(FetchOrientation::Absolute(position))
    }

    pub fn select_relative(&mut self, offset: i64) -> Result<bool> {
        self.fetch(FetchOrientation::Relative(offset))
    }

    /// Close the cursor if one is open.
    pub fn select_close(&mut self) -> Result<()> {
        self.close_open_cursor()
    }

    fn close_open_cursor(&mut self) -> Result<()> {
        if !self.cursor_open {
            return Ok(());
        }
        let handle = self.handle_mut()?;
        let ret = handle.close_cursor();
        check(ret, &**handle, || "SQLCloseCursor".to_string())?;
        self.cursor_open = false;
        Ok(())
    }

    /// Rows affected by the last INSERT, UPDATE or DELETE.
    pub fn row_count(&self) -> Result<i64> {
        self.handle
            .as_ref()
            .map(|handle| handle.row_count())
            .ok_or_else(|| Error::illegal_argument("Statement is not initialized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ColumnBuffer;
    use crate::constants::*;
    use crate::flags::ColumnFlags;
    use crate::memory::MemoryDriver;
    use crate::types::{BufferType, Value};

    fn database() -> Database {
        let driver = MemoryDriver::new();
        driver
            .create_table("NUMBERS")
            .column("ID", SQL_INTEGER, 10, 0, false)
            .primary_key(["ID"])
            .build();
        Database::open(driver).unwrap()
    }

    fn int_buffer(name: &str) -> ColumnBufferPtr {
        ColumnBuffer::new(BufferType::Integer, name, SQL_INTEGER, 10, 0, ColumnFlags::SELECT)
            .unwrap()
            .into_ptr()
    }

    #[test]
    fn test_uninitialized_statement() {
        let mut stmt = ExecutableStatement::new();
        assert!(!stmt.is_initialized());
        assert!(matches!(
            stmt.prepare("SELECT ID FROM NUMBERS"),
            Err(Error::IllegalArgument { .. })
        ));
        assert!(stmt.row_count().is_err());
    }

    #[test]
    fn test_double_init_fails() {
        let db = database();
        let mut stmt = ExecutableStatement::new();
        stmt.init(&db, false).unwrap();
        assert!(stmt.init(&db, false).is_err());
        stmt.free();
        stmt.init(&db, true).unwrap();
        assert!(!stmt.is_scrollable());
    }

    #[test]
    fn test_bind_parameter_requires_prepare() {
        let db = database();
        let mut stmt = ExecutableStatement::new();
        stmt.init(&db, true).unwrap();
        let id = int_buffer("ID");
        assert!(matches!(
            stmt.bind_parameter(&id, 1),
            Err(Error::IllegalArgument { .. })
        ));
        stmt.prepare("INSERT INTO NUMBERS (ID) VALUES(?)").unwrap();
        stmt.bind_parameter(&id, 1).unwrap();
    }

    #[test]
    fn test_prepared_insert_then_scroll() {
        let db = database();
        let id = int_buffer("ID");

        let mut insert = ExecutableStatement::new();
        insert.init(&db, true).unwrap();
        insert.prepare("INSERT INTO NUMBERS (ID) VALUES(?)").unwrap();
        insert.bind_parameter(&id, 1).unwrap();
        for i in 1..=3 {
            id.borrow_mut().set_value(Value::Integer(i)).unwrap();
            insert.execute_prepared().unwrap();
            assert_eq!(insert.row_count().unwrap(), 1);
        }

        let out = int_buffer("ID");
        let mut select = ExecutableStatement::new();
        select.init(&db, false).unwrap();
        select.bind_column(&out, 1).unwrap();
        select.execute_direct("SELECT ID FROM NUMBERS ORDER BY ID").unwrap();
        assert!(select.select_last().unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(3));
        assert!(select.select_prior().unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(2));
        assert!(select.select_first().unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(1));
        assert!(select.select_absolute(3).unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(3));
        assert!(select.select_relative(-2).unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(1));
        assert!(!select.select_prior().unwrap());
        select.select_close().unwrap();
        assert!(!select.has_open_cursor());
    }

    #[test]
    fn test_writes_leave_no_open_cursor() {
        let db = database();
        let id = int_buffer("ID");
        let mut stmt = ExecutableStatement::new();
        stmt.init(&db, true).unwrap();
        stmt.prepare("INSERT INTO NUMBERS (ID) VALUES(?)").unwrap();
        stmt.bind_parameter(&id, 1).unwrap();
        for i in 1..=2 {
            id.borrow_mut().set_value(Value::Integer(i)).unwrap();
            stmt.execute_prepared().unwrap();
            assert!(!stmt.has_open_cursor());
        }
        stmt.select_close().unwrap();

        stmt.execute_direct("SELECT ID FROM NUMBERS").unwrap();
        assert!(stmt.has_open_cursor());
        stmt.execute_direct("DELETE FROM NUMBERS WHERE ID = 2").unwrap();
        assert!(!stmt.has_open_cursor());
        stmt.prepare("INSERT INTO NUMBERS (ID) VALUES(?)").unwrap();
    }

    #[test]
    fn test_scrolling_far_past_either_end() {
        let db = database();
        let mut insert = ExecutableStatement::new();
        insert.init(&db, true).unwrap();
        insert.execute_direct("INSERT INTO NUMBERS (ID) VALUES(1)").unwrap();
        insert.execute_direct("INSERT INTO NUMBERS (ID) VALUES(2)").unwrap();

        let out = int_buffer("ID");
        let mut select = ExecutableStatement::new();
        select.init(&db, false).unwrap();
        select.bind_column(&out, 1).unwrap();
        select.execute_direct("SELECT ID FROM NUMBERS ORDER BY ID").unwrap();
        assert!(select.select_next().unwrap());
        assert!(!select.select_relative(i64::MAX).unwrap());
        assert!(select.select_last().unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(2));
        assert!(!select.select_relative(i64::MIN).unwrap());
        assert!(!select.select_absolute(i64::MIN).unwrap());
        assert!(!select.select_absolute(i64::MAX).unwrap());
        assert!(select.select_absolute(-1).unwrap());
        assert_eq!(out.borrow().value(), Value::Integer(2));
    }

    #[test]
    fn test_no_data_tolerance() {
        let db = database();
        let mut stmt = ExecutableStatement::new();
        stmt.init(&db, true).unwrap();
        let affected = stmt
            .execute_direct_with("DELETE FROM NUMBERS WHERE ID = 42", false)
            .unwrap();
        assert!(!affected);
        let err = stmt
            .execute_direct("DELETE FROM NUMBERS WHERE ID = 42")
            .unwrap_err();
        assert_eq!(err.sql_return(), Some(SqlReturn::NoData));
    }

    #[test]
    fn test_driver_error_carries_states() {
        let db = database();
        let mut stmt = ExecutableStatement::new();
        stmt.init(&db, true).unwrap();
        let err = stmt.execute_direct("SELECT ID FROM MISSING").unwrap_err();
        assert_eq!(err.sql_return(), Some(SqlReturn::Error));
        assert_eq!(err.sql_states(), vec!["42S02"]);
        assert!(err.to_string().contains("SQLExecDirect"));
    }

    #[test]
    fn test_forward_only_rejects_scrolling() {
        let db = database();
        let mut stmt = ExecutableStatement::new();
        stmt.init(&db, true).unwrap();
        stmt.execute_direct("SELECT ID FROM NUMBERS").unwrap();
        let err = stmt.select_first().unwrap_err();
        assert_eq!(err.sql_states(), vec!["HY106"]);
        assert!(!stmt.select_next().unwrap());
    }
}

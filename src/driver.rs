//! Call-level interface consumed by this crate.
//!
//! A [`Driver`] stands for an open connection handle: it hands out statement
//! handles and answers catalog queries. A [`StatementHandle`] mirrors the
//! statement-level calls of the call-level interface; every call reports a
//! [`SqlReturn`] and leaves its diagnostics on the handle until the next call.
//! Dropping a statement handle frees it.

use std::fmt;

use crate::buffer::ColumnBufferPtr;
use crate::constants::*;
use crate::error::{Diagnostic, Error, Result};
use crate::flags::TablePrivileges;
use crate::types::{ColumnInfo, SqlTypeInfo, TableInfo};

/// Return code of a call-level function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlReturn {
    Success,
    SuccessWithInfo,
    NeedData,
    NoData,
    Error,
    InvalidHandle,
}

impl SqlReturn {
    /// Create from the raw return code.
    pub fn from_raw(code: i16) -> Self {
        match code {
            SQL_SUCCESS => SqlReturn::Success,
            SQL_SUCCESS_WITH_INFO => SqlReturn::SuccessWithInfo,
            SQL_NEED_DATA => SqlReturn::NeedData,
            SQL_NO_DATA => SqlReturn::NoData,
            SQL_INVALID_HANDLE => SqlReturn::InvalidHandle,
            _ => SqlReturn::Error,
        }
    }

    /// Raw return code.
    pub fn code(&self) -> i16 {
        match self {
            SqlReturn::Success => SQL_SUCCESS,
            SqlReturn::SuccessWithInfo => SQL_SUCCESS_WITH_INFO,
            SqlReturn::NeedData => SQL_NEED_DATA,
            SqlReturn::NoData => SQL_NO_DATA,
            SqlReturn::Error => SQL_ERROR,
            SqlReturn::InvalidHandle => SQL_INVALID_HANDLE,
        }
    }

    /// `Success` or `SuccessWithInfo`.
    pub fn is_success(&self) -> bool {
        matches!(self, SqlReturn::Success | SqlReturn::SuccessWithInfo)
    }
}

impl fmt::Display for SqlReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// Cursor movement requested from `fetch_scroll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrientation {
    Next,
    Prior,
    First,
    Last,
    /// 1-based absolute row; negative counts from the end.
    Absolute(i64),
    /// Offset from the current row.
    Relative(i64),
}

/// A statement handle.
pub trait StatementHandle {
    /// Request a scrollable (static) or forward-only cursor.
    fn set_scrollable(&mut self, scrollable: bool) -> SqlReturn;

    /// Query timeout in seconds; 0 disables it.
    fn set_query_timeout(&mut self, seconds: u32) -> SqlReturn;

    /// Prepare SQL text containing `?` parameter markers.
    fn prepare(&mut self, sql: &str) -> SqlReturn;

    /// Execute the prepared statement with the current parameter buffer contents.
    fn execute(&mut self) -> SqlReturn;

    /// Execute ad hoc SQL text.
    fn exec_direct(&mut self, sql: &str) -> SqlReturn;

    /// Bind a buffer to the 1-based parameter marker `ordinal`.
    fn bind_parameter(&mut self, ordinal: u16, buffer: ColumnBufferPtr) -> SqlReturn;

    /// Bind a buffer to the 1-based result column `ordinal`.
    fn bind_column(&mut self, ordinal: u16, buffer: ColumnBufferPtr) -> SqlReturn;

    /// Move the cursor and transfer the row into the bound column buffers.
    fn fetch_scroll(&mut self, orientation: FetchOrientation) -> SqlReturn;

    /// Close an open cursor, keeping the prepared statement and bindings.
    /// Fails with 24000 if no cursor is open.
    fn close_cursor(&mut self) -> SqlReturn;

    /// Columns in the result set of the last execution; 0 if it produced none.
    fn num_result_cols(&self) -> i16;

    /// Rows affected by the last INSERT, UPDATE or DELETE.
    fn row_count(&self) -> i64;

    /// Diagnostics of the last call.
    fn diagnostics(&self) -> Vec<Diagnostic>;
}

/// An open connection handle.
pub trait Driver {
    /// Allocate a new statement handle.
    fn alloc_statement(&self) -> Result<Box<dyn StatementHandle>>;

    /// DBMS product name.
    fn dbms_name(&self) -> String;

    /// Tables matching the given criteria; `None` matches everything.
    fn tables(
        &self,
        name: Option<&str>,
        schema: Option<&str>,
        catalog: Option<&str>,
        table_type: Option<&str>,
    ) -> Result<Vec<TableInfo>>;

    /// Columns of a table, ordered by ordinal position.
    fn columns(&self, table: &TableInfo) -> Result<Vec<ColumnInfo>>;

    /// Primary key column names of a table, ordered by key sequence.
    fn primary_keys(&self, table: &TableInfo) -> Result<Vec<String>>;

    /// Privileges the connected user holds on a table.
    fn table_privileges(&self, table: &TableInfo) -> Result<TablePrivileges>;

    /// SQL types the data source supports.
    fn type_info(&self) -> Result<Vec<SqlTypeInfo>>;

    /// Switch autocommit on or off.
    fn set_autocommit(&self, enabled: bool) -> Result<()>;

    /// Commit (`true`) or roll back (`false`) the current transaction.
    fn end_transaction(&self, commit: bool) -> Result<()>;
}

/// Turn a non-success return into an error carrying the handle diagnostics.
pub(crate) fn check(
    ret: SqlReturn,
    handle: &dyn StatementHandle,
    context: impl FnOnce() -> String,
) -> Result<SqlReturn> {
    match ret {
        SqlReturn::Success => Ok(ret),
        SqlReturn::SuccessWithInfo => {
            let context = context();
            for diagnostic in handle.diagnostics() {
                tracing::warn!(%diagnostic, "{} returned with info", context);
            }
            Ok(ret)
        }
        _ => Err(Error::SqlResult {
            ret,
            context: context(),
            diagnostics: handle.diagnostics(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_return_codes() {
        for ret in [
            SqlReturn::Success,
            SqlReturn::SuccessWithInfo,
            SqlReturn::NeedData,
            SqlReturn::NoData,
            SqlReturn::Error,
            SqlReturn::InvalidHandle,
        ] {
            assert_eq!(SqlReturn::from_raw(ret.code()), ret);
        }
        assert!(SqlReturn::SuccessWithInfo.is_success());
        assert!(!SqlReturn::NoData.is_success());
        assert_eq!(SqlReturn::from_raw(-77), SqlReturn::Error);
        assert_eq!(SqlReturn::NoData.to_string(), "NoData (100)");
    }
}

//! Options applied when opening a table.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::flags::TableOpenFlags;

/// Parameters for [`Table::open`](crate::Table::open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenParams {
    /// Open flags (default: `CHECK_EXISTANCE`).
    pub flags: TableOpenFlags,
    /// Query timeout passed to the select statement.
    pub query_timeout: Option<Duration>,
    /// Column indexes forming the primary key. Suppresses primary key discovery.
    pub primary_keys: Option<BTreeSet<u16>>,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self {
            flags: TableOpenFlags::CHECK_EXISTANCE,
            query_timeout: None,
            primary_keys: None,
        }
    }
}

impl OpenParams {
    /// Create parameters with the default flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the open flags.
    ///
    /// # Example
    ///
    /// ```
    /// use odbc_table::{OpenParams, TableOpenFlags};
    ///
    /// let params = OpenParams::new()
    ///     .with_flags(TableOpenFlags::SKIP_UNSUPPORTED_COLUMNS);
    /// assert!(!params.flags.contains(TableOpenFlags::CHECK_EXISTANCE));
    /// ```
    pub fn with_flags(mut self, flags: TableOpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Add flags to the current set.
    pub fn with_flag(mut self, flag: TableOpenFlags) -> Self {
        self.flags |= flag;
        self
    }

    /// Set the query timeout of the select statement.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Mark the columns at `indexes` as the primary key.
    pub fn with_primary_keys(mut self, indexes: impl IntoIterator<Item = u16>) -> Self {
        self.primary_keys = Some(indexes.into_iter().collect());
        self
    }
}

//! Error types for table and statement operations.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

use crate::driver::SqlReturn;
use crate::flags::{ColumnFlags, TableAccessFlags, TablePrivileges};

/// Result type alias for table operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single diagnostic record reported by the driver for the last call on a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Five character SQLSTATE.
    pub sql_state: String,
    /// Driver specific error code.
    pub native_error: i32,
    /// Driver message text.
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic record.
    pub fn new(sql_state: impl Into<String>, native_error: i32, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.into(),
            native_error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (native {})",
            self.sql_state, self.message, self.native_error
        )
    }
}

struct DiagnosticList<'a>(&'a [Diagnostic]);

impl fmt::Display for DiagnosticList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no diagnostics");
        }
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

/// Error type for table, statement and buffer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic failure with the location it was raised at.
    #[error("{message} (at {location})")]
    Generic {
        message: String,
        location: &'static Location<'static>,
    },

    /// A driver call returned a non-success code.
    #[error("{context} failed with {ret:?}: {}", DiagnosticList(.diagnostics))]
    SqlResult {
        ret: SqlReturn,
        context: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// A catalog lookup matched nothing.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// A catalog lookup that must match exactly one table matched several.
    #[error("Table '{name}' is ambiguous: {count} catalog matches")]
    AmbiguousTable { name: String, count: usize },

    /// No buffer type exists for the SQL type of a column.
    #[error("SQL type {sql_type} of column '{column}' is not supported")]
    NotSupported { sql_type: i16, column: String },

    /// Bad index, misuse or call in the wrong table state.
    #[error("Illegal argument: {message}")]
    IllegalArgument { message: String },

    /// A column carries a capability the table access flags do not grant.
    #[error("Column '{column}' at index {index} has flag {flag:?} but table access flags are {access:?}")]
    InvalidColumnFlags {
        column: String,
        index: u16,
        flag: ColumnFlags,
        access: TableAccessFlags,
    },

    /// A non-null read hit a null value.
    #[error("Column '{column}' at index {index} is NULL")]
    NullValue { column: String, index: u16 },

    /// The connected user lacks privileges required by the table access flags.
    #[error("Missing privileges {missing:?} on table '{table}'")]
    MissingTablePrivilege {
        table: String,
        missing: TablePrivileges,
    },

    /// A value does not fit into the fixed capacity of a buffer.
    #[error("Value of {len} units does not fit column '{column}' (capacity {capacity})")]
    ValueTooLong {
        column: String,
        len: usize,
        capacity: usize,
    },

    /// A value of the wrong kind was written to a buffer.
    #[error("Column '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },
}

impl Error {
    /// Create a generic error tagged with the caller location.
    #[track_caller]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Create an illegal argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// The return code carried by a `SqlResult` error.
    pub fn sql_return(&self) -> Option<SqlReturn> {
        match self {
            Error::SqlResult { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    /// SQLSTATEs carried by a `SqlResult` error.
    pub fn sql_states(&self) -> Vec<&str> {
        match self {
            Error::SqlResult { diagnostics, .. } => {
                diagnostics.iter().map(|d| d.sql_state.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

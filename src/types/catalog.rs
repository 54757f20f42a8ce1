//! Catalog records describing tables, columns and supported SQL types.

use crate::constants::{SQL_NO_NULLS, SQL_NULLABLE};

/// Nullability reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nullability {
    NoNulls,
    Nullable,
    #[default]
    Unknown,
}

impl Nullability {
    /// Create from the raw catalog code.
    pub fn from_raw(code: i16) -> Self {
        match code {
            SQL_NO_NULLS => Nullability::NoNulls,
            SQL_NULLABLE => Nullability::Nullable,
            _ => Nullability::Unknown,
        }
    }

    /// Treats unknown as nullable.
    pub fn allows_null(&self) -> bool {
        !matches!(self, Nullability::NoNulls)
    }
}

/// Identity of a table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Schema the table lives in, if the database has schemas.
    pub schema: Option<String>,
    /// Catalog the table lives in, if the database has catalogs.
    pub catalog: Option<String>,
    /// Table type (`TABLE`, `VIEW`, `SYSTEM TABLE`, ...).
    pub table_type: String,
    /// Remarks.
    pub remarks: String,
}

impl TableInfo {
    /// Create table info with only a name and type.
    pub fn new(name: impl Into<String>, table_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_type: table_type.into(),
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

    /// Name used inside generated SQL: `[catalog.][schema.]name`.
    pub fn query_name(&self) -> String {
        [self.catalog.as_deref(), self.schema.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// One column of a table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Owning table name.
    pub table_name: String,
    /// Column name.
    pub column_name: String,
    /// SQL data type code.
    pub sql_type: i16,
    /// Database specific type name.
    pub type_name: String,
    /// Column size (characters for character types, precision for numerics).
    pub column_size: usize,
    /// Decimal digits (scale).
    pub decimal_digits: i16,
    /// Nullability.
    pub nullable: Nullability,
    /// 1-based position of the column in the table.
    pub ordinal_position: u16,
    /// Default value expression, if any.
    pub default_value: Option<String>,
    /// Remarks.
    pub remarks: String,
}

impl ColumnInfo {
    /// Create column info with the fields needed to build a buffer.
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        sql_type: i16,
        column_size: usize,
        decimal_digits: i16,
        nullable: Nullability,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            sql_type,
            type_name: String::new(),
            column_size,
            decimal_digits,
            nullable,
            ordinal_position: 0,
            default_value: None,
            remarks: String::new(),
        }
    }

    /// Name used inside generated SQL.
    pub fn query_name(&self) -> &str {
        &self.column_name
    }
}

/// A SQL type the database reports as supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTypeInfo {
    /// Database specific type name.
    pub type_name: String,
    /// SQL data type code.
    pub sql_type: i16,
    /// Maximum column size.
    pub column_size: usize,
    /// Nullability.
    pub nullable: Nullability,
}

impl SqlTypeInfo {
    pub fn new(type_name: impl Into<String>, sql_type: i16, column_size: usize) -> Self {
        Self {
            type_name: type_name.into(),
            sql_type,
            column_size,
            nullable: Nullability::Nullable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_query_name() {
        assert_eq!(TableInfo::new("T1", "TABLE").query_name(), "T1");
        assert_eq!(
            TableInfo::new("T1", "TABLE").with_schema("dbo").query_name(),
            "dbo.T1"
        );
        assert_eq!(
            TableInfo::new("T1", "TABLE")
                .with_schema("dbo")
                .with_catalog("db")
                .query_name(),
            "db.dbo.T1"
        );
        assert_eq!(
            TableInfo::new("T1", "TABLE").with_schema("").query_name(),
            "T1"
        );
    }

    #[test]
    fn test_nullability() {
        assert_eq!(Nullability::from_raw(0), Nullability::NoNulls);
        assert_eq!(Nullability::from_raw(1), Nullability::Nullable);
        assert_eq!(Nullability::from_raw(2), Nullability::Unknown);
        assert!(Nullability::Unknown.allows_null());
        assert!(!Nullability::NoNulls.allows_null());
    }
}

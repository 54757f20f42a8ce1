//! Table store and statement evaluation for the in-memory driver.

use std::cmp::Ordering;

use crate::constants::*;
use crate::error::Diagnostic;
use crate::flags::TablePrivileges;
use crate::types::{ColumnInfo, SqlTypeInfo, TableInfo, Value};

use super::parser::{CmpOp, Expr, OrderBy, Projection, Statement};

pub(crate) type Row = Vec<Value>;

#[derive(Debug, Clone)]
pub(crate) struct MemoryTable {
    pub info: TableInfo,
    pub columns: Vec<ColumnInfo>,
    pub primary_keys: Vec<String>,
    pub privileges: TablePrivileges,
    pub rows: Vec<Row>,
}

impl MemoryTable {
    fn column_position(&self, name: &str) -> Result<usize, Diagnostic> {
        self.columns
            .iter()
            .position(|c| c.column_name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Diagnostic::new(
                    "42S22",
                    207,
                    format!("Invalid column name '{}'", name),
                )
            })
    }

    fn require(&self, privilege: TablePrivileges) -> Result<(), Diagnostic> {
        if self.privileges.contains(privilege) {
            return Ok(());
        }
        Err(Diagnostic::new(
            "42000",
            229,
            format!(
                "{:?} permission denied on table '{}'",
                privilege, self.info.name
            ),
        ))
    }

    /// NOT NULL and primary key uniqueness over `rows`.
    fn check_constraints(&self, rows: &[Row]) -> Result<(), Diagnostic> {
        for row in rows {
            for (column, value) in self.columns.iter().zip(row) {
                if value.is_null() && !column.nullable.allows_null() {
                    return Err(Diagnostic::new(
                        "23000",
                        515,
                        format!("Cannot insert NULL into column '{}'", column.column_name),
                    ));
                }
            }
        }
        if self.primary_keys.is_empty() {
            return Ok(());
        }
        let key_positions: Vec<usize> = self
            .primary_keys
            .iter()
            .filter_map(|k| self.column_position(k).ok())
            .collect();
        for (i, a) in rows.iter().enumerate() {
            for b in &rows[i + 1..] {
                let same_key = key_positions
                    .iter()
                    .all(|&p| a[p].sql_cmp(&b[p]) == Some(Ordering::Equal));
                if same_key {
                    return Err(Diagnostic::new(
                        "23000",
                        2627,
                        format!(
                            "Violation of PRIMARY KEY constraint on table '{}'",
                            self.info.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Rows { columns: usize, rows: Vec<Row> },
    Affected(usize),
}

#[derive(Debug)]
pub(crate) struct Store {
    pub tables: Vec<MemoryTable>,
    pub dbms_name: String,
    pub type_infos: Vec<SqlTypeInfo>,
    pub autocommit: bool,
    /// Committed rows per table while in manual commit mode.
    pub snapshot: Option<Vec<(String, Vec<Row>)>>,
}

impl Store {
    pub(crate) fn table(&self, query_name: &str) -> Result<&MemoryTable, Diagnostic> {
        self.tables
            .iter()
            .find(|t| t.info.query_name().eq_ignore_ascii_case(query_name))
            .ok_or_else(|| missing_table(query_name))
    }

    fn table_mut(&mut self, query_name: &str) -> Result<&mut MemoryTable, Diagnostic> {
        self.tables
            .iter_mut()
            .find(|t| t.info.query_name().eq_ignore_ascii_case(query_name))
            .ok_or_else(|| missing_table(query_name))
    }

    pub(crate) fn take_snapshot(&mut self) {
        self.snapshot = Some(
            self.tables
                .iter()
                .map(|t| (t.info.query_name(), t.rows.clone()))
                .collect(),
        );
    }

    pub(crate) fn restore_snapshot(&mut self) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        for table in &mut self.tables {
            let name = table.info.query_name();
            table.rows = snapshot
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default();
        }
    }

    /// Execute `statement` with positional parameter values.
    pub(crate) fn execute(&mut self, statement: &Statement, params: &[Value]) -> Result<Outcome, Diagnostic> {
        match statement {
            Statement::Select {
                table,
                projection,
                filter,
                order_by,
            } => {
                let table = self.table(table)?;
                table.require(TablePrivileges::SELECT)?;
                select(table, projection, filter.as_ref(), order_by, params)
            }
            Statement::Insert {
                table,
                columns,
                values,
            } => {
                let table = self.table_mut(table)?;
                table.require(TablePrivileges::INSERT)?;
                if columns.len() != values.len() {
                    return Err(Diagnostic::new(
                        "21S01",
                        0,
                        "Insert value list does not match column list",
                    ));
                }
                let mut row = vec![Value::Null; table.columns.len()];
                for (column, expr) in columns.iter().zip(values) {
                    let position = table.column_position(column)?;
                    let value = eval(expr, None, table, params)?;
                    row[position] = coerce(&table.columns[position], value)?;
                }
                let mut rows = table.rows.clone();
                rows.push(row);
                table.check_constraints(&rows)?;
                table.rows = rows;
                Ok(Outcome::Affected(1))
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let table = self.table_mut(table)?;
                table.require(TablePrivileges::UPDATE)?;
                let mut rows = table.rows.clone();
                let mut affected = 0;
                for row in rows.iter_mut() {
                    if !matches(filter.as_ref(), row, table, params)? {
                        continue;
                    }
                    let mut updated = row.clone();
                    for (column, expr) in assignments {
                        let position = table.column_position(column)?;
                        let value = eval(expr, Some(&*row), table, params)?;
                        updated[position] = coerce(&table.columns[position], value)?;
                    }
                    *row = updated;
                    affected += 1;
                }
                table.check_constraints(&rows)?;
                table.rows = rows;
                Ok(Outcome::Affected(affected))
            }
            Statement::Delete { table, filter } => {
                let table = self.table_mut(table)?;
                table.require(TablePrivileges::DELETE)?;
                let mut kept = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    if !matches(filter.as_ref(), row, table, params)? {
                        kept.push(row.clone());
                    }
                }
                let affected = table.rows.len() - kept.len();
                table.rows = kept;
                Ok(Outcome::Affected(affected))
            }
        }
    }
}

/// Store numbers with the width of the column type.
fn coerce(column: &ColumnInfo, value: Value) -> Result<Value, Diagnostic> {
    if value.is_null() {
        return Ok(value);
    }
    let invalid = || {
        Diagnostic::new(
            "22018",
            245,
            format!(
                "Invalid value {} for column '{}'",
                value, column.column_name
            ),
        )
    };
    Ok(match column.sql_type {
        SQL_SMALLINT | SQL_TINYINT | SQL_BIT => Value::SmallInt(
            value
                .to_i64()
                .and_then(|v| i16::try_from(v).ok())
                .ok_or_else(invalid)?,
        ),
        SQL_INTEGER => Value::Integer(
            value
                .to_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(invalid)?,
        ),
        SQL_BIGINT => Value::BigInt(value.to_i64().ok_or_else(invalid)?),
        SQL_REAL => Value::Real(value.to_f64().ok_or_else(invalid)? as f32),
        SQL_FLOAT | SQL_DOUBLE => Value::Double(value.to_f64().ok_or_else(invalid)?),
        _ => value,
    })
}

fn missing_table(name: &str) -> Diagnostic {
    Diagnostic::new("42S02", 208, format!("Invalid object name '{}'", name))
}

fn select(
    table: &MemoryTable,
    projection: &Projection,
    filter: Option<&Expr>,
    order_by: &[OrderBy],
    params: &[Value],
) -> Result<Outcome, Diagnostic> {
    let mut rows = Vec::new();
    for row in &table.rows {
        if matches(filter, row, table, params)? {
            rows.push(row.clone());
        }
    }

    let positions: Vec<usize> = match projection {
        Projection::Count => {
            return Ok(Outcome::Rows {
                columns: 1,
                rows: vec![vec![Value::BigInt(rows.len() as i64)]],
            })
        }
        Projection::All => (0..table.columns.len()).collect(),
        Projection::Columns(names) => names
            .iter()
            .map(|n| table.column_position(n))
            .collect::<Result<_, _>>()?,
    };

    let sort_keys: Vec<(usize, bool)> = order_by
        .iter()
        .map(|o| table.column_position(&o.column).map(|p| (p, o.descending)))
        .collect::<Result<_, _>>()?;
    rows.sort_by(|a, b| {
        for &(p, descending) in &sort_keys {
            let ordering = match (a[p].is_null(), b[p].is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a[p].sql_cmp(&b[p]).unwrap_or(Ordering::Equal),
            };
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(Outcome::Rows {
        columns: positions.len(),
        rows: rows
            .into_iter()
            .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
            .collect(),
    })
}

fn matches(filter: Option<&Expr>, row: &Row, table: &MemoryTable, params: &[Value]) -> Result<bool, Diagnostic> {
    match filter {
        None => Ok(true),
        Some(expr) => Ok(truth(expr, row, table, params)? == Some(true)),
    }
}

/// Three-valued truth of a predicate; `None` is UNKNOWN.
fn truth(expr: &Expr, row: &Row, table: &MemoryTable, params: &[Value]) -> Result<Option<bool>, Diagnostic> {
    Ok(match expr {
        Expr::And(a, b) => match (truth(a, row, table, params)?, truth(b, row, table, params)?) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Expr::Or(a, b) => match (truth(a, row, table, params)?, truth(b, row, table, params)?) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Expr::Not(e) => truth(e, row, table, params)?.map(|v| !v),
        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, Some(row), table, params)?.is_null();
            Some(is_null != *negated)
        }
        Expr::Cmp(op, a, b) => {
            let a = eval(a, Some(row), table, params)?;
            let b = eval(b, Some(row), table, params)?;
            a.sql_cmp(&b).map(|ordering| match op {
                CmpOp::Eq => ordering == Ordering::Equal,
                CmpOp::Ne => ordering != Ordering::Equal,
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                CmpOp::Ge => ordering != Ordering::Less,
            })
        }
        other => {
            return Err(Diagnostic::new(
                "42000",
                4145,
                format!("Expression {:?} is not a predicate", other),
            ))
        }
    })
}

fn eval(expr: &Expr, row: Option<&Row>, table: &MemoryTable, params: &[Value]) -> Result<Value, Diagnostic> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(i) => params.get(*i).cloned().ok_or_else(|| {
            Diagnostic::new("07002", 0, format!("No value bound for parameter {}", i + 1))
        }),
        Expr::Column(name) => {
            let position = table.column_position(name)?;
            match row {
                Some(row) => Ok(row[position].clone()),
                None => Err(Diagnostic::new(
                    "42000",
                    128,
                    format!("Column '{}' is not allowed in this context", name),
                )),
            }
        }
        other => Err(Diagnostic::new(
            "42000",
            4145,
            format!("Predicate {:?} used as a value", other),
        )),
    }
}

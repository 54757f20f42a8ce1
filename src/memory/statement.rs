//! Statement handle of the in-memory driver.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::buffer::ColumnBufferPtr;
use crate::driver::{FetchOrientation, SqlReturn, StatementHandle};
use crate::error::{Diagnostic, Error};
use crate::types::Value;

use super::engine::{Outcome, Row, Store};
use super::parser::{parse, Parsed, Statement};

pub(crate) struct MemoryStatement {
    store: Rc<RefCell<Store>>,
    scrollable: bool,
    timeout: u32,
    prepared: Option<Parsed>,
    params: BTreeMap<u16, ColumnBufferPtr>,
    columns: BTreeMap<u16, ColumnBufferPtr>,
    /// Result set of the last query; `None` without an open cursor.
    result: Option<Vec<Row>>,
    result_columns: i16,
    /// 0 is before the first row, `len + 1` after the last.
    position: usize,
    row_count: i64,
    diagnostics: Vec<Diagnostic>,
}

impl MemoryStatement {
    pub(crate) fn new(store: Rc<RefCell<Store>>) -> Self {
        Self {
            store,
            scrollable: false,
            timeout: 0,
            prepared: None,
            params: BTreeMap::new(),
            columns: BTreeMap::new(),
            result: None,
            result_columns: 0,
            position: 0,
            row_count: -1,
            diagnostics: Vec::new(),
        }
    }

    fn fail(&mut self, diagnostic: Diagnostic) -> SqlReturn {
        tracing::trace!(%diagnostic, "memory statement error");
        self.diagnostics.push(diagnostic);
        SqlReturn::Error
    }

    fn param_values(&self, count: usize) -> Result<Vec<Value>, Diagnostic> {
        (1..=count)
            .map(|ordinal| {
                u16::try_from(ordinal)
                    .ok()
                    .and_then(|o| self.params.get(&o))
                    .map(|buffer| buffer.borrow().value())
                    .ok_or_else(|| {
                        Diagnostic::new(
                            "07002",
                            0,
                            format!("No buffer bound for parameter {}", ordinal),
                        )
                    })
            })
            .collect()
    }

    fn run(&mut self, parsed: &Parsed) -> SqlReturn {
        self.result = None;
        self.result_columns = 0;
        self.position = 0;
        let params = match self.param_values(parsed.param_count) {
            Ok(params) => params,
            Err(diagnostic) => return self.fail(diagnostic),
        };
        let outcome = self.store.borrow_mut().execute(&parsed.statement, &params);
        match outcome {
            Ok(Outcome::Rows { columns, rows }) => {
                self.row_count = rows.len() as i64;
                self.result_columns = i16::try_from(columns).unwrap_or(i16::MAX);
                self.result = Some(rows);
                SqlReturn::Success
            }
            Ok(Outcome::Affected(affected)) => {
                self.row_count = affected as i64;
                let searched = matches!(
                    parsed.statement,
                    Statement::Update { .. } | Statement::Delete { .. }
                );
                if affected == 0 && searched {
                    SqlReturn::NoData
                } else {
                    SqlReturn::Success
                }
            }
            Err(diagnostic) => self.fail(diagnostic),
        }
    }

    fn transfer_row(&mut self) -> SqlReturn {
        let Some(row) = self
            .result
            .as_ref()
            .and_then(|rows| rows.get(self.position - 1))
            .cloned()
        else {
            return SqlReturn::NoData;
        };
        let mut truncated = false;
        for (&ordinal, buffer) in &self.columns {
            let Some(value) = row.get(usize::from(ordinal) - 1) else {
                let diagnostic =
                    Diagnostic::new("07009", 0, format!("Invalid column number {}", ordinal));
                self.diagnostics.push(diagnostic);
                return SqlReturn::Error;
            };
            match buffer.borrow_mut().set_value(value.clone()) {
                Ok(()) => {}
                Err(Error::ValueTooLong { column, .. }) => {
                    truncated = true;
                    self.diagnostics.push(Diagnostic::new(
                        "01004",
                        0,
                        format!("String data right truncated for column '{}'", column),
                    ));
                }
                Err(e) => {
                    self.diagnostics
                        .push(Diagnostic::new("07006", 0, e.to_string()));
                    return SqlReturn::Error;
                }
            }
        }
        if truncated {
            SqlReturn::SuccessWithInfo
        } else {
            SqlReturn::Success
        }
    }
}

impl StatementHandle for MemoryStatement {
    fn set_scrollable(&mut self, scrollable: bool) -> SqlReturn {
        self.diagnostics.clear();
        self.scrollable = scrollable;
        SqlReturn::Success
    }

    fn set_query_timeout(&mut self, seconds: u32) -> SqlReturn {
        self.diagnostics.clear();
        self.timeout = seconds;
        tracing::trace!(seconds = self.timeout, "query timeout set");
        SqlReturn::Success
    }

    fn prepare(&mut self, sql: &str) -> SqlReturn {
        self.diagnostics.clear();
        match parse(sql) {
            Ok(parsed) => {
                self.prepared = Some(parsed);
                SqlReturn::Success
            }
            Err(e) => {
                self.prepared = None;
                self.fail(Diagnostic::new("42000", 102, format!("Syntax error: {}", e)))
            }
        }
    }

    fn execute(&mut self) -> SqlReturn {
        self.diagnostics.clear();
        match self.prepared.clone() {
            Some(parsed) => self.run(&parsed),
            None => self.fail(Diagnostic::new("HY010", 0, "Function sequence error")),
        }
    }

    fn exec_direct(&mut self, sql: &str) -> SqlReturn {
        self.diagnostics.clear();
        match parse(sql) {
            Ok(parsed) => self.run(&parsed),
            Err(e) => self.fail(Diagnostic::new("42000", 102, format!("Syntax error: {}", e))),
        }
    }

    fn bind_parameter(&mut self, ordinal: u16, buffer: ColumnBufferPtr) -> SqlReturn {
        self.diagnostics.clear();
        if ordinal == 0 {
            return self.fail(Diagnostic::new("07009", 0, "Invalid parameter number 0"));
        }
        self.params.insert(ordinal, buffer);
        SqlReturn::Success
    }

    fn bind_column(&mut self, ordinal: u16, buffer: ColumnBufferPtr) -> SqlReturn {
        self.diagnostics.clear();
        if ordinal == 0 {
            return self.fail(Diagnostic::new("07009", 0, "Invalid column number 0"));
        }
        self.columns.insert(ordinal, buffer);
        SqlReturn::Success
    }

    fn fetch_scroll(&mut self, orientation: FetchOrientation) -> SqlReturn {
        self.diagnostics.clear();
        let Some(len) = self.result.as_ref().map(Vec::len) else {
            return self.fail(Diagnostic::new("24000", 0, "Invalid cursor state"));
        };
        if !self.scrollable && orientation != FetchOrientation::Next {
            return self.fail(Diagnostic::new(
                "HY106",
                0,
                "Fetch type out of range for a forward-only cursor",
            ));
        }
        let len = len as i64;
        let current = self.position as i64;
        let target = match orientation {
            FetchOrientation::Next => current + 1,
            FetchOrientation::Prior => current - 1,
            FetchOrientation::First => 1,
            FetchOrientation::Last => len,
            FetchOrientation::Absolute(n) if n < 0 => n.saturating_add(len + 1),
            FetchOrientation::Absolute(n) => n,
            FetchOrientation::Relative(n) => current.saturating_add(n),
        };
        if target < 1 {
            self.position = 0;
            return SqlReturn::NoData;
        }
        if target > len {
            self.position = (len + 1) as usize;
            return SqlReturn::NoData;
        }
        self.position = target as usize;
        self.transfer_row()
    }

    fn close_cursor(&mut self) -> SqlReturn {
        self.diagnostics.clear();
        if self.result.take().is_none() {
            return self.fail(Diagnostic::new("24000", 0, "Invalid cursor state"));
        }
        self.result_columns = 0;
        self.position = 0;
        SqlReturn::Success
    }

    fn num_result_cols(&self) -> i16 {
        self.result_columns
    }

    fn row_count(&self) -> i64 {
        self.row_count
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }
}

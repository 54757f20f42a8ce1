//! Recursive descent parser producing statements for the in-memory engine.
//!
//! Grammar:
//!
//! ```text
//! select  := SELECT (COUNT(*) | * | name, ...) FROM table [WHERE expr] [ORDER BY name [ASC|DESC], ...]
//! insert  := INSERT INTO table (name, ...) VALUES (expr, ...)
//! update  := UPDATE table SET name = expr, ... [WHERE expr]
//! delete  := DELETE FROM table [WHERE expr]
//! expr    := and (OR and)*
//! and     := not (AND not)*
//! not     := NOT not | cmp
//! cmp     := primary [op primary | IS [NOT] NULL]
//! primary := (expr) | literal | ? | name
//! ```

use crate::types::Value;

use super::lexer::{LexErr, Lexer, Token};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Column(String),
    Literal(Value),
    /// 0-based parameter marker position.
    Param(usize),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull { expr: Box<Expr>, negated: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Count,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Select {
        table: String,
        projection: Projection,
        filter: Option<Expr>,
        order_by: Vec<OrderBy>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Expr>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        filter: Option<Expr>,
    },
    Delete {
        table: String,
        filter: Option<Expr>,
    },
}

impl Statement {
    pub(crate) fn table(&self) -> &str {
        match self {
            Statement::Select { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => table,
        }
    }
}

/// A parsed statement with the number of `?` markers it contains.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parsed {
    pub statement: Statement,
    pub param_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParseErr {
    Lex(LexErr),
    UnexpectedEof,
    Unexpected { expected: String, found: String },
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::Lex(e) => write!(f, "{}", e),
            ParseErr::UnexpectedEof => write!(f, "unexpected end of statement"),
            ParseErr::Unexpected { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
        }
    }
}

type PResult<T> = Result<T, ParseErr>;

/// Parse one statement.
pub(crate) fn parse(sql: &str) -> PResult<Parsed> {
    let tokens = Lexer::new(sql).tokenize().map_err(ParseErr::Lex)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        params: 0,
    };
    let statement = parser.statement()?;
    if let Some(token) = parser.peek() {
        return Err(ParseErr::Unexpected {
            expected: "end of statement".into(),
            found: format!("{:?}", token),
        });
    }
    Ok(Parsed {
        statement,
        param_count: parser.params,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    params: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> PResult<Token> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ParseErr::UnexpectedEof)?;
        self.pos += 1;
        Ok(token)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            return Ok(());
        }
        Err(self.unexpected(keyword))
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> PResult<()> {
        if self.eat(&token) {
            return Ok(());
        }
        Err(self.unexpected(&format!("{:?}", token)))
    }

    fn unexpected(&self, expected: &str) -> ParseErr {
        match self.peek() {
            Some(found) => ParseErr::Unexpected {
                expected: expected.to_string(),
                found: format!("{:?}", found),
            },
            None => ParseErr::UnexpectedEof,
        }
    }

    fn ident(&mut self) -> PResult<String> {
        match self.next()? {
            Token::Ident(s) | Token::Quoted(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(ParseErr::Unexpected {
                    expected: "identifier".into(),
                    found: format!("{:?}", other),
                })
            }
        }
    }

    /// `a.b.c` as written.
    fn qualified_name(&mut self) -> PResult<String> {
        let mut name = self.ident()?;
        while self.eat(&Token::Dot) {
            name.push('.');
            name.push_str(&self.ident()?);
        }
        Ok(name)
    }

    /// Column reference; a table qualifier is dropped.
    fn column_name(&mut self) -> PResult<String> {
        let name = self.qualified_name()?;
        Ok(name.rsplit('.').next().unwrap_or_default().to_string())
    }

    fn name_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.column_name()?];
        while self.eat(&Token::Comma) {
            names.push(self.column_name()?);
        }
        Ok(names)
    }

    fn statement(&mut self) -> PResult<Statement> {
        if self.eat_keyword("SELECT") {
            self.select()
        } else if self.eat_keyword("INSERT") {
            self.insert()
        } else if self.eat_keyword("UPDATE") {
            self.update()
        } else if self.eat_keyword("DELETE") {
            self.delete()
        } else {
            Err(self.unexpected("SELECT, INSERT, UPDATE or DELETE"))
        }
    }

    fn filter(&mut self) -> PResult<Option<Expr>> {
        if self.eat_keyword("WHERE") {
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    fn select(&mut self) -> PResult<Statement> {
        let projection = if self.eat(&Token::Star) {
            Projection::All
        } else if self.is_keyword("COUNT") {
            self.pos += 1;
            self.expect(Token::LParen)?;
            self.expect(Token::Star)?;
            self.expect(Token::RParen)?;
            Projection::Count
        } else {
            Projection::Columns(self.name_list()?)
        };
        self.expect_keyword("FROM")?;
        let table = self.qualified_name()?;
        let filter = self.filter()?;
        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = self.column_name()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderBy { column, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        Ok(Statement::Select {
            table,
            projection,
            filter,
            order_by,
        })
    }

    fn insert(&mut self) -> PResult<Statement> {
        self.expect_keyword("INTO")?;
        let table = self.qualified_name()?;
        self.expect(Token::LParen)?;
        let columns = self.name_list()?;
        self.expect(Token::RParen)?;
        self.expect_keyword("VALUES")?;
        self.expect(Token::LParen)?;
        let mut values = vec![self.primary()?];
        while self.eat(&Token::Comma) {
            values.push(self.primary()?);
        }
        self.expect(Token::RParen)?;
        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    fn update(&mut self) -> PResult<Statement> {
        let table = self.qualified_name()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.column_name()?;
            self.expect(Token::Eq)?;
            assignments.push((column, self.primary()?));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let filter = self.filter()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> PResult<Statement> {
        self.expect_keyword("FROM")?;
        let table = self.qualified_name()?;
        let filter = self.filter()?;
        Ok(Statement::Delete { table, filter })
    }

    fn expr(&mut self) -> PResult<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("OR") {
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> PResult<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("AND") {
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> PResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> PResult<Expr> {
        let left = self.primary()?;
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }
        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.primary()?;
        Ok(Expr::Cmp(op, Box::new(left), Box::new(right)))
    }

    fn primary(&mut self) -> PResult<Expr> {
        match self.next()? {
            Token::LParen => {
                let expr = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Param => {
                let index = self.params;
                self.params += 1;
                Ok(Expr::Param(index))
            }
            Token::Text(s) => Ok(Expr::Literal(Value::Text(s))),
            Token::Number(n) => number(&n, false),
            Token::Minus => match self.next()? {
                Token::Number(n) => number(&n, true),
                other => Err(ParseErr::Unexpected {
                    expected: "number".into(),
                    found: format!("{:?}", other),
                }),
            },
            Token::Ident(s) if s.eq_ignore_ascii_case("NULL") => Ok(Expr::Literal(Value::Null)),
            Token::Ident(_) | Token::Quoted(_) => {
                self.pos -= 1;
                Ok(Expr::Column(self.column_name()?))
            }
            other => Err(ParseErr::Unexpected {
                expected: "expression".into(),
                found: format!("{:?}", other),
            }),
        }
    }
}

fn number(text: &str, negative: bool) -> PResult<Expr> {
    let invalid = || ParseErr::Unexpected {
        expected: "number".into(),
        found: text.to_string(),
    };
    let value = if text.contains('.') {
        let v: f64 = text.parse().map_err(|_| invalid())?;
        Value::Double(if negative { -v } else { v })
    } else {
        let v: i64 = text.parse().map_err(|_| invalid())?;
        Value::BigInt(if negative { -v } else { v })
    };
    Ok(Expr::Literal(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let parsed = parse("SELECT ID,NAME FROM dbo.T WHERE ID > 5 AND NAME IS NOT NULL ORDER BY ID DESC, NAME").unwrap();
        assert_eq!(parsed.param_count, 0);
        match parsed.statement {
            Statement::Select {
                table,
                projection,
                filter,
                order_by,
            } => {
                assert_eq!(table, "dbo.T");
                assert_eq!(
                    projection,
                    Projection::Columns(vec!["ID".into(), "NAME".into()])
                );
                assert!(matches!(filter, Some(Expr::And(_, _))));
                assert_eq!(order_by.len(), 2);
                assert!(order_by[0].descending);
                assert!(!order_by[1].descending);
            }
            other => panic!("Expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_count() {
        let parsed = parse("SELECT COUNT(*) FROM t").unwrap();
        assert!(matches!(
            parsed.statement,
            Statement::Select {
                projection: Projection::Count,
                ..
            }
        ));
    }

    #[test]
    fn test_parameter_positions() {
        let parsed = parse("UPDATE t SET NAME = ?, AGE = ? WHERE ID = ? AND K = ?").unwrap();
        assert_eq!(parsed.param_count, 4);
        match parsed.statement {
            Statement::Update {
                assignments,
                filter,
                ..
            } => {
                assert_eq!(assignments[0], ("NAME".to_string(), Expr::Param(0)));
                assert_eq!(assignments[1], ("AGE".to_string(), Expr::Param(1)));
                let filter = filter.unwrap();
                assert_eq!(
                    filter,
                    Expr::And(
                        Box::new(Expr::Cmp(
                            CmpOp::Eq,
                            Box::new(Expr::Column("ID".into())),
                            Box::new(Expr::Param(2))
                        )),
                        Box::new(Expr::Cmp(
                            CmpOp::Eq,
                            Box::new(Expr::Column("K".into())),
                            Box::new(Expr::Param(3))
                        )),
                    )
                );
            }
            other => panic!("Expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_and_delete() {
        let parsed = parse("INSERT INTO t (ID,NAME) VALUES(?,'x')").unwrap();
        assert_eq!(parsed.param_count, 1);
        assert_eq!(parsed.statement.table(), "t");

        let parsed = parse("DELETE FROM t WHERE ID = -3").unwrap();
        match parsed.statement {
            Statement::Delete { filter, .. } => assert_eq!(
                filter,
                Some(Expr::Cmp(
                    CmpOp::Eq,
                    Box::new(Expr::Column("ID".into())),
                    Box::new(Expr::Literal(Value::BigInt(-3)))
                ))
            ),
            other => panic!("Expected delete, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("SELECT FROM t").is_err());
        assert!(parse("DELETE FROM t WHERE ID = 1, K = 2").is_err());
        assert_eq!(parse("UPDATE t SET"), Err(ParseErr::UnexpectedEof));
        assert!(parse("DROP TABLE t").is_err());
    }
}

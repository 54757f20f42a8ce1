//! Tokenizer for the SQL subset the in-memory driver understands.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Bare or double-quoted identifier; keywords are identifiers too.
    Ident(String),
    /// Double-quoted identifier, never a keyword.
    Quoted(String),
    Number(String),
    Text(String),
    Param,
    Comma,
    Dot,
    LParen,
    RParen,
    Star,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LexErr {
    UnterminatedText,
    UnterminatedIdent,
    InvalidChar(char),
}

impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::UnterminatedText => write!(f, "unterminated string literal"),
            LexErr::UnterminatedIdent => write!(f, "unterminated quoted identifier"),
            LexErr::InvalidChar(c) => write!(f, "unexpected character '{}'", c),
        }
    }
}

pub(crate) struct Lexer<'a> {
    src: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src: src.chars().peekable(),
        }
    }

    /// Tokenize the whole input.
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, LexErr> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_ws(&mut self) {
        while self.src.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexErr> {
        self.skip_ws();
        let Some(ch) = self.src.next() else {
            return Ok(None);
        };
        let token = match ch {
            ',' => Token::Comma,
            '.' => Token::Dot,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '*' => Token::Star,
            '?' => Token::Param,
            '-' => Token::Minus,
            '=' => Token::Eq,
            '!' if self.src.next_if_eq(&'=').is_some() => Token::Ne,
            '<' => {
                if self.src.next_if_eq(&'=').is_some() {
                    Token::Le
                } else if self.src.next_if_eq(&'>').is_some() {
                    Token::Ne
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.src.next_if_eq(&'=').is_some() {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '\'' => Token::Text(self.quoted('\'').ok_or(LexErr::UnterminatedText)?),
            '"' => Token::Quoted(self.quoted('"').ok_or(LexErr::UnterminatedIdent)?),
            c if c.is_ascii_digit() => {
                let mut num = c.to_string();
                while let Some(c) = self.src.next_if(|c| c.is_ascii_digit() || *c == '.') {
                    num.push(c);
                }
                Token::Number(num)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = c.to_string();
                while let Some(c) = self.src.next_if(|c| c.is_alphanumeric() || *c == '_') {
                    ident.push(c);
                }
                Token::Ident(ident)
            }
            c => return Err(LexErr::InvalidChar(c)),
        };
        Ok(Some(token))
    }

    /// Read up to the closing quote; a doubled quote escapes itself.
    fn quoted(&mut self, quote: char) -> Option<String> {
        let mut text = String::new();
        loop {
            let c = self.src.next()?;
            if c == quote {
                if self.src.next_if_eq(&quote).is_some() {
                    text.push(quote);
                } else {
                    return Some(text);
                }
            } else {
                text.push(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_update() {
        let tokens = Lexer::new("UPDATE t SET NAME = ? WHERE ID >= 5").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("UPDATE".into()),
                Token::Ident("t".into()),
                Token::Ident("SET".into()),
                Token::Ident("NAME".into()),
                Token::Eq,
                Token::Param,
                Token::Ident("WHERE".into()),
                Token::Ident("ID".into()),
                Token::Ge,
                Token::Number("5".into()),
            ]
        );
    }

    #[test]
    fn test_quotes() {
        let tokens = Lexer::new("'it''s' \"Order Id\" <> !=").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("it's".into()),
                Token::Quoted("Order Id".into()),
                Token::Ne,
                Token::Ne,
            ]
        );
        assert_eq!(
            Lexer::new("'open").tokenize(),
            Err(LexErr::UnterminatedText)
        );
        assert_eq!(Lexer::new("a ; b").tokenize(), Err(LexErr::InvalidChar(';')));
    }
}

//! Source lexer for mini-C.
//!
//! Pull-based: the parser asks for one token at a time, so lexical errors are
//! reported to the sink interleaved with the semantic diagnostics they precede.
//! Lines and columns are 0-based and count bytes.

use std::fmt;

use crate::diagnostics::DiagnosticsSink;
use crate::types::{DataType, Position, Range};

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Relational operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

/// Token categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `int` or `unsigned`
    Type(DataType),
    If,
    Else,
    Return,
    Id(String),
    /// Signed literal digits
    IntNumber(String),
    /// Unsigned literal digits, without the `u` suffix
    UintNumber(String),
    Arop(ArOp),
    Relop(RelOp),
    Assign,
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Type(ty) => write!(f, "type '{ty}'"),
            TokenKind::If => f.write_str("'if'"),
            TokenKind::Else => f.write_str("'else'"),
            TokenKind::Return => f.write_str("'return'"),
            TokenKind::Id(name) => write!(f, "identifier '{name}'"),
            TokenKind::IntNumber(text) => write!(f, "number '{text}'"),
            TokenKind::UintNumber(text) => write!(f, "number '{text}u'"),
            TokenKind::Arop(op) => {
                let symbol = match op {
                    ArOp::Add => "+",
                    ArOp::Sub => "-",
                    ArOp::Mul => "*",
                    ArOp::Div => "/",
                };
                write!(f, "'{symbol}'")
            }
            TokenKind::Relop(op) => {
                let symbol = match op {
                    RelOp::Lt => "<",
                    RelOp::Gt => ">",
                    RelOp::Le => "<=",
                    RelOp::Ge => ">=",
                    RelOp::Eq => "==",
                    RelOp::Ne => "!=",
                };
                write!(f, "'{symbol}'")
            }
            TokenKind::Assign => f.write_str("'='"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

/// A token paired with its location in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
}

/// Pull-based lexer producing tokens from a source string.
pub struct Lexer<'a> {
    source: &'a str,
    cursor: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer positioned at line 0, column 0 of `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            line: 0,
            column: 0,
        }
    }

    /// Current position of the lexer.
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Pull the next token. Returns [`TokenKind::Eof`] forever once the
    /// input is exhausted.
    pub fn next_token(&mut self, sink: &mut DiagnosticsSink) -> Token {
        loop {
            self.skip_trivia(sink);

            let start = self.position();
            let offset = self.cursor;
            let Some(byte) = self.peek_byte() else {
                return Token {
                    kind: TokenKind::Eof,
                    range: Range::point(start),
                };
            };

            let kind = match byte {
                b'a'..=b'z' | b'A'..=b'Z' => {
                    self.eat_while(|b| b.is_ascii_alphanumeric());
                    keyword_or_id(&self.source[offset..self.cursor])
                }
                b'0'..=b'9' => {
                    self.eat_while(|b| b.is_ascii_digit());
                    let digits = self.source[offset..self.cursor].to_string();
                    if matches!(self.peek_byte(), Some(b'u' | b'U')) {
                        self.bump();
                        TokenKind::UintNumber(digits)
                    } else {
                        TokenKind::IntNumber(digits)
                    }
                }
                b'+' => self.single(TokenKind::Arop(ArOp::Add)),
                b'-' => self.single(TokenKind::Arop(ArOp::Sub)),
                b'*' => self.single(TokenKind::Arop(ArOp::Mul)),
                b'/' => self.single(TokenKind::Arop(ArOp::Div)),
                b'<' => self.with_eq(TokenKind::Relop(RelOp::Lt), TokenKind::Relop(RelOp::Le)),
                b'>' => self.with_eq(TokenKind::Relop(RelOp::Gt), TokenKind::Relop(RelOp::Ge)),
                b'=' => self.with_eq(TokenKind::Assign, TokenKind::Relop(RelOp::Eq)),
                b'!' if self.peek_byte_at(1) == Some(b'=') => {
                    self.bump();
                    self.bump();
                    TokenKind::Relop(RelOp::Ne)
                }
                b';' => self.single(TokenKind::Semicolon),
                b',' => self.single(TokenKind::Comma),
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                _ => {
                    let bad = self.source[self.cursor..].chars().next().unwrap_or('?');
                    self.bump();
                    let range = Range::new(start, self.position());
                    sink.report_error(range, format!("lexical error on char '{bad}'"));
                    continue;
                }
            };

            return Token {
                kind,
                range: Range::new(start, self.position()),
            };
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        self.bump();
        if self.peek_byte() == Some(b'=') {
            self.bump();
            with_eq
        } else {
            plain
        }
    }

    fn skip_trivia(&mut self, sink: &mut DiagnosticsSink) {
        loop {
            match (self.peek_byte(), self.peek_byte_at(1)) {
                (Some(b' ' | b'\t' | b'\r' | b'\n' | b'\x0c'), _) => {
                    self.bump();
                }
                (Some(b'/'), Some(b'/')) => {
                    self.eat_while(|b| b != b'\n');
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek_byte(), self.peek_byte_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                let range = Range::new(start, self.position());
                                sink.report_error(range, "unterminated comment");
                                break;
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn eat_while(&mut self, mut keep: impl FnMut(u8) -> bool) {
        while let Some(byte) = self.peek_byte() {
            if !keep(byte) {
                break;
            }
            self.bump();
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.peek_byte_at(0)
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.source.as_bytes().get(self.cursor + offset).copied()
    }

    /// Advance past one character, keeping line and column current.
    fn bump(&mut self) {
        let Some(ch) = self.source[self.cursor..].chars().next() else {
            return;
        };
        let width = ch.len_utf8();
        self.cursor += width;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += width as u32;
        }
    }
}

fn keyword_or_id(word: &str) -> TokenKind {
    match word {
        "int" => TokenKind::Type(DataType::Int),
        "unsigned" => TokenKind::Type(DataType::UnsignedInt),
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        _ => TokenKind::Id(word.to_string()),
    }
}

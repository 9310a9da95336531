//! The mini-C grammar
//!
//! A [`Grammar`] scans and parses a text, performing semantic actions directly
//! against a [`SymbolTable`] and reporting to a [`DiagnosticsSink`]. There is no
//! AST: declarations are inserted as soon as they are seen and scopes are
//! rolled back when a function body closes.
//!
//! # Example
//!
//! ```
//! use minic_core::{DiagnosticsSink, Grammar, KindMask, MiniC, SymbolTable};
//!
//! let mut table = SymbolTable::new();
//! let mut sink = DiagnosticsSink::collecting();
//! MiniC.parse("int g;\nint main() { return 0; }", &mut table, &mut sink).unwrap();
//! assert!(sink.is_empty());
//! assert!(table.lookup_symbol("g", KindMask::NAMED).is_some());
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;

use thiserror::Error;

use crate::diagnostics::DiagnosticsSink;
use crate::symtab::{SymbolTable, SymtabError};
use crate::types::Position;

/// Reasons a pass stopped before the end of the text.
///
/// Both are already reported to the sink when they surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The parser met a token it could not accept
    #[error("syntax error at {}:{}", position.line, position.character)]
    Syntax {
        /// Start of the offending token
        position: Position,
    },

    /// The symbol table ran out of room
    #[error(transparent)]
    Capacity(#[from] SymtabError),
}

/// Entry point of a language front-end
pub trait Grammar: Send + Sync {
    /// Scan and parse `text`, declaring symbols into `table`.
    ///
    /// The table is expected to be freshly initialised by the caller.
    fn parse(
        &self,
        text: &str,
        table: &mut SymbolTable,
        sink: &mut DiagnosticsSink,
    ) -> Result<(), ParseError>;
}

/// The bundled mini-C grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniC;

impl Grammar for MiniC {
    fn parse(
        &self,
        text: &str,
        table: &mut SymbolTable,
        sink: &mut DiagnosticsSink,
    ) -> Result<(), ParseError> {
        Parser::new(Lexer::new(text), table, sink).parse_program()
    }
}

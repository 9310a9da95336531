//! Semantic core of the mini-C language server
//!
//! This crate holds everything a single analysis pass needs:
//!
//! 1. **Symbol table** ([`SymbolTable`]): a fixed-shape, scoped store with
//!    pseudo-register seeding, literal interning and most-recent-wins lookup
//! 2. **Diagnostics sink** ([`DiagnosticsSink`]): collects severity-tagged
//!    messages emitted during a pass, or swallows them when detached
//! 3. **Grammar** ([`grammar::Grammar`]): the mini-C lexer and parser, which
//!    performs its semantic actions directly against the symbol table
//! 4. **Analyzer** ([`Analyzer`]): drives complete reparses and answers
//!    symbol info, location and completion queries
//!
//! Every pass starts from a freshly seeded table; nothing survives between
//! passes.

pub mod analysis;
pub mod diagnostics;
pub mod grammar;
pub mod symtab;
pub mod types;

pub use analysis::{Analyzer, Completion};
pub use diagnostics::{Diagnostic, DiagnosticSeverity, DiagnosticsSink};
pub use grammar::{Grammar, MiniC, ParseError};
pub use symtab::{SymbolEntry, SymbolTable, SymtabError, SymtabResult};
pub use types::{DataType, KindMask, Position, Range, SymbolKind};

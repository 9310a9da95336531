//! Parse orchestration
//!
//! The [`Analyzer`] owns the symbol table and the grammar. Every query runs a
//! complete pass over the text it is given and reads the table as the pass
//! left it. There is no cache: nothing computed for one text is reused for
//! the next.

use std::fmt;

use tracing::{debug, trace};

use crate::diagnostics::DiagnosticsSink;
use crate::grammar::{Grammar, MiniC, ParseError};
use crate::symtab::{SymbolTable, DEFAULT_CAPACITY};
use crate::types::{KindMask, Range, SymbolKind};

/// One completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Symbol name
    pub label: String,
    /// Display string of the symbol, e.g. `unsigned f(int)`
    pub detail: String,
    /// Kind of the symbol
    pub kind: SymbolKind,
}

/// Drives full reparses and answers symbol queries
pub struct Analyzer {
    table: SymbolTable,
    grammar: Box<dyn Grammar>,
}

impl Analyzer {
    /// Analyzer for the bundled grammar with a default-sized table
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Analyzer for the bundled grammar with a table of `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_grammar(Box::new(MiniC), capacity)
    }

    /// Analyzer for a custom grammar
    pub fn with_grammar(grammar: Box<dyn Grammar>, capacity: usize) -> Self {
        Self {
            table: SymbolTable::with_capacity(capacity),
            grammar,
        }
    }

    /// The table as the last pass left it
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    /// Reset the table and run one complete pass over `text`.
    ///
    /// Errors are already reported to `sink` when they come back; the table
    /// keeps whatever was declared before the pass stopped.
    pub fn run_parse(&mut self, text: &str, sink: &mut DiagnosticsSink) -> Result<(), ParseError> {
        self.table.init();
        let result = self.grammar.parse(text, &mut self.table, sink);
        match &result {
            Ok(()) => debug!(bytes = text.len(), symbols = self.table.len(), "parse complete"),
            Err(err) => debug!(bytes = text.len(), "parse stopped: {}", err),
        }
        trace!("\n{}", self.table);
        result
    }

    /// Display string of the newest visible `name` after parsing `text`
    pub fn symbol_info(&mut self, name: &str, text: &str) -> Option<String> {
        let index = self.lookup_after_parse(name, text)?;
        Some(self.table.display(index))
    }

    /// Declaration range of the newest visible `name` after parsing `text`
    pub fn symbol_location(&mut self, name: &str, text: &str) -> Option<Range> {
        let index = self.lookup_after_parse(name, text)?;
        self.table.range(index)
    }

    /// Every symbol whose name starts with `prefix` after parsing `text`,
    /// most recently declared first
    pub fn symbol_completion(&mut self, prefix: &str, text: &str) -> Vec<Completion> {
        self.parse_quietly(text);
        self.table
            .lookup_prefix(prefix)
            .into_iter()
            .map(|index| Completion {
                label: self.table.name(index).to_string(),
                detail: self.table.display(index),
                kind: self.table.kind(index),
            })
            .collect()
    }

    fn lookup_after_parse(&mut self, name: &str, text: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.parse_quietly(text);
        self.table.lookup_symbol(name, KindMask::NAMED)
    }

    // Queries only want the table side effects; a stopped pass is expected
    // for a truncated buffer.
    fn parse_quietly(&mut self, text: &str) {
        let mut sink = DiagnosticsSink::detached();
        let _ = self.run_parse(text, &mut sink);
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

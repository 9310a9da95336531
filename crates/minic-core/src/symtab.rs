//! Scoped symbol table
//!
//! The table is an ordered sequence with a fixed capacity. The first
//! [`REGISTER_COUNT`] slots hold the pseudo-registers `%0`..`%13` consumed by
//! the register-machine backend; lookups never see them. Everything above the
//! reserved block is scanned from the newest entry backwards, so a later
//! declaration shadows an earlier one with the same name.
//!
//! Scopes are modelled with marks: remember [`SymbolTable::len`] when a scope
//! opens and call [`SymbolTable::clear_from`] with it when the scope closes.

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::diagnostics::DiagnosticsSink;
use crate::types::{DataType, KindMask, Range, SymbolKind};

/// Default number of entries, registers included
pub const DEFAULT_CAPACITY: usize = 64;

/// Number of pseudo-registers seeded at the bottom of the table
pub const REGISTER_COUNT: usize = 14;

/// Highest register usable for intermediate results
pub const LAST_WORKING_REG: usize = 12;

/// Register holding the return value of a function call
pub const FUN_REG: usize = 13;

/// Attribute value meaning "no attribute"
pub const NO_ATR: u32 = 0;

/// Symbol table errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymtabError {
    /// No room for another entry
    #[error("symbol table overflow: capacity of {capacity} entries reached")]
    Overflow {
        /// Capacity of the table
        capacity: usize,
    },

    /// A scope mark pointing past the end of the table
    #[error("invalid scope mark {mark}: table holds {len} entries")]
    InvalidMark {
        /// Requested mark
        mark: usize,
        /// Current number of entries
        len: usize,
    },
}

/// Result type for symbol table operations
pub type SymtabResult<T> = Result<T, SymtabError>;

/// One row of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Symbol name (literal text for literals)
    pub name: String,
    /// Symbol kind
    pub kind: SymbolKind,
    /// Symbol type
    pub data_type: DataType,
    /// Kind-specific payload: local index for variables, parameter count for functions
    pub atr1: u32,
    /// Kind-specific payload: parameter type for functions
    pub atr2: u32,
    /// Declaration range, absent for registers
    pub range: Option<Range>,
}

/// Scoped name to attributes store for one compilation pass
#[derive(Debug, Clone)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    capacity: usize,
}

impl SymbolTable {
    /// Create a seeded table with [`DEFAULT_CAPACITY`]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a seeded table holding at most `capacity` entries.
    ///
    /// The capacity is raised to fit the register block if it is smaller.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(REGISTER_COUNT);
        let mut table = Self {
            entries: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        };
        table.init();
        table
    }

    /// Start a fresh compilation unit: drop every entry and reseed the registers
    pub fn init(&mut self) {
        self.entries.clear();
        for reg in 0..REGISTER_COUNT {
            self.entries.push(SymbolEntry {
                name: format!("%{reg}"),
                kind: SymbolKind::Register,
                data_type: DataType::None,
                atr1: NO_ATR,
                atr2: NO_ATR,
                range: None,
            });
        }
    }

    /// Number of entries, registers included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries at all (only after `clear_from(0)`)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a symbol and return its index
    pub fn insert_symbol(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        data_type: DataType,
        atr1: u32,
        atr2: u32,
        range: Option<Range>,
    ) -> SymtabResult<usize> {
        if self.entries.len() >= self.capacity {
            return Err(SymtabError::Overflow {
                capacity: self.capacity,
            });
        }
        let name = name.into();
        trace!(name = %name, kind = kind.label(), "insert symbol");
        self.entries.push(SymbolEntry {
            name,
            kind,
            data_type,
            atr1,
            atr2,
            range,
        });
        Ok(self.entries.len() - 1)
    }

    /// Intern a literal.
    ///
    /// An existing `(text, type)` entry is reused. A value outside the range of
    /// `data_type` is reported to `sink` as an error but still inserted.
    pub fn insert_literal(
        &mut self,
        text: &str,
        data_type: DataType,
        range: Range,
        sink: &mut DiagnosticsSink,
    ) -> SymtabResult<usize> {
        let existing = self.scan().find(|(_, entry)| {
            entry.kind == SymbolKind::Literal && entry.name == text && entry.data_type == data_type
        });
        if let Some((index, _)) = existing {
            return Ok(index);
        }

        let in_range = text
            .parse::<i64>()
            .map(|value| data_type.admits(value))
            .unwrap_or(false);
        if !in_range {
            sink.report_error(range, "literal out of range");
        }

        self.insert_symbol(text, SymbolKind::Literal, data_type, NO_ATR, NO_ATR, Some(range))
    }

    /// Find the newest entry named `name` whose kind is in `mask`
    pub fn lookup_symbol(&self, name: &str, mask: impl Into<KindMask>) -> Option<usize> {
        let mask = mask.into();
        self.scan()
            .find(|(_, entry)| entry.name == name && mask.contains(entry.kind))
            .map(|(index, _)| index)
    }

    /// Every entry whose name starts with `prefix`, newest first
    pub fn lookup_prefix(&self, prefix: &str) -> Vec<usize> {
        self.scan()
            .filter(|(_, entry)| entry.name.starts_with(prefix))
            .map(|(index, _)| index)
            .collect()
    }

    /// Entries above the register block, newest first
    fn scan(&self) -> impl Iterator<Item = (usize, &SymbolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(REGISTER_COUNT)
            .rev()
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&SymbolEntry> {
        self.entries.get(index)
    }

    /// Name at `index`, or `"?"`
    pub fn name(&self, index: usize) -> &str {
        self.get(index).map_or("?", |entry| entry.name.as_str())
    }

    /// Kind at `index`, or [`SymbolKind::None`]
    pub fn kind(&self, index: usize) -> SymbolKind {
        self.get(index).map_or(SymbolKind::None, |entry| entry.kind)
    }

    /// Type at `index`, or [`DataType::None`]
    pub fn data_type(&self, index: usize) -> DataType {
        self.get(index).map_or(DataType::None, |entry| entry.data_type)
    }

    /// First attribute at `index`, or [`NO_ATR`]
    pub fn atr1(&self, index: usize) -> u32 {
        self.get(index).map_or(NO_ATR, |entry| entry.atr1)
    }

    /// Second attribute at `index`, or [`NO_ATR`]
    pub fn atr2(&self, index: usize) -> u32 {
        self.get(index).map_or(NO_ATR, |entry| entry.atr2)
    }

    /// Declaration range at `index`
    pub fn range(&self, index: usize) -> Option<Range> {
        self.get(index).and_then(|entry| entry.range)
    }

    /// Declaration line at `index`, or -1
    pub fn line(&self, index: usize) -> i64 {
        self.range(index)
            .map_or(-1, |range| i64::from(range.start.line))
    }

    /// Set the type at `index`; out-of-range indices are ignored
    pub fn set_type(&mut self, index: usize, data_type: DataType) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.data_type = data_type;
        }
    }

    /// Set the first attribute at `index`; out-of-range indices are ignored
    pub fn set_atr1(&mut self, index: usize, atr1: u32) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.atr1 = atr1;
        }
    }

    /// Set the second attribute at `index`; out-of-range indices are ignored
    pub fn set_atr2(&mut self, index: usize, atr2: u32) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.atr2 = atr2;
        }
    }

    /// Hover text for the entry at `index`: `"<type> <name>"`, with
    /// `"(<param type>)"` appended for functions taking a parameter
    pub fn display(&self, index: usize) -> String {
        let Some(entry) = self.get(index) else {
            return String::new();
        };
        let mut text = format!("{} {}", entry.data_type, entry.name);
        if entry.kind == SymbolKind::Function && entry.atr1 > 0 {
            text.push_str(&format!("({})", DataType::from_attr(entry.atr2)));
        }
        text
    }

    /// Drop every entry at or after `mark`
    pub fn clear_from(&mut self, mark: usize) -> SymtabResult<()> {
        let len = self.entries.len();
        if mark > len {
            return Err(SymtabError::InvalidMark { mark, len });
        }
        if mark < len {
            trace!(mark, dropped = len - mark, "clear symbols");
            self.entries.truncate(mark);
        }
        Ok(())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Tabular dump of every entry, registers included
impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SYMBOL TABLE")?;
        writeln!(f, "   name                kind type atr1 atr2")?;
        writeln!(f, "-- ------------------- ---- ---- ---- ----")?;
        for (index, entry) in self.entries.iter().enumerate() {
            writeln!(
                f,
                "{:2} {:<19} {:<4} {:4} {:4} {:4}",
                index,
                entry.name,
                entry.kind.label(),
                entry.data_type.as_attr(),
                entry.atr1,
                entry.atr2
            )?;
        }
        Ok(())
    }
}

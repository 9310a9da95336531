//! Core value types shared by the symbol table, the grammar and the server
//!
//! Positions and ranges follow the LSP convention: 0-based lines and 0-based
//! character offsets within the line.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Position in a document (line and character)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-based)
    pub line: u32,
    /// Character offset (0-based)
    pub character: u32,
}

impl Position {
    /// Create a new position
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Range in a document (start and end positions)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// Start position
    pub start: Position,
    /// End position
    pub end: Position,
}

impl Range {
    /// Create a new range
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width range at `position`
    pub fn point(position: Position) -> Self {
        Self::new(position, position)
    }

    /// Zero-width range at the start of this range
    pub fn collapse_to_start(self) -> Self {
        Self::point(self.start)
    }
}

/// Kind of a symbol table entry.
///
/// Each kind occupies its own bit so callers can ask for several kinds at once
/// through a [`KindMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SymbolKind {
    /// Absent entry (returned for out-of-range indices)
    None = 0x1,
    /// Pseudo-register `%0`..`%13`
    Register = 0x2,
    /// Interned numeric literal
    Literal = 0x4,
    /// Function
    Function = 0x8,
    /// Local or global variable
    Variable = 0x10,
    /// Function parameter
    Parameter = 0x20,
}

impl SymbolKind {
    /// Bit value of this kind
    pub const fn bit(self) -> u32 {
        self as u32
    }

    /// Short upper-case label used by the table dump
    pub fn label(self) -> &'static str {
        match self {
            SymbolKind::None => "NONE",
            SymbolKind::Register => "REG",
            SymbolKind::Literal => "LIT",
            SymbolKind::Function => "FUN",
            SymbolKind::Variable => "VAR",
            SymbolKind::Parameter => "PAR",
        }
    }
}

/// Set of symbol kinds used to filter a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindMask(u32);

impl KindMask {
    /// Names the user can refer to: variables, parameters and functions
    pub const NAMED: KindMask = KindMask(
        SymbolKind::Variable.bit() | SymbolKind::Parameter.bit() | SymbolKind::Function.bit(),
    );

    /// Storage locations: variables and parameters
    pub const STORAGE: KindMask =
        KindMask(SymbolKind::Variable.bit() | SymbolKind::Parameter.bit());

    /// Whether `kind` is a member of this mask
    pub fn contains(self, kind: SymbolKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl From<SymbolKind> for KindMask {
    fn from(kind: SymbolKind) -> Self {
        KindMask(kind.bit())
    }
}

impl BitOr for SymbolKind {
    type Output = KindMask;

    fn bitor(self, rhs: SymbolKind) -> KindMask {
        KindMask(self.bit() | rhs.bit())
    }
}

impl BitOr<SymbolKind> for KindMask {
    type Output = KindMask;

    fn bitor(self, rhs: SymbolKind) -> KindMask {
        KindMask(self.0 | rhs.bit())
    }
}

impl BitOr for KindMask {
    type Output = KindMask;

    fn bitor(self, rhs: KindMask) -> KindMask {
        KindMask(self.0 | rhs.0)
    }
}

/// Data type of a symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    /// No type (registers, unresolved expressions)
    #[default]
    None = 0,
    /// Signed 32-bit integer
    Int = 1,
    /// Unsigned 32-bit integer
    UnsignedInt = 2,
}

impl DataType {
    /// Encode as an attribute value (function parameter types live in `atr2`)
    pub const fn as_attr(self) -> u32 {
        self as u32
    }

    /// Decode an attribute value; unknown values decode to [`DataType::None`]
    pub fn from_attr(value: u32) -> Self {
        match value {
            1 => DataType::Int,
            2 => DataType::UnsignedInt,
            _ => DataType::None,
        }
    }

    /// Source-level spelling of the type
    pub fn name(self) -> &'static str {
        match self {
            DataType::None => "none",
            DataType::Int => "int",
            DataType::UnsignedInt => "unsigned",
        }
    }

    /// Whether a numeric literal value fits this type
    pub fn admits(self, value: i64) -> bool {
        match self {
            DataType::Int => i64::from(i32::MIN) <= value && value <= i64::from(i32::MAX),
            DataType::UnsignedInt => 0 <= value && value <= i64::from(u32::MAX),
            DataType::None => true,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

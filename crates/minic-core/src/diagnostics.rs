//! Diagnostics sink for a single analysis pass
//!
//! A pass either runs with an attached sink, which keeps every report in
//! emission order, or with a detached one, which turns reports into no-ops.
//! Hover, definition and completion only need the symbol table side effects
//! of a pass and use the detached form.

use serde::{Deserialize, Serialize};

use crate::types::Range;

/// Diagnostic severity level, numbered as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Error severity
    Error = 1,
    /// Warning severity
    Warning = 2,
    /// Information severity
    Information = 3,
    /// Hint severity
    Hint = 4,
}

impl DiagnosticSeverity {
    /// LSP numeric severity
    pub fn to_lsp(self) -> u8 {
        self as u8
    }

    /// Convert from LSP numeric severity
    pub fn from_lsp(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Information),
            4 => Some(Self::Hint),
            _ => None,
        }
    }
}

impl Serialize for DiagnosticSeverity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.to_lsp())
    }
}

impl<'de> Deserialize<'de> for DiagnosticSeverity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        Self::from_lsp(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid severity {value}")))
    }
}

/// A single report produced during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Range of the diagnostic
    pub range: Range,
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Diagnostic message
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(range: Range, severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            range,
            severity,
            message: message.into(),
        }
    }
}

/// Per-pass collector of diagnostics
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSink {
    collected: Option<Vec<Diagnostic>>,
}

impl DiagnosticsSink {
    /// A sink that keeps every report
    pub fn collecting() -> Self {
        Self {
            collected: Some(Vec::new()),
        }
    }

    /// A sink that discards every report
    pub fn detached() -> Self {
        Self { collected: None }
    }

    /// Report an error
    pub fn report_error(&mut self, range: Range, message: impl Into<String>) {
        self.report(DiagnosticSeverity::Error, range, message);
    }

    /// Report a warning
    pub fn report_warning(&mut self, range: Range, message: impl Into<String>) {
        self.report(DiagnosticSeverity::Warning, range, message);
    }

    fn report(&mut self, severity: DiagnosticSeverity, range: Range, message: impl Into<String>) {
        if let Some(collected) = self.collected.as_mut() {
            collected.push(Diagnostic::new(range, severity, message));
        }
    }

    /// Diagnostics collected so far, in emission order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.collected.as_deref().unwrap_or(&[])
    }

    /// Number of collected diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics().len()
    }

    /// Whether nothing has been collected
    pub fn is_empty(&self) -> bool {
        self.diagnostics().is_empty()
    }

    /// Take the collected diagnostics
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.collected.unwrap_or_default()
    }
}

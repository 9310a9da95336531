//! Core LSP types and data structures
//!
//! Error taxonomy, server lifecycle state and the cursor position carried by
//! hover, definition and completion requests.

use serde_json::Value;

/// Result type for LSP operations
pub type LspResult<T> = Result<T, LspError>;

/// Framing and decoding failures on the input stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Missing, zero, oversized or unparsable `Content-Length`, or EOF inside
    /// a header block
    #[error("header incomplete: {0}")]
    HeaderIncomplete(String),

    /// The stream ended before the announced body length was read
    #[error("short body: expected {expected} bytes")]
    ShortBody {
        /// Announced `Content-Length`
        expected: usize,
    },

    /// The body is not valid UTF-8 JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The stream ended cleanly between two messages
    #[error("connection closed")]
    ConnectionClosed,
}

/// LSP-specific error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LspError {
    /// Framing or decoding failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A bounded store is full
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// A required JSON field is absent or has the wrong type
    #[error("Content error: {0}")]
    Content(String),

    /// A document lookup missed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request not allowed in the current server state
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Request received before `initialize`
    #[error("Server not initialized")]
    ServerNotInitialized,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LspError {
    /// Process exit code used when this error terminates the server
    pub fn exit_code(&self) -> i32 {
        match self {
            LspError::Protocol(ProtocolError::HeaderIncomplete(_)) => 2,
            LspError::Content(_) => 3,
            LspError::Protocol(ProtocolError::ShortBody { .. }) | LspError::Io(_) => 4,
            LspError::Protocol(ProtocolError::InvalidJson(_)) => 5,
            LspError::Capacity(_) => 6,
            LspError::NotFound(_) => 7,
            _ => 1,
        }
    }

    /// Whether the error ends the connection regardless of policy
    pub fn is_fatal(&self) -> bool {
        matches!(self, LspError::Protocol(_) | LspError::Io(_))
    }
}

/// Server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for `initialize`
    Uninitialized,
    /// Serving requests
    Initialized,
    /// `shutdown` received, waiting for `exit`
    ShuttingDown,
    /// `exit` received
    Exited,
}

/// How the message loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// `exit` after `shutdown`
    Clean,
    /// `exit` without `shutdown`, or the client went away
    WithoutShutdown,
}

impl ExitStatus {
    /// Process exit code
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::WithoutShutdown => 1,
        }
    }
}

/// Cursor position in an open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLocation {
    /// Document URI
    pub uri: String,
    /// Line (0-based)
    pub line: u32,
    /// Character offset (0-based)
    pub character: u32,
}

impl DocumentLocation {
    /// Extract `textDocument.uri` and `position` from request params
    pub fn from_params(params: &Value) -> LspResult<Self> {
        let uri = document_uri(params)?;

        let position = params
            .get("position")
            .ok_or_else(|| LspError::Content("Missing position".to_string()))?;

        let line = position
            .get("line")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| LspError::Content("Missing line".to_string()))?;

        let character = position
            .get("character")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| LspError::Content("Missing character".to_string()))?;

        Ok(Self {
            uri,
            line,
            character,
        })
    }
}

/// Extract `textDocument.uri` from notification or request params
pub fn document_uri(params: &Value) -> LspResult<String> {
    params
        .get("textDocument")
        .ok_or_else(|| LspError::Content("Missing textDocument".to_string()))?
        .get("uri")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LspError::Content("Missing uri".to_string()))
}

//! Language Server Protocol engine for mini-C
//!
//! This crate turns a byte stream of framed JSON-RPC messages into calls on
//! the mini-C analyzer and renders the results back as LSP payloads.
//!
//! # Architecture
//!
//! 1. **Transport** ([`transport`]): `Content-Length` framing and JSON-RPC
//!    message types over any async reader/writer pair
//! 2. **Document store** ([`documents`]): full text of every open document
//! 3. **Server** ([`LspServer`]): lifecycle state machine, method dispatch
//!    and the sequential message loop
//! 4. **Configuration** ([`config`]): server settings loaded from YAML or JSON
//!
//! Every hover, definition and completion request reparses a truncated
//! prefix of the document; every open or change reparses the whole document
//! and republishes its diagnostics.

pub mod config;
pub mod cursor;
pub mod documents;
pub mod server;
pub mod transport;
pub mod types;

// Re-export public API
pub use config::{ConfigError, ConfigLoader, ServerConfig};
pub use documents::DocumentStore;
pub use server::{LspServer, ServerCapabilities};
pub use transport::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, LspMessage, Transport,
};
pub use types::{DocumentLocation, ExitStatus, LspError, LspResult, ProtocolError, ServerState};

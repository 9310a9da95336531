//! JSON-RPC message transport
//!
//! This module handles the low-level communication protocol for LSP:
//! message framing with `Content-Length` headers, and JSON-RPC message
//! parsing and serialization. The transport is generic over any async
//! reader/writer pair so the server can run on stdio or on in-memory
//! buffers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin,
    Stdout,
};
use tracing::trace;

use crate::types::{LspError, LspResult, ProtocolError};

/// Default upper bound on a message body (4 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Clients that omit `jsonrpc` are still answered
fn default_version() -> String {
    "2.0".to_string()
}

/// JSON-RPC request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Request ID
    pub id: Value,
    /// Method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(id: Value, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response message.
///
/// A successful response always carries `result`, `null` included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID
    pub id: Value,
    /// Response result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Response error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Invalid request (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(-32600, message)
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {}", method))
    }

    /// Invalid params (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(-32602, message)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(-32603, message)
    }

    /// Server not initialized (-32002)
    pub fn server_not_initialized() -> Self {
        Self::new(-32002, "Server not initialized")
    }
}

/// JSON-RPC notification message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0")
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// LSP message (can be request, response, or notification)
#[derive(Debug, Clone)]
pub enum LspMessage {
    /// Request message
    Request(JsonRpcRequest),
    /// Response message
    Response(JsonRpcResponse),
    /// Notification message
    Notification(JsonRpcNotification),
}

impl LspMessage {
    /// Parse a message from a JSON body
    pub fn from_json(json: &str) -> LspResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Classify an already decoded JSON value
    pub fn from_value(value: Value) -> LspResult<Self> {
        if value.get("method").is_some() {
            if value.get("method").and_then(Value::as_str).is_none() {
                return Err(LspError::Content("method must be a string".to_string()));
            }
            // A request carries an id, a notification does not
            if value.get("id").is_some() {
                let request: JsonRpcRequest = serde_json::from_value(value)
                    .map_err(|e| LspError::Content(format!("Failed to parse request: {}", e)))?;
                Ok(LspMessage::Request(request))
            } else {
                let notification: JsonRpcNotification = serde_json::from_value(value)
                    .map_err(|e| {
                        LspError::Content(format!("Failed to parse notification: {}", e))
                    })?;
                Ok(LspMessage::Notification(notification))
            }
        } else if value.get("result").is_some() || value.get("error").is_some() {
            let response: JsonRpcResponse = serde_json::from_value(value)
                .map_err(|e| LspError::Content(format!("Failed to parse response: {}", e)))?;
            Ok(LspMessage::Response(response))
        } else {
            Err(LspError::Content(
                "Message must be a request, response, or notification".to_string(),
            ))
        }
    }

    /// Serialize message to JSON
    pub fn to_json(&self) -> LspResult<String> {
        let encoded = match self {
            LspMessage::Request(req) => serde_json::to_string(req),
            LspMessage::Response(resp) => serde_json::to_string(resp),
            LspMessage::Notification(notif) => serde_json::to_string(notif),
        };
        encoded.map_err(|e| LspError::Serialization(e.to_string()))
    }
}

impl From<JsonRpcResponse> for LspMessage {
    fn from(response: JsonRpcResponse) -> Self {
        LspMessage::Response(response)
    }
}

impl From<JsonRpcNotification> for LspMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        LspMessage::Notification(notification)
    }
}

/// Framed transport over an async reader/writer pair
pub struct Transport<R, W> {
    reader: R,
    writer: W,
    max_frame_bytes: usize,
}

impl Transport<BufReader<Stdin>, Stdout> {
    /// Transport over the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Transport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a transport with the default frame limit
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Set the largest accepted `Content-Length`
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Give back the reader and writer
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Read one message
    pub async fn read_message(&mut self) -> LspResult<LspMessage> {
        let body = self.read_frame().await?;
        LspMessage::from_json(&body)
    }

    /// Read one framed body
    pub async fn read_frame(&mut self) -> LspResult<String> {
        let content_length = self.read_header().await?;
        self.read_body(content_length).await
    }

    /// Parse a header block and return its `Content-Length`
    async fn read_header(&mut self) -> LspResult<usize> {
        let mut content_length: Option<usize> = None;
        let mut saw_header_bytes = false;
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| LspError::Io(format!("Failed to read header: {}", e)))?;

            if read == 0 {
                if saw_header_bytes {
                    return Err(ProtocolError::HeaderIncomplete(
                        "unexpected EOF while reading headers".to_string(),
                    )
                    .into());
                }
                return Err(ProtocolError::ConnectionClosed.into());
            }
            saw_header_bytes = true;

            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                break;
            }

            if let Some((key, value)) = trimmed.split_once(':') {
                if key.trim().eq_ignore_ascii_case("Content-Length") {
                    let length = value.trim().parse::<usize>().map_err(|e| {
                        ProtocolError::HeaderIncomplete(format!("invalid Content-Length: {}", e))
                    })?;
                    content_length = Some(length);
                }
            }
        }

        match content_length {
            None => Err(ProtocolError::HeaderIncomplete(
                "missing Content-Length header".to_string(),
            )
            .into()),
            Some(0) => Err(ProtocolError::HeaderIncomplete("zero Content-Length".to_string()).into()),
            Some(length) if length > self.max_frame_bytes => {
                Err(ProtocolError::HeaderIncomplete(format!(
                    "Content-Length {} exceeds maximum {}",
                    length, self.max_frame_bytes
                ))
                .into())
            }
            Some(length) => Ok(length),
        }
    }

    async fn read_body(&mut self, content_length: usize) -> LspResult<String> {
        let mut content = vec![0u8; content_length];
        self.reader
            .read_exact(&mut content)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => LspError::from(ProtocolError::ShortBody {
                    expected: content_length,
                }),
                _ => LspError::Io(format!("Failed to read content: {}", e)),
            })?;

        let body = String::from_utf8(content)
            .map_err(|e| ProtocolError::InvalidJson(format!("Invalid UTF-8: {}", e)))?;
        trace!("<- {}", body);
        Ok(body)
    }

    /// Write one message
    pub async fn write_message(&mut self, message: &LspMessage) -> LspResult<()> {
        let json = message.to_json()?;
        trace!("-> {}", json);

        self.writer
            .write_all(format!("Content-Length: {}\r\n\r\n{}", json.len(), json).as_bytes())
            .await
            .map_err(|e| LspError::Io(format!("Failed to write message: {}", e)))?;

        self.writer
            .flush()
            .await
            .map_err(|e| LspError::Io(format!("Failed to flush output: {}", e)))?;

        Ok(())
    }
}

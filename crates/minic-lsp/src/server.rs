//! LSP Server implementation
//!
//! This module implements the request/notification dispatch, the lifecycle
//! state machine and the message loop. The loop is strictly sequential: a
//! message is fully handled, and everything it produced is written, before
//! the next header is read.

use minic_core::{Analyzer, Completion, Diagnostic, DiagnosticsSink, Range, SymbolKind};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::{
    config::ServerConfig,
    cursor::{trailing_identifier, truncate_at_cursor},
    documents::DocumentStore,
    transport::{
        JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, LspMessage, Transport,
    },
    types::{document_uri, DocumentLocation, ExitStatus, LspError, LspResult, ProtocolError, ServerState},
};

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "minic-lsp";

/// Value of `source` on every published diagnostic
pub const DIAGNOSTIC_SOURCE: &str = "minic";

/// Server capabilities
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    /// Text document sync kind
    pub text_document_sync: u32,
    /// Hover capability
    pub hover_provider: bool,
    /// Go-to-definition capability
    pub definition_provider: bool,
    /// Completion capability
    pub completion_provider: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            text_document_sync: 1, // Full sync
            hover_provider: true,
            definition_provider: true,
            completion_provider: true,
        }
    }
}

impl ServerCapabilities {
    /// Convert to JSON
    pub fn to_json(&self) -> Value {
        let mut capabilities = json!({
            "textDocumentSync": self.text_document_sync,
            "hoverProvider": self.hover_provider,
            "definitionProvider": self.definition_provider,
        });
        if self.completion_provider {
            capabilities["completionProvider"] = json!({ "resolveProvider": false });
        }
        capabilities
    }
}

/// LSP Server
pub struct LspServer {
    state: ServerState,
    capabilities: ServerCapabilities,
    documents: DocumentStore,
    analyzer: Analyzer,
    strict_exit: bool,
    exit_status: Option<ExitStatus>,
}

impl LspServer {
    /// Create a server with default settings
    pub fn new() -> Self {
        Self::with_config(&ServerConfig::default())
    }

    /// Create a server from validated settings
    pub fn with_config(config: &ServerConfig) -> Self {
        Self::with_analyzer(config, Analyzer::with_capacity(config.symbol_table_capacity))
    }

    /// Create a server around a prepared analyzer
    pub fn with_analyzer(config: &ServerConfig, analyzer: Analyzer) -> Self {
        Self {
            state: ServerState::Uninitialized,
            capabilities: ServerCapabilities::default(),
            documents: DocumentStore::with_limit(config.max_documents),
            analyzer,
            strict_exit: config.strict_exit,
            exit_status: None,
        }
    }

    /// Get the current server state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Get server capabilities
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Open documents
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// How the session ended, once `exit` has been received
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn ensure_initialized(&self) -> LspResult<()> {
        match self.state {
            ServerState::Initialized => Ok(()),
            ServerState::Uninitialized => Err(LspError::ServerNotInitialized),
            ServerState::ShuttingDown | ServerState::Exited => Err(LspError::InvalidRequest(
                "Server is shutting down".to_string(),
            )),
        }
    }

    /// Handle initialize request
    pub fn handle_initialize(&mut self, _params: &Value) -> LspResult<Value> {
        if self.state != ServerState::Uninitialized {
            return Err(LspError::InvalidRequest(
                "Server is already initialized".to_string(),
            ));
        }

        self.state = ServerState::Initialized;
        info!("LSP server initialized");
        Ok(json!({
            "capabilities": self.capabilities.to_json(),
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    /// Handle shutdown request
    pub fn handle_shutdown(&mut self) -> LspResult<Value> {
        self.ensure_initialized()?;
        self.state = ServerState::ShuttingDown;
        info!("Server state changed to ShuttingDown");
        Ok(Value::Null)
    }

    /// Handle exit notification
    pub fn handle_exit(&mut self) -> ExitStatus {
        let status = if self.state == ServerState::ShuttingDown {
            ExitStatus::Clean
        } else {
            warn!("Exit received without a prior shutdown");
            ExitStatus::WithoutShutdown
        };
        self.state = ServerState::Exited;
        self.exit_status = Some(status);
        info!("Server state changed to Exited");
        status
    }

    /// Handle didOpen notification: store the text and lint it
    pub fn handle_did_open(&mut self, params: &Value) -> LspResult<JsonRpcNotification> {
        self.ensure_initialized()?;
        let uri = document_uri(params)?;
        let text = params
            .get("textDocument")
            .and_then(|doc| doc.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| LspError::Content("Missing text".to_string()))?;

        self.documents.open(&uri, text.to_string())?;
        self.lint(&uri)
    }

    /// Handle didChange notification: replace the text with the first
    /// content change and lint it
    pub fn handle_did_change(&mut self, params: &Value) -> LspResult<JsonRpcNotification> {
        self.ensure_initialized()?;
        let uri = document_uri(params)?;
        let text = params
            .get("contentChanges")
            .and_then(Value::as_array)
            .and_then(|changes| changes.first())
            .and_then(|change| change.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| LspError::Content("Missing contentChanges text".to_string()))?;

        self.documents.update(&uri, text.to_string())?;
        self.lint(&uri)
    }

    /// Handle didClose notification: forget the document and clear its
    /// diagnostics
    pub fn handle_did_close(&mut self, params: &Value) -> LspResult<JsonRpcNotification> {
        self.ensure_initialized()?;
        let uri = document_uri(params)?;
        self.documents.close(&uri)?;
        Ok(publish_diagnostics(&uri, Vec::new()))
    }

    /// Handle hover request
    pub fn handle_hover(&mut self, params: &Value) -> LspResult<Value> {
        self.ensure_initialized()?;
        let location = DocumentLocation::from_params(params)?;
        let text = self.documents.get(&location.uri)?;
        let prefix = truncate_at_cursor(text, location.line, location.character);
        let name = trailing_identifier(prefix);

        Ok(match self.analyzer.symbol_info(name, prefix) {
            Some(display) => json!({ "contents": display }),
            None => Value::Null,
        })
    }

    /// Handle definition request
    pub fn handle_definition(&mut self, params: &Value) -> LspResult<Value> {
        self.ensure_initialized()?;
        let location = DocumentLocation::from_params(params)?;
        let text = self.documents.get(&location.uri)?;
        let prefix = truncate_at_cursor(text, location.line, location.character);
        let name = trailing_identifier(prefix);

        Ok(match self.analyzer.symbol_location(name, prefix) {
            Some(range) => json!({
                "uri": location.uri,
                "range": Range::point(range.start),
            }),
            None => Value::Null,
        })
    }

    /// Handle completion request
    pub fn handle_completion(&mut self, params: &Value) -> LspResult<Value> {
        self.ensure_initialized()?;
        let location = DocumentLocation::from_params(params)?;
        let text = self.documents.get(&location.uri)?;
        let prefix = truncate_at_cursor(text, location.line, location.character);
        let partial = trailing_identifier(prefix);

        let items: Vec<Value> = self
            .analyzer
            .symbol_completion(partial, prefix)
            .iter()
            .map(completion_item)
            .collect();
        debug!("Completion for '{}': {} items", partial, items.len());
        Ok(Value::Array(items))
    }

    /// Reparse a stored document and build its diagnostics notification
    pub fn lint(&mut self, uri: &str) -> LspResult<JsonRpcNotification> {
        let text = self.documents.get(uri)?;
        let mut sink = DiagnosticsSink::collecting();
        if let Err(err) = self.analyzer.run_parse(text, &mut sink) {
            debug!("Lint of {} stopped early: {}", uri, err);
        }
        let diagnostics: Vec<Value> = sink.diagnostics().iter().map(diagnostic_json).collect();
        debug!("Publishing {} diagnostics for {}", diagnostics.len(), uri);
        Ok(publish_diagnostics(uri, diagnostics))
    }

    /// Handle one inbound message and return everything to send back.
    ///
    /// Request failures become error responses and notification failures
    /// are logged and dropped. Only fatal errors come back as `Err`.
    pub fn process_message(&mut self, message: LspMessage) -> LspResult<Vec<LspMessage>> {
        match message {
            LspMessage::Request(req) => {
                debug!("Received request: method={}, id={}", req.method, req.id);
                let id = req.id.clone();
                let result = self.dispatch_request(req);
                self.respond(id, result).map(|response| vec![response.into()])
            }
            LspMessage::Notification(notif) => {
                debug!("Received notification: method={}", notif.method);
                let method = notif.method.clone();
                match self.dispatch_notification(notif) {
                    Ok(outgoing) => Ok(outgoing.into_iter().map(LspMessage::from).collect()),
                    Err(err) if self.is_fatal(&err) => Err(err),
                    Err(err) => {
                        warn!("Dropping notification {}: {}", method, err);
                        Ok(Vec::new())
                    }
                }
            }
            LspMessage::Response(_) => {
                debug!("Ignoring response from client");
                Ok(Vec::new())
            }
        }
    }

    fn dispatch_request(&mut self, req: JsonRpcRequest) -> LspResult<Value> {
        let params = req.params.unwrap_or(Value::Null);
        match req.method.as_str() {
            "initialize" => self.handle_initialize(&params),
            "shutdown" => self.handle_shutdown(),
            "textDocument/hover" => self.handle_hover(&params),
            "textDocument/definition" => self.handle_definition(&params),
            "textDocument/completion" => self.handle_completion(&params),
            _ => {
                self.ensure_initialized()?;
                Err(LspError::MethodNotFound(req.method))
            }
        }
    }

    fn dispatch_notification(
        &mut self,
        notif: JsonRpcNotification,
    ) -> LspResult<Option<JsonRpcNotification>> {
        let params = notif.params.unwrap_or(Value::Null);
        match notif.method.as_str() {
            "textDocument/didOpen" => self.handle_did_open(&params).map(Some),
            "textDocument/didChange" => self.handle_did_change(&params).map(Some),
            "textDocument/didClose" => self.handle_did_close(&params).map(Some),
            "exit" => {
                self.handle_exit();
                Ok(None)
            }
            // `initialized`, `$/...` and anything unknown
            _ => Ok(None),
        }
    }

    fn respond(&self, id: Value, result: LspResult<Value>) -> LspResult<JsonRpcResponse> {
        let err = match result {
            Ok(value) => return Ok(JsonRpcResponse::success(id, value)),
            Err(err) if self.is_fatal(&err) => return Err(err),
            Err(err) => err,
        };

        let error = match err {
            LspError::NotFound(msg) => {
                debug!("Answering null: {}", msg);
                return Ok(JsonRpcResponse::success(id, Value::Null));
            }
            LspError::MethodNotFound(method) => JsonRpcError::method_not_found(&method),
            LspError::Content(msg) => {
                warn!("Invalid parameters: {}", msg);
                JsonRpcError::invalid_params(msg)
            }
            LspError::InvalidRequest(msg) => JsonRpcError::invalid_request(msg),
            LspError::ServerNotInitialized => JsonRpcError::server_not_initialized(),
            other => {
                error!("Internal error: {}", other);
                JsonRpcError::internal_error(other.to_string())
            }
        };
        Ok(JsonRpcResponse::error(id, error))
    }

    fn is_fatal(&self, err: &LspError) -> bool {
        err.is_fatal()
            || (self.strict_exit
                && matches!(
                    err,
                    LspError::Content(_) | LspError::Capacity(_) | LspError::NotFound(_)
                ))
    }

    /// Run the message loop until `exit` or the end of the input.
    ///
    /// Fatal errors are returned; [`LspError::exit_code`] gives the process
    /// status for them.
    pub async fn run<R, W>(&mut self, transport: &mut Transport<R, W>) -> LspResult<ExitStatus>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("LSP server started");

        loop {
            let message = match transport.read_message().await {
                Ok(message) => message,
                Err(LspError::Protocol(ProtocolError::ConnectionClosed)) => {
                    let status = if self.state == ServerState::ShuttingDown {
                        ExitStatus::Clean
                    } else {
                        ExitStatus::WithoutShutdown
                    };
                    info!("Input closed, stopping with {:?}", status);
                    return Ok(status);
                }
                Err(err) if self.is_fatal(&err) => {
                    error!("Failed to read message: {}", err);
                    return Err(err);
                }
                Err(err) => {
                    warn!("Skipping undecodable message: {}", err);
                    continue;
                }
            };

            for outgoing in self.process_message(message)? {
                transport.write_message(&outgoing).await?;
            }

            if let Some(status) = self.exit_status {
                info!("LSP server stopped");
                return Ok(status);
            }
        }
    }
}

impl Default for LspServer {
    fn default() -> Self {
        Self::new()
    }
}

fn publish_diagnostics(uri: &str, diagnostics: Vec<Value>) -> JsonRpcNotification {
    JsonRpcNotification::new(
        "textDocument/publishDiagnostics",
        Some(json!({
            "uri": uri,
            "diagnostics": diagnostics,
        })),
    )
}

fn diagnostic_json(diagnostic: &Diagnostic) -> Value {
    json!({
        "range": diagnostic.range,
        "severity": diagnostic.severity.to_lsp(),
        "source": DIAGNOSTIC_SOURCE,
        "message": diagnostic.message,
    })
}

fn completion_item(completion: &Completion) -> Value {
    // LSP CompletionItemKind
    let kind = match completion.kind {
        SymbolKind::Function => 3,
        SymbolKind::Literal => 21,
        _ => 6,
    };
    json!({
        "label": completion.label,
        "detail": completion.detail,
        "kind": kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "file:///test.mc";

    fn initialized() -> LspServer {
        let mut server = LspServer::new();
        server.handle_initialize(&json!({})).unwrap();
        server
    }

    fn open(server: &mut LspServer, text: &str) -> JsonRpcNotification {
        server
            .handle_did_open(&json!({
                "textDocument": {"uri": URI, "languageId": "minic", "version": 1, "text": text}
            }))
            .unwrap()
    }

    fn at(line: u32, character: u32) -> Value {
        json!({
            "textDocument": {"uri": URI},
            "position": {"line": line, "character": character}
        })
    }

    fn request(id: i64, method: &str, params: Value) -> LspMessage {
        LspMessage::Request(JsonRpcRequest::new(json!(id), method, Some(params)))
    }

    fn only_response(messages: Vec<LspMessage>) -> JsonRpcResponse {
        match messages.as_slice() {
            [LspMessage::Response(response)] => response.clone(),
            other => panic!("Expected one response, got {:?}", other),
        }
    }

    #[test]
    fn test_server_creation() {
        let server = LspServer::new();
        assert_eq!(server.state(), ServerState::Uninitialized);
        assert!(server.exit_status().is_none());
    }

    #[test]
    fn test_server_capabilities_json() {
        let json = ServerCapabilities::default().to_json();
        assert_eq!(json["textDocumentSync"], 1);
        assert_eq!(json["hoverProvider"], true);
        assert_eq!(json["definitionProvider"], true);
        assert_eq!(json["completionProvider"]["resolveProvider"], false);
    }

    #[test]
    fn test_initialize_reports_server_info() {
        let mut server = LspServer::new();
        let result = server.handle_initialize(&json!({"capabilities": {}})).unwrap();
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(server.state(), ServerState::Initialized);
        assert!(matches!(
            server.handle_initialize(&json!({})),
            Err(LspError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_requests_before_initialize() {
        let mut server = LspServer::new();
        assert_eq!(
            server.handle_hover(&at(0, 0)),
            Err(LspError::ServerNotInitialized)
        );
        let response = only_response(
            server
                .process_message(request(1, "textDocument/hover", at(0, 0)))
                .unwrap(),
        );
        assert_eq!(response.error.unwrap().code, -32002);
    }

    #[test]
    fn test_did_open_publishes_diagnostics() {
        let mut server = initialized();
        let notification = open(&mut server, "int x; int x;\nint main() { return 0; }");
        assert_eq!(notification.method, "textDocument/publishDiagnostics");
        let params = notification.params.unwrap();
        assert_eq!(params["uri"], URI);
        let diagnostics = params["diagnostics"].as_array().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0]["message"], "redefinition of 'x'");
        assert_eq!(diagnostics[0]["severity"], 1);
        assert_eq!(diagnostics[0]["source"], DIAGNOSTIC_SOURCE);
        assert_eq!(diagnostics[0]["range"]["start"]["character"], 11);
    }

    #[test]
    fn test_did_change_replaces_diagnostics() {
        let mut server = initialized();
        open(&mut server, "int x; int x;");
        let notification = server
            .handle_did_change(&json!({
                "textDocument": {"uri": URI, "version": 2},
                "contentChanges": [{"text": "int main() { return 0; }"}, {"text": "ignored"}]
            }))
            .unwrap();
        assert_eq!(notification.params.unwrap()["diagnostics"], json!([]));
        assert_eq!(
            server.documents().get(URI).unwrap(),
            "int main() { return 0; }"
        );
    }

    #[test]
    fn test_did_close_publishes_empty_set() {
        let mut server = initialized();
        open(&mut server, "int x; int x;");
        let notification = server
            .handle_did_close(&json!({"textDocument": {"uri": URI}}))
            .unwrap();
        assert_eq!(notification.params.unwrap()["diagnostics"], json!([]));
        assert!(server.documents().is_empty());
    }

    #[test]
    fn test_hover() {
        let mut server = initialized();
        open(&mut server, "int main() {\n  unsigned total;\n  total = 1u;\n  return 0;\n}");
        assert_eq!(
            server.handle_hover(&at(2, 4)).unwrap(),
            json!({"contents": "unsigned total"})
        );
        // cursor on whitespace
        assert_eq!(server.handle_hover(&at(2, 1)).unwrap(), Value::Null);
    }

    #[test]
    fn test_definition() {
        let mut server = initialized();
        open(&mut server, "int g;\nint main() {\n  g = 2;\n  return g;\n}");
        let location = server.handle_definition(&at(2, 2)).unwrap();
        assert_eq!(location["uri"], URI);
        assert_eq!(
            location["range"],
            json!({
                "start": {"line": 0, "character": 4},
                "end": {"line": 0, "character": 4}
            })
        );
    }

    #[test]
    fn test_completion_most_recent_first() {
        let mut server = initialized();
        open(&mut server, "int x2() { int y; int x1; return x");
        let items = server.handle_completion(&at(0, 34)).unwrap();
        assert_eq!(
            items,
            json!([
                {"label": "x1", "detail": "int x1", "kind": 6},
                {"label": "x2", "detail": "int x2", "kind": 3}
            ])
        );
    }

    #[test]
    fn test_query_on_unknown_document_answers_null() {
        let mut server = initialized();
        let response = only_response(
            server
                .process_message(request(3, "textDocument/hover", at(0, 0)))
                .unwrap(),
        );
        assert_eq!(response.result, Some(Value::Null));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_missing_params_is_invalid_params() {
        let mut server = initialized();
        let response = only_response(
            server
                .process_message(request(4, "textDocument/definition", json!({})))
                .unwrap(),
        );
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[test]
    fn test_unknown_request_and_notification() {
        let mut server = initialized();
        let response = only_response(
            server
                .process_message(request(5, "workspace/symbol", json!({})))
                .unwrap(),
        );
        assert_eq!(response.error.unwrap().code, -32601);

        let outgoing = server
            .process_message(LspMessage::Notification(JsonRpcNotification::new(
                "$/cancelRequest",
                Some(json!({"id": 5})),
            )))
            .unwrap();
        assert!(outgoing.is_empty());
    }

    #[test]
    fn test_bad_notification_is_dropped_unless_strict() {
        let close_unknown = || {
            LspMessage::Notification(JsonRpcNotification::new(
                "textDocument/didClose",
                Some(json!({"textDocument": {"uri": "file:///never-opened.mc"}})),
            ))
        };

        let mut lenient = initialized();
        assert!(lenient.process_message(close_unknown()).unwrap().is_empty());

        let config = ServerConfig {
            strict_exit: true,
            ..ServerConfig::default()
        };
        let mut strict = LspServer::with_config(&config);
        strict.handle_initialize(&json!({})).unwrap();
        let err = strict.process_message(close_unknown()).unwrap_err();
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_shutdown_then_exit() {
        let mut server = initialized();
        assert_eq!(server.handle_shutdown().unwrap(), Value::Null);
        assert!(matches!(
            server.handle_hover(&at(0, 0)),
            Err(LspError::InvalidRequest(_))
        ));
        assert_eq!(server.handle_exit(), ExitStatus::Clean);
        assert_eq!(server.state(), ServerState::Exited);
    }

    #[test]
    fn test_exit_without_shutdown() {
        let mut server = initialized();
        assert_eq!(server.handle_exit(), ExitStatus::WithoutShutdown);
        assert_eq!(server.exit_status(), Some(ExitStatus::WithoutShutdown));
    }

    #[test]
    fn test_document_limit_from_config() {
        let config = ServerConfig {
            max_documents: Some(1),
            ..ServerConfig::default()
        };
        let mut server = LspServer::with_config(&config);
        server.handle_initialize(&json!({})).unwrap();
        open(&mut server, "int main() { return 0; }");
        let err = server
            .handle_did_open(&json!({"textDocument": {"uri": "file:///other.mc", "text": ""}}))
            .unwrap_err();
        assert!(matches!(err, LspError::Capacity(_)));
    }
}

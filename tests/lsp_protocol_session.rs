//! End-to-end sessions: framed bytes in, framed bytes out.

use minic_lsp::{
    ExitStatus, LspError, LspMessage, LspServer, ProtocolError, ServerConfig, Transport,
};
use serde_json::{json, Value};

const URI: &str = "file:///session.mc";

fn frame(message: Value) -> Vec<u8> {
    let body = message.to_string();
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
}

fn request(id: i64, method: &str, params: Value) -> Vec<u8> {
    frame(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
}

fn notification(method: &str, params: Value) -> Vec<u8> {
    frame(json!({"jsonrpc": "2.0", "method": method, "params": params}))
}

fn position(line: u32, character: u32) -> Value {
    json!({"textDocument": {"uri": URI}, "position": {"line": line, "character": character}})
}

fn did_open(text: &str) -> Vec<u8> {
    notification(
        "textDocument/didOpen",
        json!({"textDocument": {"uri": URI, "languageId": "minic", "version": 1, "text": text}}),
    )
}

/// Run a whole session and decode every message the server wrote
async fn run_session(
    config: &ServerConfig,
    input: Vec<u8>,
) -> (Result<ExitStatus, LspError>, Vec<Value>) {
    let mut transport = Transport::new(input.as_slice(), Vec::new());
    let mut server = LspServer::with_config(config);
    let outcome = server.run(&mut transport).await;
    let (_, written) = transport.into_inner();

    let mut output = Transport::new(written.as_slice(), Vec::new());
    let mut messages = Vec::new();
    loop {
        match output.read_frame().await {
            Ok(body) => messages.push(serde_json::from_str(&body).unwrap()),
            Err(LspError::Protocol(ProtocolError::ConnectionClosed)) => break,
            Err(other) => panic!("server wrote a bad frame: {}", other),
        }
    }
    (outcome, messages)
}

fn response(messages: &[Value], id: i64) -> &Value {
    messages
        .iter()
        .find(|m| m["id"] == json!(id))
        .unwrap_or_else(|| panic!("no response with id {}", id))
}

fn published(messages: &[Value]) -> Vec<&Value> {
    messages
        .iter()
        .filter(|m| m["method"] == "textDocument/publishDiagnostics")
        .map(|m| &m["params"]["diagnostics"])
        .collect()
}

#[tokio::test]
async fn test_full_session() {
    let mut input = Vec::new();
    input.extend(request(1, "initialize", json!({"capabilities": {}})));
    input.extend(notification("initialized", json!({})));
    input.extend(did_open("int x; int x;"));
    input.extend(notification(
        "textDocument/didChange",
        json!({
            "textDocument": {"uri": URI, "version": 2},
            "contentChanges": [{"text": "int x2() { int y; int x1; return x"}]
        }),
    ));
    input.extend(request(2, "textDocument/completion", position(0, 34)));
    input.extend(request(3, "textDocument/hover", position(0, 24)));
    input.extend(request(4, "textDocument/hover", position(0, 9)));
    input.extend(request(5, "textDocument/definition", position(0, 23)));
    input.extend(request(6, "textDocument/signatureHelp", position(0, 0)));
    input.extend(notification("textDocument/didClose", json!({"textDocument": {"uri": URI}})));
    input.extend(request(7, "shutdown", Value::Null));
    input.extend(notification("exit", Value::Null));

    let (outcome, messages) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(outcome, Ok(ExitStatus::Clean));

    let init = &response(&messages, 1)["result"];
    assert_eq!(init["capabilities"]["textDocumentSync"], 1);
    assert_eq!(init["capabilities"]["completionProvider"]["resolveProvider"], false);

    let diagnostics = published(&messages);
    assert_eq!(diagnostics.len(), 3);
    let first: Vec<&str> = diagnostics[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["message"].as_str().unwrap())
        .collect();
    assert_eq!(first, vec!["redefinition of 'x'", "undefined reference to 'main'"]);
    assert!(!diagnostics[1].as_array().unwrap().is_empty());
    assert_eq!(diagnostics[2], &json!([]));

    let labels: Vec<&str> = response(&messages, 2)["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["x1", "x2"]);

    assert_eq!(response(&messages, 3)["result"], json!({"contents": "int x1"}));
    assert_eq!(response(&messages, 4)["result"], Value::Null);

    let definition = &response(&messages, 5)["result"];
    assert_eq!(definition["uri"], URI);
    assert_eq!(definition["range"]["start"], json!({"line": 0, "character": 22}));
    assert_eq!(definition["range"]["end"], definition["range"]["start"]);

    assert_eq!(response(&messages, 6)["error"]["code"], -32601);
    assert_eq!(response(&messages, 7)["result"], Value::Null);
}

#[tokio::test]
async fn test_responses_follow_request_order() {
    let mut input = Vec::new();
    input.extend(request(10, "initialize", json!({})));
    input.extend(did_open("int main() { int a; a = 1; return a; }"));
    input.extend(request(11, "textDocument/hover", position(0, 17)));
    input.extend(request(12, "textDocument/hover", position(0, 20)));
    input.extend(notification("exit", Value::Null));

    let (_, messages) = run_session(&ServerConfig::default(), input).await;
    let ids: Vec<&Value> = messages
        .iter()
        .filter(|m| m.get("id").is_some())
        .map(|m| &m["id"])
        .collect();
    assert_eq!(ids, vec![&json!(10), &json!(11), &json!(12)]);
}

#[tokio::test]
async fn test_exit_without_shutdown() {
    let mut input = request(1, "initialize", json!({}));
    input.extend(notification("exit", Value::Null));
    let (outcome, _) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(outcome.map(ExitStatus::code), Ok(1));
}

#[tokio::test]
async fn test_input_closed_without_exit() {
    let input = request(1, "initialize", json!({}));
    let (outcome, messages) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(outcome, Ok(ExitStatus::WithoutShutdown));
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_request_before_initialize() {
    let mut input = request(1, "textDocument/hover", position(0, 0));
    input.extend(notification("exit", Value::Null));
    let (_, messages) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(response(&messages, 1)["error"]["code"], -32002);
}

#[tokio::test]
async fn test_header_without_length_is_fatal() {
    let mut input = request(1, "initialize", json!({}));
    input.extend(b"Content-Type: application/json\r\n\r\n{}");
    let (outcome, messages) = run_session(&ServerConfig::default(), input).await;
    let err = outcome.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    // the initialize response was already written
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_short_body_is_fatal() {
    let input = b"Content-Length: 50\r\n\r\n{\"jsonrpc\":\"2.0\"}".to_vec();
    let (outcome, _) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(outcome.unwrap_err().exit_code(), 4);
}

#[tokio::test]
async fn test_malformed_json_is_fatal() {
    let input = b"Content-Length: 5\r\n\r\n{oops".to_vec();
    let (outcome, _) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(outcome.unwrap_err().exit_code(), 5);
}

#[tokio::test]
async fn test_missing_text_recovers_unless_strict() {
    let bad_open = notification("textDocument/didOpen", json!({"textDocument": {"uri": URI}}));

    let mut input = request(1, "initialize", json!({}));
    input.extend(bad_open.clone());
    input.extend(request(2, "shutdown", Value::Null));
    input.extend(notification("exit", Value::Null));
    let (outcome, _) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(outcome, Ok(ExitStatus::Clean));

    let strict = ServerConfig {
        strict_exit: true,
        ..ServerConfig::default()
    };
    let mut input = request(1, "initialize", json!({}));
    input.extend(bad_open);
    let (outcome, _) = run_session(&strict, input).await;
    assert_eq!(outcome.unwrap_err().exit_code(), 3);
}

#[tokio::test]
async fn test_symbol_table_overflow_is_a_diagnostic() {
    let config = ServerConfig {
        symbol_table_capacity: 16,
        ..ServerConfig::default()
    };
    let mut input = request(1, "initialize", json!({}));
    input.extend(did_open("int a; int b; int c;"));
    input.extend(request(2, "shutdown", Value::Null));
    input.extend(notification("exit", Value::Null));

    let (outcome, messages) = run_session(&config, input).await;
    assert_eq!(outcome, Ok(ExitStatus::Clean));
    let diagnostics = published(&messages);
    assert_eq!(diagnostics[0][0]["message"], "symbol table overflow");
}

#[tokio::test]
async fn test_unknown_notification_gets_no_reply() {
    let mut input = request(1, "initialize", json!({}));
    input.extend(notification("$/setTrace", json!({"value": "off"})));
    input.extend(notification("exit", Value::Null));
    let (_, messages) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_request_without_version_is_answered() {
    let mut input = frame(json!({"id": 1, "method": "initialize", "params": {}}));
    input.extend(notification("exit", Value::Null));
    let (_, messages) = run_session(&ServerConfig::default(), input).await;
    assert!(response(&messages, 1)["result"]["capabilities"].is_object());
}

#[tokio::test]
async fn test_completion_on_unterminated_global() {
    let mut input = request(1, "initialize", json!({}));
    input.extend(did_open("int counter;\nint main() { return 0; }"));
    input.extend(request(2, "textDocument/completion", position(0, 7)));
    input.extend(notification("exit", Value::Null));

    let (_, messages) = run_session(&ServerConfig::default(), input).await;
    assert_eq!(
        response(&messages, 2)["result"],
        json!([{"label": "counter", "detail": "int counter", "kind": 6}])
    );
}

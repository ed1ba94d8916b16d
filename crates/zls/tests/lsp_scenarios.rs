//! End-to-end scenarios driving the server through its dispatch seam.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use zls::config::Config;
use zls::{JsonRpcRequest, Server};
use zls_uri::path_to_uri;

fn server() -> Server {
    let mut server = Server::new(Config::default());
    initialize(&mut server);
    server
}

fn initialize(server: &mut Server) {
    let response = send(
        server,
        Some(json!(0)),
        "initialize",
        json!({
            "capabilities": {
                "textDocument": {
                    "hover": {"contentFormat": ["markdown", "plaintext"]},
                    "completion": {"completionItem": {"snippetSupport": true}}
                }
            }
        }),
    )
    .expect("initialize response");
    assert!(response["capabilities"].is_object());
    send_notification(server, "initialized", json!({}));
}

fn send(server: &mut Server, id: Option<Value>, method: &str, params: Value) -> Option<Value> {
    let request = JsonRpcRequest {
        _jsonrpc: "2.0".to_string(),
        id,
        method: method.to_string(),
        params: Some(params),
    };
    let response = server.handle_request(request)?;
    assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
    response.result
}

fn send_expect_error(server: &mut Server, id: Value, method: &str) -> zls::JsonRpcError {
    let request = JsonRpcRequest {
        _jsonrpc: "2.0".to_string(),
        id: Some(id),
        method: method.to_string(),
        params: Some(json!({})),
    };
    let response = server.handle_request(request).expect("response for request");
    response.error.expect("error response")
}

fn send_notification(server: &mut Server, method: &str, params: Value) {
    let request = JsonRpcRequest {
        _jsonrpc: "2.0".to_string(),
        id: None,
        method: method.to_string(),
        params: Some(params),
    };
    let response = server.handle_request(request);
    assert!(response.is_none(), "notifications never get responses");
}

fn open(server: &mut Server, uri: &str, text: &str) {
    send_notification(
        server,
        "textDocument/didOpen",
        json!({
            "textDocument": {"uri": uri, "languageId": "zig", "version": 1, "text": text}
        }),
    );
}

fn open_on_disk(server: &mut Server, dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    let uri = path_to_uri(&path);
    open(server, &uri, text);
    uri
}

fn published_diagnostics(server: &mut Server, uri: &str) -> Vec<Value> {
    server
        .take_notifications()
        .into_iter()
        .filter(|n| n.method == "textDocument/publishDiagnostics")
        .filter(|n| n.params["uri"] == json!(uri))
        .flat_map(|n| n.params["diagnostics"].as_array().cloned().unwrap_or_default())
        .collect()
}

fn position_params(uri: &str, line: u32, character: u32) -> Value {
    json!({
        "textDocument": {"uri": uri},
        "position": {"line": line, "character": character}
    })
}

// Hovering a function renders its prototype.
#[test]
fn hover_on_function_shows_signature() {
    let mut server = server();
    let uri = "file:///test/hover.zig";
    open(&mut server, uri, "fn add(a: i32, b: i32) i32 { return a + b; }");

    let result = send(
        &mut server,
        Some(json!(1)),
        "textDocument/hover",
        position_params(uri, 0, 4),
    )
    .unwrap();
    let value = result["contents"]["value"].as_str().unwrap();
    assert!(value.contains("fn add(a: i32, b: i32) i32"), "{value}");
}

// Goto definition sees through alias chains; goto declaration does not.
#[test]
fn goto_through_alias() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server();
    let a_uri = open_on_disk(&mut server, dir.path(), "a.zig", "pub const X = struct { y: i32 };\n");
    let b_uri = open_on_disk(
        &mut server,
        dir.path(),
        "b.zig",
        "const A = @import(\"a.zig\");\nconst Z = A.X;\n",
    );

    // Cursor on `Z`.
    let definition = send(
        &mut server,
        Some(json!(2)),
        "textDocument/definition",
        position_params(&b_uri, 1, 6),
    )
    .unwrap();
    assert!(definition["uri"].as_str().unwrap().ends_with("a.zig"), "{definition}");
    assert_eq!(definition["range"]["start"]["line"], json!(0));
    assert_eq!(definition["uri"], json!(a_uri));

    let declaration = send(
        &mut server,
        Some(json!(3)),
        "textDocument/declaration",
        position_params(&b_uri, 1, 6),
    )
    .unwrap();
    assert_eq!(declaration["uri"], json!(b_uri));
    assert_eq!(declaration["range"]["start"]["line"], json!(1));
}

// References across files find every occurrence.
#[test]
fn references_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server();
    let a_uri = open_on_disk(&mut server, dir.path(), "a.zig", "pub fn foo() void {}\n");
    let b_uri = open_on_disk(
        &mut server,
        dir.path(),
        "b.zig",
        "const a = @import(\"a.zig\");\na.foo();\na.foo();\n",
    );

    let result = send(
        &mut server,
        Some(json!(4)),
        "textDocument/references",
        json!({
            "textDocument": {"uri": a_uri},
            "position": {"line": 0, "character": 8},
            "context": {"includeDeclaration": true}
        }),
    )
    .unwrap();
    let locations = result.as_array().unwrap();
    assert_eq!(locations.len(), 3);
    let in_a = locations.iter().filter(|l| l["uri"] == json!(a_uri)).count();
    let in_b = locations.iter().filter(|l| l["uri"] == json!(b_uri)).count();
    assert_eq!((in_a, in_b), (1, 2));
}

// Rename groups edits by URI; applying them moves all references.
#[test]
fn rename_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server();
    let a_uri = open_on_disk(&mut server, dir.path(), "a.zig", "pub fn foo() void {}\n");
    let b_uri = open_on_disk(
        &mut server,
        dir.path(),
        "b.zig",
        "const a = @import(\"a.zig\");\na.foo();\na.foo();\n",
    );

    let result = send(
        &mut server,
        Some(json!(5)),
        "textDocument/rename",
        json!({
            "textDocument": {"uri": a_uri},
            "position": {"line": 0, "character": 8},
            "newName": "bar"
        }),
    )
    .unwrap();
    let changes = result["changes"].as_object().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[&a_uri].as_array().unwrap().len(), 1);
    assert_eq!(changes[&b_uri].as_array().unwrap().len(), 2);

    // Apply the edits and re-run references on the renamed symbol.
    send_notification(
        &mut server,
        "textDocument/didChange",
        json!({
            "textDocument": {"uri": a_uri, "version": 2},
            "contentChanges": [{"text": "pub fn bar() void {}\n"}]
        }),
    );
    send_notification(
        &mut server,
        "textDocument/didChange",
        json!({
            "textDocument": {"uri": b_uri, "version": 2},
            "contentChanges": [{"text": "const a = @import(\"a.zig\");\na.bar();\na.bar();\n"}]
        }),
    );
    let result = send(
        &mut server,
        Some(json!(6)),
        "textDocument/references",
        json!({
            "textDocument": {"uri": a_uri},
            "position": {"line": 0, "character": 8},
            "context": {"includeDeclaration": true}
        }),
    )
    .unwrap();
    assert_eq!(result.as_array().unwrap().len(), 3);
}

// A parse error produces exactly one Error diagnostic from "zls".
#[test]
fn parse_error_diagnostic() {
    let mut server = server();
    let uri = "file:///test/parse_error.zig";
    open(&mut server, uri, "fn (");

    let diagnostics = published_diagnostics(&mut server, uri);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["severity"], json!(1));
    assert_eq!(diagnostics[0]["source"], json!("zls"));
    assert_eq!(diagnostics[0]["range"]["start"]["character"], json!(3));
}

// Completion after `p.` lists the struct fields.
#[test]
fn completion_in_field_access() {
    let mut server = server();
    let uri = "file:///test/completion.zig";
    open(
        &mut server,
        uri,
        "const P = struct { x: i32, y: i32 };\nvar p: P = undefined;\np.",
    );

    let result = send(
        &mut server,
        Some(json!(7)),
        "textDocument/completion",
        position_params(uri, 2, 2),
    )
    .unwrap();
    let items = result.as_array().unwrap();
    let mut labels: Vec<&str> =
        items.iter().map(|item| item["label"].as_str().unwrap()).collect();
    labels.sort_unstable();
    assert_eq!(labels, vec!["x", "y"]);
    assert!(items.iter().all(|item| item["kind"] == json!(5)), "field kind: {items:?}");
}

#[test]
fn empty_file_boundaries() {
    let mut server = server();
    let uri = "file:///test/empty.zig";
    open(&mut server, uri, "");

    assert_eq!(published_diagnostics(&mut server, uri).len(), 0);

    let symbols = send(
        &mut server,
        Some(json!(8)),
        "textDocument/documentSymbol",
        json!({"textDocument": {"uri": uri}}),
    )
    .unwrap();
    assert_eq!(symbols, json!([]));

    let completions = send(
        &mut server,
        Some(json!(9)),
        "textDocument/completion",
        position_params(uri, 0, 0),
    )
    .unwrap();
    assert_eq!(completions, json!([]));
}

#[test]
fn broken_file_features_return_null_without_crashing() {
    let mut server = server();
    let uri = "file:///test/broken.zig";
    open(&mut server, uri, "fn (");

    for (id, method) in
        [(10, "textDocument/hover"), (11, "textDocument/definition"), (12, "textDocument/references")]
    {
        let request = JsonRpcRequest {
            _jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params: Some(position_params(uri, 0, 0)),
        };
        let response = server.handle_request(request).unwrap();
        assert!(response.error.is_none());
    }
}

#[test]
fn unknown_request_gets_not_implemented() {
    let mut server = server();
    let error = send_expect_error(&mut server, json!(13), "textDocument/signatureHelp");
    assert_eq!(error.code, -32601);
    assert_eq!(error.message, "NotImplemented");
}

#[test]
fn unknown_notification_is_ignored() {
    let mut server = server();
    send_notification(&mut server, "$/unknownThing", json!({}));
    send_notification(&mut server, "$/cancelRequest", json!({"id": 1}));
}

#[test]
fn utf8_position_encoding_negotiation() {
    let mut server = Server::new(Config::default());
    let response = send(
        &mut server,
        Some(json!(0)),
        "initialize",
        json!({
            "capabilities": {"general": {"positionEncodings": ["utf-8", "utf-16"]}}
        }),
    )
    .unwrap();
    assert_eq!(response["capabilities"]["positionEncoding"], json!("utf-8"));
}

#[test]
fn shutdown_stops_the_loop() {
    let mut server = server();
    let result = send(&mut server, Some(json!(99)), "shutdown", json!(null));
    assert_eq!(result, Some(json!(null)));
}

#[test]
fn document_symbols_outline() {
    let mut server = server();
    let uri = "file:///test/outline.zig";
    open(
        &mut server,
        uri,
        "const Point = struct { x: i32, y: i32 };\nfn main() void {}\n",
    );
    let symbols = send(
        &mut server,
        Some(json!(14)),
        "textDocument/documentSymbol",
        json!({"textDocument": {"uri": uri}}),
    )
    .unwrap();
    let names: Vec<&str> =
        symbols.as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Point", "main"]);
    let children = symbols[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
}

#[test]
fn semantic_tokens_for_simple_file() {
    let mut server = server();
    let uri = "file:///test/tokens.zig";
    open(&mut server, uri, "const x = 1;\n");
    let result = send(
        &mut server,
        Some(json!(15)),
        "textDocument/semanticTokens/full",
        json!({"textDocument": {"uri": uri}}),
    )
    .unwrap();
    let data = result["data"].as_array().unwrap();
    // Four tokens (`const`, `x`, `=`, `1`), five integers each.
    assert_eq!(data.len(), 20);
    assert_eq!(data[0], json!(0));
    assert_eq!(data[2], json!(5));
}

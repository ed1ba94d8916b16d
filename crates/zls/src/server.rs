//! Server state and the dispatch loop.
//!
//! One `Server` value owns everything the handlers touch: the document
//! store, the loaded configuration, negotiated client capabilities, and the
//! `keep_running` flag. Requests are handled strictly serially; handlers
//! queue server→client notifications, which the run loop flushes after each
//! message.

use std::io::{self, BufReader, Write};

use serde_json::Value;
use zls_document_store::{DocumentStore, ToolchainEnv};
use zls_position_tracking::PositionEncoding;
use zls_protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

use crate::config::Config;
use crate::transport::{read_message, write_message, write_notification, ReadOutcome};

/// Client capabilities the handlers care about.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCaps {
    pub supports_markdown: bool,
    pub supports_snippets: bool,
}

/// A queued server→client notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: &'static str,
    pub params: Value,
}

/// The language server.
pub struct Server {
    pub(crate) store: DocumentStore,
    pub(crate) config: Config,
    pub(crate) client: ClientCaps,
    pub(crate) encoding: PositionEncoding,
    pub(crate) keep_running: bool,
    pub(crate) debug_log: bool,
    pub(crate) outgoing: Vec<Notification>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let toolchain = ToolchainEnv {
            zig_exe_path: config.zig_exe_path.clone(),
            zig_lib_path: config.zig_lib_path.clone(),
            build_runner_path: config.build_runner_path.clone(),
        };
        Self {
            store: DocumentStore::new(toolchain),
            config,
            client: ClientCaps::default(),
            encoding: PositionEncoding::default(),
            keep_running: true,
            debug_log: false,
            outgoing: Vec::new(),
        }
    }

    pub fn with_debug_log(mut self, debug_log: bool) -> Self {
        self.debug_log = debug_log;
        self
    }

    /// Serve standard input until shutdown or EOF.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        let stdout = io::stdout();
        let mut writer = stdout.lock();

        while self.keep_running {
            match read_message(&mut reader)? {
                ReadOutcome::Message(request) => {
                    let response = self.handle_request(request);
                    if let Some(response) = response {
                        write_message(&mut writer, &response)?;
                    }
                    self.flush_notifications(&mut writer)?;
                }
                ReadOutcome::Malformed => continue,
                ReadOutcome::Eof => {
                    self.log_debug("standard input closed");
                    break;
                }
            }
        }
        Ok(())
    }

    fn flush_notifications<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        for notification in std::mem::take(&mut self.outgoing) {
            write_notification(writer, notification.method, notification.params)?;
        }
        Ok(())
    }

    /// Queued notifications, drained. Used by the run loop and by tests.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outgoing)
    }

    pub(crate) fn notify(&mut self, method: &'static str, params: Value) {
        self.outgoing.push(Notification { method, params });
    }

    /// Log to stderr and mirror to the client as `window/logMessage`.
    pub(crate) fn log_warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        eprintln!("[zls] warning: {message}");
        self.notify(
            "window/logMessage",
            serde_json::json!({ "type": 2, "message": message }),
        );
    }

    pub(crate) fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        eprintln!("[zls] error: {message}");
        self.notify(
            "window/logMessage",
            serde_json::json!({ "type": 1, "message": message }),
        );
    }

    pub(crate) fn log_debug(&self, message: impl AsRef<str>) {
        if self.debug_log {
            eprintln!("[zls] debug: {}", message.as_ref());
        }
    }

    /// Handle one request or notification; `None` means no response is due.
    pub fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let is_request = id.is_some();

        let result: Result<Option<Value>, JsonRpcError> = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "initialized" => Ok(None),
            "shutdown" => {
                self.keep_running = false;
                Ok(Some(Value::Null))
            }
            "exit" => {
                self.keep_running = false;
                Ok(None)
            }
            "$/cancelRequest" => Ok(None),
            "textDocument/didOpen" => self.handle_did_open(request.params),
            "textDocument/didChange" => self.handle_did_change(request.params),
            "textDocument/didSave" => self.handle_did_save(request.params),
            "textDocument/didClose" => self.handle_did_close(request.params),
            "textDocument/willSave" => Ok(None),
            "textDocument/completion" => self.handle_completion(request.params),
            "textDocument/hover" => self.handle_hover(request.params),
            "textDocument/definition" => self.handle_definition(request.params, true),
            "textDocument/typeDefinition" => self.handle_type_definition(request.params),
            "textDocument/implementation" => self.handle_definition(request.params, true),
            "textDocument/declaration" => self.handle_definition(request.params, false),
            "textDocument/references" => self.handle_references(request.params),
            "textDocument/rename" => self.handle_rename(request.params),
            "textDocument/documentSymbol" => self.handle_document_symbol(request.params),
            "textDocument/formatting" => self.handle_formatting(request.params),
            "textDocument/semanticTokens/full" => self.handle_semantic_tokens(request.params),
            method => {
                if is_request {
                    Err(JsonRpcError::not_implemented())
                } else {
                    self.log_debug(format!("ignoring notification {method}"));
                    Ok(None)
                }
            }
        };

        match result {
            Ok(Some(value)) => Some(JsonRpcResponse::success(id, value)),
            Ok(None) => {
                if is_request {
                    // A request must always be answered.
                    Some(JsonRpcResponse::null(id))
                } else {
                    None
                }
            }
            Err(error) => {
                if is_request {
                    Some(JsonRpcResponse::error(id, error))
                } else {
                    eprintln!("[zls] error in notification {}: {error}", request.method);
                    None
                }
            }
        }
    }
}

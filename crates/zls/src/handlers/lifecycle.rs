//! `initialize` negotiation.

use lsp_types::{InitializeParams, InitializeResult, MarkupKind, PositionEncodingKind, ServerInfo};
use serde_json::Value;
use zls_position_tracking::PositionEncoding;
use zls_protocol::{server_capabilities, JsonRpcError};

use crate::server::Server;

impl Server {
    pub(crate) fn handle_initialize(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<InitializeParams>(params) else {
            return Ok(Some(Value::Null));
        };

        let caps = &params.capabilities;
        self.encoding = caps
            .general
            .as_ref()
            .and_then(|general| general.position_encodings.as_ref())
            .is_some_and(|encodings| encodings.contains(&PositionEncodingKind::UTF8))
            .then_some(PositionEncoding::Utf8)
            .unwrap_or(PositionEncoding::Utf16);

        self.client.supports_markdown = caps
            .text_document
            .as_ref()
            .and_then(|td| td.hover.as_ref())
            .and_then(|hover| hover.content_format.as_ref())
            .is_some_and(|formats| formats.contains(&MarkupKind::Markdown));

        self.client.supports_snippets = caps
            .text_document
            .as_ref()
            .and_then(|td| td.completion.as_ref())
            .and_then(|completion| completion.completion_item.as_ref())
            .and_then(|item| item.snippet_support)
            .unwrap_or(false);

        let encoding_kind = match self.encoding {
            PositionEncoding::Utf8 => PositionEncodingKind::UTF8,
            PositionEncoding::Utf16 => PositionEncodingKind::UTF16,
        };
        let result = InitializeResult {
            capabilities: server_capabilities(encoding_kind, self.config.enable_semantic_tokens),
            server_info: Some(ServerInfo {
                name: "zls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        };
        self.log_debug(format!(
            "initialized: encoding={:?} markdown={} snippets={}",
            self.encoding, self.client.supports_markdown, self.client.supports_snippets
        ));
        Ok(Some(serde_json::to_value(result).unwrap_or(Value::Null)))
    }
}

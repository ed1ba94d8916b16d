//! LSP feature handlers.
//!
//! Each submodule adds `handle_*` methods to [`crate::server::Server`]. All
//! of them share the same contract: parse their params into the typed
//! `lsp_types` shape (a parse failure logs a warning and produces a `null`
//! result), resolve against the document store, and never surface internal
//! errors to the client.

mod completion;
mod diagnostics;
mod document_symbol;
mod formatting;
mod hover;
mod lifecycle;
mod navigation;
mod references;
mod semantic_tokens;
mod text_sync;

use lsp_types::{Location, Position, Range, TextDocumentPositionParams, Uri};
use serde::de::DeserializeOwned;
use serde_json::Value;
use zls_analysis::{
    identifier_range_at, lookup_label, lookup_symbol_global, position_context,
    resolve_field_access, Declaration, PositionContext,
};
use zls_document_store::{DocumentStore, Handle};
use zls_position_tracking::PositionEncoding;

use crate::server::Server;

impl Server {
    /// Deserialize request params; log and yield `None` on mismatch.
    pub(crate) fn parse_params<T: DeserializeOwned>(&mut self, params: Option<Value>) -> Option<T> {
        let value = params.unwrap_or(Value::Null);
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                self.log_warn(format!("malformed request params: {err}"));
                None
            }
        }
    }

    /// Resolve a `textDocument/position` pair to a handle URI and byte
    /// offset. Logs a warning when the document is not held.
    pub(crate) fn doc_offset(
        &mut self,
        position: &TextDocumentPositionParams,
    ) -> Option<(String, usize)> {
        let uri = position.text_document.uri.as_str().to_string();
        match self.store.get_handle(&uri) {
            Some(handle) => {
                let offset = handle.document.line_index.position_to_offset(
                    &handle.document.text,
                    position.position,
                    self.encoding,
                );
                Some((uri, offset))
            }
            None => {
                self.log_warn(format!("unknown document {uri}"));
                None
            }
        }
    }
}

/// The symbol under the cursor, resolved the same way references resolve
/// occurrences (so goto/rename/references agree with each other).
pub(crate) fn decl_at_offset(
    store: &DocumentStore,
    handle: &Handle,
    offset: usize,
) -> Option<Declaration> {
    let text = &handle.document.text;
    let ident = identifier_range_at(text, offset)?;
    match position_context(text, ident.end) {
        PositionContext::FieldAccess(range) => {
            resolve_field_access(store, handle, range).map(|resolution| resolution.decl)
        }
        PositionContext::Label => lookup_label(handle, &text[ident.clone()], ident.start),
        PositionContext::Builtin
        | PositionContext::StringLiteral
        | PositionContext::EnumLiteral
        | PositionContext::GlobalErrorSet
        | PositionContext::Other => None,
        PositionContext::VarAccess | PositionContext::Empty => {
            lookup_symbol_global(handle, &text[ident.clone()], ident.start)
        }
    }
}

/// Location of a declaration's name token (file start for file roots).
pub(crate) fn decl_location(
    store: &DocumentStore,
    decl: &Declaration,
    enc: PositionEncoding,
) -> Option<Location> {
    let handle = decl.handle(store)?;
    let uri: Uri = handle.uri.parse().ok()?;
    let range = match decl.name_token(&handle.tree) {
        Some(tok) => {
            let token = handle.tree.token(tok);
            handle.document.line_index.range(&handle.document.text, token.start, token.end, enc)
        }
        None => Range { start: Position::new(0, 0), end: Position::new(0, 0) },
    };
    Some(Location { uri, range })
}

//! Document lifecycle notifications.

use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams,
};
use serde_json::Value;
use zls_protocol::JsonRpcError;

use crate::server::Server;

impl Server {
    pub(crate) fn handle_did_open(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<DidOpenTextDocumentParams>(params) else {
            return Ok(None);
        };
        let uri = params.text_document.uri.as_str().to_string();
        self.store.open_document(&uri, params.text_document.text);
        self.log_debug(format!("opened {uri} ({} handles)", self.store.handle_count()));
        self.publish_diagnostics(&uri);
        Ok(None)
    }

    pub(crate) fn handle_did_change(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<DidChangeTextDocumentParams>(params) else {
            return Ok(None);
        };
        let uri = params.text_document.uri.as_str().to_string();
        self.store.apply_changes(&uri, &params.content_changes, self.encoding);
        self.publish_diagnostics(&uri);
        Ok(None)
    }

    pub(crate) fn handle_did_save(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<DidSaveTextDocumentParams>(params) else {
            return Ok(None);
        };
        let uri = params.text_document.uri.as_str().to_string();
        if let Err(err) = self.store.apply_save(&uri) {
            self.log_error(format!("build discovery for {uri} failed: {err}"));
        }
        Ok(None)
    }

    pub(crate) fn handle_did_close(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<DidCloseTextDocumentParams>(params) else {
            return Ok(None);
        };
        self.store.close_document(params.text_document.uri.as_str());
        Ok(None)
    }
}

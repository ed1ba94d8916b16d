//! Find references and rename.

use lsp_types::{ReferenceParams, RenameParams};
use serde_json::Value;
use zls_analysis::{rename_symbol, symbol_references};
use zls_protocol::JsonRpcError;

use crate::handlers::decl_at_offset;
use crate::server::Server;

impl Server {
    pub(crate) fn handle_references(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<ReferenceParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let Some((uri, offset)) = self.doc_offset(&params.text_document_position) else {
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            return Ok(Some(Value::Null));
        };
        let Some(decl) = decl_at_offset(&self.store, handle, offset) else {
            return Ok(Some(Value::Null));
        };
        let locations = symbol_references(
            &self.store,
            &decl,
            params.context.include_declaration,
            self.config.skip_std_references,
            self.encoding,
        );
        Ok(Some(serde_json::to_value(locations).unwrap_or(Value::Null)))
    }

    pub(crate) fn handle_rename(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<RenameParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let Some((uri, offset)) = self.doc_offset(&params.text_document_position) else {
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            return Ok(Some(Value::Null));
        };
        let Some(decl) = decl_at_offset(&self.store, handle, offset) else {
            return Ok(Some(Value::Null));
        };
        let edit = rename_symbol(&self.store, &decl, &params.new_name, self.encoding);
        Ok(Some(serde_json::to_value(edit).unwrap_or(Value::Null)))
    }
}

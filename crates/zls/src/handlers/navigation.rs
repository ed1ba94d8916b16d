//! Goto definition / declaration / type definition.
//!
//! `declaration` answers with the symbol itself; `definition` (and
//! `implementation`) follow alias re-exports to the ultimate target.

use lsp_types::{GotoDefinitionParams, Location, Uri};
use serde_json::Value;
use zls_analysis::{container_of, follow_alias, resolve_type_of_decl};
use zls_protocol::JsonRpcError;

use crate::handlers::{decl_at_offset, decl_location};
use crate::server::Server;

impl Server {
    pub(crate) fn handle_definition(
        &mut self,
        params: Option<Value>,
        follow_aliases: bool,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<GotoDefinitionParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let Some((uri, offset)) = self.doc_offset(&params.text_document_position_params) else {
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            return Ok(Some(Value::Null));
        };
        let Some(decl) = decl_at_offset(&self.store, handle, offset) else {
            return Ok(Some(Value::Null));
        };
        let decl = if follow_aliases { follow_alias(&self.store, &decl) } else { decl };
        let Some(location) = decl_location(&self.store, &decl, self.encoding) else {
            return Ok(Some(Value::Null));
        };
        Ok(Some(serde_json::to_value(location).unwrap_or(Value::Null)))
    }

    pub(crate) fn handle_type_definition(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<GotoDefinitionParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let Some((uri, offset)) = self.doc_offset(&params.text_document_position_params) else {
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            return Ok(Some(Value::Null));
        };
        let Some(decl) = decl_at_offset(&self.store, handle, offset) else {
            return Ok(Some(Value::Null));
        };
        let Some(ty) = resolve_type_of_decl(&self.store, &decl) else {
            return Ok(Some(Value::Null));
        };
        let Some((type_uri, container)) = container_of(&self.store, &ty) else {
            return Ok(Some(Value::Null));
        };
        let Some(target) = self.store.get_handle(&type_uri) else {
            return Ok(Some(Value::Null));
        };
        let Ok(parsed_uri) = type_uri.parse::<Uri>() else {
            return Ok(Some(Value::Null));
        };
        let tok = target.tree.token(target.tree.node(container).main_token);
        let range = target.document.line_index.range(
            &target.document.text,
            tok.start,
            tok.end,
            self.encoding,
        );
        let location = Location { uri: parsed_uri, range };
        Ok(Some(serde_json::to_value(location).unwrap_or(Value::Null)))
    }
}

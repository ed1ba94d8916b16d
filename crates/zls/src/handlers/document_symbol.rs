//! Document outline.

use lsp_types::{DocumentSymbol, DocumentSymbolParams, SymbolKind};
use serde_json::Value;
use zls_document_store::Handle;
use zls_position_tracking::PositionEncoding;
use zls_protocol::JsonRpcError;
use zls_syntax::{NodeIndex, NodeKind};

use crate::server::Server;

impl Server {
    pub(crate) fn handle_document_symbol(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<DocumentSymbolParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let uri = params.text_document.uri.as_str().to_string();
        let Some(handle) = self.store.get_handle(&uri) else {
            self.log_warn(format!("unknown document {uri}"));
            return Ok(Some(Value::Null));
        };
        let symbols = container_symbols(handle, handle.tree.root, self.encoding);
        Ok(Some(serde_json::to_value(symbols).unwrap_or(Value::Null)))
    }
}

fn container_symbols(handle: &Handle, container: NodeIndex, enc: PositionEncoding) -> Vec<DocumentSymbol> {
    let ast = &handle.tree;
    let Some(members) = ast.container_members(container) else { return Vec::new() };
    members.iter().filter_map(|&member| symbol_for(handle, member, enc)).collect()
}

fn symbol_for(handle: &Handle, node: NodeIndex, enc: PositionEncoding) -> Option<DocumentSymbol> {
    let ast = &handle.tree;
    let name_token = ast.decl_name_token(node)?;
    let name = ast.token_text(name_token).to_string();

    let (kind, children) = match &ast.node(node).kind {
        NodeKind::FnDecl(..) => (SymbolKind::FUNCTION, Vec::new()),
        NodeKind::ContainerField(_) => (SymbolKind::FIELD, Vec::new()),
        NodeKind::VarDecl(v) => match v.init_node.map(|init| &ast.node(init).kind) {
            Some(NodeKind::ContainerDecl(_)) => {
                let container = v.init_node.unwrap_or(node);
                (SymbolKind::STRUCT, container_symbols(handle, container, enc))
            }
            _ if v.is_const => (SymbolKind::CONSTANT, Vec::new()),
            _ => (SymbolKind::VARIABLE, Vec::new()),
        },
        _ => return None,
    };

    let (start, end) = ast.node_range(node);
    let range = handle.document.line_index.range(&handle.document.text, start, end, enc);
    let name_tok = ast.token(name_token);
    let selection_range = handle.document.line_index.range(
        &handle.document.text,
        name_tok.start,
        name_tok.end,
        enc,
    );

    #[allow(deprecated)]
    Some(DocumentSymbol {
        name,
        detail: None,
        kind,
        tags: None,
        deprecated: None,
        range,
        selection_range,
        children: if children.is_empty() { None } else { Some(children) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zls_document_store::{DocumentStore, ToolchainEnv};

    #[test]
    fn hierarchical_outline() {
        let mut store = DocumentStore::new(ToolchainEnv::default());
        let uri = "file:///test/outline.zig";
        store.open_document(
            uri,
            "pub const Point = struct {\n    x: i32,\n    y: i32,\n    pub fn len(self: Point) i32 { return self.x; }\n};\nvar counter: i32 = 0;\nfn main() void {}\n"
                .to_string(),
        );
        let handle = store.get_handle(uri).unwrap();
        let symbols = container_symbols(handle, handle.tree.root, PositionEncoding::Utf16);

        let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Point", "counter", "main"]);
        assert_eq!(symbols[0].kind, SymbolKind::STRUCT);
        assert_eq!(symbols[1].kind, SymbolKind::VARIABLE);
        assert_eq!(symbols[2].kind, SymbolKind::FUNCTION);

        let children = symbols[0].children.as_ref().unwrap();
        let child_names: Vec<_> = children.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(child_names, vec!["x", "y", "len"]);
        assert_eq!(children[0].kind, SymbolKind::FIELD);
        assert_eq!(children[2].kind, SymbolKind::FUNCTION);
        // selectionRange covers just the name token.
        assert_eq!(symbols[0].selection_range.start.line, 0);
        assert_eq!(symbols[0].selection_range.start.character, 10);
    }

    #[test]
    fn empty_file_yields_empty_outline() {
        let mut store = DocumentStore::new(ToolchainEnv::default());
        store.open_document("file:///test/empty.zig", String::new());
        let handle = store.get_handle("file:///test/empty.zig").unwrap();
        assert_eq!(
            container_symbols(handle, handle.tree.root, PositionEncoding::Utf16).len(),
            0
        );
    }
}

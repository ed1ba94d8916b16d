//! Hover: signature plus doc comment.

use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use serde_json::Value;
use zls_analysis::{collect_doc_comments, identifier_range_at, Declaration};
use zls_document_store::DocumentStore;
use zls_protocol::JsonRpcError;

use crate::handlers::decl_at_offset;
use crate::server::Server;

impl Server {
    pub(crate) fn handle_hover(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<HoverParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let Some((uri, offset)) = self.doc_offset(&params.text_document_position_params) else {
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            return Ok(Some(Value::Null));
        };
        let text = &handle.document.text;

        // Builtins render their precomputed signature and docs.
        if let Some(ident) = identifier_range_at(text, offset) {
            if ident.start > 0 && text.as_bytes()[ident.start - 1] == b'@' {
                let name = format!("@{}", &text[ident.clone()]);
                let Some(builtin) = zls_builtins::find(&name) else {
                    return Ok(Some(Value::Null));
                };
                let hover =
                    self.render_hover(builtin.signature, Some(builtin.documentation.to_string()));
                return Ok(Some(serde_json::to_value(hover).unwrap_or(Value::Null)));
            }
        }

        let Some(decl) = decl_at_offset(&self.store, handle, offset) else {
            return Ok(Some(Value::Null));
        };
        let Some(signature) = signature_of_decl(&self.store, &decl) else {
            return Ok(Some(Value::Null));
        };
        let docs = docs_of_decl(&self.store, &decl);
        let hover = self.render_hover(&signature, docs);
        Ok(Some(serde_json::to_value(hover).unwrap_or(Value::Null)))
    }

    fn render_hover(&self, signature: &str, docs: Option<String>) -> Hover {
        let (kind, value) = if self.client.supports_markdown {
            let mut value = format!("```zig\n{signature}\n```");
            if let Some(docs) = docs {
                value.push_str("\n\n");
                value.push_str(&docs);
            }
            (MarkupKind::Markdown, value)
        } else {
            let mut value = signature.to_string();
            if let Some(docs) = docs {
                value.push('\n');
                value.push_str(&docs);
            }
            (MarkupKind::PlainText, value)
        };
        Hover { contents: HoverContents::Markup(MarkupContent { kind, value }), range: None }
    }
}

/// Render the source prototype of a declaration.
pub(crate) fn signature_of_decl(store: &DocumentStore, decl: &Declaration) -> Option<String> {
    let handle = decl.handle(store)?;
    let ast = &handle.tree;
    match decl {
        Declaration::AstNode { node, .. } => {
            let (start, node_end) = ast.node_range(*node);
            match &ast.node(*node).kind {
                zls_syntax::NodeKind::FnDecl(proto, body) => {
                    let end = match (proto.return_type, body) {
                        (Some(ret), _) => ast.node_range(ret).1,
                        (None, Some(b)) => ast.token(ast.node(*b).first_token).start,
                        (None, None) => node_end,
                    };
                    Some(ast.source.get(start..end)?.trim_end().to_string())
                }
                zls_syntax::NodeKind::VarDecl(v) => {
                    let end = if let Some(type_node) = v.type_node {
                        ast.node_range(type_node).1
                    } else if let Some(init) = v.init_node {
                        // Containers render as `const P = struct`, not the
                        // whole body.
                        if matches!(ast.node(init).kind, zls_syntax::NodeKind::ContainerDecl(_)) {
                            ast.token(ast.node(init).main_token).end
                        } else {
                            node_end
                        }
                    } else {
                        node_end
                    };
                    let slice = ast.source.get(start..end)?;
                    Some(slice.trim_end().trim_end_matches(';').trim_end().to_string())
                }
                zls_syntax::NodeKind::ContainerField(_) => {
                    Some(ast.source.get(start..node_end)?.trim_end().to_string())
                }
                zls_syntax::NodeKind::Root { .. } => None,
                _ => Some(ast.source.get(start..node_end)?.trim_end().to_string()),
            }
        }
        Declaration::Param { fn_node, index, .. } => {
            let param = ast.fn_proto(*fn_node)?.params.get(*index)?;
            let name_tok = param.name_token?;
            let start = ast.token(name_tok).start;
            let end = match param.type_node {
                Some(type_node) => ast.node_range(type_node).1,
                None => ast.token(name_tok).end,
            };
            Some(ast.source.get(start..end)?.to_string())
        }
        Declaration::PointerPayload { name_token, .. }
        | Declaration::ArrayPayload { name_token, .. }
        | Declaration::ArrayIndex { name_token, .. }
        | Declaration::SwitchPayload { name_token, .. }
        | Declaration::Label { name_token, .. } => Some(ast.token_text(*name_token).to_string()),
    }
}

fn docs_of_decl(store: &DocumentStore, decl: &Declaration) -> Option<String> {
    let Declaration::AstNode { node, .. } = decl else { return None };
    let handle = decl.handle(store)?;
    collect_doc_comments(&handle.tree, *node)
}

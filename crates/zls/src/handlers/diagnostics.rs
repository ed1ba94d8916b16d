//! Parse-error and style diagnostics.
//!
//! Diagnostics are pushed via `textDocument/publishDiagnostics` after every
//! open and change. Parse errors are `Error` severity; style findings are
//! `Information` and only produced when `warn_style` is configured. All
//! diagnostics anchor at the offending name token, not the whole
//! declaration.

use lsp_types::{Diagnostic, DiagnosticSeverity, PublishDiagnosticsParams};
use zls_document_store::Handle;
use zls_position_tracking::PositionEncoding;
use zls_syntax::{Ast, NodeIndex, NodeKind, TokenIndex};

use crate::server::Server;

const SOURCE: &str = "zls";

impl Server {
    /// Queue a `publishDiagnostics` notification for `uri`.
    pub(crate) fn publish_diagnostics(&mut self, uri: &str) {
        let Some(handle) = self.store.get_handle(uri) else { return };
        let diagnostics = build_diagnostics(handle, self.config.warn_style, self.encoding);
        let Ok(parsed_uri) = uri.parse::<lsp_types::Uri>() else { return };
        let params =
            PublishDiagnosticsParams { uri: parsed_uri, diagnostics, version: None };
        match serde_json::to_value(params) {
            Ok(value) => self.notify("textDocument/publishDiagnostics", value),
            Err(err) => self.log_error(format!("diagnostics for {uri} failed: {err}")),
        }
    }
}

pub(crate) fn build_diagnostics(
    handle: &Handle,
    warn_style: bool,
    enc: PositionEncoding,
) -> Vec<Diagnostic> {
    let ast = &handle.tree;
    let mut diagnostics = Vec::new();

    for err in &ast.errors {
        diagnostics.push(diagnostic(
            handle,
            err.token,
            DiagnosticSeverity::ERROR,
            ast.render_parse_error(err),
            enc,
        ));
    }

    if warn_style {
        style_walk(ast, ast.root, &mut |node| {
            if let Some(d) = style_diagnostic(handle, node, enc) {
                diagnostics.push(d);
            }
        });
    }

    diagnostics
}

fn diagnostic(
    handle: &Handle,
    token: TokenIndex,
    severity: DiagnosticSeverity,
    message: String,
    enc: PositionEncoding,
) -> Diagnostic {
    let tok = handle.tree.token(token);
    let range = handle.document.line_index.range(&handle.document.text, tok.start, tok.end, enc);
    Diagnostic {
        range,
        severity: Some(severity),
        code: None,
        code_description: None,
        source: Some(SOURCE.to_string()),
        message,
        related_information: None,
        tags: None,
        data: None,
    }
}

/// Visit every container member in the tree, nested containers included.
fn style_walk(ast: &Ast, container: NodeIndex, visit: &mut impl FnMut(NodeIndex)) {
    let Some(members) = ast.container_members(container) else { return };
    for &member in members {
        visit(member);
        if let NodeKind::VarDecl(v) = &ast.node(member).kind {
            if let Some(init) = v.init_node {
                if matches!(ast.node(init).kind, NodeKind::ContainerDecl(_)) {
                    style_walk(ast, init, visit);
                }
            }
        }
    }
}

fn style_diagnostic(
    handle: &Handle,
    node: NodeIndex,
    enc: PositionEncoding,
) -> Option<Diagnostic> {
    let ast = &handle.tree;
    match &ast.node(node).kind {
        NodeKind::FnDecl(proto, _) => {
            let name_token = proto.name_token?;
            let name = ast.token_text(name_token);
            if returns_type(ast, proto.return_type) {
                if !is_pascal_case(name) {
                    return Some(diagnostic(
                        handle,
                        name_token,
                        DiagnosticSeverity::INFORMATION,
                        format!("function '{name}' returns a type and should be PascalCase"),
                        enc,
                    ));
                }
            } else if !is_camel_case(name) {
                return Some(diagnostic(
                    handle,
                    name_token,
                    DiagnosticSeverity::INFORMATION,
                    format!("function '{name}' should be camelCase"),
                    enc,
                ));
            }
            None
        }
        NodeKind::ContainerField(field) => {
            let name = ast.token_text(field.name_token);
            if !is_snake_case(name) {
                return Some(diagnostic(
                    handle,
                    field.name_token,
                    DiagnosticSeverity::INFORMATION,
                    format!("field '{name}' should be snake_case"),
                    enc,
                ));
            }
            None
        }
        _ => None,
    }
}

fn returns_type(ast: &Ast, return_type: Option<NodeIndex>) -> bool {
    let Some(ret) = return_type else { return false };
    matches!(ast.node(ret).kind, NodeKind::Identifier)
        && ast.token_text(ast.node(ret).main_token) == "type"
}

fn is_pascal_case(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase) && !name.contains('_')
}

fn is_camel_case(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_lowercase) && !name.contains('_')
}

fn is_snake_case(name: &str) -> bool {
    !name.chars().any(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zls_document_store::{DocumentStore, ToolchainEnv};

    fn handle_for(text: &str) -> DocumentStore {
        let mut store = DocumentStore::new(ToolchainEnv::default());
        store.open_document("file:///test/style.zig", text.to_string());
        store
    }

    #[test]
    fn parse_error_becomes_error_diagnostic() {
        let store = handle_for("fn (");
        let handle = store.get_handle("file:///test/style.zig").unwrap();
        let diags = build_diagnostics(handle, false, PositionEncoding::Utf16);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diags[0].source.as_deref(), Some("zls"));
        assert_eq!(diags[0].range.start.character, 3);
    }

    #[test]
    fn style_findings_require_warn_style() {
        let text = "fn Bad() void {}\nfn MakeThing() type { return struct {}; }\nconst S = struct { BadField: i32 };\n";
        let store = handle_for(text);
        let handle = store.get_handle("file:///test/style.zig").unwrap();

        assert_eq!(build_diagnostics(handle, false, PositionEncoding::Utf16).len(), 0);

        let diags = build_diagnostics(handle, true, PositionEncoding::Utf16);
        let messages: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(diags.len(), 2, "{messages:?}");
        assert!(messages[0].contains("camelCase"));
        assert!(messages[1].contains("snake_case"));
        assert!(diags.iter().all(|d| d.severity == Some(DiagnosticSeverity::INFORMATION)));
    }

    #[test]
    fn type_returning_function_wants_pascal_case() {
        let text = "fn makeThing() type { return struct {}; }\n";
        let store = handle_for(text);
        let handle = store.get_handle("file:///test/style.zig").unwrap();
        let diags = build_diagnostics(handle, true, PositionEncoding::Utf16);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("PascalCase"));
    }

    #[test]
    fn clean_code_has_no_diagnostics() {
        let text = "const Point = struct { x: i32 };\npub fn addOne(v: i32) i32 { return v + 1; }\n";
        let store = handle_for(text);
        let handle = store.get_handle("file:///test/style.zig").unwrap();
        assert_eq!(build_diagnostics(handle, true, PositionEncoding::Utf16).len(), 0);
    }
}

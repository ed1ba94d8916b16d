//! Completion, dispatched on the position context.

use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, Documentation,
    InsertTextFormat, MarkupContent, MarkupKind,
};
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use serde_json::Value;
use zls_analysis::{
    collect_doc_comments, container_of, deref_type, identifier_range_at, is_enum_container,
    lookup_symbol_global, position_context, resolve_field_access, resolve_type_of_decl,
    resolve_type_of_node, scope_declarations, scope_labels, Declaration, PositionContext,
    TypeData, TypeWithHandle,
};
use zls_document_store::{DocumentStore, Handle};
use zls_protocol::JsonRpcError;
use zls_syntax::{ContainerKind, NodeKind};

use crate::handlers::hover::signature_of_decl;
use crate::server::Server;

/// Builtin completion items without snippet text, built once per process.
static BUILTIN_ITEMS: Lazy<Vec<CompletionItem>> = Lazy::new(|| {
    zls_builtins::BUILTINS
        .iter()
        .map(|builtin| CompletionItem {
            label: builtin.name.to_string(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some(builtin.signature.to_string()),
            documentation: Some(Documentation::String(builtin.documentation.to_string())),
            ..CompletionItem::default()
        })
        .collect()
});

impl Server {
    pub(crate) fn handle_completion(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<CompletionParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let Some((uri, offset)) = self.doc_offset(&params.text_document_position) else {
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            return Ok(Some(Value::Null));
        };

        let snippets = self.config.enable_snippets && self.client.supports_snippets;
        let builder = ItemBuilder {
            store: &self.store,
            markdown: self.client.supports_markdown,
            snippets,
        };

        let items = match position_context(&handle.document.text, offset) {
            PositionContext::Builtin => builtin_items(snippets),
            PositionContext::VarAccess | PositionContext::Empty => {
                global_items(&builder, handle, offset)
            }
            PositionContext::FieldAccess(range) => {
                field_access_items(&builder, handle, range, self.config.operator_completions)
            }
            PositionContext::GlobalErrorSet => error_set_items(&self.store),
            PositionContext::EnumLiteral => enum_literal_items(&self.store, handle, offset),
            PositionContext::Label => label_items(&builder, handle, offset),
            PositionContext::StringLiteral | PositionContext::Other => {
                return Ok(Some(Value::Null));
            }
        };

        let response = CompletionResponse::Array(items);
        Ok(Some(serde_json::to_value(response).unwrap_or(Value::Null)))
    }
}

struct ItemBuilder<'a> {
    store: &'a DocumentStore,
    markdown: bool,
    snippets: bool,
}

impl ItemBuilder<'_> {
    /// Completion item for a declaration; `kind_override` lets enum
    /// containers mark their variants, and `skip_first_param` applies the
    /// method-call idiom to member function snippets.
    fn item(
        &self,
        decl: &Declaration,
        kind_override: Option<CompletionItemKind>,
        skip_first_param: bool,
    ) -> Option<CompletionItem> {
        let handle = decl.handle(self.store)?;
        let ast = &handle.tree;
        let name = ast.token_text(decl.name_token(ast)?).to_string();

        let kind = kind_override.or_else(|| Some(self.decl_kind(decl, handle)))?;
        let detail = signature_of_decl(self.store, decl);
        let documentation = self.docs(decl);

        let mut item = CompletionItem {
            label: name.clone(),
            kind: Some(kind),
            detail,
            documentation,
            ..CompletionItem::default()
        };
        if self.snippets {
            if let Declaration::AstNode { node, .. } = decl {
                if let Some(proto) = ast.fn_proto(*node) {
                    let skip = usize::from(skip_first_param);
                    let placeholders: Vec<String> = proto
                        .params
                        .iter()
                        .skip(skip)
                        .enumerate()
                        .map(|(i, param)| {
                            let label = param
                                .name_token
                                .map(|tok| ast.token_text(tok).to_string())
                                .unwrap_or_else(|| format!("arg{}", i + 1));
                            format!("${{{}:{}}}", i + 1, label)
                        })
                        .collect();
                    item.insert_text = Some(format!("{}({})", name, placeholders.join(", ")));
                    item.insert_text_format = Some(InsertTextFormat::SNIPPET);
                }
            }
        }
        Some(item)
    }

    fn decl_kind(&self, decl: &Declaration, handle: &Handle) -> CompletionItemKind {
        let ast = &handle.tree;
        match decl {
            Declaration::AstNode { node, .. } => match &ast.node(*node).kind {
                NodeKind::FnDecl(..) => CompletionItemKind::FUNCTION,
                NodeKind::ContainerField(_) => CompletionItemKind::FIELD,
                NodeKind::VarDecl(v) => match v.init_node.map(|init| &ast.node(init).kind) {
                    Some(NodeKind::BuiltinCall { .. }) => CompletionItemKind::MODULE,
                    Some(NodeKind::ContainerDecl(c)) if c.kind == ContainerKind::Enum => {
                        CompletionItemKind::ENUM
                    }
                    Some(NodeKind::ContainerDecl(_)) => CompletionItemKind::STRUCT,
                    _ if v.is_const => CompletionItemKind::CONSTANT,
                    _ => CompletionItemKind::VARIABLE,
                },
                _ => CompletionItemKind::VARIABLE,
            },
            Declaration::Label { .. } => CompletionItemKind::KEYWORD,
            _ => CompletionItemKind::VARIABLE,
        }
    }

    fn docs(&self, decl: &Declaration) -> Option<Documentation> {
        let Declaration::AstNode { node, .. } = decl else { return None };
        let handle = decl.handle(self.store)?;
        let docs = collect_doc_comments(&handle.tree, *node)?;
        Some(if self.markdown {
            Documentation::MarkupContent(MarkupContent { kind: MarkupKind::Markdown, value: docs })
        } else {
            Documentation::String(docs)
        })
    }
}

fn builtin_items(snippets: bool) -> Vec<CompletionItem> {
    BUILTIN_ITEMS
        .iter()
        .zip(zls_builtins::BUILTINS)
        .map(|(base, builtin)| {
            let mut item = base.clone();
            // The '@' is already typed when the context triggers.
            if snippets {
                item.insert_text = Some(builtin.snippet.trim_start_matches('@').to_string());
                item.insert_text_format = Some(InsertTextFormat::SNIPPET);
            } else {
                item.insert_text = Some(builtin.name.trim_start_matches('@').to_string());
            }
            item
        })
        .collect()
}

fn global_items(builder: &ItemBuilder<'_>, handle: &Handle, offset: usize) -> Vec<CompletionItem> {
    scope_declarations(handle, offset)
        .iter()
        .filter_map(|decl| builder.item(decl, None, false))
        .collect()
}

fn field_access_items(
    builder: &ItemBuilder<'_>,
    handle: &Handle,
    range: std::ops::Range<usize>,
    operator_completions: bool,
) -> Vec<CompletionItem> {
    let Some(resolution) = resolve_field_access(builder.store, handle, range) else {
        return Vec::new();
    };
    let Some(ty) = resolution.ty else { return Vec::new() };

    let mut items = Vec::new();

    // Operator completions describe the receiver as written.
    match &ty.original.data {
        TypeData::Pointer(_) if operator_completions && !ty.original.is_type_val => {
            items.push(operator_item("*", "dereference"));
        }
        TypeData::Other(node) if operator_completions => {
            if let Some(target) = builder.store.get_handle(&ty.original.uri) {
                if matches!(target.tree.node(*node).kind, NodeKind::OptionalType { .. })
                    && !ty.original.is_type_val
                {
                    items.push(operator_item("?", "unwrap optional"));
                }
            }
        }
        _ => {}
    }

    // Member completions come from the unwrapped type when one applies.
    let base = ty.unwrapped.unwrap_or(ty.original);
    let base = match deref_type(builder.store, &base) {
        Some(inner) => inner,
        None => base,
    };

    match &base.data {
        TypeData::Slice(_) => {
            items.push(slice_member("len", "usize"));
            items.push(slice_member("ptr", "[*]T"));
        }
        _ => items.extend(member_items(builder, &base)),
    }
    items
}

fn member_items(builder: &ItemBuilder<'_>, ty: &TypeWithHandle) -> Vec<CompletionItem> {
    let Some((uri, container)) = container_of(builder.store, ty) else { return Vec::new() };
    let Some(handle) = builder.store.get_handle(&uri) else { return Vec::new() };
    let ast = &handle.tree;
    let Some(members) = ast.container_members(container) else { return Vec::new() };
    let is_enum = is_enum_container(builder.store, ty);
    let instance = !ty.is_type_val;

    let mut items = Vec::new();
    for &member in members {
        let decl = Declaration::AstNode { uri: uri.clone(), node: member };
        match &ast.node(member).kind {
            NodeKind::ContainerField(_) => {
                let kind = is_enum.then_some(CompletionItemKind::ENUM_MEMBER);
                items.extend(builder.item(&decl, kind, false));
            }
            NodeKind::FnDecl(proto, _) => {
                if proto.name_token.is_none() {
                    continue;
                }
                let skip_first =
                    instance && first_param_matches(builder.store, &uri, proto, ty);
                items.extend(builder.item(&decl, None, skip_first));
            }
            NodeKind::VarDecl(_) if !instance => {
                items.extend(builder.item(&decl, None, false));
            }
            _ => {}
        }
    }
    items
}

/// Method-call idiom: the first parameter's type structurally equals the
/// receiver container (directly or through one pointer).
fn first_param_matches(
    store: &DocumentStore,
    uri: &str,
    proto: &zls_syntax::FnProto,
    receiver: &TypeWithHandle,
) -> bool {
    let Some(param) = proto.params.first() else { return false };
    let Some(type_node) = param.type_node else { return param.is_anytype };
    let Some(param_ty) = resolve_type_of_node(store, uri, type_node) else { return false };
    let param_ty = match deref_type(store, &param_ty) {
        Some(inner) => inner,
        None => param_ty,
    };
    match (container_of(store, &param_ty), container_of(store, receiver)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn operator_item(label: &str, detail: &str) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(CompletionItemKind::OPERATOR),
        detail: Some(detail.to_string()),
        ..CompletionItem::default()
    }
}

fn slice_member(label: &str, detail: &str) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(CompletionItemKind::FIELD),
        detail: Some(detail.to_string()),
        ..CompletionItem::default()
    }
}

/// Every error name declared anywhere in the reachable graph.
fn error_set_items(store: &DocumentStore) -> Vec<CompletionItem> {
    let mut seen = FxHashSet::default();
    let mut items = Vec::new();
    let mut uris: Vec<&str> = store.handles().map(|h| h.uri.as_str()).collect();
    uris.sort_unstable();
    for uri in uris {
        let Some(handle) = store.get_handle(uri) else { continue };
        let ast = &handle.tree;
        for index in 0..ast.nodes.len() as u32 {
            match &ast.node(index).kind {
                NodeKind::ErrorSetDecl(names) => {
                    for &tok in names {
                        let name = ast.token_text(tok);
                        if seen.insert(name.to_string()) {
                            items.push(error_item(name));
                        }
                    }
                }
                NodeKind::ErrorValue => {
                    let name = ast.token_text(ast.node(index).main_token);
                    if seen.insert(name.to_string()) {
                        items.push(error_item(name));
                    }
                }
                _ => {}
            }
        }
    }
    items
}

fn error_item(name: &str) -> CompletionItem {
    CompletionItem {
        label: name.to_string(),
        kind: Some(CompletionItemKind::CONSTANT),
        detail: Some("error".to_string()),
        ..CompletionItem::default()
    }
}

/// Variants of the expected enum, resolved through the nearest assignment
/// or comparison receiver; all reachable enum variants otherwise.
fn enum_literal_items(
    store: &DocumentStore,
    handle: &Handle,
    offset: usize,
) -> Vec<CompletionItem> {
    if let Some(ty) = expected_enum(store, handle, offset) {
        if is_enum_container(store, &ty) {
            return enum_variant_items(store, &ty);
        }
    }

    // Fallback: every enum in the reachable graph.
    let mut items = Vec::new();
    let mut uris: Vec<&str> = store.handles().map(|h| h.uri.as_str()).collect();
    uris.sort_unstable();
    for uri in uris {
        let Some(target) = store.get_handle(uri) else { continue };
        let ast = &target.tree;
        for index in 0..ast.nodes.len() as u32 {
            if let NodeKind::ContainerDecl(c) = &ast.node(index).kind {
                if c.kind == ContainerKind::Enum {
                    let ty = TypeWithHandle::other(index, uri, true);
                    items.extend(enum_variant_items(store, &ty));
                }
            }
        }
    }
    items
}

fn enum_variant_items(store: &DocumentStore, ty: &TypeWithHandle) -> Vec<CompletionItem> {
    let Some((uri, container)) = container_of(store, ty) else { return Vec::new() };
    let Some(handle) = store.get_handle(&uri) else { return Vec::new() };
    let ast = &handle.tree;
    let Some(members) = ast.container_members(container) else { return Vec::new() };
    members
        .iter()
        .filter_map(|&member| ast.container_field(member))
        .map(|field| CompletionItem {
            label: ast.token_text(field.name_token).to_string(),
            kind: Some(CompletionItemKind::ENUM_MEMBER),
            ..CompletionItem::default()
        })
        .collect()
}

/// Resolve `name = .` / `name == .` receivers to the expected enum type.
fn expected_enum(
    store: &DocumentStore,
    handle: &Handle,
    offset: usize,
) -> Option<TypeWithHandle> {
    let text = &handle.document.text;
    let bytes = text.as_bytes();
    // Walk back over the partial variant name and its dot.
    let mut i = offset.min(bytes.len());
    while i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') {
        i -= 1;
    }
    if i == 0 || bytes[i - 1] != b'.' {
        return None;
    }
    i -= 1;
    while i > 0 && bytes[i - 1] == b' ' {
        i -= 1;
    }
    // `=`, `==`, or `!=` before the literal.
    if i == 0 || bytes[i - 1] != b'=' {
        return None;
    }
    i -= 1;
    if i > 0 && (bytes[i - 1] == b'=' || bytes[i - 1] == b'!') {
        i -= 1;
    }
    while i > 0 && bytes[i - 1] == b' ' {
        i -= 1;
    }
    let receiver = identifier_range_at(text, i)?;
    let decl =
        lookup_symbol_global(handle, &text[receiver.clone()], receiver.start)?;
    resolve_type_of_decl(store, &decl)
}

fn label_items(builder: &ItemBuilder<'_>, handle: &Handle, offset: usize) -> Vec<CompletionItem> {
    scope_labels(handle, offset)
        .iter()
        .filter_map(|decl| builder.item(decl, None, false))
        .collect()
}

//! Symbol lookup, type resolution, and field-access chain folding.
//!
//! Resolution is bounded: every recursive path threads a depth counter
//! capped at [`MAX_RESOLVE_DEPTH`], so alias cycles and self-referential
//! types degrade to `None` instead of spinning.

use zls_document_store::{DocumentStore, Handle};
use zls_syntax::{tokenize, Ast, ContainerKind, NodeIndex, NodeKind, TokenTag};

use crate::{is_primitive, Declaration, FieldAccessReturn, TypeData, TypeWithHandle, MAX_RESOLVE_DEPTH};

/// Result of folding a dotted chain: the last named declaration plus the
/// declared type at the cursor.
#[derive(Debug, Clone)]
pub struct FieldAccessResolution {
    pub decl: Declaration,
    pub ty: Option<FieldAccessReturn>,
}

fn ast_of<'a>(store: &'a DocumentStore, uri: &str) -> Option<&'a Ast> {
    store.get_handle(uri).map(|h| &h.tree)
}

// ----------------------------------------------------------------------
// Scope walking
// ----------------------------------------------------------------------

/// Containment path from the root to the innermost node holding `offset`.
fn scope_chain(ast: &Ast, offset: usize) -> Vec<NodeIndex> {
    let mut chain = vec![ast.root];
    loop {
        let current = *chain.last().unwrap_or(&ast.root);
        let mut next = None;
        ast.visit_children(current, &mut |child| {
            if next.is_some() {
                return;
            }
            let (start, end) = ast.node_range(child);
            if start <= offset && offset <= end {
                next = Some(child);
            }
        });
        match next {
            Some(child) => chain.push(child),
            None => return chain,
        }
    }
}

/// Walk outward from the innermost scope containing `offset`, honoring
/// shadowing: locals first, then parameters and unwrap payloads, then
/// container members (order-independent), then the file top level.
pub fn lookup_symbol_global(handle: &Handle, name: &str, offset: usize) -> Option<Declaration> {
    let ast = &handle.tree;
    let chain = scope_chain(ast, offset);
    for &scope in chain.iter().rev() {
        match &ast.node(scope).kind {
            NodeKind::Block(block) => {
                for &stmt in &block.statements {
                    if let NodeKind::VarDecl(v) = &ast.node(stmt).kind {
                        if ast.token_text(v.name_token) == name
                            && ast.node_range(stmt).0 <= offset
                        {
                            return Some(Declaration::AstNode {
                                uri: handle.uri.clone(),
                                node: stmt,
                            });
                        }
                    }
                }
            }
            NodeKind::FnDecl(proto, _) => {
                for (index, param) in proto.params.iter().enumerate() {
                    if let Some(tok) = param.name_token {
                        if ast.token_text(tok) == name {
                            return Some(Declaration::Param {
                                uri: handle.uri.clone(),
                                fn_node: scope,
                                index,
                            });
                        }
                    }
                }
            }
            NodeKind::If { payload, then_expr, condition, .. } => {
                if let Some(p) = payload {
                    if ast.token_text(p.name_token) == name
                        && node_contains(ast, *then_expr, offset)
                    {
                        return Some(Declaration::PointerPayload {
                            uri: handle.uri.clone(),
                            name_token: p.name_token,
                            condition: *condition,
                        });
                    }
                }
            }
            NodeKind::While { payload, body, condition, .. } => {
                if let Some(p) = payload {
                    if ast.token_text(p.name_token) == name && node_contains(ast, *body, offset) {
                        return Some(Declaration::PointerPayload {
                            uri: handle.uri.clone(),
                            name_token: p.name_token,
                            condition: *condition,
                        });
                    }
                }
            }
            NodeKind::Catch { lhs, payload, rhs } => {
                if let Some(p) = payload {
                    if ast.token_text(p.name_token) == name && node_contains(ast, *rhs, offset) {
                        return Some(Declaration::PointerPayload {
                            uri: handle.uri.clone(),
                            name_token: p.name_token,
                            condition: *lhs,
                        });
                    }
                }
            }
            NodeKind::For { sequence, payloads, body, .. } => {
                if node_contains(ast, *body, offset) {
                    for (i, p) in payloads.iter().enumerate() {
                        if ast.token_text(p.name_token) == name {
                            return Some(if i == 0 {
                                Declaration::ArrayPayload {
                                    uri: handle.uri.clone(),
                                    name_token: p.name_token,
                                    sequence: *sequence,
                                }
                            } else {
                                Declaration::ArrayIndex {
                                    uri: handle.uri.clone(),
                                    name_token: p.name_token,
                                }
                            });
                        }
                    }
                }
            }
            NodeKind::Switch { operand, prongs } => {
                for prong in prongs {
                    if let Some(p) = prong.payload {
                        if ast.token_text(p.name_token) == name
                            && node_contains(ast, prong.body, offset)
                        {
                            return Some(Declaration::SwitchPayload {
                                uri: handle.uri.clone(),
                                name_token: p.name_token,
                                operand: *operand,
                            });
                        }
                    }
                }
            }
            NodeKind::Root { members } | NodeKind::ContainerDecl(zls_syntax::ContainerDecl { members, .. }) => {
                for &member in members {
                    match &ast.node(member).kind {
                        NodeKind::VarDecl(v) if ast.token_text(v.name_token) == name => {
                            return Some(Declaration::AstNode {
                                uri: handle.uri.clone(),
                                node: member,
                            });
                        }
                        NodeKind::FnDecl(proto, _) => {
                            if let Some(tok) = proto.name_token {
                                if ast.token_text(tok) == name {
                                    return Some(Declaration::AstNode {
                                        uri: handle.uri.clone(),
                                        node: member,
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Every declaration visible at `offset`, innermost scope first.
///
/// The completion counterpart of [`lookup_symbol_global`]: the same scope
/// walk, collecting instead of matching. Shadowed outer declarations are
/// dropped.
pub fn scope_declarations(handle: &Handle, offset: usize) -> Vec<Declaration> {
    let ast = &handle.tree;
    let chain = scope_chain(ast, offset);
    let mut seen = rustc_hash::FxHashSet::default();
    let mut decls = Vec::new();
    let mut add = |name: &str, decl: Declaration, decls: &mut Vec<Declaration>| {
        if seen.insert(name.to_string()) {
            decls.push(decl);
        }
    };
    for &scope in chain.iter().rev() {
        match &ast.node(scope).kind {
            NodeKind::Block(block) => {
                for &stmt in &block.statements {
                    if let NodeKind::VarDecl(v) = &ast.node(stmt).kind {
                        if ast.node_range(stmt).0 <= offset {
                            add(
                                ast.token_text(v.name_token),
                                Declaration::AstNode { uri: handle.uri.clone(), node: stmt },
                                &mut decls,
                            );
                        }
                    }
                }
            }
            NodeKind::FnDecl(proto, _) => {
                for (index, param) in proto.params.iter().enumerate() {
                    if let Some(tok) = param.name_token {
                        add(
                            ast.token_text(tok),
                            Declaration::Param { uri: handle.uri.clone(), fn_node: scope, index },
                            &mut decls,
                        );
                    }
                }
            }
            NodeKind::If { payload, then_expr, condition, .. } => {
                if let Some(p) = payload {
                    if node_contains(ast, *then_expr, offset) {
                        add(
                            ast.token_text(p.name_token),
                            Declaration::PointerPayload {
                                uri: handle.uri.clone(),
                                name_token: p.name_token,
                                condition: *condition,
                            },
                            &mut decls,
                        );
                    }
                }
            }
            NodeKind::While { payload, body, condition, .. } => {
                if let Some(p) = payload {
                    if node_contains(ast, *body, offset) {
                        add(
                            ast.token_text(p.name_token),
                            Declaration::PointerPayload {
                                uri: handle.uri.clone(),
                                name_token: p.name_token,
                                condition: *condition,
                            },
                            &mut decls,
                        );
                    }
                }
            }
            NodeKind::For { sequence, payloads, body, .. } => {
                if node_contains(ast, *body, offset) {
                    for (i, p) in payloads.iter().enumerate() {
                        let decl = if i == 0 {
                            Declaration::ArrayPayload {
                                uri: handle.uri.clone(),
                                name_token: p.name_token,
                                sequence: *sequence,
                            }
                        } else {
                            Declaration::ArrayIndex {
                                uri: handle.uri.clone(),
                                name_token: p.name_token,
                            }
                        };
                        add(ast.token_text(p.name_token), decl, &mut decls);
                    }
                }
            }
            NodeKind::Switch { operand, prongs } => {
                for prong in prongs {
                    if let Some(p) = prong.payload {
                        if node_contains(ast, prong.body, offset) {
                            add(
                                ast.token_text(p.name_token),
                                Declaration::SwitchPayload {
                                    uri: handle.uri.clone(),
                                    name_token: p.name_token,
                                    operand: *operand,
                                },
                                &mut decls,
                            );
                        }
                    }
                }
            }
            NodeKind::Root { members }
            | NodeKind::ContainerDecl(zls_syntax::ContainerDecl { members, .. }) => {
                for &member in members {
                    match &ast.node(member).kind {
                        NodeKind::VarDecl(v) => add(
                            ast.token_text(v.name_token),
                            Declaration::AstNode { uri: handle.uri.clone(), node: member },
                            &mut decls,
                        ),
                        NodeKind::FnDecl(proto, _) => {
                            if let Some(tok) = proto.name_token {
                                add(
                                    ast.token_text(tok),
                                    Declaration::AstNode { uri: handle.uri.clone(), node: member },
                                    &mut decls,
                                );
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    decls
}

fn node_contains(ast: &Ast, node: NodeIndex, offset: usize) -> bool {
    let (start, end) = ast.node_range(node);
    start <= offset && offset <= end
}

/// Look up `name` as a member of a container.
///
/// With `instance` set, constants and nested types are omitted; fields and
/// member functions are always candidates.
pub fn lookup_symbol_container(
    store: &DocumentStore,
    uri: &str,
    container: NodeIndex,
    name: &str,
    instance: bool,
) -> Option<Declaration> {
    let ast = ast_of(store, uri)?;
    let members = ast.container_members(container)?;
    for &member in members {
        match &ast.node(member).kind {
            NodeKind::ContainerField(field) if ast.token_text(field.name_token) == name => {
                return Some(Declaration::AstNode { uri: uri.to_string(), node: member });
            }
            NodeKind::FnDecl(proto, _) => {
                if proto.name_token.is_some_and(|tok| ast.token_text(tok) == name) {
                    return Some(Declaration::AstNode { uri: uri.to_string(), node: member });
                }
            }
            NodeKind::VarDecl(v) if !instance && ast.token_text(v.name_token) == name => {
                return Some(Declaration::AstNode { uri: uri.to_string(), node: member });
            }
            _ => {}
        }
    }
    None
}

/// Find the enclosing block or loop label named `name` at `offset`.
pub fn lookup_label(handle: &Handle, name: &str, offset: usize) -> Option<Declaration> {
    let ast = &handle.tree;
    let chain = scope_chain(ast, offset);
    for &scope in chain.iter().rev() {
        let label = match &ast.node(scope).kind {
            NodeKind::Block(block) => block.label,
            NodeKind::While { label, .. } | NodeKind::For { label, .. } => *label,
            _ => None,
        };
        if let Some(tok) = label {
            if ast.token_text(tok) == name {
                return Some(Declaration::Label { uri: handle.uri.clone(), name_token: tok });
            }
        }
    }
    None
}

// ----------------------------------------------------------------------
// Type resolution
// ----------------------------------------------------------------------

/// Declared type of an expression node. Cycle-safe via the depth bound.
pub fn resolve_type_of_node(
    store: &DocumentStore,
    uri: &str,
    node: NodeIndex,
) -> Option<TypeWithHandle> {
    type_of_node(store, uri, node, 0)
}

fn type_of_node(
    store: &DocumentStore,
    uri: &str,
    node: NodeIndex,
    depth: u32,
) -> Option<TypeWithHandle> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let handle = store.get_handle(uri)?;
    let ast = &handle.tree;
    match &ast.node(node).kind {
        NodeKind::Identifier => {
            let name = ast.token_text(ast.node(node).main_token);
            if is_primitive(name) {
                return Some(TypeWithHandle::primitive(name, true));
            }
            let start = ast.token(ast.node(node).main_token).start;
            let decl = lookup_symbol_global(handle, name, start)?;
            type_of_decl(store, &decl, depth + 1)
        }
        NodeKind::FieldAccess { .. } => {
            let decl = field_access_decl_at(store, uri, node, depth)?;
            let decl = follow_alias_depth(store, &decl, depth + 1);
            type_of_decl(store, &decl, depth + 1)
        }
        NodeKind::Call { callee, .. } => {
            let callee_ty = type_of_node(store, uri, *callee, depth + 1)?;
            return_type_depth(store, &callee_ty, depth + 1)
        }
        NodeKind::BuiltinCall { args } => {
            match ast.token_text(ast.node(node).main_token) {
                "@import" => {
                    let &arg = args.first()?;
                    if !matches!(ast.node(arg).kind, NodeKind::StringLiteral) {
                        return None;
                    }
                    let target = ast.string_value(ast.node(arg).main_token);
                    let target_uri = store.resolve_import_uri(uri, &target)?;
                    let target_ast = ast_of(store, &target_uri)?;
                    Some(TypeWithHandle::other(target_ast.root, target_uri, true))
                }
                "@This" => {
                    let offset = ast.node_range(node).0;
                    let chain = scope_chain(ast, offset);
                    let container = chain
                        .iter()
                        .rev()
                        .find(|&&n| {
                            matches!(
                                ast.node(n).kind,
                                NodeKind::ContainerDecl(_) | NodeKind::Root { .. }
                            )
                        })
                        .copied()?;
                    Some(TypeWithHandle::other(container, uri, true))
                }
                _ => None,
            }
        }
        NodeKind::StringLiteral => Some(TypeWithHandle {
            data: TypeData::Slice(node),
            uri: uri.to_string(),
            is_type_val: false,
        }),
        NodeKind::NumberLiteral => Some(TypeWithHandle::primitive("comptime_int", false)),
        NodeKind::CharLiteral => Some(TypeWithHandle::primitive("u8", false)),
        NodeKind::BoolLiteral => Some(TypeWithHandle::primitive("bool", false)),
        NodeKind::Root { .. } | NodeKind::ContainerDecl(_) | NodeKind::ErrorSetDecl(_) => {
            Some(TypeWithHandle::other(node, uri, true))
        }
        NodeKind::FnDecl(..) => Some(TypeWithHandle::other(node, uri, false)),
        NodeKind::PtrType(_) | NodeKind::AddressOf { .. } => Some(TypeWithHandle {
            data: TypeData::Pointer(node),
            uri: uri.to_string(),
            is_type_val: matches!(ast.node(node).kind, NodeKind::PtrType(_)),
        }),
        NodeKind::SliceType { .. } => Some(TypeWithHandle {
            data: TypeData::Slice(node),
            uri: uri.to_string(),
            is_type_val: true,
        }),
        NodeKind::ErrorUnionType { .. } => Some(TypeWithHandle {
            data: TypeData::ErrorUnion(node),
            uri: uri.to_string(),
            is_type_val: true,
        }),
        NodeKind::OptionalType { .. } | NodeKind::ArrayType { .. } => {
            Some(TypeWithHandle::other(node, uri, true))
        }
        NodeKind::Try { operand } => {
            let ty = type_of_node(store, uri, *operand, depth + 1)?;
            unwrap_error_union(store, &ty, depth + 1)
        }
        NodeKind::Catch { lhs, .. } => {
            let ty = type_of_node(store, uri, *lhs, depth + 1)?;
            unwrap_error_union(store, &ty, depth + 1)
        }
        NodeKind::Orelse { lhs, .. } => {
            let ty = type_of_node(store, uri, *lhs, depth + 1)?;
            unwrap_optional(store, &ty, depth + 1)
        }
        NodeKind::UnwrapOptional { lhs } => {
            let ty = type_of_node(store, uri, *lhs, depth + 1)?;
            unwrap_optional(store, &ty, depth + 1)
        }
        NodeKind::Deref { lhs } => {
            let ty = type_of_node(store, uri, *lhs, depth + 1)?;
            unwrap_pointer(store, &ty, depth + 1)
        }
        NodeKind::Grouped { expr } => type_of_node(store, uri, *expr, depth + 1),
        NodeKind::If { then_expr, .. } => type_of_node(store, uri, *then_expr, depth + 1),
        NodeKind::ArrayAccess { lhs, .. } => {
            let ty = type_of_node(store, uri, *lhs, depth + 1)?;
            element_type(store, &ty, depth + 1)
        }
        NodeKind::BinOp { lhs, .. } => type_of_node(store, uri, *lhs, depth + 1),
        NodeKind::UnOp { operand } => type_of_node(store, uri, *operand, depth + 1),
        NodeKind::InitList { ty: Some(ty_node), .. } => {
            let ty = type_of_node(store, uri, *ty_node, depth + 1)?;
            Some(ty.instance())
        }
        _ => None,
    }
}

/// Declared type of a resolved declaration.
pub fn resolve_type_of_decl(store: &DocumentStore, decl: &Declaration) -> Option<TypeWithHandle> {
    type_of_decl(store, decl, 0)
}

fn type_of_decl(
    store: &DocumentStore,
    decl: &Declaration,
    depth: u32,
) -> Option<TypeWithHandle> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let uri = decl.uri();
    let ast = ast_of(store, uri)?;
    match decl {
        Declaration::AstNode { node, .. } => match &ast.node(*node).kind {
            NodeKind::VarDecl(v) => {
                if let Some(type_node) = v.type_node {
                    let ty = type_of_node(store, uri, type_node, depth + 1)?;
                    Some(ty.instance())
                } else {
                    type_of_node(store, uri, v.init_node?, depth + 1)
                }
            }
            NodeKind::ContainerField(field) => {
                let ty = type_of_node(store, uri, field.type_node?, depth + 1)?;
                Some(ty.instance())
            }
            NodeKind::FnDecl(..) => Some(TypeWithHandle::other(*node, uri, false)),
            _ => type_of_node(store, uri, *node, depth + 1),
        },
        Declaration::Param { fn_node, index, .. } => {
            let param = ast.fn_proto(*fn_node)?.params.get(*index)?;
            let ty = type_of_node(store, uri, param.type_node?, depth + 1)?;
            Some(ty.instance())
        }
        Declaration::PointerPayload { condition, .. } => {
            let ty = type_of_node(store, uri, *condition, depth + 1)?;
            unwrap_optional(store, &ty, depth + 1).or(Some(ty))
        }
        Declaration::ArrayPayload { sequence, .. } => {
            let ty = type_of_node(store, uri, *sequence, depth + 1)?;
            element_type(store, &ty, depth + 1)
        }
        Declaration::ArrayIndex { .. } => Some(TypeWithHandle::primitive("usize", false)),
        Declaration::SwitchPayload { operand, .. } => {
            let ty = type_of_node(store, uri, *operand, depth + 1)?;
            unwrap_error_union(store, &ty, depth + 1).or(Some(ty))
        }
        Declaration::Label { .. } => None,
    }
}

// ----------------------------------------------------------------------
// Aliases
// ----------------------------------------------------------------------

/// If `node` is a pure re-export (`const Foo = Bar;`,
/// `const Foo = @import("...").Bar;`), return the ultimate target.
///
/// Chains are followed to a bounded depth; cycles return `None`.
pub fn resolve_var_decl_alias(
    store: &DocumentStore,
    uri: &str,
    node: NodeIndex,
) -> Option<Declaration> {
    var_decl_alias(store, uri, node, 0)
}

fn var_decl_alias(
    store: &DocumentStore,
    uri: &str,
    node: NodeIndex,
    depth: u32,
) -> Option<Declaration> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let handle = store.get_handle(uri)?;
    let ast = &handle.tree;
    let var = ast.var_decl(node)?;
    if !var.is_const {
        return None;
    }
    let init = var.init_node?;
    let target = match &ast.node(init).kind {
        NodeKind::Identifier => {
            let tok = ast.node(init).main_token;
            lookup_symbol_global(handle, ast.token_text(tok), ast.token(tok).start)?
        }
        NodeKind::FieldAccess { .. } => field_access_decl_at(store, uri, init, depth)?,
        NodeKind::BuiltinCall { args } if ast.token_text(ast.node(init).main_token) == "@import" => {
            let &arg = args.first()?;
            if !matches!(ast.node(arg).kind, NodeKind::StringLiteral) {
                return None;
            }
            let import = ast.string_value(ast.node(arg).main_token);
            let target_uri = store.resolve_import_uri(uri, &import)?;
            let root = ast_of(store, &target_uri)?.root;
            return Some(Declaration::AstNode { uri: target_uri, node: root });
        }
        _ => return None,
    };
    // Keep following while the target is itself a re-export; a cycle
    // exhausts the depth limit and fails the whole chain.
    if let Declaration::AstNode { uri: target_uri, node: target_node } = &target {
        if alias_shaped(store, target_uri, *target_node) {
            return var_decl_alias(store, target_uri, *target_node, depth + 1);
        }
    }
    Some(target)
}

/// Whether a node is a `const` whose initializer is a pure re-export.
fn alias_shaped(store: &DocumentStore, uri: &str, node: NodeIndex) -> bool {
    let Some(ast) = ast_of(store, uri) else { return false };
    let Some(var) = ast.var_decl(node) else { return false };
    if !var.is_const {
        return false;
    }
    let Some(init) = var.init_node else { return false };
    match &ast.node(init).kind {
        NodeKind::Identifier | NodeKind::FieldAccess { .. } => true,
        NodeKind::BuiltinCall { .. } => ast.token_text(ast.node(init).main_token) == "@import",
        _ => false,
    }
}

/// Follow a declaration through alias re-exports; returns the input when it
/// is not an alias (or the chain cannot be resolved).
pub fn follow_alias(store: &DocumentStore, decl: &Declaration) -> Declaration {
    follow_alias_depth(store, decl, 0)
}

fn follow_alias_depth(store: &DocumentStore, decl: &Declaration, depth: u32) -> Declaration {
    if let Declaration::AstNode { uri, node } = decl {
        if alias_shaped(store, uri, *node) {
            if let Some(target) = var_decl_alias(store, uri, *node, depth) {
                return target;
            }
        }
    }
    decl.clone()
}

// ----------------------------------------------------------------------
// Unwrapping and member lookup
// ----------------------------------------------------------------------

fn unwrap_pointer(
    store: &DocumentStore,
    ty: &TypeWithHandle,
    depth: u32,
) -> Option<TypeWithHandle> {
    let TypeData::Pointer(node) = ty.data else { return None };
    let ast = ast_of(store, &ty.uri)?;
    match &ast.node(node).kind {
        NodeKind::PtrType(p) => {
            let child = type_of_node(store, &ty.uri, p.child, depth + 1)?;
            Some(child.instance())
        }
        NodeKind::AddressOf { operand } => type_of_node(store, &ty.uri, *operand, depth + 1),
        _ => None,
    }
}

fn unwrap_optional(
    store: &DocumentStore,
    ty: &TypeWithHandle,
    depth: u32,
) -> Option<TypeWithHandle> {
    let TypeData::Other(node) = ty.data else { return None };
    let ast = ast_of(store, &ty.uri)?;
    let NodeKind::OptionalType { child } = ast.node(node).kind else { return None };
    let child_ty = type_of_node(store, &ty.uri, child, depth + 1)?;
    Some(child_ty.instance())
}

fn unwrap_error_union(
    store: &DocumentStore,
    ty: &TypeWithHandle,
    depth: u32,
) -> Option<TypeWithHandle> {
    let TypeData::ErrorUnion(node) = ty.data else { return None };
    let ast = ast_of(store, &ty.uri)?;
    let NodeKind::ErrorUnionType { payload, .. } = ast.node(node).kind else { return None };
    let payload_ty = type_of_node(store, &ty.uri, payload, depth + 1)?;
    Some(payload_ty.instance())
}

/// Unwrap one `?` or `!` level, the way field access does at lookup time.
pub fn unwrap_one_level(store: &DocumentStore, ty: &TypeWithHandle) -> Option<TypeWithHandle> {
    unwrap_optional(store, ty, 0).or_else(|| unwrap_error_union(store, ty, 0))
}

/// The pointee type of a single pointer.
pub fn deref_type(store: &DocumentStore, ty: &TypeWithHandle) -> Option<TypeWithHandle> {
    unwrap_pointer(store, ty, 0)
}

/// Block and loop labels in scope at `offset`, innermost first.
pub fn scope_labels(handle: &Handle, offset: usize) -> Vec<Declaration> {
    let ast = &handle.tree;
    let mut labels = Vec::new();
    for &scope in scope_chain(ast, offset).iter().rev() {
        let label = match &ast.node(scope).kind {
            NodeKind::Block(block) => block.label,
            NodeKind::While { label, .. } | NodeKind::For { label, .. } => *label,
            _ => None,
        };
        if let Some(tok) = label {
            labels.push(Declaration::Label { uri: handle.uri.clone(), name_token: tok });
        }
    }
    labels
}

/// Pointer/optional auto-unwrap applied before member lookup.
fn auto_unwrap(store: &DocumentStore, ty: TypeWithHandle, depth: u32) -> TypeWithHandle {
    let ty = match unwrap_pointer(store, &ty, depth) {
        Some(inner) => inner,
        None => ty,
    };
    match unwrap_optional(store, &ty, depth) {
        Some(inner) => inner,
        None => ty,
    }
}

fn element_type(
    store: &DocumentStore,
    ty: &TypeWithHandle,
    depth: u32,
) -> Option<TypeWithHandle> {
    let ast = ast_of(store, &ty.uri)?;
    match ty.data {
        TypeData::Slice(node) => match &ast.node(node).kind {
            NodeKind::SliceType { child, .. } => {
                let child_ty = type_of_node(store, &ty.uri, *child, depth + 1)?;
                Some(child_ty.instance())
            }
            NodeKind::StringLiteral => Some(TypeWithHandle::primitive("u8", false)),
            _ => None,
        },
        TypeData::Other(node) => match &ast.node(node).kind {
            NodeKind::ArrayType { child, .. } => {
                let child_ty = type_of_node(store, &ty.uri, *child, depth + 1)?;
                Some(child_ty.instance())
            }
            _ => None,
        },
        _ => None,
    }
}

/// The container node a type's members live in, when it has one.
pub fn container_of(store: &DocumentStore, ty: &TypeWithHandle) -> Option<(String, NodeIndex)> {
    let TypeData::Other(node) = ty.data else { return None };
    let ast = ast_of(store, &ty.uri)?;
    match ast.node(node).kind {
        NodeKind::Root { .. } | NodeKind::ContainerDecl(_) => Some((ty.uri.clone(), node)),
        _ => None,
    }
}

/// Whether the container behind a type is an `enum`.
pub fn is_enum_container(store: &DocumentStore, ty: &TypeWithHandle) -> bool {
    let Some((uri, node)) = container_of(store, ty) else { return false };
    let Some(ast) = ast_of(store, &uri) else { return false };
    matches!(
        &ast.node(node).kind,
        NodeKind::ContainerDecl(c) if c.kind == ContainerKind::Enum
    )
}

fn member_decl(
    store: &DocumentStore,
    ty: &TypeWithHandle,
    name: &str,
    depth: u32,
) -> Option<Declaration> {
    let ty = auto_unwrap(store, ty.clone(), depth);
    let (uri, node) = container_of(store, &ty)?;
    lookup_symbol_container(store, &uri, node, name, !ty.is_type_val)
}

/// Resolve the declaration a `lhs.name` node refers to.
pub fn field_access_decl(
    store: &DocumentStore,
    uri: &str,
    node: NodeIndex,
) -> Option<Declaration> {
    field_access_decl_at(store, uri, node, 0)
}

fn field_access_decl_at(
    store: &DocumentStore,
    uri: &str,
    node: NodeIndex,
    depth: u32,
) -> Option<Declaration> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let ast = ast_of(store, uri)?;
    let NodeKind::FieldAccess { lhs, name_token } = ast.node(node).kind else { return None };
    let lhs_ty = type_of_node(store, uri, lhs, depth + 1)?;
    member_decl(store, &lhs_ty, ast.token_text(name_token), depth + 1)
}

/// Return type of a call through a function-typed value.
pub fn fn_return_type(store: &DocumentStore, ty: &TypeWithHandle) -> Option<TypeWithHandle> {
    return_type_depth(store, ty, 0)
}

fn return_type_depth(
    store: &DocumentStore,
    ty: &TypeWithHandle,
    depth: u32,
) -> Option<TypeWithHandle> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let TypeData::Other(node) = ty.data else { return None };
    let ast = ast_of(store, &ty.uri)?;
    let NodeKind::FnDecl(proto, body) = &ast.node(node).kind else { return None };
    let ret = proto.return_type?;
    let ret_ty = type_of_node(store, &ty.uri, ret, depth + 1)?;
    // A function returning `type` is a type constructor; its result is
    // whatever the body returns.
    if matches!(&ret_ty.data, TypeData::Primitive(name) if name == "type") {
        let body = (*body)?;
        let ret_expr = first_return_expr(ast, body)?;
        return type_of_node(store, &ty.uri, ret_expr, depth + 1);
    }
    Some(ret_ty.instance())
}

fn first_return_expr(ast: &Ast, node: NodeIndex) -> Option<NodeIndex> {
    if let NodeKind::Return { operand: Some(expr) } = ast.node(node).kind {
        return Some(expr);
    }
    let mut found = None;
    ast.visit_children(node, &mut |child| {
        if found.is_none() {
            found = first_return_expr(ast, child);
        }
    });
    found
}

// ----------------------------------------------------------------------
// Field-access chain folding (text based, for broken-at-cursor code)
// ----------------------------------------------------------------------

/// Tokenize `range` of the handle's text and left-fold `a.b.c...` into the
/// final declaration and type, unwrapping pointers/optionals at each hop and
/// continuing through aliases.
pub fn resolve_field_access(
    store: &DocumentStore,
    handle: &Handle,
    range: std::ops::Range<usize>,
) -> Option<FieldAccessResolution> {
    let source = &handle.tree.source;
    let slice = source.get(range.clone())?;
    let tokens: Vec<_> = tokenize(slice)
        .into_iter()
        .filter(|t| !t.tag.is_comment() && t.tag != TokenTag::Eof)
        .collect();

    let mut iter = tokens.iter().peekable();
    let first = iter.next()?;
    if first.tag != TokenTag::Identifier {
        return None;
    }
    let first_name = &slice[first.start..first.end];
    let mut decl = lookup_symbol_global(handle, first_name, range.start + first.start)?;
    // Type as of the last completed step; recomputed from `decl` when a
    // named step follows.
    let mut current: Option<TypeWithHandle> = None;

    while let Some(token) = iter.next() {
        match token.tag {
            TokenTag::Period => {
                let Some(next) = iter.peek() else { break };
                if next.tag == TokenTag::Question {
                    // `.?` optional unwrap
                    iter.next();
                    let base = match current.take() {
                        Some(ty) => ty,
                        None => type_of_decl(store, &follow_alias(store, &decl), 0)?,
                    };
                    current = Some(unwrap_optional(store, &base, 0)?);
                    continue;
                }
                if next.tag != TokenTag::Identifier {
                    break;
                }
                let name_tok = iter.next()?;
                let name = &slice[name_tok.start..name_tok.end];
                let base = match current.take() {
                    Some(ty) => ty,
                    None => {
                        let followed = follow_alias(store, &decl);
                        type_of_decl(store, &followed, 0)?
                    }
                };
                let base = auto_unwrap(store, base, 0);
                let (uri, container) = container_of(store, &base)?;
                decl = lookup_symbol_container(store, &uri, container, name, !base.is_type_val)?;
            }
            TokenTag::LParen => {
                skip_balanced(&mut iter, TokenTag::LParen, TokenTag::RParen);
                let base = match current.take() {
                    Some(ty) => ty,
                    None => {
                        let followed = follow_alias(store, &decl);
                        type_of_decl(store, &followed, 0)?
                    }
                };
                current = Some(return_type_depth(store, &base, 0)?);
            }
            TokenTag::LBracket => {
                skip_balanced(&mut iter, TokenTag::LBracket, TokenTag::RBracket);
                let base = match current.take() {
                    Some(ty) => ty,
                    None => type_of_decl(store, &follow_alias(store, &decl), 0)?,
                };
                current = Some(element_type(store, &base, 0)?);
            }
            TokenTag::PeriodAsterisk => {
                let base = match current.take() {
                    Some(ty) => ty,
                    None => type_of_decl(store, &follow_alias(store, &decl), 0)?,
                };
                current = Some(unwrap_pointer(store, &base, 0)?);
            }
            TokenTag::Question => {
                let base = match current.take() {
                    Some(ty) => ty,
                    None => type_of_decl(store, &follow_alias(store, &decl), 0)?,
                };
                current = Some(unwrap_optional(store, &base, 0)?);
            }
            _ => break,
        }
    }

    let ty = match current {
        Some(ty) => Some(ty),
        None => type_of_decl(store, &follow_alias(store, &decl), 0),
    };
    let ty = ty.map(|original| {
        let unwrapped = unwrap_one_level(store, &original);
        FieldAccessReturn { original, unwrapped }
    });
    Some(FieldAccessResolution { decl, ty })
}

fn skip_balanced<'a>(
    iter: &mut std::iter::Peekable<impl Iterator<Item = &'a zls_syntax::Token>>,
    open: TokenTag,
    close: TokenTag,
) {
    let mut depth = 1usize;
    for token in iter.by_ref() {
        if token.tag == open {
            depth += 1;
        } else if token.tag == close {
            depth -= 1;
            if depth == 0 {
                return;
            }
        }
    }
}

// ----------------------------------------------------------------------
// Doc comments
// ----------------------------------------------------------------------

/// The doc comment attached to a declaration node, markers stripped.
pub fn collect_doc_comments(ast: &Ast, node: NodeIndex) -> Option<String> {
    let first = ast.node(node).first_token;
    let run = ast.doc_comment_run(first)?;
    Some(ast.render_doc_comments(run))
}

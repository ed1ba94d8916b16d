//! Symbol lookup, type resolution, and reference search for the Zig
//! language server.
//!
//! Everything here reads the document store without mutating it: import
//! targets were loaded when their importers were parsed, so a lookup that
//! walks an import either finds a live handle or gives up with `None`.
//!
//! The tagged types ([`Declaration`], [`TypeData`]) are consumed by
//! exhaustive matches throughout; adding a variant surfaces every site that
//! needs teaching as a compile error.

#![deny(unsafe_code)]

mod position_context;
mod references;
mod resolve;

pub use position_context::{identifier_range_at, position_context, PositionContext};
pub use references::{label_references, rename_symbol, symbol_references};
pub use resolve::{
    collect_doc_comments, container_of, deref_type, field_access_decl, fn_return_type,
    follow_alias, is_enum_container, lookup_label, lookup_symbol_container, lookup_symbol_global,
    resolve_field_access, resolve_type_of_decl, resolve_type_of_node, resolve_var_decl_alias,
    scope_declarations, scope_labels, unwrap_one_level, FieldAccessResolution,
};

use zls_document_store::{DocumentStore, Handle};
use zls_syntax::{Ast, NodeIndex, TokenIndex};

/// Maximum alias-chain / type-resolution recursion depth.
pub const MAX_RESOLVE_DEPTH: u32 = 32;

/// A resolved symbol.
///
/// Equality is handle URI + variant + anchor indices, which is exactly the
/// identity reference search compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// A top-level or container-member declaration node.
    AstNode { uri: String, node: NodeIndex },
    /// A function parameter.
    Param { uri: String, fn_node: NodeIndex, index: usize },
    /// `|x|` binding of an `if`/`while`/`catch` unwrap.
    PointerPayload { uri: String, name_token: TokenIndex, condition: NodeIndex },
    /// First `|x|` binding of a `for` loop.
    ArrayPayload { uri: String, name_token: TokenIndex, sequence: NodeIndex },
    /// Second (index) binding of a `for` loop.
    ArrayIndex { uri: String, name_token: TokenIndex },
    /// `|x|` binding of a `switch` prong.
    SwitchPayload { uri: String, name_token: TokenIndex, operand: NodeIndex },
    /// A named block label.
    Label { uri: String, name_token: TokenIndex },
}

impl Declaration {
    /// URI of the handle the declaration lives in.
    pub fn uri(&self) -> &str {
        match self {
            Declaration::AstNode { uri, .. }
            | Declaration::Param { uri, .. }
            | Declaration::PointerPayload { uri, .. }
            | Declaration::ArrayPayload { uri, .. }
            | Declaration::ArrayIndex { uri, .. }
            | Declaration::SwitchPayload { uri, .. }
            | Declaration::Label { uri, .. } => uri,
        }
    }

    /// The declaration's name token in its own tree.
    pub fn name_token(&self, ast: &Ast) -> Option<TokenIndex> {
        match self {
            Declaration::AstNode { node, .. } => ast.decl_name_token(*node),
            Declaration::Param { fn_node, index, .. } => {
                ast.fn_proto(*fn_node)?.params.get(*index)?.name_token
            }
            Declaration::PointerPayload { name_token, .. }
            | Declaration::ArrayPayload { name_token, .. }
            | Declaration::ArrayIndex { name_token, .. }
            | Declaration::SwitchPayload { name_token, .. }
            | Declaration::Label { name_token, .. } => Some(*name_token),
        }
    }

    /// The handle this declaration lives in.
    pub fn handle<'a>(&self, store: &'a DocumentStore) -> Option<&'a Handle> {
        store.get_handle(self.uri())
    }
}

/// What a resolved type is, structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeData {
    /// A slice (or a string literal, which is a slice of bytes).
    Slice(NodeIndex),
    /// An error union; the node is the `ErrorUnionType` (or `try`d operand).
    ErrorUnion(NodeIndex),
    /// A single pointer; the node is the `PtrType` or `&x` expression.
    Pointer(NodeIndex),
    /// Any other type-carrying node (container, optional, array, fn, ...).
    Other(NodeIndex),
    /// A primitive by name (`i32`, `bool`, `type`, ...).
    Primitive(String),
}

/// A resolved type plus the handle its node lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeWithHandle {
    pub data: TypeData,
    /// URI of the handle `data`'s node belongs to.
    pub uri: String,
    /// Whether the value *is* a type (so members are looked up on the type
    /// itself rather than on an instance).
    pub is_type_val: bool,
}

impl TypeWithHandle {
    pub fn other(node: NodeIndex, uri: impl Into<String>, is_type_val: bool) -> Self {
        Self { data: TypeData::Other(node), uri: uri.into(), is_type_val }
    }

    pub fn primitive(name: impl Into<String>, is_type_val: bool) -> Self {
        Self { data: TypeData::Primitive(name.into()), uri: String::new(), is_type_val }
    }

    /// The same type as an instance rather than a type value.
    pub fn instance(mut self) -> Self {
        self.is_type_val = false;
        self
    }
}

/// Result of resolving a field-access chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessReturn {
    /// The declared type of the chain.
    pub original: TypeWithHandle,
    /// The type after unwrapping one pointer/optional/error-union level,
    /// when that applies.
    pub unwrapped: Option<TypeWithHandle>,
}

/// Primitive type and value names recognized without declaration lookup.
pub fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "void"
            | "bool"
            | "type"
            | "anyerror"
            | "anyopaque"
            | "noreturn"
            | "usize"
            | "isize"
            | "comptime_int"
            | "comptime_float"
            | "c_int"
            | "c_uint"
            | "c_long"
            | "c_ulong"
            | "c_char"
    ) || is_int_primitive(name)
        || matches!(name, "f16" | "f32" | "f64" | "f80" | "f128")
}

fn is_int_primitive(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('i') | Some('u'))
        && !name[1..].is_empty()
        && name[1..].chars().all(|c| c.is_ascii_digit())
}

//! Syntax tree: a flat node arena over the token array.
//!
//! Nodes are addressed by [`NodeIndex`] and carry their child indices in the
//! variant payload, so declarations have stable anchors (`main_token`) that
//! survive as identity for cross-file symbol comparison. The tree owns a copy
//! of the source it was parsed from; every stored byte offset is valid for
//! exactly that text.

use crate::token::{Token, TokenIndex, TokenTag};
use crate::tokenizer::string_literal_value;

/// Index of a node in an [`Ast`]'s node arena.
pub type NodeIndex = u32;

/// Container flavor of a [`NodeKind::ContainerDecl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Struct,
    Enum,
    Union,
    Opaque,
}

/// A `const`/`var` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name_token: TokenIndex,
    pub type_node: Option<NodeIndex>,
    pub init_node: Option<NodeIndex>,
    pub is_pub: bool,
    pub is_const: bool,
}

/// One function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name_token: Option<TokenIndex>,
    pub type_node: Option<NodeIndex>,
    pub is_comptime: bool,
    pub is_anytype: bool,
}

/// A function prototype (name, parameters, return type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnProto {
    pub fn_token: TokenIndex,
    pub name_token: Option<TokenIndex>,
    pub params: Vec<Param>,
    pub return_type: Option<NodeIndex>,
    pub is_pub: bool,
}

/// A `struct`/`enum`/`union`/`opaque` declaration body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDecl {
    pub kind: ContainerKind,
    pub members: Vec<NodeIndex>,
}

/// A container field (`name: T = default,`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerField {
    pub name_token: TokenIndex,
    pub type_node: Option<NodeIndex>,
    pub value_node: Option<NodeIndex>,
}

/// A pointer type (`*T`, `*const T`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtrType {
    pub is_const: bool,
    pub child: NodeIndex,
}

/// A block (`{ ... }`), optionally labeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub label: Option<TokenIndex>,
    pub statements: Vec<NodeIndex>,
}

/// A capture payload (`|x|` / `|*x|`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub name_token: TokenIndex,
    pub is_pointer: bool,
}

/// One `switch` prong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchProng {
    pub items: Vec<NodeIndex>,
    pub is_else: bool,
    pub payload: Option<Payload>,
    pub body: NodeIndex,
}

/// Node kinds with their child indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// File root; behaves as an implicit `struct` container.
    Root { members: Vec<NodeIndex> },
    VarDecl(VarDecl),
    /// Prototype plus optional body block (`None` for fn types and externs).
    FnDecl(FnProto, Option<NodeIndex>),
    ContainerDecl(ContainerDecl),
    ContainerField(ContainerField),
    /// `error{A, B}`; payload is the name tokens.
    ErrorSetDecl(Vec<TokenIndex>),
    /// `error.Name`; `main_token` is the name token.
    ErrorValue,
    TestDecl { name_token: Option<TokenIndex>, body: Option<NodeIndex> },
    Block(Block),
    /// `main_token` is the identifier token.
    Identifier,
    /// `.name`; `main_token` is the name token.
    EnumLiteral,
    FieldAccess { lhs: NodeIndex, name_token: TokenIndex },
    /// `x.*`
    Deref { lhs: NodeIndex },
    /// `x.?`
    UnwrapOptional { lhs: NodeIndex },
    Call { callee: NodeIndex, args: Vec<NodeIndex> },
    /// `@name(args)`; `main_token` is the builtin token.
    BuiltinCall { args: Vec<NodeIndex> },
    StringLiteral,
    CharLiteral,
    NumberLiteral,
    BoolLiteral,
    NullLiteral,
    UndefinedLiteral,
    UnreachableLiteral,
    PtrType(PtrType),
    SliceType { is_const: bool, child: NodeIndex },
    ArrayType { len: NodeIndex, child: NodeIndex },
    OptionalType { child: NodeIndex },
    /// `E!T` (or `!T` with an inferred set in return position).
    ErrorUnionType { error_set: Option<NodeIndex>, payload: NodeIndex },
    /// `&x`
    AddressOf { operand: NodeIndex },
    Try { operand: NodeIndex },
    Catch { lhs: NodeIndex, payload: Option<Payload>, rhs: NodeIndex },
    Orelse { lhs: NodeIndex, rhs: NodeIndex },
    Return { operand: Option<NodeIndex> },
    Break { label: Option<TokenIndex>, operand: Option<NodeIndex> },
    Continue { label: Option<TokenIndex> },
    Defer { operand: NodeIndex },
    If {
        condition: NodeIndex,
        payload: Option<Payload>,
        then_expr: NodeIndex,
        else_expr: Option<NodeIndex>,
    },
    While {
        label: Option<TokenIndex>,
        condition: NodeIndex,
        payload: Option<Payload>,
        body: NodeIndex,
    },
    For {
        label: Option<TokenIndex>,
        sequence: NodeIndex,
        payloads: Vec<Payload>,
        body: NodeIndex,
    },
    Switch { operand: NodeIndex, prongs: Vec<SwitchProng> },
    /// Binary operator; `main_token` is the operator.
    BinOp { lhs: NodeIndex, rhs: NodeIndex },
    /// Prefix `!x` or `-x`; `main_token` is the operator.
    UnOp { operand: NodeIndex },
    Grouped { expr: NodeIndex },
    ArrayAccess { lhs: NodeIndex, index: NodeIndex },
    /// `T{ ... }` or `.{ ... }`; entries are field values / elements.
    InitList { ty: Option<NodeIndex>, entries: Vec<NodeIndex> },
    /// Assignment statement (`lhs = rhs`); `main_token` is the `=`.
    Assign { lhs: NodeIndex, rhs: NodeIndex },
}

/// One node: kind, anchor token, and covered token span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Anchor token (name for declarations, operator for operators).
    pub main_token: TokenIndex,
    pub first_token: TokenIndex,
    pub last_token: TokenIndex,
}

/// A recoverable parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The offending token.
    pub token: TokenIndex,
    /// What the parser expected at that point.
    pub expected: &'static str,
}

/// The parsed tree: owned source, token array, node arena, root members,
/// recoverable errors.
#[derive(Debug, Clone)]
pub struct Ast {
    pub source: String,
    pub tokens: Vec<Token>,
    pub nodes: Vec<Node>,
    pub root: NodeIndex,
    pub errors: Vec<ParseError>,
}

impl Ast {
    /// Parse `source`; never fails, errors are collected on the tree.
    pub fn parse(source: &str) -> Ast {
        crate::parser::parse(source)
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index as usize]
    }

    pub fn token(&self, index: TokenIndex) -> Token {
        self.tokens[index as usize]
    }

    pub fn token_tag(&self, index: TokenIndex) -> TokenTag {
        self.tokens[index as usize].tag
    }

    /// Source text covered by a token.
    pub fn token_text(&self, index: TokenIndex) -> &str {
        let tok = self.tokens[index as usize];
        &self.source[tok.start..tok.end]
    }

    /// Top-level declaration node indices, in source order.
    pub fn root_decls(&self) -> &[NodeIndex] {
        match &self.node(self.root).kind {
            NodeKind::Root { members } => members,
            _ => &[],
        }
    }

    /// Byte range covered by a node.
    pub fn node_range(&self, index: NodeIndex) -> (usize, usize) {
        let node = self.node(index);
        let first = self.token(node.first_token);
        let last = self.token(node.last_token);
        (first.start, last.end.max(first.start))
    }

    /// The name token of a declaration-like node, if it has one.
    pub fn decl_name_token(&self, index: NodeIndex) -> Option<TokenIndex> {
        match &self.node(index).kind {
            NodeKind::VarDecl(v) => Some(v.name_token),
            NodeKind::FnDecl(proto, _) => proto.name_token,
            NodeKind::ContainerField(f) => Some(f.name_token),
            NodeKind::TestDecl { name_token, .. } => *name_token,
            _ => None,
        }
    }

    /// Structured view: function prototype.
    pub fn fn_proto(&self, index: NodeIndex) -> Option<&FnProto> {
        match &self.node(index).kind {
            NodeKind::FnDecl(proto, _) => Some(proto),
            _ => None,
        }
    }

    /// Structured view: variable declaration.
    pub fn var_decl(&self, index: NodeIndex) -> Option<&VarDecl> {
        match &self.node(index).kind {
            NodeKind::VarDecl(v) => Some(v),
            _ => None,
        }
    }

    /// Structured view: container field.
    pub fn container_field(&self, index: NodeIndex) -> Option<&ContainerField> {
        match &self.node(index).kind {
            NodeKind::ContainerField(f) => Some(f),
            _ => None,
        }
    }

    /// Structured view: pointer type.
    pub fn ptr_type(&self, index: NodeIndex) -> Option<PtrType> {
        match self.node(index).kind {
            NodeKind::PtrType(p) => Some(p),
            _ => None,
        }
    }

    /// Container members of a node, treating the file root as a container.
    pub fn container_members(&self, index: NodeIndex) -> Option<&[NodeIndex]> {
        match &self.node(index).kind {
            NodeKind::Root { members } => Some(members),
            NodeKind::ContainerDecl(c) => Some(&c.members),
            _ => None,
        }
    }

    /// The token whose byte range contains `offset` (comments included).
    pub fn token_at_offset(&self, offset: usize) -> Option<TokenIndex> {
        let idx = self
            .tokens
            .partition_point(|t| t.end <= offset || (t.is_empty() && t.start <= offset));
        let tok = self.tokens.get(idx)?;
        if tok.tag != TokenTag::Eof && tok.start <= offset {
            Some(idx as TokenIndex)
        } else {
            None
        }
    }

    /// The run of `///` doc-comment tokens immediately preceding `token`.
    ///
    /// Returns the token range of the run; any other token terminates it.
    pub fn doc_comment_run(&self, token: TokenIndex) -> Option<std::ops::Range<TokenIndex>> {
        let mut first = token;
        while first > 0 && self.token_tag(first - 1) == TokenTag::DocComment {
            first -= 1;
        }
        if first == token {
            None
        } else {
            Some(first..token)
        }
    }

    /// Render one doc-comment run as text, markers stripped.
    pub fn render_doc_comments(&self, run: std::ops::Range<TokenIndex>) -> String {
        let mut out = String::new();
        for tok in run {
            let line = self.token_text(tok);
            let line = line.strip_prefix("///").unwrap_or(line);
            let line = line.strip_prefix(' ').unwrap_or(line);
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    /// Decoded value of a string-literal token.
    pub fn string_value(&self, token: TokenIndex) -> String {
        string_literal_value(self.token_text(token))
    }

    /// Import strings referenced by this file, in lexical order.
    pub fn import_strings(&self) -> Vec<String> {
        let mut imports: Vec<(usize, String)> = Vec::new();
        for node in &self.nodes {
            if let NodeKind::BuiltinCall { args } = &node.kind {
                if self.token_text(node.main_token) == "@import" {
                    if let Some(&arg) = args.first() {
                        if matches!(self.node(arg).kind, NodeKind::StringLiteral) {
                            let tok = self.node(arg).main_token;
                            imports
                                .push((self.token(tok).start, self.string_value(tok)));
                        }
                    }
                }
            }
        }
        imports.sort_by_key(|(start, _)| *start);
        imports.into_iter().map(|(_, s)| s).collect()
    }

    /// Render a parse error as a human-readable diagnostic message.
    pub fn render_parse_error(&self, err: &ParseError) -> String {
        let found = self.token_tag(err.token).symbol();
        format!("expected {}, found {}", err.expected, found)
    }

    /// Invoke `f` for every direct child node of `index`.
    ///
    /// Exhaustive over [`NodeKind`] so a new variant shows up here as a
    /// compile error rather than a silently unvisited subtree.
    pub fn visit_children(&self, index: NodeIndex, f: &mut impl FnMut(NodeIndex)) {
        match &self.node(index).kind {
            NodeKind::Root { members } => members.iter().copied().for_each(f),
            NodeKind::VarDecl(v) => {
                v.type_node.into_iter().for_each(&mut *f);
                v.init_node.into_iter().for_each(f);
            }
            NodeKind::FnDecl(proto, body) => {
                for param in &proto.params {
                    param.type_node.into_iter().for_each(&mut *f);
                }
                proto.return_type.into_iter().for_each(&mut *f);
                body.into_iter().copied().for_each(f);
            }
            NodeKind::ContainerDecl(c) => c.members.iter().copied().for_each(f),
            NodeKind::ContainerField(field) => {
                field.type_node.into_iter().for_each(&mut *f);
                field.value_node.into_iter().for_each(f);
            }
            NodeKind::ErrorSetDecl(_)
            | NodeKind::ErrorValue
            | NodeKind::Identifier
            | NodeKind::EnumLiteral
            | NodeKind::StringLiteral
            | NodeKind::CharLiteral
            | NodeKind::NumberLiteral
            | NodeKind::BoolLiteral
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral
            | NodeKind::UnreachableLiteral
            | NodeKind::Continue { .. } => {}
            NodeKind::TestDecl { body, .. } => body.into_iter().copied().for_each(f),
            NodeKind::Block(block) => block.statements.iter().copied().for_each(f),
            NodeKind::FieldAccess { lhs, .. }
            | NodeKind::Deref { lhs }
            | NodeKind::UnwrapOptional { lhs } => f(*lhs),
            NodeKind::Call { callee, args } => {
                f(*callee);
                args.iter().copied().for_each(f);
            }
            NodeKind::BuiltinCall { args } => args.iter().copied().for_each(f),
            NodeKind::PtrType(p) => f(p.child),
            NodeKind::SliceType { child, .. } | NodeKind::OptionalType { child } => f(*child),
            NodeKind::ArrayType { len, child } => {
                f(*len);
                f(*child);
            }
            NodeKind::ErrorUnionType { error_set, payload } => {
                error_set.into_iter().copied().for_each(&mut *f);
                f(*payload);
            }
            NodeKind::AddressOf { operand }
            | NodeKind::Try { operand }
            | NodeKind::Defer { operand }
            | NodeKind::UnOp { operand } => f(*operand),
            NodeKind::Catch { lhs, rhs, .. } | NodeKind::Orelse { lhs, rhs } => {
                f(*lhs);
                f(*rhs);
            }
            NodeKind::Return { operand } => operand.into_iter().copied().for_each(f),
            NodeKind::Break { operand, .. } => operand.into_iter().copied().for_each(f),
            NodeKind::If { condition, then_expr, else_expr, .. } => {
                f(*condition);
                f(*then_expr);
                else_expr.into_iter().copied().for_each(f);
            }
            NodeKind::While { condition, body, .. } => {
                f(*condition);
                f(*body);
            }
            NodeKind::For { sequence, body, .. } => {
                f(*sequence);
                f(*body);
            }
            NodeKind::Switch { operand, prongs } => {
                f(*operand);
                for prong in prongs {
                    prong.items.iter().copied().for_each(&mut *f);
                    f(prong.body);
                }
            }
            NodeKind::BinOp { lhs, rhs } | NodeKind::Assign { lhs, rhs } => {
                f(*lhs);
                f(*rhs);
            }
            NodeKind::Grouped { expr } => f(*expr),
            NodeKind::ArrayAccess { lhs, index: idx } => {
                f(*lhs);
                f(*idx);
            }
            NodeKind::InitList { ty, entries } => {
                ty.into_iter().copied().for_each(&mut *f);
                entries.iter().copied().for_each(f);
            }
        }
    }

    /// The innermost node containing `offset`, starting from `index`.
    pub fn innermost_at(&self, index: NodeIndex, offset: usize) -> NodeIndex {
        let mut best = index;
        let mut found = true;
        while found {
            found = false;
            let current = best;
            self.visit_children(current, &mut |child| {
                let (start, end) = self.node_range(child);
                if !found && start <= offset && offset <= end {
                    best = child;
                    found = true;
                }
            });
            if best == current {
                break;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn token_at_offset_finds_identifier() {
        let ast = Ast::parse("const abc = 1;");
        let tok = ast.token_at_offset(7).unwrap();
        assert_eq!(ast.token_text(tok), "abc");
        let tok = ast.token_at_offset(0).unwrap();
        assert_eq!(ast.token_text(tok), "const");
    }

    #[test]
    fn token_at_offset_past_end_is_none() {
        let ast = Ast::parse("x");
        assert_eq!(ast.token_at_offset(10), None);
    }

    #[test]
    fn doc_comment_run_collects_contiguous_lines() {
        let ast = Ast::parse("/// one\n/// two\nconst x = 1;");
        let decl = ast.root_decls()[0];
        let name = ast.decl_name_token(decl).unwrap();
        let first = ast.node(decl).first_token;
        let run = ast.doc_comment_run(first).unwrap();
        assert_eq!(ast.render_doc_comments(run), "one\ntwo");
        assert_eq!(ast.token_text(name), "x");
    }

    #[test]
    fn line_comment_breaks_doc_run() {
        let ast = Ast::parse("/// doc\n// gap\nconst x = 1;");
        let first = ast.node(ast.root_decls()[0]).first_token;
        assert_eq!(ast.doc_comment_run(first), None);
    }

    #[test]
    fn import_strings_in_lexical_order() {
        let ast = Ast::parse(
            "const b = @import(\"b.zig\");\nconst a = @import(\"a.zig\");\n",
        );
        assert_eq!(ast.import_strings(), vec!["b.zig".to_string(), "a.zig".to_string()]);
    }
}

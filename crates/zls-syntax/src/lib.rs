//! Tokenizer, error-tolerant parser, and syntax tree for the Zig language
//! server.
//!
//! The tree is deliberately flat: a token array plus a node arena addressed
//! by [`NodeIndex`], with structured views ([`FnProto`], [`VarDecl`],
//! [`ContainerField`], [`PtrType`]) for the handful of shapes the semantic
//! analysis inspects. Parsing never fails; broken input yields a best-effort
//! tree plus [`ParseError`] records, one per broken declaration.
//!
//! # Example
//!
//! ```
//! use zls_syntax::Ast;
//!
//! let ast = Ast::parse("fn add(a: i32, b: i32) i32 { return a + b; }");
//! assert!(ast.errors.is_empty());
//! let proto = ast.fn_proto(ast.root_decls()[0]).unwrap();
//! assert_eq!(ast.token_text(proto.name_token.unwrap()), "add");
//! ```

#![deny(unsafe_code)]

mod ast;
mod parser;
mod token;
mod tokenizer;

pub use ast::{
    Ast, Block, ContainerDecl, ContainerField, ContainerKind, FnProto, Node, NodeIndex, NodeKind,
    Param, ParseError, Payload, PtrType, SwitchProng, VarDecl,
};
pub use token::{keyword_tag, Token, TokenIndex, TokenTag};
pub use tokenizer::{string_literal_value, tokenize};

//! JSON-RPC/LSP protocol types and capability configuration for the Zig
//! language server.

#![deny(unsafe_code)]

mod capabilities;
mod jsonrpc;

pub use capabilities::{
    semantic_tokens_legend, server_capabilities, TOKEN_MODIFIERS, TOKEN_TYPES,
};
pub use jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND,
};

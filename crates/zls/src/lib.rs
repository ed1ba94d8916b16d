//! Zig language server.
//!
//! The crate is organized the way the server runs:
//!
//! - [`transport`]: Content-Length framing over stdio
//! - [`server`]: state, dispatch, and the serial request loop
//! - [`handlers`]: one module per LSP feature
//! - [`config`]: `zls.json` discovery and defaults
//!
//! [`server::Server::handle_request`] is the seam integration tests drive
//! directly, bypassing the transport.

#![deny(unsafe_code)]

pub mod config;
mod handlers;
pub mod server;
pub mod transport;

pub use server::Server;
pub use zls_protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Run the language server over stdio until shutdown.
pub fn run_stdio() -> anyhow::Result<()> {
    let config = config::Config::load();
    let mut server = Server::new(config);
    server.run()?;
    Ok(())
}

//! Zig language server binary.
//!
//! Usage:
//!   zls [--debug-log]
//!
//! The server speaks LSP over stdio; stderr carries the log.

use std::process;

use zls::config::Config;
use zls::server::Server;

fn main() {
    let mut debug_log = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--debug-log" => debug_log = true,
            other => {
                eprintln!("unknown argument: {other}");
                eprintln!("usage: zls [--debug-log]");
                process::exit(1);
            }
        }
    }

    let config = Config::load();
    let mut server = Server::new(config).with_debug_log(debug_log);
    if let Err(err) = server.run() {
        eprintln!("[zls] fatal: {err}");
        process::exit(1);
    }
}

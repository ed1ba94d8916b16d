//! Document handles, the refcounted import graph, and build-file discovery
//! for the Zig language server.
//!
//! The [`DocumentStore`] owns one [`Handle`] per open or transitively
//! imported file. Opening, editing, and closing documents flows through the
//! store so the import DAG's reference counts stay consistent; build files
//! (`build.zig`) are discovered by ancestor-directory probing and queried
//! through the toolchain's describe-build step.

#![deny(unsafe_code)]

mod build_file;
mod document;
mod store;

pub use build_file::{package_table, parse_describe_output, BuildError, BuildFile, PackageDecl};
pub use document::Document;
pub use store::{DocumentStore, Handle, ToolchainEnv};

//! Build-file (`build.zig`) package tables.
//!
//! A build file's package table is produced by the toolchain: the configured
//! build runner is executed against the build script and prints a JSON array
//! of `{name, path}` package declarations. The table seeds package-name
//! import resolution for every source handle below the build file's
//! directory.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use zls_uri::path_to_uri;

/// One package declaration from the describe-build output.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDecl {
    pub name: String,
    pub path: PathBuf,
}

/// A discovered `build.zig` with its package table.
#[derive(Debug, Clone, Default)]
pub struct BuildFile {
    pub uri: String,
    /// Package name → root source file URI.
    pub packages: FxHashMap<String, String>,
}

/// Failure to run or parse the describe-build step.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to run the build runner: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("build runner exited with status {0}")]
    Failed(std::process::ExitStatus),
    #[error("unreadable describe-build output: {0}")]
    BadOutput(#[from] serde_json::Error),
}

impl BuildFile {
    pub fn new(uri: String) -> Self {
        Self { uri, packages: FxHashMap::default() }
    }

    /// Re-run the toolchain's describe step and replace the package table.
    pub fn regenerate(
        &mut self,
        zig_exe: &Path,
        build_runner: Option<&Path>,
        build_file_path: &Path,
    ) -> Result<(), BuildError> {
        let mut cmd = Command::new(zig_exe);
        match build_runner {
            Some(runner) => {
                cmd.arg("run").arg(runner).arg("--").arg(build_file_path);
            }
            None => {
                cmd.arg("build-describe").arg(build_file_path);
            }
        }
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(BuildError::Failed(output.status));
        }
        let decls: Vec<PackageDecl> = serde_json::from_slice(&output.stdout)?;
        self.packages = package_table(&decls);
        Ok(())
    }
}

/// Convert describe-build declarations to a name → URI table.
pub fn package_table(decls: &[PackageDecl]) -> FxHashMap<String, String> {
    decls
        .iter()
        .map(|decl| (decl.name.clone(), path_to_uri(&decl.path)))
        .collect()
}

/// Parse raw describe-build JSON into a package table.
pub fn parse_describe_output(json: &[u8]) -> Result<FxHashMap<String, String>, BuildError> {
    let decls: Vec<PackageDecl> = serde_json::from_slice(json)?;
    Ok(package_table(&decls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_describe_output() {
        let json = br#"[
            {"name": "pkg", "path": "/proj/src/pkg.zig"},
            {"name": "other", "path": "/proj/dep/other.zig"}
        ]"#;
        let table = parse_describe_output(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["pkg"], "file:///proj/src/pkg.zig");
        assert_eq!(table["other"], "file:///proj/dep/other.zig");
    }

    #[test]
    fn rejects_malformed_output() {
        assert!(parse_describe_output(b"not json").is_err());
    }
}

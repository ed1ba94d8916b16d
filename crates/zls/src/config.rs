//! `zls.json` configuration.
//!
//! The file is searched in the platform's local config directory first,
//! then next to the server executable. A missing file means defaults; an
//! unreadable file is reported on stderr and also means defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Toolchain binary (absolute path preferred; `PATH` otherwise).
    pub zig_exe_path: Option<PathBuf>,
    /// Standard library root.
    pub zig_lib_path: Option<PathBuf>,
    /// Script used to extract build information.
    pub build_runner_path: Option<PathBuf>,
    pub warn_style: bool,
    pub enable_semantic_tokens: bool,
    pub enable_snippets: bool,
    pub operator_completions: bool,
    pub skip_std_references: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zig_exe_path: None,
            zig_lib_path: None,
            build_runner_path: None,
            warn_style: false,
            enable_semantic_tokens: true,
            enable_snippets: false,
            operator_completions: true,
            skip_std_references: false,
        }
    }
}

impl Config {
    /// Load `zls.json` from the standard locations.
    pub fn load() -> Config {
        let mut candidates = Vec::new();
        if let Some(dir) = dirs::config_local_dir() {
            candidates.push(dir.join("zls.json"));
        }
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("zls.json"));
            }
        }
        for path in candidates {
            match Config::load_from(&path) {
                Some(Ok(config)) => return config.resolved(),
                Some(Err(err)) => {
                    eprintln!("[zls] unreadable config {}: {err}", path.display());
                }
                None => {}
            }
        }
        Config::default().resolved()
    }

    fn load_from(path: &Path) -> Option<Result<Config, serde_json::Error>> {
        let contents = std::fs::read_to_string(path).ok()?;
        Some(serde_json::from_str(&contents))
    }

    /// Fill in the toolchain binary from `PATH` when the configured path is
    /// missing or not absolute.
    fn resolved(mut self) -> Config {
        let needs_search = match &self.zig_exe_path {
            None => true,
            Some(path) => !path.is_absolute(),
        };
        if needs_search {
            if let Some(found) = find_in_path("zig") {
                self.zig_exe_path = Some(found);
            }
        }
        self
    }
}

/// Search the `PATH` environment variable for an executable.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!(!config.warn_style);
        assert!(config.enable_semantic_tokens);
        assert!(!config.enable_snippets);
        assert!(config.operator_completions);
        assert!(!config.skip_std_references);
        assert_eq!(config.zig_exe_path, None);
    }

    #[test]
    fn partial_config_files_fill_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"warn_style": true, "zig_lib_path": "/opt/zig/lib"}"#)
                .unwrap();
        assert!(config.warn_style);
        assert_eq!(config.zig_lib_path, Some(PathBuf::from("/opt/zig/lib")));
        assert!(config.enable_semantic_tokens);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let config: Config = serde_json::from_str(r#"{"future_option": 1}"#).unwrap();
        assert!(config.operator_completions);
    }
}

//! The document store: one handle per open or transitively-imported file.
//!
//! Handles form a refcounted import DAG. A handle's `ref_count` is the
//! number of *other* handles whose import lists name it; a handle survives
//! while it is open or referenced, and pruning cascades in post-order when
//! the last reference drops. Import targets are loaded from disk eagerly
//! right after each (re)parse, so request handlers can borrow the store
//! immutably for the whole request.

use lsp_types::TextDocumentContentChangeEvent;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use zls_position_tracking::PositionEncoding;
use zls_syntax::Ast;
use zls_uri::{path_to_uri, uri_to_path};

use crate::build_file::{BuildError, BuildFile};
use crate::document::Document;

/// Toolchain locations consulted for import resolution and build discovery.
#[derive(Debug, Clone, Default)]
pub struct ToolchainEnv {
    pub zig_exe_path: Option<PathBuf>,
    pub zig_lib_path: Option<PathBuf>,
    pub build_runner_path: Option<PathBuf>,
}

/// One file under management.
#[derive(Debug)]
pub struct Handle {
    pub uri: String,
    pub document: Document,
    pub tree: Ast,
    /// Whether the editor holds this file open.
    pub open: bool,
    /// Number of other handles importing this one.
    pub ref_count: u32,
    /// Resolved import URIs, one per import expression, lexical order.
    pub import_uris: Vec<String>,
    /// Index into the store's build-file table, when adopted.
    pub associated_build_file: Option<usize>,
}

impl Handle {
    /// Current buffer text.
    pub fn text(&self) -> &str {
        &self.document.text
    }
}

/// URI-keyed handle table plus discovered build files.
#[derive(Debug, Default)]
pub struct DocumentStore {
    handles: FxHashMap<String, Handle>,
    build_files: Vec<BuildFile>,
    pub toolchain: ToolchainEnv,
}

impl DocumentStore {
    pub fn new(toolchain: ToolchainEnv) -> Self {
        Self { handles: FxHashMap::default(), build_files: Vec::new(), toolchain }
    }

    /// Lookup without touching reference counts.
    pub fn get_handle(&self, uri: &str) -> Option<&Handle> {
        self.handles.get(uri)
    }

    /// Iterate every handle in the store.
    pub fn handles(&self) -> impl Iterator<Item = &Handle> {
        self.handles.values()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn build_file(&self, index: usize) -> Option<&BuildFile> {
        self.build_files.get(index)
    }

    /// Open a document, creating or refreshing its handle. Idempotent.
    pub fn open_document(&mut self, uri: &str, text: String) {
        if let Some(handle) = self.handles.get_mut(uri) {
            handle.open = true;
            if handle.document.text != text {
                handle.document.replace_all(text);
                handle.tree = Ast::parse(&handle.document.text);
                self.refresh_imports(uri);
            }
            return;
        }
        self.insert_handle(uri, text, true);
        self.refresh_imports(uri);
    }

    /// Clear the open flag; prune if nothing imports the file anymore.
    pub fn close_document(&mut self, uri: &str) {
        let Some(handle) = self.handles.get_mut(uri) else { return };
        handle.open = false;
        if handle.ref_count == 0 {
            self.destroy(uri);
        }
    }

    /// Apply edits in order, re-parse, and adjust the import graph.
    pub fn apply_changes(
        &mut self,
        uri: &str,
        changes: &[TextDocumentContentChangeEvent],
        enc: PositionEncoding,
    ) {
        let Some(handle) = self.handles.get_mut(uri) else { return };
        for change in changes {
            handle.document.apply_change(change, enc);
        }
        handle.tree = Ast::parse(&handle.document.text);
        self.refresh_imports(uri);
    }

    /// Re-run build discovery when a build file is saved; no-op otherwise.
    pub fn apply_save(&mut self, uri: &str) -> Result<(), BuildError> {
        if !is_build_file_uri(uri) {
            return Ok(());
        }
        let index = self.ensure_build_file(uri);
        self.regenerate_build_file(index)
    }

    /// Resolve an import string against a handle and make sure the target is
    /// loaded and reference-counted. `None` when nothing resolves or the
    /// target file cannot be read.
    pub fn uri_from_import(&mut self, owner_uri: &str, import_string: &str) -> Option<String> {
        let owner = self.handles.get(owner_uri)?;
        let uri = self.resolve_import(owner, import_string)?;
        if !self.ensure_loaded(&uri) {
            return None;
        }
        let owner = self.handles.get_mut(owner_uri)?;
        if !owner.import_uris.contains(&uri) {
            owner.import_uris.push(uri.clone());
            if let Some(target) = self.handles.get_mut(&uri) {
                target.ref_count += 1;
            }
        }
        Some(uri)
    }

    /// Read-only import resolution for analysis walks: the resolved target,
    /// provided it is already in the store.
    pub fn resolve_import_uri(&self, owner_uri: &str, import_string: &str) -> Option<String> {
        let owner = self.handles.get(owner_uri)?;
        let uri = self.resolve_import(owner, import_string)?;
        self.handles.contains_key(&uri).then_some(uri)
    }

    // ------------------------------------------------------------------
    // Import graph maintenance
    // ------------------------------------------------------------------

    fn resolve_import(&self, owner: &Handle, name: &str) -> Option<String> {
        if name == "std" {
            let lib = self.toolchain.zig_lib_path.as_deref()?;
            return Some(path_to_uri(&lib.join("std").join("std.zig")));
        }
        if name == "builtin" {
            let lib = self.toolchain.zig_lib_path.as_deref()?;
            return Some(path_to_uri(&lib.join("builtin.zig")));
        }
        if name.ends_with(".zig") {
            let owner_path = uri_to_path(&owner.uri).ok()?;
            let dir = owner_path.parent()?;
            return Some(path_to_uri(&normalize_path(&dir.join(name))));
        }
        let build_file = owner.associated_build_file.and_then(|i| self.build_files.get(i))?;
        build_file.packages.get(name).cloned()
    }

    /// Re-resolve a handle's imports, loading new targets and releasing
    /// dropped ones.
    ///
    /// The old edge list is taken out, every import expression is re-added
    /// through [`DocumentStore::uri_from_import`], and only then are the old
    /// edges' references dropped, so a target that stays imported never
    /// transiently reaches a zero count.
    fn refresh_imports(&mut self, uri: &str) {
        let (strings, old_list) = match self.handles.get_mut(uri) {
            Some(handle) => {
                (handle.tree.import_strings(), std::mem::take(&mut handle.import_uris))
            }
            None => return,
        };

        for name in &strings {
            self.uri_from_import(uri, name);
        }

        let old_set: FxHashSet<String> = old_list.into_iter().collect();
        for target in old_set {
            self.release(&target);
        }
    }

    /// Load a file into the store as a non-open handle. True if present.
    fn ensure_loaded(&mut self, uri: &str) -> bool {
        if self.handles.contains_key(uri) {
            return true;
        }
        let Ok(path) = uri_to_path(uri) else { return false };
        let Ok(text) = fs::read_to_string(&path) else { return false };
        self.insert_handle(uri, text, false);
        // The handle is in the map before its own imports are scanned, so
        // import cycles terminate here.
        self.refresh_imports(uri);
        true
    }

    fn insert_handle(&mut self, uri: &str, text: String, open: bool) {
        let associated_build_file = self.associate_build_file(uri);
        let document = Document::new(text);
        let tree = Ast::parse(&document.text);
        self.handles.insert(
            uri.to_string(),
            Handle {
                uri: uri.to_string(),
                document,
                tree,
                open,
                ref_count: 0,
                import_uris: Vec::new(),
                associated_build_file,
            },
        );
    }

    /// Drop one reference; prune when the handle is closed and unreferenced.
    fn release(&mut self, uri: &str) {
        let Some(handle) = self.handles.get_mut(uri) else { return };
        handle.ref_count = handle.ref_count.saturating_sub(1);
        if handle.ref_count == 0 && !handle.open {
            self.destroy(uri);
        }
    }

    /// Remove a handle and release everything it imports, cascading.
    fn destroy(&mut self, uri: &str) {
        let Some(handle) = self.handles.remove(uri) else { return };
        let imports: FxHashSet<String> = handle.import_uris.into_iter().collect();
        for target in imports {
            self.release(&target);
        }
    }

    // ------------------------------------------------------------------
    // Build files
    // ------------------------------------------------------------------

    /// Find the deepest `build.zig` above `uri` and adopt it.
    fn associate_build_file(&mut self, uri: &str) -> Option<usize> {
        let path = uri_to_path(uri).ok()?;
        if path.file_name().is_some_and(|n| n == "build.zig") {
            return Some(self.ensure_build_file(uri));
        }
        let mut dir = path.parent();
        while let Some(current) = dir {
            let candidate = current.join("build.zig");
            if candidate.is_file() {
                let build_uri = path_to_uri(&candidate);
                return Some(self.ensure_build_file(&build_uri));
            }
            dir = current.parent();
        }
        None
    }

    fn ensure_build_file(&mut self, build_uri: &str) -> usize {
        if let Some(index) = self.build_files.iter().position(|bf| bf.uri == build_uri) {
            return index;
        }
        self.build_files.push(BuildFile::new(build_uri.to_string()));
        let index = self.build_files.len() - 1;
        // Best effort on first sight; a save re-runs it loudly.
        let _ = self.regenerate_build_file(index);
        index
    }

    fn regenerate_build_file(&mut self, index: usize) -> Result<(), BuildError> {
        let Some(zig_exe) = self.toolchain.zig_exe_path.clone() else {
            return Ok(());
        };
        let runner = self.toolchain.build_runner_path.clone();
        let Some(build_file) = self.build_files.get_mut(index) else {
            return Ok(());
        };
        let Ok(path) = uri_to_path(&build_file.uri) else {
            return Ok(());
        };
        build_file.regenerate(&zig_exe, runner.as_deref(), &path)
    }
}

fn is_build_file_uri(uri: &str) -> bool {
    uri.ends_with("/build.zig")
}

/// Collapse `.` and `..` segments without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

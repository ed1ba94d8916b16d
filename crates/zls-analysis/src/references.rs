//! Whole-graph reference search and rename.
//!
//! `symbol_references` re-resolves every identifier and field-name token in
//! every handle and keeps the ones whose resolution equals the target
//! declaration. That makes the correctness property structural: an
//! occurrence is reported iff it resolves to the declaration.

use lsp_types::{Location, TextEdit, Uri, WorkspaceEdit};
use std::collections::HashMap;
use zls_document_store::{DocumentStore, Handle};
use zls_position_tracking::PositionEncoding;
use zls_syntax::{NodeKind, TokenIndex};
use zls_uri::path_to_uri;

use crate::resolve::{field_access_decl, lookup_label, lookup_symbol_global};
use crate::Declaration;

fn token_location(handle: &Handle, token: TokenIndex, enc: PositionEncoding) -> Option<Location> {
    let uri: Uri = handle.uri.parse().ok()?;
    let tok = handle.tree.token(token);
    let range = handle.document.line_index.range(&handle.document.text, tok.start, tok.end, enc);
    Some(Location { uri, range })
}

/// Every location whose resolution equals `decl`.
///
/// With `skip_std`, handles under the configured standard-library root are
/// not scanned. `include_decl` adds the declaration's own name token.
pub fn symbol_references(
    store: &DocumentStore,
    decl: &Declaration,
    include_decl: bool,
    skip_std: bool,
    enc: PositionEncoding,
) -> Vec<Location> {
    if let Declaration::Label { .. } = decl {
        return label_references(store, decl, include_decl, enc);
    }

    let mut locations = Vec::new();
    if include_decl {
        if let Some(handle) = decl.handle(store) {
            if let Some(tok) = decl.name_token(&handle.tree) {
                locations.extend(token_location(handle, tok, enc));
            }
        }
    }

    let std_root = store
        .toolchain
        .zig_lib_path
        .as_deref()
        .map(|lib| path_to_uri(lib));

    let mut uris: Vec<&str> = store.handles().map(|h| h.uri.as_str()).collect();
    uris.sort_unstable();

    for uri in uris {
        let Some(handle) = store.get_handle(uri) else { continue };
        if skip_std {
            if let Some(std_root) = &std_root {
                if handle.uri.starts_with(std_root.as_str()) {
                    continue;
                }
            }
        }
        let ast = &handle.tree;
        let mut tokens: Vec<TokenIndex> = Vec::new();
        for index in 0..ast.nodes.len() as u32 {
            match &ast.node(index).kind {
                NodeKind::Identifier => {
                    let tok = ast.node(index).main_token;
                    let name = ast.token_text(tok);
                    if name == "_" {
                        continue;
                    }
                    let resolved =
                        lookup_symbol_global(handle, name, ast.token(tok).start);
                    if resolved.as_ref() == Some(decl) {
                        tokens.push(tok);
                    }
                }
                NodeKind::FieldAccess { name_token, .. } => {
                    let resolved = field_access_decl(store, uri, index);
                    if resolved.as_ref() == Some(decl) {
                        tokens.push(*name_token);
                    }
                }
                _ => {}
            }
        }
        tokens.sort_unstable();
        tokens.dedup();
        for tok in tokens {
            locations.extend(token_location(handle, tok, enc));
        }
    }
    locations
}

/// References to a block or loop label, scoped to the handle holding it.
pub fn label_references(
    store: &DocumentStore,
    decl: &Declaration,
    include_decl: bool,
    enc: PositionEncoding,
) -> Vec<Location> {
    let Declaration::Label { uri, name_token } = decl else { return Vec::new() };
    let Some(handle) = store.get_handle(uri) else { return Vec::new() };
    let ast = &handle.tree;
    let name = ast.token_text(*name_token);

    let mut locations = Vec::new();
    if include_decl {
        locations.extend(token_location(handle, *name_token, enc));
    }
    for index in 0..ast.nodes.len() as u32 {
        let label = match &ast.node(index).kind {
            NodeKind::Break { label: Some(tok), .. } => *tok,
            NodeKind::Continue { label: Some(tok) } => *tok,
            _ => continue,
        };
        if ast.token_text(label) != name {
            continue;
        }
        let resolved = lookup_label(handle, name, ast.token(label).start);
        if resolved.as_ref() == Some(decl) {
            locations.extend(token_location(handle, label, enc));
        }
    }
    locations
}

/// Build the workspace edit renaming `decl` to `new_name`.
///
/// Occurrences that already carry the new name produce no edit, so renaming
/// a symbol to its current name is a no-op with an empty edit set.
pub fn rename_symbol(
    store: &DocumentStore,
    decl: &Declaration,
    new_name: &str,
    enc: PositionEncoding,
) -> WorkspaceEdit {
    let locations = symbol_references(store, decl, true, false, enc);
    let mut changes: HashMap<Uri, Vec<TextEdit>> = HashMap::new();
    for location in locations {
        let already_named = store.get_handle(location.uri.as_str()).is_some_and(|handle| {
            let text = &handle.document.text;
            let (start, end) =
                handle.document.line_index.range_to_offsets(text, location.range, enc);
            text.get(start..end) == Some(new_name)
        });
        if already_named {
            continue;
        }
        changes
            .entry(location.uri)
            .or_default()
            .push(TextEdit { range: location.range, new_text: new_name.to_string() });
    }
    WorkspaceEdit { changes: Some(changes), ..Default::default() }
}

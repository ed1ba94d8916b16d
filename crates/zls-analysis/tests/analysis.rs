//! Engine-level tests: lookup, type resolution, aliases, references.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use zls_analysis::{
    container_of, is_primitive, lookup_label, lookup_symbol_container, lookup_symbol_global,
    position_context, rename_symbol, resolve_field_access, resolve_type_of_decl,
    resolve_var_decl_alias, symbol_references, Declaration, PositionContext, TypeData,
};
use zls_document_store::{DocumentStore, ToolchainEnv};
use zls_position_tracking::PositionEncoding;
use zls_syntax::NodeKind;
use zls_uri::path_to_uri;

fn store_with(uri: &str, text: &str) -> DocumentStore {
    let mut store = DocumentStore::new(ToolchainEnv::default());
    store.open_document(uri, text.to_string());
    store
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path_to_uri(&path)
}

fn decl_name(store: &DocumentStore, decl: &Declaration) -> String {
    let handle = decl.handle(store).unwrap();
    let tok = decl.name_token(&handle.tree).unwrap();
    handle.tree.token_text(tok).to_string()
}

const URI: &str = "file:///test/main.zig";

#[test]
fn locals_shadow_params_shadow_globals() {
    let text = "const x = 1;\nfn f(x: i32) i32 {\n    const y = x;\n    {\n        const x = true;\n        return x;\n    }\n}\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();

    // Inside the inner block, `x` is the local bool.
    let inner = text.rfind("return x").unwrap() + 7;
    let decl = lookup_symbol_global(handle, "x", inner).unwrap();
    match &decl {
        Declaration::AstNode { node, .. } => {
            assert!(handle.tree.var_decl(*node).is_some());
            let ty = resolve_type_of_decl(&store, &decl).unwrap();
            assert_eq!(ty.data, TypeData::Primitive("bool".into()));
        }
        other => panic!("expected local var decl, got {other:?}"),
    }

    // In the function body before the inner block, `x` is the parameter.
    let in_body = text.find("const y = x").unwrap() + 10;
    let decl = lookup_symbol_global(handle, "x", in_body).unwrap();
    assert!(matches!(decl, Declaration::Param { index: 0, .. }));

    // At the top level, `x` is the global.
    let decl = lookup_symbol_global(handle, "x", 6).unwrap();
    assert!(matches!(decl, Declaration::AstNode { .. }));
    let ty = resolve_type_of_decl(&store, &decl).unwrap();
    assert_eq!(ty.data, TypeData::Primitive("comptime_int".into()));
}

#[test]
fn block_locals_are_not_visible_before_declaration() {
    let text = "fn f() i32 {\n    const a = b;\n    const b = 1;\n    return a;\n}\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let use_site = text.find("= b;").unwrap() + 2;
    assert_eq!(lookup_symbol_global(handle, "b", use_site), None);
}

#[test]
fn container_lookup_honors_instance_flag() {
    let text = "const P = struct {\n    x: i32,\n    const max = 10;\n    pub fn len(self: P) i32 {\n        return self.x;\n    }\n};\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let p = handle.tree.root_decls()[0];
    let container = handle.tree.var_decl(p).unwrap().init_node.unwrap();

    // Fields and member functions resolve through an instance.
    assert!(lookup_symbol_container(&store, URI, container, "x", true).is_some());
    assert!(lookup_symbol_container(&store, URI, container, "len", true).is_some());
    // Constants only through the type itself.
    assert!(lookup_symbol_container(&store, URI, container, "max", true).is_none());
    assert!(lookup_symbol_container(&store, URI, container, "max", false).is_some());
    assert!(lookup_symbol_container(&store, URI, container, "missing", false).is_none());
}

#[test]
fn field_access_fold_resolves_struct_members() {
    let text = "const P = struct { x: i32, y: i32 };\nvar p: P = undefined;\np.\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();

    let dot = text.rfind("p.").unwrap();
    let ctx = position_context(&handle.document.text, dot + 2);
    let PositionContext::FieldAccess(range) = ctx else {
        panic!("expected field access, got {ctx:?}");
    };
    let resolution = resolve_field_access(&store, handle, range).unwrap();
    assert_eq!(decl_name(&store, &resolution.decl), "p");

    let ty = resolution.ty.unwrap();
    assert!(!ty.original.is_type_val);
    let (uri, container) = container_of(&store, &ty.original).unwrap();
    assert_eq!(uri, URI);
    let members = handle.tree.container_members(container).unwrap();
    let names: Vec<_> = members
        .iter()
        .filter_map(|&m| handle.tree.container_field(m))
        .map(|f| handle.tree.token_text(f.name_token))
        .collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn field_chain_unwraps_pointer() {
    let text = "const Inner = struct { value: i32 };\nconst Outer = struct { inner: *Inner };\nvar o: Outer = undefined;\nconst v = o.inner.value;\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let decl = lookup_symbol_global(handle, "v", text.rfind("v =").unwrap()).unwrap();
    let ty = resolve_type_of_decl(&store, &decl).unwrap();
    assert_eq!(ty.data, TypeData::Primitive("i32".into()));
}

#[test]
fn call_resolves_to_annotated_return_type() {
    let text = "fn add(a: i32, b: i32) i32 { return a + b; }\nconst r = add(1, 2);\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let decl = lookup_symbol_global(handle, "r", text.find("r =").unwrap()).unwrap();
    let ty = resolve_type_of_decl(&store, &decl).unwrap();
    assert_eq!(ty.data, TypeData::Primitive("i32".into()));
    assert!(!ty.is_type_val);
}

#[test]
fn type_returning_function_follows_body_return() {
    let text = "fn List(comptime T: type) type {\n    return struct { first: ?T };\n}\nconst Ints = List(i32);\nvar xs: Ints = undefined;\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let decl = lookup_symbol_global(handle, "xs", text.find("xs:").unwrap()).unwrap();
    let ty = resolve_type_of_decl(&store, &decl).unwrap();
    assert!(!ty.is_type_val);
    let (_, container) = container_of(&store, &ty).unwrap();
    assert!(matches!(handle.tree.node(container).kind, NodeKind::ContainerDecl(_)));
}

#[test]
fn payload_binding_resolves_to_unwrapped_type() {
    let text = "fn f(opt: ?i32) i32 {\n    if (opt) |val| {\n        return val;\n    }\n    return 0;\n}\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let site = text.find("return val").unwrap() + 8;
    let decl = lookup_symbol_global(handle, "val", site).unwrap();
    assert!(matches!(decl, Declaration::PointerPayload { .. }));
    let ty = resolve_type_of_decl(&store, &decl).unwrap();
    assert_eq!(ty.data, TypeData::Primitive("i32".into()));
}

#[test]
fn for_payloads_bind_element_and_index() {
    let text = "fn sum(xs: []const i32) i32 {\n    var total: i32 = 0;\n    for (xs) |x, i| {\n        total += x;\n        _ = i;\n    }\n    return total;\n}\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let site = text.find("total += x").unwrap() + 9;
    let elem = lookup_symbol_global(handle, "x", site).unwrap();
    assert!(matches!(elem, Declaration::ArrayPayload { .. }));
    let ty = resolve_type_of_decl(&store, &elem).unwrap();
    assert_eq!(ty.data, TypeData::Primitive("i32".into()));

    let idx = lookup_symbol_global(handle, "i", site).unwrap();
    assert!(matches!(idx, Declaration::ArrayIndex { .. }));
    let ty = resolve_type_of_decl(&store, &idx).unwrap();
    assert_eq!(ty.data, TypeData::Primitive("usize".into()));
}

#[test]
fn alias_resolves_through_import() {
    let dir = tempfile::tempdir().unwrap();
    let a_uri = write_file(dir.path(), "a.zig", "pub const X = struct { y: i32 };\n");
    let b_uri = write_file(
        dir.path(),
        "b.zig",
        "const A = @import(\"a.zig\");\nconst Z = A.X;\n",
    );

    let mut store = DocumentStore::new(ToolchainEnv::default());
    store.open_document(&b_uri, fs::read_to_string(dir.path().join("b.zig")).unwrap());

    let b = store.get_handle(&b_uri).unwrap();
    let z_node = b.tree.root_decls()[1];
    let target = resolve_var_decl_alias(&store, &b_uri, z_node).unwrap();
    assert_eq!(target.uri(), a_uri);
    assert_eq!(decl_name(&store, &target), "X");
}

#[test]
fn cyclic_alias_chain_resolves_to_none() {
    let text = "const A = B;\nconst B = A;\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let a_node = handle.tree.root_decls()[0];
    assert_eq!(resolve_var_decl_alias(&store, URI, a_node), None);
}

#[test]
fn references_across_files_find_every_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let a_uri = write_file(dir.path(), "a.zig", "pub fn foo() void {}\n");
    let b_uri = write_file(
        dir.path(),
        "b.zig",
        "const a = @import(\"a.zig\");\na.foo();\na.foo();\n",
    );

    let mut store = DocumentStore::new(ToolchainEnv::default());
    store.open_document(&a_uri, fs::read_to_string(dir.path().join("a.zig")).unwrap());
    store.open_document(&b_uri, fs::read_to_string(dir.path().join("b.zig")).unwrap());

    let a = store.get_handle(&a_uri).unwrap();
    let foo = Declaration::AstNode { uri: a_uri.clone(), node: a.tree.root_decls()[0] };

    let locations = symbol_references(&store, &foo, true, false, PositionEncoding::Utf16);
    assert_eq!(locations.len(), 3);
    let in_a = locations.iter().filter(|l| l.uri.as_str() == a_uri).count();
    let in_b = locations.iter().filter(|l| l.uri.as_str() == b_uri).count();
    assert_eq!((in_a, in_b), (1, 2));

    let without_decl = symbol_references(&store, &foo, false, false, PositionEncoding::Utf16);
    assert_eq!(without_decl.len(), 2);
}

#[test]
fn rename_groups_edits_by_uri_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let a_uri = write_file(dir.path(), "a.zig", "pub fn foo() void {}\n");
    let b_uri = write_file(
        dir.path(),
        "b.zig",
        "const a = @import(\"a.zig\");\na.foo();\na.foo();\n",
    );

    let mut store = DocumentStore::new(ToolchainEnv::default());
    store.open_document(&a_uri, fs::read_to_string(dir.path().join("a.zig")).unwrap());
    store.open_document(&b_uri, fs::read_to_string(dir.path().join("b.zig")).unwrap());

    let a = store.get_handle(&a_uri).unwrap();
    let foo = Declaration::AstNode { uri: a_uri.clone(), node: a.tree.root_decls()[0] };

    let edit = rename_symbol(&store, &foo, "bar", PositionEncoding::Utf16);
    let changes = edit.changes.unwrap();
    assert_eq!(changes.len(), 2);
    let a_key: lsp_types::Uri = a_uri.parse().unwrap();
    let b_key: lsp_types::Uri = b_uri.parse().unwrap();
    assert_eq!((changes[&a_key].len(), changes[&b_key].len()), (1, 2));

    // Renaming to the current name is a no-op.
    let noop = rename_symbol(&store, &foo, "foo", PositionEncoding::Utf16);
    assert!(noop.changes.unwrap().values().all(|edits| edits.is_empty()));
}

#[test]
fn labels_resolve_and_enumerate() {
    let text = "fn f() i32 {\n    const v = blk: {\n        break :blk 1;\n    };\n    return v;\n}\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let site = text.find("break").unwrap();
    let label = lookup_label(handle, "blk", site).unwrap();
    assert!(matches!(label, Declaration::Label { .. }));

    let refs = zls_analysis::label_references(&store, &label, true, PositionEncoding::Utf16);
    assert_eq!(refs.len(), 2);
}

#[test]
fn doc_comments_collect_for_declarations() {
    let text = "/// Adds two numbers.\n/// Wraps on overflow.\nfn add(a: i32, b: i32) i32 { return a + b; }\n";
    let store = store_with(URI, text);
    let handle = store.get_handle(URI).unwrap();
    let docs =
        zls_analysis::collect_doc_comments(&handle.tree, handle.tree.root_decls()[0]).unwrap();
    assert_eq!(docs, "Adds two numbers.\nWraps on overflow.");
}

#[test]
fn primitive_classification_used_by_identifier_resolution() {
    assert!(is_primitive("i32"));
    assert!(!is_primitive("Point"));
}

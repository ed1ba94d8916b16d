//! Full-document semantic tokens.
//!
//! A classification map is built from an AST walk (declarations, resolved
//! identifier uses, labels, payloads), then the token array is emitted in
//! order using LSP's 5-integer delta encoding. Index and bit positions
//! follow the legend advertised in the server capabilities.

use lsp_types::{SemanticToken, SemanticTokens, SemanticTokensParams};
use rustc_hash::FxHashMap;
use serde_json::Value;
use zls_analysis::{field_access_decl, is_primitive, lookup_symbol_global, Declaration};
use zls_document_store::{DocumentStore, Handle};
use zls_position_tracking::PositionEncoding;
use zls_protocol::JsonRpcError;
use zls_syntax::{ContainerKind, NodeKind, TokenIndex, TokenTag};

use crate::server::Server;

// Token type indices, matching `zls_protocol::TOKEN_TYPES`.
const T_KEYWORD: u32 = 0;
const T_NAMESPACE: u32 = 1;
const T_TYPE: u32 = 2;
const T_PARAMETER: u32 = 3;
const T_VARIABLE: u32 = 4;
const T_ENUM_MEMBER: u32 = 5;
const T_FIELD: u32 = 6;
const T_ERROR_TAG: u32 = 7;
const T_FUNCTION: u32 = 8;
const T_COMMENT: u32 = 9;
const T_STRING: u32 = 10;
const T_NUMBER: u32 = 11;
const T_OPERATOR: u32 = 12;
const T_BUILTIN: u32 = 13;
const T_LABEL: u32 = 14;

// Modifier bits, matching `zls_protocol::TOKEN_MODIFIERS`.
const M_DECLARATION: u32 = 1 << 0;
const M_READONLY: u32 = 1 << 2;
const M_DOCUMENTATION: u32 = 1 << 8;
const M_DEFAULT_LIBRARY: u32 = 1 << 9;
const M_GENERIC: u32 = 1 << 10;

impl Server {
    pub(crate) fn handle_semantic_tokens(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        if !self.config.enable_semantic_tokens {
            return Ok(Some(Value::Null));
        }
        let Some(params) = self.parse_params::<SemanticTokensParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let uri = params.text_document.uri.as_str().to_string();
        let Some(handle) = self.store.get_handle(&uri) else {
            self.log_warn(format!("unknown document {uri}"));
            return Ok(Some(Value::Null));
        };
        let tokens = build_tokens(&self.store, handle, self.encoding);
        let result = SemanticTokens { result_id: None, data: tokens };
        Ok(Some(serde_json::to_value(result).unwrap_or(Value::Null)))
    }
}

pub(crate) fn build_tokens(
    store: &DocumentStore,
    handle: &Handle,
    enc: PositionEncoding,
) -> Vec<SemanticToken> {
    let classified = classify_identifiers(store, handle);
    let ast = &handle.tree;
    let text = &handle.document.text;

    let mut data = Vec::new();
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for (index, token) in ast.tokens.iter().enumerate() {
        let Some((token_type, modifiers)) = classify_token(token.tag, index as TokenIndex, &classified)
        else {
            continue;
        };
        let start = handle.document.line_index.offset_to_position(text, token.start, enc);
        let end = handle.document.line_index.offset_to_position(text, token.end, enc);
        let length = end.character.saturating_sub(start.character);
        if length == 0 {
            continue;
        }
        let delta_line = start.line - prev_line;
        let delta_start =
            if delta_line == 0 { start.character - prev_start } else { start.character };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length,
            token_type,
            token_modifiers_bitset: modifiers,
        });
        prev_line = start.line;
        prev_start = start.character;
    }
    data
}

fn classify_token(
    tag: TokenTag,
    index: TokenIndex,
    classified: &FxHashMap<TokenIndex, (u32, u32)>,
) -> Option<(u32, u32)> {
    use TokenTag::*;
    match tag {
        Identifier => classified.get(&index).copied(),
        Builtin => Some((T_BUILTIN, M_DEFAULT_LIBRARY)),
        StringLiteral | CharLiteral => Some((T_STRING, 0)),
        NumberLiteral => Some((T_NUMBER, 0)),
        DocComment | ContainerDocComment => Some((T_COMMENT, M_DOCUMENTATION)),
        LineComment => Some((T_COMMENT, 0)),
        KeywordAnd | KeywordAnytype | KeywordBreak | KeywordCatch | KeywordComptime
        | KeywordConst | KeywordContinue | KeywordDefer | KeywordElse | KeywordEnum
        | KeywordError | KeywordExport | KeywordExtern | KeywordFalse | KeywordFn | KeywordFor
        | KeywordIf | KeywordInline | KeywordNull | KeywordOpaque | KeywordOr | KeywordOrelse
        | KeywordPub | KeywordReturn | KeywordStruct | KeywordSwitch | KeywordTest
        | KeywordTrue | KeywordTry | KeywordUndefined | KeywordUnion | KeywordUnreachable
        | KeywordVar | KeywordWhile => Some((T_KEYWORD, 0)),
        Equal | EqualEqual | EqualArrow | Bang | BangEqual | Plus | PlusPlus | PlusEqual
        | Minus | MinusEqual | Asterisk | AsteriskEqual | Slash | SlashEqual | Percent
        | PercentEqual | Ampersand | AmpersandEqual | Pipe | PipeEqual | LAngle | LAngleEqual
        | RAngle | RAngleEqual | PeriodAsterisk => Some((T_OPERATOR, 0)),
        LParen | RParen | LBrace | RBrace | LBracket | RBracket | Comma | Semicolon | Colon
        | Period | Ellipsis2 | Ellipsis3 | Question | Invalid | Eof => None,
    }
}

/// Walk the tree and classify every identifier-ish token.
fn classify_identifiers(store: &DocumentStore, handle: &Handle) -> FxHashMap<TokenIndex, (u32, u32)> {
    let ast = &handle.tree;
    let mut map = FxHashMap::default();

    for index in 0..ast.nodes.len() as u32 {
        match &ast.node(index).kind {
            NodeKind::VarDecl(v) => {
                let (ty, _) = var_decl_classification(handle, index);
                let mut mods = M_DECLARATION;
                if v.is_const {
                    mods |= M_READONLY;
                }
                map.insert(v.name_token, (ty, mods));
            }
            NodeKind::FnDecl(proto, _) => {
                if let Some(name) = proto.name_token {
                    let generic = proto.params.iter().any(|p| p.is_comptime || p.is_anytype);
                    let mods = M_DECLARATION | if generic { M_GENERIC } else { 0 };
                    map.insert(name, (T_FUNCTION, mods));
                }
                for param in &proto.params {
                    if let Some(tok) = param.name_token {
                        map.insert(tok, (T_PARAMETER, M_DECLARATION));
                    }
                }
            }
            NodeKind::ContainerDecl(container) => {
                let field_type = if container.kind == ContainerKind::Enum {
                    T_ENUM_MEMBER
                } else {
                    T_FIELD
                };
                for &member in &container.members {
                    if let NodeKind::ContainerField(field) = &ast.node(member).kind {
                        map.insert(field.name_token, (field_type, M_DECLARATION));
                    }
                }
            }
            NodeKind::Root { members } => {
                for &member in members {
                    if let NodeKind::ContainerField(field) = &ast.node(member).kind {
                        map.insert(field.name_token, (T_FIELD, M_DECLARATION));
                    }
                }
            }
            NodeKind::ErrorSetDecl(names) => {
                for &tok in names {
                    map.insert(tok, (T_ERROR_TAG, M_DECLARATION));
                }
            }
            NodeKind::ErrorValue => {
                map.insert(ast.node(index).main_token, (T_ERROR_TAG, 0));
            }
            NodeKind::EnumLiteral => {
                map.insert(ast.node(index).main_token, (T_ENUM_MEMBER, 0));
            }
            NodeKind::Block(block) => {
                if let Some(label) = block.label {
                    map.insert(label, (T_LABEL, M_DECLARATION));
                }
            }
            NodeKind::While { label, payload, .. } => {
                if let Some(label) = label {
                    map.insert(*label, (T_LABEL, M_DECLARATION));
                }
                if let Some(p) = payload {
                    map.insert(p.name_token, (T_VARIABLE, M_DECLARATION));
                }
            }
            NodeKind::For { label, payloads, .. } => {
                if let Some(label) = label {
                    map.insert(*label, (T_LABEL, M_DECLARATION));
                }
                for p in payloads {
                    map.insert(p.name_token, (T_VARIABLE, M_DECLARATION));
                }
            }
            NodeKind::If { payload, .. } | NodeKind::Catch { payload, .. } => {
                if let Some(p) = payload {
                    map.insert(p.name_token, (T_VARIABLE, M_DECLARATION));
                }
            }
            NodeKind::Switch { prongs, .. } => {
                for prong in prongs {
                    if let Some(p) = prong.payload {
                        map.insert(p.name_token, (T_VARIABLE, M_DECLARATION));
                    }
                }
            }
            NodeKind::Break { label: Some(label), .. } | NodeKind::Continue { label: Some(label) } => {
                map.insert(*label, (T_LABEL, 0));
            }
            NodeKind::Identifier => {
                let tok = ast.node(index).main_token;
                if map.contains_key(&tok) {
                    continue;
                }
                let name = ast.token_text(tok);
                if is_primitive(name) {
                    map.insert(tok, (T_TYPE, M_DEFAULT_LIBRARY));
                } else if let Some(decl) =
                    lookup_symbol_global(handle, name, ast.token(tok).start)
                {
                    if let Some(classified) = classify_decl(store, &decl) {
                        map.insert(tok, classified);
                    }
                }
            }
            NodeKind::FieldAccess { name_token, .. } => {
                if map.contains_key(name_token) {
                    continue;
                }
                let classified = field_access_decl(store, &handle.uri, index)
                    .and_then(|decl| classify_decl(store, &decl))
                    .unwrap_or((T_FIELD, 0));
                map.insert(*name_token, classified);
            }
            _ => {}
        }
    }
    map
}

fn var_decl_classification(handle: &Handle, node: u32) -> (u32, u32) {
    let ast = &handle.tree;
    if let NodeKind::VarDecl(v) = &ast.node(node).kind {
        if let Some(init) = v.init_node {
            return match &ast.node(init).kind {
                NodeKind::BuiltinCall { .. }
                    if ast.token_text(ast.node(init).main_token) == "@import" =>
                {
                    (T_NAMESPACE, 0)
                }
                NodeKind::ContainerDecl(_) | NodeKind::ErrorSetDecl(_) => (T_TYPE, 0),
                _ => (T_VARIABLE, 0),
            };
        }
    }
    (T_VARIABLE, 0)
}

fn classify_decl(store: &DocumentStore, decl: &Declaration) -> Option<(u32, u32)> {
    let handle = decl.handle(store)?;
    let ast = &handle.tree;
    Some(match decl {
        Declaration::AstNode { node, .. } => match &ast.node(*node).kind {
            NodeKind::FnDecl(..) => (T_FUNCTION, 0),
            NodeKind::ContainerField(_) => (T_FIELD, 0),
            NodeKind::VarDecl(v) => {
                let (ty, _) = var_decl_classification(handle, *node);
                (ty, if v.is_const { M_READONLY } else { 0 })
            }
            NodeKind::Root { .. } => (T_NAMESPACE, 0),
            _ => (T_VARIABLE, 0),
        },
        Declaration::Param { .. } => (T_PARAMETER, 0),
        Declaration::Label { .. } => (T_LABEL, 0),
        Declaration::PointerPayload { .. }
        | Declaration::ArrayPayload { .. }
        | Declaration::ArrayIndex { .. }
        | Declaration::SwitchPayload { .. } => (T_VARIABLE, 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zls_document_store::ToolchainEnv;

    fn tokens_for(text: &str) -> Vec<SemanticToken> {
        let mut store = DocumentStore::new(ToolchainEnv::default());
        let uri = "file:///test/tokens.zig";
        store.open_document(uri, text.to_string());
        let handle = store.get_handle(uri).unwrap();
        build_tokens(&store, handle, PositionEncoding::Utf16)
    }

    #[test]
    fn delta_encoding_is_relative() {
        let data = tokens_for("const x = 1;\n");
        // `const` at 0:0, `x` at 0:6, `=` at 0:8, `1` at 0:10.
        let summary: Vec<(u32, u32, u32, u32)> = data
            .iter()
            .map(|t| (t.delta_line, t.delta_start, t.length, t.token_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 0, 5, T_KEYWORD),
                (0, 6, 1, T_VARIABLE),
                (0, 2, 1, T_OPERATOR),
                (0, 2, 1, T_NUMBER),
            ]
        );
        assert_eq!(data[1].token_modifiers_bitset, M_DECLARATION | M_READONLY);
    }

    #[test]
    fn second_line_resets_delta_start() {
        let data = tokens_for("const a = 1;\nconst b = a;\n");
        // First token of line 1 carries delta_line 1 and absolute column.
        let line2_keyword = &data[4];
        assert_eq!((line2_keyword.delta_line, line2_keyword.delta_start), (1, 0));
        // The trailing `a` resolves back to the line-1 constant.
        let last = data.last().unwrap();
        assert_eq!(last.token_type, T_VARIABLE);
        assert_eq!(last.token_modifiers_bitset, M_READONLY);
    }

    #[test]
    fn classification_covers_declarations() {
        let data = tokens_for(
            "const std = @import(\"std\");\nconst Color = enum { red, green };\nfn get(c: Color) i32 {\n    _ = c;\n    return 0;\n}\n",
        );
        let types: Vec<u32> = data.iter().map(|t| t.token_type).collect();
        assert!(types.contains(&T_NAMESPACE), "import alias is a namespace: {types:?}");
        assert!(types.contains(&T_BUILTIN));
        assert!(types.contains(&T_STRING));
        assert!(types.contains(&T_TYPE), "enum decl and i32: {types:?}");
        assert!(types.contains(&T_ENUM_MEMBER));
        assert!(types.contains(&T_FUNCTION));
        assert!(types.contains(&T_PARAMETER));
    }

    #[test]
    fn doc_comments_carry_documentation_modifier() {
        let data = tokens_for("/// docs\nconst x = 1;\n");
        assert_eq!(data[0].token_type, T_COMMENT);
        assert_eq!(data[0].token_modifiers_bitset, M_DOCUMENTATION);
    }

    #[test]
    fn empty_file_has_no_tokens() {
        assert_eq!(tokens_for("").len(), 0);
    }
}

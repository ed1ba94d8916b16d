//! Advertised server capabilities, including the semantic-token legend.

use lsp_types::{
    CompletionOptions, DeclarationCapability, HoverProviderCapability,
    ImplementationProviderCapability, OneOf, PositionEncodingKind, SemanticTokenModifier,
    SemanticTokenType, SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions,
    SemanticTokensServerCapabilities, ServerCapabilities, TextDocumentSyncCapability,
    TextDocumentSyncKind, TypeDefinitionProviderCapability,
};

/// Semantic token types, in legend (index) order.
///
/// `errorTag`, `builtin`, and `label` are server-specific additions after
/// the standard names.
pub const TOKEN_TYPES: &[&str] = &[
    "keyword",
    "namespace",
    "type",
    "parameter",
    "variable",
    "enumMember",
    "field",
    "errorTag",
    "function",
    "comment",
    "string",
    "number",
    "operator",
    "builtin",
    "label",
];

/// Semantic token modifiers, in legend (bit) order.
pub const TOKEN_MODIFIERS: &[&str] = &[
    "declaration",
    "definition",
    "readonly",
    "static",
    "deprecated",
    "abstract",
    "async",
    "modification",
    "documentation",
    "defaultLibrary",
    "generic",
];

/// The semantic-token legend advertised during `initialize`.
pub fn semantic_tokens_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.iter().map(|&t| SemanticTokenType::new(t)).collect(),
        token_modifiers: TOKEN_MODIFIERS.iter().map(|&m| SemanticTokenModifier::new(m)).collect(),
    }
}

/// Build the capabilities announced to the client.
pub fn server_capabilities(
    encoding: PositionEncodingKind,
    enable_semantic_tokens: bool,
) -> ServerCapabilities {
    ServerCapabilities {
        position_encoding: Some(encoding),
        text_document_sync: Some(TextDocumentSyncCapability::Kind(
            TextDocumentSyncKind::INCREMENTAL,
        )),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(false),
            trigger_characters: Some(vec![".".to_string(), "@".to_string()]),
            ..CompletionOptions::default()
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        declaration_provider: Some(DeclarationCapability::Simple(true)),
        type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
        implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        document_formatting_provider: Some(OneOf::Left(true)),
        rename_provider: Some(OneOf::Left(true)),
        semantic_tokens_provider: enable_semantic_tokens.then(|| {
            SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
                legend: semantic_tokens_legend(),
                range: Some(false),
                full: Some(SemanticTokensFullOptions::Bool(true)),
                ..SemanticTokensOptions::default()
            })
        }),
        ..ServerCapabilities::default()
    }
}

//! Cursor-position classification.
//!
//! Works from the raw document text with a coarse backward scan rather than
//! the parse tree, so it keeps answering while the code at the cursor is
//! syntactically broken (the normal state while typing).

/// The syntactic category at a cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionContext {
    /// `@buil...`
    Builtin,
    /// A bare identifier (or nothing typed yet where one would go).
    VarAccess,
    /// A dotted chain; the byte range runs from the start of the leading
    /// identifier to the cursor.
    FieldAccess(std::ops::Range<usize>),
    /// Inside a string literal.
    StringLiteral,
    /// `.name` with no receiver, e.g. `x = .re`.
    EnumLiteral,
    /// `error.`
    GlobalErrorSet,
    /// `break :l` / `continue :l`.
    Label,
    /// Nothing relevant before the cursor.
    Empty,
    /// Comments, number-adjacent dots, and everything else uninteresting.
    Other,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Identifier byte range covering `offset`, if any (used by hover and
/// navigation to pick the symbol under the cursor).
pub fn identifier_range_at(text: &str, offset: usize) -> Option<std::ops::Range<usize>> {
    let bytes = text.as_bytes();
    let offset = offset.min(bytes.len());
    let mut start = offset;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    if start == end || bytes[start].is_ascii_digit() {
        None
    } else {
        Some(start..end)
    }
}

/// Classify the position at byte `offset` in `text`.
pub fn position_context(text: &str, offset: usize) -> PositionContext {
    let bytes = text.as_bytes();
    let mut offset = offset.min(bytes.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &bytes[line_start..offset];

    if let Some(ctx) = string_or_comment_context(prefix) {
        return ctx;
    }

    // Partial identifier directly before the cursor.
    let mut id_start = prefix.len();
    while id_start > 0 && is_ident_byte(prefix[id_start - 1]) {
        id_start -= 1;
    }

    if id_start > 0 && prefix[id_start - 1] == b'@' {
        return PositionContext::Builtin;
    }
    if id_start > 0 && prefix[id_start - 1] == b':' {
        return label_or_other(prefix, id_start - 1);
    }

    if id_start == 0 || prefix[id_start - 1] != b'.' {
        if id_start < prefix.len() {
            if prefix[id_start].is_ascii_digit() {
                return PositionContext::Other;
            }
            return PositionContext::VarAccess;
        }
        return PositionContext::Empty;
    }

    // Walk the dotted chain backwards.
    let mut chain_start = id_start;
    let mut i = id_start - 1; // index of the '.'
    loop {
        if i > 0 && prefix[i - 1] == b'.' {
            // `..` range syntax, not a member access
            return PositionContext::Other;
        }
        // Step over whatever precedes this '.'.
        let Some(segment_start) = scan_chain_segment(prefix, i) else {
            // Nothing chain-like before the dot: `.name` enum literal.
            return if chain_start == id_start {
                PositionContext::EnumLiteral
            } else {
                PositionContext::Other
            };
        };
        chain_start = segment_start;
        if segment_start > 0 && prefix[segment_start - 1] == b'.' {
            i = segment_start - 1;
            continue;
        }
        break;
    }

    let first_segment_end = prefix[chain_start..]
        .iter()
        .position(|&b| !is_ident_byte(b))
        .map_or(prefix.len(), |p| chain_start + p);
    if &prefix[chain_start..first_segment_end] == b"error" {
        return PositionContext::GlobalErrorSet;
    }
    if prefix[chain_start].is_ascii_digit() {
        return PositionContext::Other;
    }
    PositionContext::FieldAccess(line_start + chain_start..offset)
}

/// Scan backward over one chain segment ending at the byte before `dot`.
///
/// Returns the segment's start, or `None` when the dot is not preceded by a
/// chain segment (identifier, call/index suffix, or `.*`/`.?` unwrap).
fn scan_chain_segment(prefix: &[u8], dot: usize) -> Option<usize> {
    if dot == 0 {
        return None;
    }
    let mut i = dot;
    match prefix[i - 1] {
        b if is_ident_byte(b) => {
            while i > 0 && is_ident_byte(prefix[i - 1]) {
                i -= 1;
            }
            Some(i)
        }
        b'*' | b'?' if i >= 2 && prefix[i - 2] == b'.' => {
            // `.*` / `.?` unwraps belong to the chain; keep scanning
            // before its dot.
            scan_chain_segment(prefix, i - 2)
        }
        b')' => balance_backward(prefix, i - 1, b'(', b')').and_then(|open| {
            let mut j = open;
            while j > 0 && is_ident_byte(prefix[j - 1]) {
                j -= 1;
            }
            if j == open { Some(open) } else { Some(j) }
        }),
        b']' => balance_backward(prefix, i - 1, b'[', b']').and_then(|open| {
            let mut j = open;
            while j > 0 && is_ident_byte(prefix[j - 1]) {
                j -= 1;
            }
            if j == open { Some(open) } else { Some(j) }
        }),
        _ => None,
    }
}

/// Index of the matching opening bracket for the closer at `close`.
fn balance_backward(prefix: &[u8], close: usize, open: u8, close_byte: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = close + 1;
    while i > 0 {
        i -= 1;
        if prefix[i] == close_byte {
            depth += 1;
        } else if prefix[i] == open {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn label_or_other(prefix: &[u8], colon: usize) -> PositionContext {
    let mut i = colon;
    while i > 0 && prefix[i - 1] == b' ' {
        i -= 1;
    }
    let mut word_start = i;
    while word_start > 0 && is_ident_byte(prefix[word_start - 1]) {
        word_start -= 1;
    }
    match &prefix[word_start..i] {
        b"break" | b"continue" => PositionContext::Label,
        _ => PositionContext::Other,
    }
}

/// `Some(ctx)` when the cursor sits in a string literal or comment.
fn string_or_comment_context(prefix: &[u8]) -> Option<PositionContext> {
    let mut in_string = false;
    let mut i = 0;
    while i < prefix.len() {
        match prefix[i] {
            b'"' => in_string = !in_string,
            b'\\' if in_string => i += 1,
            b'/' if !in_string && prefix.get(i + 1) == Some(&b'/') => {
                return Some(PositionContext::Other);
            }
            _ => {}
        }
        i += 1;
    }
    in_string.then_some(PositionContext::StringLiteral)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx(source: &str) -> PositionContext {
        // The cursor sits at the '|' marker.
        let offset = source.find('|').expect("cursor marker");
        let text = source.replace('|', "");
        position_context(&text, offset)
    }

    #[test]
    fn builtin_context() {
        assert_eq!(ctx("const std = @imp|"), PositionContext::Builtin);
        assert_eq!(ctx("@|"), PositionContext::Builtin);
    }

    #[test]
    fn var_access_context() {
        assert_eq!(ctx("const x = fo|"), PositionContext::VarAccess);
        assert_eq!(ctx("    retu|"), PositionContext::VarAccess);
    }

    #[test]
    fn field_access_context_spans_chain() {
        let source = "    std.mem.|";
        let offset = source.find('|').unwrap();
        let text = source.replace('|', "");
        match position_context(&text, offset) {
            PositionContext::FieldAccess(range) => {
                assert_eq!(&text[range], "std.mem.");
            }
            other => panic!("expected field access, got {other:?}"),
        }
    }

    #[test]
    fn field_access_through_calls_and_unwraps() {
        let source = "x = list.items(0).ptr.*.|";
        let offset = source.find('|').unwrap();
        let text = source.replace('|', "");
        match position_context(&text, offset) {
            PositionContext::FieldAccess(range) => {
                assert_eq!(&text[range], "list.items(0).ptr.*.");
            }
            other => panic!("expected field access, got {other:?}"),
        }
    }

    #[test]
    fn string_literal_context() {
        assert_eq!(ctx("const s = \"hel|lo\";"), PositionContext::StringLiteral);
        assert_eq!(ctx("@import(\"st|"), PositionContext::StringLiteral);
    }

    #[test]
    fn enum_literal_context() {
        assert_eq!(ctx("x = .re|"), PositionContext::EnumLiteral);
        assert_eq!(ctx("f(.|"), PositionContext::EnumLiteral);
    }

    #[test]
    fn global_error_set_context() {
        assert_eq!(ctx("return error.|"), PositionContext::GlobalErrorSet);
        assert_eq!(ctx("return error.NotFo|"), PositionContext::GlobalErrorSet);
    }

    #[test]
    fn label_context() {
        assert_eq!(ctx("break :|"), PositionContext::Label);
        assert_eq!(ctx("continue :lo|"), PositionContext::Label);
    }

    #[test]
    fn empty_context() {
        assert_eq!(ctx("|"), PositionContext::Empty);
        assert_eq!(ctx("    |"), PositionContext::Empty);
    }

    #[test]
    fn comment_is_other() {
        assert_eq!(ctx("// hel|lo"), PositionContext::Other);
    }

    #[test]
    fn number_range_is_other() {
        assert_eq!(ctx("for (items[0..|"), PositionContext::Other);
        assert_eq!(ctx("const f = 3.|"), PositionContext::Other);
    }

    #[test]
    fn identifier_range() {
        let text = "const abc = 12;";
        assert_eq!(identifier_range_at(text, 7), Some(6..9));
        assert_eq!(identifier_range_at(text, 9), Some(6..9));
        // Touching the end of the previous word still selects it.
        assert_eq!(identifier_range_at(text, 5), Some(0..5));
        // Number literals are not identifiers.
        assert_eq!(identifier_range_at(text, 13), None);
        assert_eq!(identifier_range_at(text, 11), None);
    }
}

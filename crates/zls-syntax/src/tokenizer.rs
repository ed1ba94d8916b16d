//! Single-pass tokenizer.
//!
//! Produces the full token array for a source buffer, comments included,
//! terminated by an `Eof` sentinel. Unknown bytes become `Invalid` tokens so
//! downstream consumers never see a gap.

use crate::token::{keyword_tag, Token, TokenTag};

/// Tokenize `source` into a token array ending with an `Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let tag = keyword_tag(&source[start..i]).unwrap_or(TokenTag::Identifier);
                tokens.push(Token { tag, start, end: i });
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    // Don't swallow a field access or range after the number.
                    if bytes[i] == b'.'
                        && !bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit())
                    {
                        break;
                    }
                    i += 1;
                }
                tokens.push(Token { tag: TokenTag::NumberLiteral, start, end: i });
            }
            b'@' => {
                let start = i;
                i += 1;
                if bytes.get(i) == Some(&b'"') {
                    // @"quoted identifier"
                    i += 1;
                    i = scan_string_body(bytes, i);
                    tokens.push(Token { tag: TokenTag::Identifier, start, end: i });
                } else if bytes.get(i).is_some_and(|c| c.is_ascii_alphabetic()) {
                    while i < bytes.len()
                        && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                    {
                        i += 1;
                    }
                    tokens.push(Token { tag: TokenTag::Builtin, start, end: i });
                } else {
                    tokens.push(Token { tag: TokenTag::Invalid, start, end: i });
                }
            }
            b'"' => {
                let start = i;
                i = scan_string_body(bytes, i + 1);
                tokens.push(Token { tag: TokenTag::StringLiteral, start, end: i });
            }
            b'\'' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'\'' {
                    i += 1;
                }
                tokens.push(Token { tag: TokenTag::CharLiteral, start, end: i });
            }
            b'/' => {
                if bytes.get(i + 1) == Some(&b'/') {
                    let start = i;
                    let tag = if bytes.get(i + 2) == Some(&b'/') && bytes.get(i + 3) != Some(&b'/')
                    {
                        TokenTag::DocComment
                    } else if bytes.get(i + 2) == Some(&b'!') {
                        TokenTag::ContainerDocComment
                    } else {
                        TokenTag::LineComment
                    };
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    tokens.push(Token { tag, start, end: i });
                } else if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tag: TokenTag::SlashEqual, start: i, end: i + 2 });
                    i += 2;
                } else {
                    tokens.push(Token { tag: TokenTag::Slash, start: i, end: i + 1 });
                    i += 1;
                }
            }
            b'.' => {
                let start = i;
                if bytes.get(i + 1) == Some(&b'*') {
                    tokens.push(Token { tag: TokenTag::PeriodAsterisk, start, end: i + 2 });
                    i += 2;
                } else if bytes.get(i + 1) == Some(&b'.') {
                    if bytes.get(i + 2) == Some(&b'.') {
                        tokens.push(Token { tag: TokenTag::Ellipsis3, start, end: i + 3 });
                        i += 3;
                    } else {
                        tokens.push(Token { tag: TokenTag::Ellipsis2, start, end: i + 2 });
                        i += 2;
                    }
                } else {
                    tokens.push(Token { tag: TokenTag::Period, start, end: i + 1 });
                    i += 1;
                }
            }
            b'=' => {
                let start = i;
                match bytes.get(i + 1) {
                    Some(b'=') => {
                        tokens.push(Token { tag: TokenTag::EqualEqual, start, end: i + 2 });
                        i += 2;
                    }
                    Some(b'>') => {
                        tokens.push(Token { tag: TokenTag::EqualArrow, start, end: i + 2 });
                        i += 2;
                    }
                    _ => {
                        tokens.push(Token { tag: TokenTag::Equal, start, end: i + 1 });
                        i += 1;
                    }
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tag: TokenTag::BangEqual, start: i, end: i + 2 });
                    i += 2;
                } else {
                    tokens.push(Token { tag: TokenTag::Bang, start: i, end: i + 1 });
                    i += 1;
                }
            }
            b'+' => {
                let (tag, len) = match bytes.get(i + 1) {
                    Some(b'+') => (TokenTag::PlusPlus, 2),
                    Some(b'=') => (TokenTag::PlusEqual, 2),
                    _ => (TokenTag::Plus, 1),
                };
                tokens.push(Token { tag, start: i, end: i + len });
                i += len;
            }
            b'-' | b'*' | b'%' | b'&' | b'|' => {
                let with_eq = bytes.get(i + 1) == Some(&b'=');
                let tag = match b {
                    b'-' if with_eq => TokenTag::MinusEqual,
                    b'-' => TokenTag::Minus,
                    b'*' if with_eq => TokenTag::AsteriskEqual,
                    b'*' => TokenTag::Asterisk,
                    b'%' if with_eq => TokenTag::PercentEqual,
                    b'%' => TokenTag::Percent,
                    b'&' if with_eq => TokenTag::AmpersandEqual,
                    b'&' => TokenTag::Ampersand,
                    b'|' if with_eq => TokenTag::PipeEqual,
                    _ => TokenTag::Pipe,
                };
                let len = if with_eq { 2 } else { 1 };
                tokens.push(Token { tag, start: i, end: i + len });
                i += len;
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tag: TokenTag::LAngleEqual, start: i, end: i + 2 });
                    i += 2;
                } else {
                    tokens.push(Token { tag: TokenTag::LAngle, start: i, end: i + 1 });
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tag: TokenTag::RAngleEqual, start: i, end: i + 2 });
                    i += 2;
                } else {
                    tokens.push(Token { tag: TokenTag::RAngle, start: i, end: i + 1 });
                    i += 1;
                }
            }
            _ => {
                let tag = match b {
                    b'(' => TokenTag::LParen,
                    b')' => TokenTag::RParen,
                    b'{' => TokenTag::LBrace,
                    b'}' => TokenTag::RBrace,
                    b'[' => TokenTag::LBracket,
                    b']' => TokenTag::RBracket,
                    b',' => TokenTag::Comma,
                    b';' => TokenTag::Semicolon,
                    b':' => TokenTag::Colon,
                    b'?' => TokenTag::Question,
                    _ => TokenTag::Invalid,
                };
                let len = if tag == TokenTag::Invalid {
                    // Consume the whole UTF-8 sequence so Invalid tokens stay
                    // on character boundaries.
                    source[i..].chars().next().map_or(1, char::len_utf8)
                } else {
                    1
                };
                tokens.push(Token { tag, start: i, end: i + len });
                i += len;
            }
        }
    }

    tokens.push(Token { tag: TokenTag::Eof, start: bytes.len(), end: bytes.len() });
    tokens
}

fn scan_string_body(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'\n' {
        if bytes[i] == b'\\' {
            i += 1;
        }
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'"' {
        i += 1;
    }
    i
}

/// Decode the contents of a string-literal token (quotes stripped, the
/// escapes the import scanner cares about resolved).
pub fn string_literal_value(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .unwrap_or(text)
        .strip_suffix('"')
        .unwrap_or_else(|| text.strip_prefix('"').unwrap_or(text));
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(source: &str) -> Vec<TokenTag> {
        tokenize(source).into_iter().map(|t| t.tag).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            tags("pub fn main"),
            vec![
                TokenTag::KeywordPub,
                TokenTag::KeywordFn,
                TokenTag::Identifier,
                TokenTag::Eof
            ]
        );
    }

    #[test]
    fn builtin_token_includes_at_sign() {
        let toks = tokenize("@import(\"std\")");
        assert_eq!(toks[0].tag, TokenTag::Builtin);
        assert_eq!(&"@import(\"std\")"[toks[0].start..toks[0].end], "@import");
        assert_eq!(toks[2].tag, TokenTag::StringLiteral);
    }

    #[test]
    fn comment_flavors() {
        assert_eq!(
            tags("//! container\n/// doc\n// plain\n//// not doc"),
            vec![
                TokenTag::ContainerDocComment,
                TokenTag::DocComment,
                TokenTag::LineComment,
                TokenTag::LineComment,
                TokenTag::Eof
            ]
        );
    }

    #[test]
    fn period_family() {
        assert_eq!(
            tags("a.b p.* x.? 0..2 a...b"),
            vec![
                TokenTag::Identifier,
                TokenTag::Period,
                TokenTag::Identifier,
                TokenTag::Identifier,
                TokenTag::PeriodAsterisk,
                TokenTag::Identifier,
                TokenTag::Period,
                TokenTag::Question,
                TokenTag::NumberLiteral,
                TokenTag::Ellipsis2,
                TokenTag::NumberLiteral,
                TokenTag::Identifier,
                TokenTag::Ellipsis3,
                TokenTag::Identifier,
                TokenTag::Eof
            ]
        );
    }

    #[test]
    fn number_does_not_swallow_field_access() {
        let toks = tokenize("1.max");
        assert_eq!(
            toks.iter().map(|t| t.tag).collect::<Vec<_>>(),
            vec![
                TokenTag::NumberLiteral,
                TokenTag::Period,
                TokenTag::Identifier,
                TokenTag::Eof
            ]
        );
    }

    #[test]
    fn float_literal_is_one_token() {
        assert_eq!(tags("3.14"), vec![TokenTag::NumberLiteral, TokenTag::Eof]);
    }

    #[test]
    fn string_with_escapes() {
        let toks = tokenize(r#""a\"b" x"#);
        assert_eq!(toks[0].tag, TokenTag::StringLiteral);
        assert_eq!(toks[1].tag, TokenTag::Identifier);
    }

    #[test]
    fn string_value_unescapes() {
        assert_eq!(string_literal_value(r#""a\\b\n""#), "a\\b\n");
        assert_eq!(string_literal_value("\"std\""), "std");
    }

    #[test]
    fn invalid_bytes_are_single_tokens() {
        let toks = tokenize("a $ b");
        assert_eq!(toks[1].tag, TokenTag::Invalid);
        assert_eq!(toks.len(), 4);
    }

    #[test]
    fn eof_spans_end() {
        let toks = tokenize("x");
        let eof = toks.last().unwrap();
        assert_eq!((eof.tag, eof.start, eof.end), (TokenTag::Eof, 1, 1));
    }
}

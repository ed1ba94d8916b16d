//! UTF-8/UTF-16 position tracking and conversion for the Zig language server.
//!
//! LSP clients address text by `{line, character}` where `character` counts
//! UTF-16 code units by default; everything on the server side works in byte
//! offsets into UTF-8 source. This crate provides the [`LineIndex`] line-start
//! cache and the conversions between the two worlds, parameterized by the
//! [`PositionEncoding`] negotiated during `initialize`.
//!
//! # Examples
//!
//! ```
//! use zls_position_tracking::{LineIndex, PositionEncoding};
//!
//! let text = "const a = 1;\nconst b = 2;\n";
//! let index = LineIndex::new(text);
//!
//! let pos = index.offset_to_position(text, 19, PositionEncoding::Utf16);
//! assert_eq!((pos.line, pos.character), (1, 6));
//! assert_eq!(index.position_to_offset(text, pos, PositionEncoding::Utf16), 19);
//! ```

use lsp_types::{Position, Range};

/// Column encoding negotiated with the client.
///
/// UTF-16 is the LSP default; UTF-8 is used when the client advertises
/// `positionEncodings` containing `"utf-8"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionEncoding {
    /// Columns count UTF-8 bytes from the line start.
    Utf8,
    /// Columns count UTF-16 code units from the line start (surrogate pairs
    /// count as two).
    #[default]
    Utf16,
}

/// Byte offsets of every line start, for O(log n) offset ↔ position lookups.
///
/// The index does not own the text; callers pass the same text the index was
/// built from. Lines are delimited by `\n` (so `\r\n` is a single break and
/// the `\r` byte counts toward the preceding line's width only in UTF-8
/// columns, where it is never addressed by a valid client position).
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build the line-start table for `text`.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Number of lines (always at least one).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of the start of `line`, clamped to the last line.
    pub fn line_start(&self, line: usize) -> usize {
        let line = line.min(self.line_starts.len() - 1);
        self.line_starts[line]
    }

    /// Convert an absolute byte offset to an LSP position.
    ///
    /// Offsets past the end of `text` clamp to the final position. Offsets
    /// inside a multi-byte sequence are rounded down to the character start.
    pub fn offset_to_position(&self, text: &str, offset: usize, enc: PositionEncoding) -> Position {
        let mut offset = offset.min(text.len());
        while offset > 0 && !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self
            .line_starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i.saturating_sub(1));
        let line_start = self.line_starts[line];
        let prefix = &text[line_start..offset];
        let character = match enc {
            PositionEncoding::Utf8 => prefix.len(),
            PositionEncoding::Utf16 => prefix.chars().map(char::len_utf16).sum(),
        };
        Position { line: line as u32, character: character as u32 }
    }

    /// Convert an LSP position to an absolute byte offset.
    ///
    /// Out-of-range lines clamp to the end of the text; out-of-range columns
    /// clamp to the end of the line (excluding its terminator). A UTF-16
    /// column landing inside a surrogate pair snaps to the character start.
    pub fn position_to_offset(&self, text: &str, pos: Position, enc: PositionEncoding) -> usize {
        let line = pos.line as usize;
        if line >= self.line_starts.len() {
            return text.len();
        }
        let line_start = self.line_starts[line];
        let line_end = self.line_end(text, line);
        let line_text = &text[line_start..line_end];

        match enc {
            PositionEncoding::Utf8 => {
                let mut col = (pos.character as usize).min(line_text.len());
                while col > 0 && !line_text.is_char_boundary(col) {
                    col -= 1;
                }
                line_start + col
            }
            PositionEncoding::Utf16 => {
                let target = pos.character as usize;
                let mut units = 0;
                for (byte, ch) in line_text.char_indices() {
                    if units >= target {
                        return line_start + byte;
                    }
                    units += ch.len_utf16();
                }
                line_end
            }
        }
    }

    /// Convert a byte range (such as a token's source span) to an LSP range.
    pub fn range(&self, text: &str, start: usize, end: usize, enc: PositionEncoding) -> Range {
        Range {
            start: self.offset_to_position(text, start, enc),
            end: self.offset_to_position(text, end, enc),
        }
    }

    /// Convert an LSP range back to byte offsets, start clamped before end.
    pub fn range_to_offsets(&self, text: &str, range: Range, enc: PositionEncoding) -> (usize, usize) {
        let start = self.position_to_offset(text, range.start, enc);
        let end = self.position_to_offset(text, range.end, enc);
        (start.min(end), end.max(start))
    }

    /// End of `line` excluding the `\n` terminator (and a trailing `\r`).
    fn line_end(&self, text: &str, line: usize) -> usize {
        let mut end = if line + 1 < self.line_starts.len() {
            self.line_starts[line + 1] - 1
        } else {
            return text.len();
        };
        if end > self.line_starts[line] && text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn pos(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn ascii_round_trip() {
        let text = "fn add(a: i32) i32 {\n    return a;\n}\n";
        let index = LineIndex::new(text);
        for enc in [PositionEncoding::Utf8, PositionEncoding::Utf16] {
            assert_eq!(index.offset_to_position(text, 0, enc), pos(0, 0));
            assert_eq!(index.offset_to_position(text, 25, enc), pos(1, 4));
            assert_eq!(index.position_to_offset(text, pos(1, 4), enc), 25);
        }
    }

    #[test]
    fn utf16_counts_surrogate_pairs_as_two() {
        // '𝕫' is U+1D56B: 4 bytes in UTF-8, a surrogate pair in UTF-16.
        let text = "const 𝕫 = 1;";
        let index = LineIndex::new(text);
        let after = 6 + '𝕫'.len_utf8();
        assert_eq!(index.offset_to_position(text, after, PositionEncoding::Utf16), pos(0, 8));
        assert_eq!(index.offset_to_position(text, after, PositionEncoding::Utf8), pos(0, 10));
        assert_eq!(index.position_to_offset(text, pos(0, 8), PositionEncoding::Utf16), after);
    }

    #[test]
    fn utf16_column_inside_surrogate_pair_snaps_to_char_start() {
        let text = "𝕫x";
        let index = LineIndex::new(text);
        assert_eq!(index.position_to_offset(text, pos(0, 1), PositionEncoding::Utf16), 0);
        assert_eq!(index.position_to_offset(text, pos(0, 2), PositionEncoding::Utf16), 4);
    }

    #[test]
    fn crlf_is_one_line_break() {
        let text = "a\r\nb\r\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.offset_to_position(text, 3, PositionEncoding::Utf16), pos(1, 0));
        // Column clamping stops before the \r\n terminator.
        assert_eq!(index.position_to_offset(text, pos(0, 10), PositionEncoding::Utf16), 1);
    }

    #[test]
    fn out_of_range_positions_clamp() {
        let text = "short\n";
        let index = LineIndex::new(text);
        assert_eq!(index.position_to_offset(text, pos(9, 0), PositionEncoding::Utf16), text.len());
        assert_eq!(index.offset_to_position(text, 999, PositionEncoding::Utf16), pos(1, 0));
    }

    #[test]
    fn empty_text() {
        let text = "";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.offset_to_position(text, 0, PositionEncoding::Utf16), pos(0, 0));
        assert_eq!(index.position_to_offset(text, pos(0, 0), PositionEncoding::Utf16), 0);
    }

    proptest! {
        // byte_to_position(position_to_byte(p)) = p for every valid position,
        // exercised via char-boundary offsets in mixed-width text.
        #[test]
        fn round_trip_offsets(s in "[a-z√ 𝕫\n]{0,40}") {
            let index = LineIndex::new(&s);
            for enc in [PositionEncoding::Utf8, PositionEncoding::Utf16] {
                for (offset, _) in s.char_indices().chain(std::iter::once((s.len(), ' '))) {
                    let p = index.offset_to_position(&s, offset, enc);
                    prop_assert_eq!(index.position_to_offset(&s, p, enc), offset);
                }
            }
        }
    }
}

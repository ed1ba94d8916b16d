//! Rope-backed text buffer with incremental LSP edit application.
//!
//! The rope gives O(log n) edits; the cached string is the authoritative
//! representation handed to the parser and the position index. Both are
//! refreshed together after every change, so byte offsets computed against
//! `text` are always valid for the current buffer.

use lsp_types::TextDocumentContentChangeEvent;
use ropey::Rope;
use zls_position_tracking::{LineIndex, PositionEncoding};

/// One document's text buffer.
#[derive(Debug, Clone)]
pub struct Document {
    /// Rope-backed content, the edit target.
    pub rope: Rope,
    /// Cached string content, synchronized with the rope.
    pub text: String,
    /// Line-start cache over `text`.
    pub line_index: LineIndex,
}

impl Document {
    pub fn new(text: String) -> Self {
        let rope = Rope::from_str(&text);
        let line_index = LineIndex::new(&text);
        Self { rope, text, line_index }
    }

    /// Replace the whole buffer.
    pub fn replace_all(&mut self, text: String) {
        self.rope = Rope::from_str(&text);
        self.line_index = LineIndex::new(&text);
        self.text = text;
    }

    /// Replace the byte range `[start, end)` with `new_text`.
    pub fn replace(&mut self, start: usize, end: usize, new_text: &str) {
        let start_char = self.rope.byte_to_char(start.min(self.rope.len_bytes()));
        let end_char = self.rope.byte_to_char(end.min(self.rope.len_bytes()));
        if start_char < end_char {
            self.rope.remove(start_char..end_char);
        }
        if !new_text.is_empty() {
            self.rope.insert(start_char, new_text);
        }
        self.text = self.rope.to_string();
        self.line_index = LineIndex::new(&self.text);
    }

    /// Apply one LSP content change in the negotiated position encoding.
    ///
    /// A change without a range replaces the entire document.
    pub fn apply_change(&mut self, change: &TextDocumentContentChangeEvent, enc: PositionEncoding) {
        match change.range {
            Some(range) => {
                let (start, end) = self.line_index.range_to_offsets(&self.text, range, enc);
                self.replace(start, end, &change.text);
            }
            None => self.replace_all(change.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Position, Range};
    use pretty_assertions::assert_eq;

    fn change(range: Option<Range>, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent { range, range_length: None, text: text.to_string() }
    }

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range {
            start: Position { line: sl, character: sc },
            end: Position { line: el, character: ec },
        }
    }

    #[test]
    fn full_replacement() {
        let mut doc = Document::new("old".to_string());
        doc.apply_change(&change(None, "new text"), PositionEncoding::Utf16);
        assert_eq!(doc.text, "new text");
        assert_eq!(doc.rope.to_string(), "new text");
    }

    #[test]
    fn incremental_edit_matches_string_splicing() {
        let mut doc = Document::new("const x = 1;\nconst y = 2;\n".to_string());
        doc.apply_change(&change(Some(range(0, 6, 0, 7)), "abc"), PositionEncoding::Utf16);
        assert_eq!(doc.text, "const abc = 1;\nconst y = 2;\n");
    }

    #[test]
    fn multiple_edits_apply_in_order() {
        let mut doc = Document::new("ab".to_string());
        doc.apply_change(&change(Some(range(0, 1, 0, 1)), "X"), PositionEncoding::Utf16);
        doc.apply_change(&change(Some(range(0, 3, 0, 3)), "Y"), PositionEncoding::Utf16);
        assert_eq!(doc.text, "aXbY");
    }

    #[test]
    fn utf16_edit_after_surrogate_pair() {
        // '𝕫' counts as two UTF-16 units, so character 3 follows "a𝕫".
        let mut doc = Document::new("a𝕫b".to_string());
        doc.apply_change(&change(Some(range(0, 3, 0, 4)), "c"), PositionEncoding::Utf16);
        assert_eq!(doc.text, "a𝕫c");
    }

    #[test]
    fn utf8_encoding_counts_bytes() {
        let mut doc = Document::new("a𝕫b".to_string());
        doc.apply_change(&change(Some(range(0, 5, 0, 6)), "c"), PositionEncoding::Utf8);
        assert_eq!(doc.text, "a𝕫c");
    }

    #[test]
    fn insertion_at_end_of_document() {
        let mut doc = Document::new("x".to_string());
        doc.apply_change(&change(Some(range(0, 1, 0, 1)), "y"), PositionEncoding::Utf16);
        assert_eq!(doc.text, "xy");
    }

    #[test]
    fn deletion_across_lines() {
        let mut doc = Document::new("one\ntwo\nthree".to_string());
        doc.apply_change(&change(Some(range(0, 3, 2, 0)), " "), PositionEncoding::Utf16);
        assert_eq!(doc.text, "one three");
    }
}

//! Completion Normalization
//!
//! Turns the service's raw completion items into editor-ready
//! [`CompletionItem`]s: assembles inline parts, builds the single-line hint,
//! and carries the replace range and post-insertion caret adjustment.

pub mod coalescer;
pub mod hint;

use crate::protocol::{
    CompletionPartKind, CursorPosition, DocumentState, EditorOptions, Language, RawCompletionItem,
};
use crate::sink::Position;

pub use coalescer::{CompletionCoalescer, Generation};

/// A host-side snapshot of the document a completion is requested for
#[derive(Clone, Debug)]
pub struct DocumentSnapshot {
    /// Full document text
    pub text: String,
    /// Editor language id (e.g. "python")
    pub editor_language: String,
    /// Caret location
    pub cursor: Position,
    /// Tab width in columns
    pub tab_size: u32,
    /// Whether the editor inserts spaces for tabs
    pub insert_spaces: bool,
}

impl DocumentSnapshot {
    /// Build the wire document state for this snapshot
    #[must_use]
    pub fn document_state(&self) -> DocumentState {
        DocumentState {
            text: self.text.clone(),
            editor_language: self.editor_language.clone(),
            language: Language::from_editor_language(&self.editor_language),
            cursor_position: CursorPosition {
                row: self.cursor.row,
                col: self.cursor.col,
            },
        }
    }

    /// Build the wire editor options for this snapshot
    #[must_use]
    pub fn editor_options(&self) -> EditorOptions {
        EditorOptions {
            tab_size: self.tab_size,
            insert_spaces: self.insert_spaces,
        }
    }

    /// Leading whitespace of the caret's line
    ///
    /// Used as left padding when a hint block is wrapped for display.
    #[must_use]
    pub fn cursor_line_indent(&self) -> String {
        let line = self
            .text
            .split('\n')
            .nth(self.cursor.row as usize)
            .unwrap_or("");
        line.chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }
}

/// A normalized completion suggestion
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionItem {
    /// Single-line display hint (control characters collapsed to spaces)
    pub hint: String,
    /// Full text inserted when the item is accepted
    pub insert_text: String,
    /// Text placed after the caret on acceptance
    pub suffix_text: String,
    /// Concatenated inline parts
    pub inline_text: String,
    /// The already-typed portion of the line the inline parts extend
    pub inline_mask_text: String,
    /// Whole-line block portion
    pub block_text: String,
    /// Inclusive start of the document span to replace
    pub range_start: Position,
    /// Exclusive end of the document span to replace
    pub range_end: Position,
    /// Signed caret offset applied after insertion
    pub cursor_offset_delta: i64,
}

impl CompletionItem {
    /// Insertion text followed by the suffix
    #[must_use]
    pub fn full_text(&self) -> String {
        let mut text = self.insert_text.clone();
        text.push_str(&self.suffix_text);
        text
    }
}

/// Normalize a raw response batch
///
/// The returned batch fully replaces any previously stored one; batches are
/// never merged.
#[must_use]
pub fn normalize(items: Vec<RawCompletionItem>) -> Vec<CompletionItem> {
    items.into_iter().map(normalize_item).collect()
}

fn normalize_item(item: RawCompletionItem) -> CompletionItem {
    let mut inline_text = String::new();
    let mut inline_mask_text = String::new();
    let mut block_text = String::new();
    let mut inline_seen = false;

    for part in item.completion_parts {
        match part.kind {
            CompletionPartKind::Inline => {
                // The first inline part stands alone; later ones are joined
                // through their prefix.
                if inline_seen {
                    inline_text.push_str(&part.prefix);
                }
                inline_text.push_str(&part.text);
                inline_seen = true;
            }
            CompletionPartKind::InlineMask => inline_mask_text = part.text,
            CompletionPartKind::Block => block_text = part.text,
            CompletionPartKind::Unknown => {}
        }
    }

    let (suffix_text, cursor_offset_delta) = match item.suffix {
        Some(suffix) => (suffix.text, suffix.delta_cursor_offset),
        None => (String::new(), 0),
    };

    let hint = if inline_text.is_empty() {
        collapse_controls(&item.completion.text)
    } else {
        let mut hint = collapse_controls(&inline_text);
        hint.push(' ');
        hint.push_str(&collapse_controls(&block_text));
        hint
    };

    CompletionItem {
        hint,
        insert_text: item.completion.text,
        suffix_text,
        inline_text,
        inline_mask_text,
        block_text,
        range_start: Position::new(item.range.start_position.row, item.range.start_position.col),
        range_end: Position::new(item.range.end_position.row, item.range.end_position.col),
        cursor_offset_delta,
    }
}

/// Collapse control characters (newlines included) to single spaces
fn collapse_controls(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CompletionResponse;

    fn sample_response() -> CompletionResponse {
        serde_json::from_str(
            r#"{
                "completionItems": [{
                    "completion": {"text": "for i in range(10):\n    print(i)"},
                    "completionParts": [
                        {"type": "COMPLETION_PART_TYPE_INLINE", "text": "for i in "},
                        {"type": "COMPLETION_PART_TYPE_INLINE", "prefix": "range(", "text": "10):"},
                        {"type": "COMPLETION_PART_TYPE_BLOCK", "text": "    print(i)"}
                    ],
                    "range": {
                        "startPosition": {"row": "2"},
                        "endPosition": {"row": "2", "col": "7"}
                    },
                    "suffix": {"text": "\n", "deltaCursorOffset": "-1"}
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_assembles_parts() {
        let items = normalize(sample_response().completion_items);
        assert_eq!(items.len(), 1);
        let item = &items[0];

        assert_eq!(item.inline_text, "for i in range(10):");
        assert_eq!(item.block_text, "    print(i)");
        assert_eq!(item.hint, "for i in range(10):     print(i)");
        assert_eq!(item.range_start, Position::new(2, 0));
        assert_eq!(item.range_end, Position::new(2, 7));
        assert_eq!(item.cursor_offset_delta, -1);
        assert_eq!(item.suffix_text, "\n");
    }

    #[test]
    fn test_hint_falls_back_to_completion_text() {
        let raw: RawCompletionItem = serde_json::from_str(
            r#"{"completion": {"text": "line one\nline two"}}"#,
        )
        .unwrap();
        let item = normalize(vec![raw]).remove(0);
        assert_eq!(item.hint, "line one line two");
        assert!(item.inline_text.is_empty());
    }

    #[test]
    fn test_full_text_concatenates_suffix() {
        let item = CompletionItem {
            insert_text: "call(".into(),
            suffix_text: ")".into(),
            ..CompletionItem::default()
        };
        assert_eq!(item.full_text(), "call()");
    }

    #[test]
    fn test_snapshot_indent_and_wire_mapping() {
        let snapshot = DocumentSnapshot {
            text: "def f():\n    pass\n".into(),
            editor_language: "python".into(),
            cursor: Position::new(1, 4),
            tab_size: 4,
            insert_spaces: true,
        };

        assert_eq!(snapshot.cursor_line_indent(), "    ");
        let doc = snapshot.document_state();
        assert_eq!(doc.language, Language::Python);
        assert_eq!(doc.cursor_position.row, 1);
    }
}

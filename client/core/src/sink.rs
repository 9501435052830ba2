//! Output Sinks
//!
//! The editor-facing output surface. Conversation text and applied
//! completions are written into an [`OutputSink`] — in a real editor a
//! document tab, here abstracted so the core stays free of UI dependencies.
//!
//! Sinks are owned and mutated by the host loop only. Worker tasks never
//! touch a sink; they post events the host applies.

use std::fmt;

/// Zero-based row/column location in a sink
///
/// Columns count bytes, matching the wire protocol's cursor positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// Zero-based line
    pub row: u32,
    /// Zero-based byte column
    pub col: u32,
}

impl Position {
    /// Create a position
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// An output surface text is written into
///
/// Mirrors the narrow slice of editor API the client needs: ranged
/// replacement, appends, caret control, offset conversion, and validity.
/// A sink becomes invalid when the user closes its tab; every write is
/// preceded by an `is_valid` check.
pub trait OutputSink: Send {
    /// Whether the underlying surface still exists
    fn is_valid(&self) -> bool;

    /// Append text at the end of the sink
    fn append(&mut self, text: &str);

    /// Replace the span `[start, end)` with `text`
    ///
    /// Returns the caret position immediately after the inserted text.
    fn replace_range(&mut self, start: Position, end: Position, text: &str) -> Position;

    /// Move the caret
    fn set_caret(&mut self, pos: Position);

    /// Current caret position
    fn caret(&self) -> Position;

    /// Byte offset of a position from the start of the sink
    fn offset_at(&self, pos: Position) -> usize;

    /// Position of a byte offset from the start of the sink
    fn position_at(&self, offset: usize) -> Position;

    /// Position just past the last byte of content
    fn end_position(&self) -> Position;

    /// Clear the modified indicator
    fn mark_unmodified(&mut self);

    /// Show or clear the transient busy marker
    fn set_busy(&mut self, busy: bool);
}

/// Creates output sinks on demand
///
/// The registry calls this exactly once per conversation, when the
/// conversation is first resolved. A released conversation is never
/// re-created.
pub trait SinkFactory: Send {
    /// Create a new sink titled `title`
    fn create(&mut self, title: &str) -> Box<dyn OutputSink>;
}

/// In-memory sink for tests and headless operation
#[derive(Debug, Default)]
pub struct BufferSink {
    text: String,
    caret: Position,
    closed: bool,
    modified: bool,
    busy: bool,
}

impl BufferSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Simulate the user closing the tab
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether any write happened since the last `mark_unmodified`
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether the busy marker is shown
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl OutputSink for BufferSink {
    fn is_valid(&self) -> bool {
        !self.closed
    }

    fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.modified = true;
    }

    fn replace_range(&mut self, start: Position, end: Position, text: &str) -> Position {
        let start_off = self.offset_at(start);
        let end_off = self.offset_at(end).max(start_off);
        self.text.replace_range(start_off..end_off, text);
        self.modified = true;
        let caret = self.position_at(start_off + text.len());
        self.caret = caret;
        caret
    }

    fn set_caret(&mut self, pos: Position) {
        self.caret = pos;
    }

    fn caret(&self) -> Position {
        self.caret
    }

    fn offset_at(&self, pos: Position) -> usize {
        let mut offset = 0;
        for (row, line) in self.text.split('\n').enumerate() {
            if row as u32 == pos.row {
                return offset + (pos.col as usize).min(line.len());
            }
            offset += line.len() + 1;
        }
        self.text.len()
    }

    fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let before = &self.text[..offset];
        let row = before.matches('\n').count() as u32;
        let col = match before.rfind('\n') {
            Some(nl) => before.len() - nl - 1,
            None => before.len(),
        } as u32;
        Position { row, col }
    }

    fn end_position(&self) -> Position {
        self.position_at(self.text.len())
    }

    fn mark_unmodified(&mut self) {
        self.modified = false;
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }
}

/// Factory producing fresh [`BufferSink`]s
#[derive(Debug, Default)]
pub struct BufferSinkFactory;

impl SinkFactory for BufferSinkFactory {
    fn create(&mut self, _title: &str) -> Box<dyn OutputSink> {
        Box::new(BufferSink::new())
    }
}

//! Rope-backed document text and immutable snapshots.

use crate::edit::{Edit, Revision};
use crate::error::EditError;
use crate::range::ByteRange;
use ropey::Rope;

/// A row/column position, column counted in bytes from the start of the row.
///
/// Rows are separated by `\n` only, the same convention incremental parsers use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextPoint {
    /// Zero-based row.
    pub row: usize,
    /// Zero-based byte column.
    pub column: usize,
}

/// Immutable view of the document text at one revision.
///
/// Cloning is cheap: rope nodes are shared, never copied.
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshot {
    revision: Revision,
    text: Rope,
}

impl DocumentSnapshot {
    /// Create a snapshot of `text` at `revision`.
    pub fn new(revision: Revision, text: Rope) -> Self {
        Self { revision, text }
    }

    /// Create a snapshot from a string.
    pub fn from_text(revision: Revision, text: &str) -> Self {
        Self::new(revision, Rope::from_str(text))
    }

    /// Revision this snapshot represents.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// The text.
    pub fn text(&self) -> &Rope {
        &self.text
    }

    /// Length in bytes.
    pub fn len_bytes(&self) -> usize {
        self.text.len_bytes()
    }

    /// Returns `true` for an empty document.
    pub fn is_empty(&self) -> bool {
        self.text.len_bytes() == 0
    }

    /// The whole document as a range.
    pub fn full_range(&self) -> ByteRange {
        ByteRange::new(0, self.len_bytes())
    }

    /// Row/column of `byte`, clamped to the document end.
    pub fn point_at(&self, byte: usize) -> TextPoint {
        point_at(&self.text, byte)
    }

    /// Bytes from `byte` to the end of the rope chunk containing it.
    ///
    /// Returns an empty slice at or past the end of the document.
    pub fn chunk_from(&self, byte: usize) -> &[u8] {
        if byte >= self.text.len_bytes() {
            return &[];
        }
        let (chunk, chunk_start, _, _) = self.text.chunk_at_byte(byte);
        &chunk.as_bytes()[byte - chunk_start..]
    }

    /// Copy the text of `range` (clamped to the document) into a `String`.
    pub fn slice_to_string(&self, range: ByteRange) -> String {
        let range = range.clamp_to(self.len_bytes());
        self.text.byte_slice(range.start..range.end).to_string()
    }

    /// The snapshot produced by applying `edit` to this one.
    ///
    /// The result carries the edit's revision. `self` is left untouched.
    pub fn apply_edit(&self, edit: &Edit) -> Result<DocumentSnapshot, EditError> {
        let mut text = self.text.clone();
        apply_to_rope(&mut text, edit)?;
        Ok(DocumentSnapshot::new(edit.revision, text))
    }

    /// Grow `range` to whole lines: from the start of its first line to the end of its last
    /// line (including the trailing newline, if any).
    pub fn expand_to_lines(&self, range: ByteRange) -> ByteRange {
        let len = self.len_bytes();
        let range = range.clamp_to(len);
        let first_line = self.text.byte_to_line(range.start);
        let last_line = self.text.byte_to_line(range.end.saturating_sub(1).max(range.start));
        let start = self.text.line_to_byte(first_line);
        let end = if last_line + 1 < self.text.len_lines() {
            self.text.line_to_byte(last_line + 1)
        } else {
            len
        };
        ByteRange::new(start, end.max(range.end))
    }
}

fn point_at(text: &Rope, byte: usize) -> TextPoint {
    let byte = byte.min(text.len_bytes());
    let row = text.byte_to_line(byte);
    TextPoint {
        row,
        column: byte - text.line_to_byte(row),
    }
}

fn is_char_boundary(text: &Rope, byte: usize) -> bool {
    byte == text.len_bytes() || text.char_to_byte(text.byte_to_char(byte)) == byte
}

fn apply_to_rope(text: &mut Rope, edit: &Edit) -> Result<(), EditError> {
    edit.validate(text.len_bytes())?;
    for offset in [edit.range.start, edit.range.end] {
        if !is_char_boundary(text, offset) {
            return Err(EditError::NotCharBoundary(offset));
        }
    }

    let start_char = text.byte_to_char(edit.range.start);
    let end_char = text.byte_to_char(edit.range.end);
    text.remove(start_char..end_char);
    text.insert(start_char, &edit.text);
    Ok(())
}

/// Callback invoked with every edit applied to a [`Document`].
pub type EditCallback = Box<dyn FnMut(&Edit) + Send>;

/// Editable document text.
///
/// Applies edits, stamps them with a revision and notifies subscribers. The highlighter never
/// owns a `Document`; it receives [`DocumentSnapshot`]s and edits.
pub struct Document {
    text: Rope,
    revision: Revision,
    callbacks: Vec<EditCallback>,
}

impl Document {
    /// Create a document at revision 0.
    pub fn new(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
            revision: 0,
            callbacks: Vec::new(),
        }
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Length in bytes.
    pub fn len_bytes(&self) -> usize {
        self.text.len_bytes()
    }

    /// Returns `true` for an empty document.
    pub fn is_empty(&self) -> bool {
        self.text.len_bytes() == 0
    }

    /// The current text.
    pub fn text(&self) -> &Rope {
        &self.text
    }

    /// Snapshot of the current text and revision.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::new(self.revision, self.text.clone())
    }

    /// Subscribe to applied edits.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&Edit) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Apply `edit`, bump the revision and return the stamped edit.
    pub fn apply(&mut self, mut edit: Edit) -> Result<Edit, EditError> {
        apply_to_rope(&mut self.text, &edit)?;
        self.revision += 1;
        edit.revision = self.revision;
        for callback in &mut self.callbacks {
            callback(&edit);
        }
        Ok(edit)
    }

    /// Insert `text` at `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<Edit, EditError> {
        self.apply(Edit::insert(offset, text))
    }

    /// Delete `range`.
    pub fn delete(&mut self, range: impl Into<ByteRange>) -> Result<Edit, EditError> {
        self.apply(Edit::delete(range))
    }

    /// Replace `range` with `text`.
    pub fn replace(&mut self, range: impl Into<ByteRange>, text: &str) -> Result<Edit, EditError> {
        self.apply(Edit::replace(range, text))
    }

    /// Replace the whole document.
    pub fn set_text(&mut self, text: &str) -> Edit {
        let edit = Edit::replace(ByteRange::new(0, self.text.len_bytes()), text);
        self.text = Rope::from_str(text);
        self.revision += 1;
        let edit = Edit {
            revision: self.revision,
            ..edit
        };
        for callback in &mut self.callbacks {
            callback(&edit);
        }
        edit
    }
}

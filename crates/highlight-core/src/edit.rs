//! Document edits and the edit log.
//!
//! An [`Edit`] describes one contiguous replacement in byte offsets. Edits are ordered: each one
//! is expressed against the document produced by the previous edit, so applying a batch in log
//! order transforms one snapshot into the next.
//!
//! The [`EditLog`] records edits since the last reconciled parse. Every recorded edit advances
//! the revision by one; a consumer holding work keyed to an older revision knows that work is
//! superseded.

use crate::error::EditError;
use crate::range::{ByteRange, RangeSet};

/// Monotonic document revision.
pub type Revision = u64;

/// A single contiguous replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Revision produced by this edit (stamped when recorded).
    pub revision: Revision,
    /// Replaced byte range in the document before this edit.
    pub range: ByteRange,
    /// Inserted text (may be empty).
    pub text: String,
}

impl Edit {
    /// Replace `range` with `text`.
    pub fn replace(range: impl Into<ByteRange>, text: impl Into<String>) -> Self {
        Self {
            revision: 0,
            range: range.into(),
            text: text.into(),
        }
    }

    /// Insert `text` at `offset`.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::replace(ByteRange::empty_at(offset), text)
    }

    /// Delete `range`.
    pub fn delete(range: impl Into<ByteRange>) -> Self {
        Self::replace(range, String::new())
    }

    /// Length of the inserted text in bytes.
    pub fn replacement_len(&self) -> usize {
        self.text.len()
    }

    /// Range covered by the inserted text after the edit is applied.
    pub fn new_range(&self) -> ByteRange {
        ByteRange::new(self.range.start, self.range.start + self.replacement_len())
    }

    /// Signed change in document length.
    pub fn delta(&self) -> isize {
        self.replacement_len() as isize - self.range.len() as isize
    }

    /// Returns `true` if the edit neither removes nor inserts anything.
    pub fn is_noop(&self) -> bool {
        self.range.is_empty() && self.text.is_empty()
    }

    /// Check the edit against a document of `len` bytes.
    pub fn validate(&self, len: usize) -> Result<(), EditError> {
        if self.range.end < self.range.start {
            return Err(EditError::InvertedRange(self.range));
        }
        if self.range.end > len {
            return Err(EditError::OutOfBounds {
                range: self.range,
                len,
            });
        }
        Ok(())
    }
}

/// Ordered record of edits since the last reconciled parse.
#[derive(Debug, Clone, Default)]
pub struct EditLog {
    revision: Revision,
    len: usize,
    pending: Vec<Edit>,
}

impl EditLog {
    /// Create a log for a document of `len` bytes at `revision`.
    pub fn new(revision: Revision, len: usize) -> Self {
        Self {
            revision,
            len,
            pending: Vec::new(),
        }
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Document length in bytes after every recorded edit.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tracked document is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Edits recorded since the last [`take_pending`](Self::take_pending).
    pub fn pending(&self) -> &[Edit] {
        &self.pending
    }

    /// Returns `true` if edits are waiting for a re-parse.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Append an edit, bump the revision and return it.
    ///
    /// The edit is stamped with the new revision. Adjacent edits are not coalesced.
    pub fn record(&mut self, mut edit: Edit) -> Result<Revision, EditError> {
        edit.validate(self.len)?;
        self.revision += 1;
        self.len = self.len - edit.range.len() + edit.replacement_len();
        edit.revision = self.revision;
        self.pending.push(edit);
        Ok(self.revision)
    }

    /// Drain the pending batch in log order.
    pub fn take_pending(&mut self) -> Vec<Edit> {
        std::mem::take(&mut self.pending)
    }

    /// Forget pending edits and re-base the log on a full document at `revision`.
    pub fn reset(&mut self, revision: Revision, len: usize) {
        self.revision = revision;
        self.len = len;
        self.pending.clear();
    }
}

/// Replacement spans of `edits`, expressed in coordinates of the document after the last edit.
///
/// Every span is carried forward through the later edits of the batch, so a span partly
/// overwritten by a later edit still covers the text that replaced it.
pub fn edited_spans(edits: &[Edit]) -> RangeSet {
    let mut spans = RangeSet::new();
    for edit in edits {
        spans.apply_edit(edit);
        let new_range = edit.new_range();
        if new_range.is_empty() {
            // Deletions leave a seam between two formerly separate tokens.
            spans.insert(ByteRange::new(new_range.start, new_range.start + 1));
        } else {
            spans.insert(new_range);
        }
    }
    spans
}

//! Errors of the core data model.

use crate::range::ByteRange;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced when recording or applying an [`Edit`](crate::Edit).
pub enum EditError {
    #[error("edit range {}..{} is out of bounds for a document of {len} bytes", .range.start, .range.end)]
    /// The edited range extends past the end of the document.
    OutOfBounds {
        /// Offending range.
        range: ByteRange,
        /// Document length in bytes.
        len: usize,
    },

    #[error("edit range {}..{} ends before it starts", .0.start, .0.end)]
    /// `end < start`.
    InvertedRange(ByteRange),

    #[error("byte offset {0} is not on a UTF-8 character boundary")]
    /// An edit boundary splits a multi-byte character.
    NotCharBoundary(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced by [`RangeIndex::replace`](crate::RangeIndex::replace).
pub enum RangeIndexError {
    #[error("replacement leaves a gap at byte {0}")]
    /// The replacement ranges do not start where the previous one ended.
    Gap(usize),

    #[error("replacement ranges overlap at byte {0}")]
    /// A replacement range starts before the previous one ended.
    Overlap(usize),

    #[error("replacement covers ..{actual} but the replaced range ends at {expected}")]
    /// The replacement ranges end before or after the replaced range.
    Extent {
        /// End of the replaced range.
        expected: usize,
        /// End of the last replacement range.
        actual: usize,
    },

    #[error("replacement contains an empty range at byte {0}")]
    /// One of the replacement ranges is empty.
    EmptyPiece(usize),
}

//! Style range index.
//!
//! Maps byte ranges of the document to style categories. Entries are non-overlapping, non-empty
//! and sorted by start offset, so both ends are monotonic and every lookup is a binary search.
//!
//! The index is shifted eagerly when an edit lands ([`RangeIndex::apply_edit`]) and patched when
//! classification results arrive ([`RangeIndex::replace`]). Anything not covered by an entry
//! reads back as [`StyleCategory::Unclassified`].

use crate::error::RangeIndexError;
use crate::range::ByteRange;
use crate::style::{StyleCategory, StyleRange, push_coalesced};

/// Ordered, non-overlapping index of style ranges.
///
/// Query complexity: O(log n + k), where k is the number of entries intersecting the query.
/// Replacement complexity: O(n) in the worst case (vector splice).
#[derive(Debug, Clone, Default)]
pub struct RangeIndex {
    /// Entries sorted by start; `entries[i].range.end <= entries[i + 1].range.start`.
    entries: Vec<StyleRange>,
}

impl RangeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been classified.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate stored entries in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &StyleRange> {
        self.entries.iter()
    }

    /// Index of the first entry ending after `offset`.
    fn first_ending_after(&self, offset: usize) -> usize {
        self.entries.partition_point(|e| e.range.end <= offset)
    }

    /// Index of the first entry starting at or after `offset`.
    fn first_starting_at(&self, offset: usize) -> usize {
        self.entries.partition_point(|e| e.range.start < offset)
    }

    /// Replace the classification of `range` with `with`.
    ///
    /// `with` must tile `range` exactly: sorted, contiguous, non-empty pieces starting at
    /// `range.start` and ending at `range.end`. Entries overlapping `range` are removed; their
    /// parts outside `range` survive.
    pub fn replace(&mut self, range: ByteRange, with: &[StyleRange]) -> Result<(), RangeIndexError> {
        validate_tiling(range, with)?;
        if range.is_empty() {
            return Ok(());
        }

        let lo = self.first_ending_after(range.start);
        let hi = self.first_starting_at(range.end);

        let mut replacement = Vec::with_capacity(with.len() + 2);
        if lo < hi {
            let first = self.entries[lo];
            if first.range.start < range.start {
                replacement.push(StyleRange::new(
                    ByteRange::new(first.range.start, range.start),
                    first.category,
                ));
            }
        }
        for piece in with {
            push_coalesced(&mut replacement, *piece);
        }
        if lo < hi {
            let last = self.entries[hi - 1];
            if last.range.end > range.end {
                push_coalesced(
                    &mut replacement,
                    StyleRange::new(ByteRange::new(range.end, last.range.end), last.category),
                );
            }
        }

        let inserted = replacement.len();
        self.entries.splice(lo..hi, replacement);
        self.coalesce_around(lo, lo + inserted);
        Ok(())
    }

    /// Merge entries at the seams of `[from, to)` with their outer neighbours.
    fn coalesce_around(&mut self, from: usize, to: usize) {
        if to < self.entries.len() && to > 0 && mergeable(&self.entries[to - 1], &self.entries[to]) {
            self.entries[to - 1].range.end = self.entries[to].range.end;
            self.entries.remove(to);
        }
        if from > 0 && from < self.entries.len() && mergeable(&self.entries[from - 1], &self.entries[from]) {
            self.entries[from - 1].range.end = self.entries[from].range.end;
            self.entries.remove(from);
        }
    }

    /// Classification of `range`, clipped to it.
    ///
    /// The result partitions `range` exactly: holes (never classified, dropped by an edit, past
    /// the end of the document) are returned as unclassified ranges.
    pub fn query(&self, range: ByteRange) -> Vec<StyleRange> {
        let mut out = Vec::new();
        if range.is_empty() {
            return out;
        }

        let mut cursor = range.start;
        for entry in self.entries[self.first_ending_after(range.start)..]
            .iter()
            .take_while(|e| e.range.start < range.end)
        {
            let Some(clipped) = entry.range.intersection(&range) else {
                continue;
            };
            push_coalesced(&mut out, StyleRange::unclassified(cursor..clipped.start));
            push_coalesced(&mut out, StyleRange::new(clipped, entry.category));
            cursor = clipped.end;
        }
        push_coalesced(&mut out, StyleRange::unclassified(cursor..range.end));
        out
    }

    /// Category at `offset`.
    pub fn style_at(&self, offset: usize) -> StyleCategory {
        self.entries
            .get(self.first_ending_after(offset))
            .filter(|e| e.range.contains(offset))
            .map_or(StyleCategory::Unclassified, |e| e.category)
    }

    /// Map the index through an edit that replaced `old` with `new_len` bytes.
    ///
    /// Entries entirely before the edit are kept, entries entirely after it move by the length
    /// delta, and entries overlapping the edited span are dropped (including entries straddling
    /// an insertion point).
    ///
    /// Returns the region, in post-edit offsets, whose classification was dropped beyond the
    /// edited span itself; `None` when only the edited span lost it.
    pub fn apply_edit(&mut self, old: ByteRange, new_len: usize) -> Option<ByteRange> {
        let lo = self.first_ending_after(old.start);
        let hi = if old.is_empty() {
            // An entry starting exactly at an insertion point moves with the text after it.
            self.first_starting_at(old.start)
        } else {
            self.first_starting_at(old.end)
        }
        .max(lo);

        let map = |offset: usize| offset - old.end + old.start + new_len;
        let lost = (lo < hi).then(|| {
            let start = self.entries[lo].range.start.min(old.start);
            let end = self.entries[hi - 1].range.end.max(old.end);
            ByteRange::new(start, map(end))
        });

        for entry in &mut self.entries[hi..] {
            entry.range.start = map(entry.range.start);
            entry.range.end = map(entry.range.end);
        }
        self.entries.drain(lo..hi);
        if lo > 0 && lo < self.entries.len() && mergeable(&self.entries[lo - 1], &self.entries[lo]) {
            self.entries[lo - 1].range.end = self.entries[lo].range.end;
            self.entries.remove(lo);
        }

        lost.filter(|lost| *lost != ByteRange::new(old.start, old.start + new_len))
    }

    /// Shift for a length change at `after_offset`.
    ///
    /// A positive `delta` is an insertion of `delta` bytes at `after_offset`; a negative one a
    /// deletion of `|delta|` bytes starting there. Returns what [`apply_edit`](Self::apply_edit)
    /// returns.
    pub fn shift(&mut self, after_offset: usize, delta: isize) -> Option<ByteRange> {
        if delta >= 0 {
            self.apply_edit(ByteRange::empty_at(after_offset), delta.unsigned_abs())
        } else {
            let removed = delta.unsigned_abs();
            self.apply_edit(ByteRange::new(after_offset, after_offset + removed), 0)
        }
    }
}

fn mergeable(left: &StyleRange, right: &StyleRange) -> bool {
    left.category == right.category && left.range.end == right.range.start
}

fn validate_tiling(range: ByteRange, with: &[StyleRange]) -> Result<(), RangeIndexError> {
    let mut cursor = range.start;
    for piece in with {
        if piece.range.is_empty() {
            return Err(RangeIndexError::EmptyPiece(piece.range.start));
        }
        if piece.range.start > cursor {
            return Err(RangeIndexError::Gap(cursor));
        }
        if piece.range.start < cursor {
            return Err(RangeIndexError::Overlap(piece.range.start));
        }
        cursor = piece.range.end;
    }
    if cursor != range.end {
        return Err(RangeIndexError::Extent {
            expected: range.end,
            actual: cursor,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEYWORD: u32 = 1;
    const IDENT: u32 = 2;
    const NUMBER: u32 = 3;

    fn let_x_index() -> RangeIndex {
        // "let x = 1"
        let mut index = RangeIndex::new();
        index
            .replace(
                ByteRange::new(0, 9),
                &[
                    StyleRange::styled(0..3, KEYWORD),
                    StyleRange::unclassified(3..4),
                    StyleRange::styled(4..5, IDENT),
                    StyleRange::unclassified(5..8),
                    StyleRange::styled(8..9, NUMBER),
                ],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_query_clips_and_fills() {
        let index = let_x_index();
        assert_eq!(
            index.query(ByteRange::new(0, 3)),
            vec![StyleRange::styled(0..3, KEYWORD)]
        );
        assert_eq!(
            index.query(ByteRange::new(2, 12)),
            vec![
                StyleRange::styled(2..3, KEYWORD),
                StyleRange::unclassified(3..4),
                StyleRange::styled(4..5, IDENT),
                StyleRange::unclassified(5..8),
                StyleRange::styled(8..9, NUMBER),
                StyleRange::unclassified(9..12),
            ]
        );
        assert!(index.query(ByteRange::new(4, 4)).is_empty());
    }

    #[test]
    fn test_query_on_empty_index_is_unclassified() {
        let index = RangeIndex::new();
        assert_eq!(
            index.query(ByteRange::new(10, 20)),
            vec![StyleRange::unclassified(10..20)]
        );
        assert_eq!(index.style_at(15), StyleCategory::Unclassified);
    }

    #[test]
    fn test_style_at() {
        let index = let_x_index();
        assert_eq!(index.style_at(0), StyleCategory::Styled(KEYWORD));
        assert_eq!(index.style_at(2), StyleCategory::Styled(KEYWORD));
        assert_eq!(index.style_at(3), StyleCategory::Unclassified);
        assert_eq!(index.style_at(8), StyleCategory::Styled(NUMBER));
        assert_eq!(index.style_at(9), StyleCategory::Unclassified);
        assert_eq!(index.style_at(1000), StyleCategory::Unclassified);
    }

    #[test]
    fn test_replace_keeps_remnants_outside_range() {
        let mut index = RangeIndex::new();
        index
            .replace(ByteRange::new(0, 10), &[StyleRange::styled(0..10, IDENT)])
            .unwrap();
        index
            .replace(ByteRange::new(3, 6), &[StyleRange::styled(3..6, KEYWORD)])
            .unwrap();

        assert_eq!(
            index.iter().copied().collect::<Vec<_>>(),
            vec![
                StyleRange::styled(0..3, IDENT),
                StyleRange::styled(3..6, KEYWORD),
                StyleRange::styled(6..10, IDENT),
            ]
        );
    }

    #[test]
    fn test_replace_coalesces_with_neighbours() {
        let mut index = RangeIndex::new();
        index
            .replace(
                ByteRange::new(0, 9),
                &[
                    StyleRange::styled(0..3, IDENT),
                    StyleRange::styled(3..6, KEYWORD),
                    StyleRange::styled(6..9, IDENT),
                ],
            )
            .unwrap();
        index
            .replace(ByteRange::new(3, 6), &[StyleRange::styled(3..6, IDENT)])
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(
            index.query(ByteRange::new(0, 9)),
            vec![StyleRange::styled(0..9, IDENT)]
        );
    }

    #[test]
    fn test_replace_rejects_bad_tilings() {
        let mut index = let_x_index();
        let range = ByteRange::new(0, 6);

        assert_eq!(
            index.replace(
                range,
                &[StyleRange::styled(0..2, IDENT), StyleRange::styled(3..6, IDENT)]
            ),
            Err(RangeIndexError::Gap(2))
        );
        assert_eq!(
            index.replace(
                range,
                &[StyleRange::styled(0..4, IDENT), StyleRange::styled(3..6, IDENT)]
            ),
            Err(RangeIndexError::Overlap(3))
        );
        assert_eq!(
            index.replace(range, &[StyleRange::styled(0..5, IDENT)]),
            Err(RangeIndexError::Extent {
                expected: 6,
                actual: 5
            })
        );
        assert_eq!(
            index.replace(range, &[StyleRange::styled(0..0, IDENT)]),
            Err(RangeIndexError::EmptyPiece(0))
        );

        // Failed replacements leave the index untouched.
        assert_eq!(index.style_at(0), StyleCategory::Styled(KEYWORD));
    }

    #[test]
    fn test_insertion_before_entry_shifts_it() {
        // "let x = 1" -> "let foox = 1": "foo" inserted at 4, before `x`.
        let mut index = let_x_index();
        assert_eq!(index.apply_edit(ByteRange::empty_at(4), 3), None);

        assert_eq!(index.style_at(0), StyleCategory::Styled(KEYWORD));
        assert_eq!(index.style_at(4), StyleCategory::Unclassified);
        assert_eq!(index.style_at(6), StyleCategory::Unclassified);
        assert_eq!(index.style_at(7), StyleCategory::Styled(IDENT));
        assert_eq!(index.style_at(11), StyleCategory::Styled(NUMBER));
    }

    #[test]
    fn test_insertion_inside_entry_drops_it() {
        let mut index = let_x_index();
        // "le|t" split by an insertion.
        assert_eq!(
            index.apply_edit(ByteRange::empty_at(2), 2),
            Some(ByteRange::new(0, 5))
        );
        assert_eq!(index.style_at(0), StyleCategory::Unclassified);
        assert_eq!(index.style_at(6), StyleCategory::Styled(IDENT));
    }

    #[test]
    fn test_edit_inside_long_entry_reports_lost_region() {
        const COMMENT: u32 = 9;
        let mut index = RangeIndex::new();
        index
            .replace(
                ByteRange::new(0, 40),
                &[
                    StyleRange::styled(0..30, COMMENT),
                    StyleRange::unclassified(30..40),
                ],
            )
            .unwrap();

        // Replace one byte of the comment's second line with three.
        assert_eq!(
            index.apply_edit(ByteRange::new(20, 21), 3),
            Some(ByteRange::new(0, 32))
        );
        assert_eq!(
            index.query(ByteRange::new(0, 42)),
            vec![StyleRange::unclassified(0..42)]
        );
    }

    #[test]
    fn test_deletion_drops_overlapping_entries() {
        let mut index = let_x_index();
        // Delete "x = " ([4, 8)).
        assert_eq!(index.apply_edit(ByteRange::new(4, 8), 0), None);

        assert_eq!(
            index.query(ByteRange::new(0, 5)),
            vec![
                StyleRange::styled(0..3, KEYWORD),
                StyleRange::unclassified(3..4),
                StyleRange::styled(4..5, NUMBER),
            ]
        );
    }

    #[test]
    fn test_shift_matches_apply_edit() {
        let mut a = let_x_index();
        let mut b = let_x_index();
        a.shift(5, 4);
        b.apply_edit(ByteRange::empty_at(5), 4);
        assert_eq!(a.query(ByteRange::new(0, 20)), b.query(ByteRange::new(0, 20)));

        a.shift(0, -3);
        b.apply_edit(ByteRange::new(0, 3), 0);
        assert_eq!(a.query(ByteRange::new(0, 20)), b.query(ByteRange::new(0, 20)));
        assert_eq!(a.style_at(0), StyleCategory::Unclassified);
    }

    #[test]
    fn test_clear() {
        let mut index = let_x_index();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.style_at(0), StyleCategory::Unclassified);
    }
}

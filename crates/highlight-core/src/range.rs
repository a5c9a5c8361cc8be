//! Byte ranges and normalized range sets.
//!
//! All offsets in this crate are UTF-8 byte offsets into the document text. Ranges are half-open
//! (`[start, end)`).

use crate::edit::Edit;
use std::ops::Range;

/// A half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
}

impl ByteRange {
    /// Create a range. An `end` before `start` collapses to an empty range at `start`.
    pub const fn new(start: usize, end: usize) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// An empty range positioned at `offset`.
    pub const fn empty_at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Length in bytes.
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the range covers no bytes.
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Check if the range contains `offset`.
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Check if two ranges share at least one byte.
    pub const fn intersects(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The non-empty overlap of two ranges, if any.
    pub fn intersection(&self, other: &ByteRange) -> Option<ByteRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(ByteRange { start, end })
    }

    /// The smallest range spanning both `self` and `other`.
    pub fn cover(&self, other: &ByteRange) -> ByteRange {
        ByteRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Clamp both ends to `len`.
    pub fn clamp_to(&self, len: usize) -> ByteRange {
        ByteRange::new(self.start.min(len), self.end.min(len))
    }
}

impl From<Range<usize>> for ByteRange {
    fn from(range: Range<usize>) -> Self {
        ByteRange::new(range.start, range.end)
    }
}

impl From<ByteRange> for Range<usize> {
    fn from(range: ByteRange) -> Self {
        range.start..range.end
    }
}

/// A set of byte ranges kept sorted, disjoint and non-adjacent.
///
/// Inserting a range merges it with every range it overlaps or touches, so the set always holds
/// the minimal number of ranges describing the covered bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<ByteRange>,
}

impl RangeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the set covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of covered bytes.
    pub fn total_len(&self) -> usize {
        self.ranges.iter().map(ByteRange::len).sum()
    }

    /// Iterate ranges in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ByteRange> + '_ {
        self.ranges.iter().copied()
    }

    /// Remove every range.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Add a range, merging with overlapping or adjacent ranges.
    pub fn insert(&mut self, range: ByteRange) {
        if range.is_empty() {
            return;
        }

        // First range whose end reaches `range.start` (adjacent ranges merge too).
        let lo = self.ranges.partition_point(|r| r.end < range.start);
        // First range starting strictly after `range.end`.
        let hi = self.ranges.partition_point(|r| r.start <= range.end);

        let mut merged = range;
        if lo < hi {
            merged = merged.cover(&self.ranges[lo]).cover(&self.ranges[hi - 1]);
        }
        self.ranges.splice(lo..hi, std::iter::once(merged));
    }

    /// Add every range of `other`.
    pub fn extend(&mut self, other: impl IntoIterator<Item = ByteRange>) {
        for range in other {
            self.insert(range);
        }
    }

    /// Remove the bytes of `range` from the set, splitting ranges as needed.
    pub fn remove(&mut self, range: ByteRange) {
        if range.is_empty() {
            return;
        }

        let lo = self.ranges.partition_point(|r| r.end <= range.start);
        let hi = self.ranges.partition_point(|r| r.start < range.end);
        if lo >= hi {
            return;
        }

        let mut remnants = Vec::with_capacity(2);
        let first = self.ranges[lo];
        let last = self.ranges[hi - 1];
        if first.start < range.start {
            remnants.push(ByteRange::new(first.start, range.start));
        }
        if last.end > range.end {
            remnants.push(ByteRange::new(range.end, last.end));
        }
        self.ranges.splice(lo..hi, remnants);
    }

    /// The parts of the set intersecting `range`.
    pub fn intersecting(&self, range: ByteRange) -> RangeSet {
        let lo = self.ranges.partition_point(|r| r.end <= range.start);
        let ranges = self.ranges[lo..]
            .iter()
            .take_while(|r| r.start < range.end)
            .filter_map(|r| r.intersection(&range))
            .collect();
        RangeSet { ranges }
    }

    /// Returns `true` if every byte of `range` is in the set.
    pub fn covers(&self, range: ByteRange) -> bool {
        if range.is_empty() {
            return true;
        }
        let idx = self.ranges.partition_point(|r| r.end <= range.start);
        self.ranges
            .get(idx)
            .is_some_and(|r| r.start <= range.start && range.end <= r.end)
    }

    /// Drop everything at or past `len` and clip the last range to it.
    pub fn truncate(&mut self, len: usize) {
        self.ranges.retain_mut(|r| {
            r.end = r.end.min(len);
            r.start < r.end
        });
    }

    /// Map the set through a text edit.
    ///
    /// Ranges entirely before the edit are kept, ranges entirely after it are shifted by the
    /// length delta, and ranges touching the edited span grow to cover the replacement text so
    /// no dirty byte is lost.
    pub fn apply_edit(&mut self, edit: &Edit) {
        let old = edit.range;
        let new_len = edit.replacement_len();
        let mut out = RangeSet::new();
        for r in self.ranges.drain(..) {
            let mapped = if r.end < old.start {
                r
            } else if r.start > old.end {
                ByteRange::new(shift(r.start, old, new_len), shift(r.end, old, new_len))
            } else {
                let end = if r.end > old.end {
                    shift(r.end, old, new_len)
                } else {
                    old.start + new_len
                };
                ByteRange::new(r.start.min(old.start), end)
            };
            out.insert(mapped);
        }
        *self = out;
    }
}

fn shift(offset: usize, old: ByteRange, new_len: usize) -> usize {
    offset - old.end + old.start + new_len
}

impl FromIterator<ByteRange> for RangeSet {
    fn from_iter<T: IntoIterator<Item = ByteRange>>(iter: T) -> Self {
        let mut set = RangeSet::new();
        set.extend(iter);
        set
    }
}

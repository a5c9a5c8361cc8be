//! Style categories and styled ranges.

use crate::range::ByteRange;

/// Style ID type
///
/// Opaque to this crate: presentation layers map ids to colors and fonts.
pub type StyleId = u32;

/// Classification of a byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StyleCategory {
    /// Not classified (trivia, not yet computed, or dropped by an edit).
    #[default]
    Unclassified,
    /// Classified with a style id.
    Styled(StyleId),
}

impl StyleCategory {
    /// Returns `true` for [`StyleCategory::Styled`].
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Styled(_))
    }

    /// The style id, if classified.
    pub fn style_id(&self) -> Option<StyleId> {
        match self {
            Self::Styled(id) => Some(*id),
            Self::Unclassified => None,
        }
    }
}

impl From<Option<StyleId>> for StyleCategory {
    fn from(id: Option<StyleId>) -> Self {
        id.map_or(Self::Unclassified, Self::Styled)
    }
}

/// A byte range with a style category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleRange {
    /// Covered bytes.
    pub range: ByteRange,
    /// Category of every byte in `range`.
    pub category: StyleCategory,
}

impl StyleRange {
    /// Create a styled range.
    pub fn new(range: impl Into<ByteRange>, category: StyleCategory) -> Self {
        Self {
            range: range.into(),
            category,
        }
    }

    /// Create a range with style id `style_id`.
    pub fn styled(range: impl Into<ByteRange>, style_id: StyleId) -> Self {
        Self::new(range, StyleCategory::Styled(style_id))
    }

    /// Create an unclassified range.
    pub fn unclassified(range: impl Into<ByteRange>) -> Self {
        Self::new(range, StyleCategory::Unclassified)
    }
}

/// Append `range` to `out`, merging it into the last entry when it continues it with the same
/// category. Empty ranges are skipped.
pub fn push_coalesced(out: &mut Vec<StyleRange>, range: StyleRange) {
    if range.range.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut()
        && last.category == range.category
        && last.range.end == range.range.start
    {
        last.range.end = range.range.end;
        return;
    }
    out.push(range);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_coalesced_merges_contiguous_equal_categories() {
        let mut out = Vec::new();
        push_coalesced(&mut out, StyleRange::styled(0..3, 1));
        push_coalesced(&mut out, StyleRange::styled(3..5, 1));
        push_coalesced(&mut out, StyleRange::unclassified(5..5));
        push_coalesced(&mut out, StyleRange::unclassified(5..7));
        push_coalesced(&mut out, StyleRange::styled(8..9, 1));

        assert_eq!(
            out,
            vec![
                StyleRange::styled(0..5, 1),
                StyleRange::unclassified(5..7),
                StyleRange::styled(8..9, 1),
            ]
        );
    }

    #[test]
    fn test_category_from_option() {
        assert_eq!(StyleCategory::from(Some(4)), StyleCategory::Styled(4));
        assert_eq!(StyleCategory::from(None), StyleCategory::Unclassified);
        assert_eq!(StyleCategory::Styled(4).style_id(), Some(4));
        assert!(!StyleCategory::default().is_classified());
    }
}

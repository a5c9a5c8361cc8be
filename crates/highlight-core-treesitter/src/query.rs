//! Query engine: turns a syntax tree into classified style ranges.
//!
//! Captures are resolved by a deterministic precedence. For every byte, the winning capture is
//! the one on the smallest node (ties broken by tree depth, deeper wins); among captures on the
//! same node, the pattern with the higher `#set! priority` wins, then the pattern declared later
//! in the query.

use crate::grammar::HighlightRules;
use crate::parser::SyntaxTree;
use highlight_core::style::push_coalesced;
use highlight_core::{ByteRange, StyleCategory, StyleId, StyleRange};
use ropey::Rope;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor, TextProvider};

/// Feeds rope chunks to query predicates without copying the document.
struct RopeProvider<'a>(&'a Rope);

struct ChunksBytes<'a> {
    chunks: ropey::iter::Chunks<'a>,
}

impl<'a> Iterator for ChunksBytes<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(str::as_bytes)
    }
}

impl<'a> TextProvider<&'a [u8]> for RopeProvider<'a> {
    type I = ChunksBytes<'a>;

    fn text(&mut self, node: Node) -> Self::I {
        let len = self.0.len_bytes();
        let start = node.start_byte().min(len);
        let end = node.end_byte().min(len).max(start);
        ChunksBytes {
            chunks: self.0.byte_slice(start..end).chunks(),
        }
    }
}

/// A capture that survived style resolution, in paint order terms.
#[derive(Debug, Clone, Copy)]
struct Capture {
    range: ByteRange,
    node_len: usize,
    depth: usize,
    priority: u32,
    pattern: usize,
    style: StyleId,
}

impl Capture {
    /// Captures sorted ascending by this key are painted in order; later ones win.
    fn paint_key(&self) -> (Reverse<usize>, usize, u32, usize) {
        (Reverse(self.node_len), self.depth, self.priority, self.pattern)
    }
}

/// Depth of `node` below `root`, found by descending from `root` (one step per level).
fn node_depth(root: Node, node: Node) -> usize {
    let mut depth = 0;
    let mut current = root;
    while current.id() != node.id() {
        let Some(child) = current.child_with_descendant(node) else {
            break;
        };
        current = child;
        depth += 1;
    }
    depth
}

/// Classify `range` of `syntax` with `rules`.
///
/// The result is sorted, non-overlapping, coalesced and covers `range` exactly; bytes without a
/// winning capture (trivia, unmapped captures, anything past the end of the text) are
/// unclassified. Pure: depends only on its arguments, so it runs on any thread.
pub fn classify(syntax: &SyntaxTree, rules: &HighlightRules, range: ByteRange) -> Vec<StyleRange> {
    if range.is_empty() {
        return Vec::new();
    }
    let Some(query) = rules.grammar().query() else {
        return vec![StyleRange::unclassified(range)];
    };

    let text = syntax.snapshot().text();
    let mut captures = Vec::new();
    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(range.start..range.end);
    let root = syntax.root_node();
    let mut matches = cursor.matches(query, root, RopeProvider(text));
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let Some(style) = rules.capture_style(capture.index) else {
                continue;
            };
            let node = capture.node;
            let node_range = ByteRange::new(node.start_byte(), node.end_byte());
            let Some(clipped) = node_range.intersection(&range) else {
                continue;
            };
            captures.push(Capture {
                range: clipped,
                node_len: node_range.len(),
                depth: node_depth(root, node),
                priority: rules.grammar().priority(m.pattern_index),
                pattern: m.pattern_index,
                style,
            });
        }
    }

    resolve(range, captures)
}

/// Sweep `captures` left to right, keeping the highest-ranked active capture on top of a heap.
fn resolve(range: ByteRange, mut captures: Vec<Capture>) -> Vec<StyleRange> {
    captures.sort_by_key(Capture::paint_key);

    let mut by_start: Vec<usize> = (0..captures.len()).collect();
    by_start.sort_by_key(|&rank| captures[rank].range.start);

    let mut bounds: Vec<usize> = captures
        .iter()
        .flat_map(|c| [c.range.start, c.range.end])
        .chain([range.start, range.end])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut out = Vec::new();
    // (rank, end); expired entries are dropped lazily when they reach the top.
    let mut active = BinaryHeap::<(usize, usize)>::new();
    let mut next = 0;
    for window in bounds.windows(2) {
        let (pos, until) = (window[0], window[1]);
        while next < by_start.len() && captures[by_start[next]].range.start <= pos {
            let rank = by_start[next];
            active.push((rank, captures[rank].range.end));
            next += 1;
        }
        while active.peek().is_some_and(|&(_, end)| end <= pos) {
            active.pop();
        }

        let category = active
            .peek()
            .map_or(StyleCategory::Unclassified, |&(rank, _)| {
                StyleCategory::Styled(captures[rank].style)
            });
        push_coalesced(&mut out, StyleRange::new(pos..until, category));
    }
    out
}

//! Incremental parsing.

use crate::error::HighlightError;
use crate::grammar::Grammar;
use highlight_core::{ByteRange, DocumentSnapshot, Edit, Revision, TextPoint};
use tree_sitter::{InputEdit, Node, Parser, Point, Tree};

/// How the adapter produced the tree of the last [`ParserAdapter::reparse`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// First parse for this adapter.
    Initial,
    /// Edits were applied to the previous tree and the text was re-parsed incrementally.
    Incremental,
    /// The previous tree was unusable (missing, or the edits did not line up); parsed from
    /// scratch.
    FullReparse,
    /// The tree already matched the snapshot.
    Skipped,
}

/// A syntax tree bundled with the snapshot it was parsed from.
///
/// Queries always read the bundled snapshot, so a tree can never be matched against text of a
/// different revision. Clones share the underlying tree and rope.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    tree: Tree,
    snapshot: DocumentSnapshot,
}

impl SyntaxTree {
    /// The tree-sitter tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The parsed text.
    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    /// Revision of the parsed text.
    pub fn revision(&self) -> Revision {
        self.snapshot.revision()
    }

    /// Root node.
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Result of a successful [`ParserAdapter::reparse`].
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// The new tree.
    pub syntax: SyntaxTree,
    /// Byte ranges whose structure differs from the previous tree (the whole document after a
    /// full parse).
    pub changed_ranges: Vec<ByteRange>,
    /// How the tree was produced.
    pub mode: ParseMode,
}

/// Owns a tree-sitter parser and the current syntax tree of one document.
pub struct ParserAdapter {
    parser: Parser,
    current: Option<SyntaxTree>,
    last_mode: Option<ParseMode>,
    failures: Option<(Revision, u32)>,
    #[cfg(test)]
    fail_next: u32,
}

impl ParserAdapter {
    /// Create an adapter for `grammar`'s language.
    pub fn new(grammar: &Grammar) -> Result<Self, HighlightError> {
        let mut parser = Parser::new();
        parser
            .set_language(grammar.language())
            .map_err(|e| HighlightError::Language(e.to_string()))?;
        Ok(Self {
            parser,
            current: None,
            last_mode: None,
            failures: None,
            #[cfg(test)]
            fail_next: 0,
        })
    }

    /// The current tree, if the last parse succeeded.
    pub fn tree(&self) -> Option<&SyntaxTree> {
        self.current.as_ref()
    }

    /// Mode of the last successful parse.
    pub fn last_mode(&self) -> Option<ParseMode> {
        self.last_mode
    }

    /// Drop the current tree; the next [`reparse`](Self::reparse) parses from scratch.
    pub fn discard(&mut self) {
        self.current = None;
    }

    /// Number of consecutive failed parses of `revision`.
    pub fn failure_count(&self, revision: Revision) -> u32 {
        match self.failures {
            Some((failed, count)) if failed == revision => count,
            _ => 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_next_parses(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Bring the tree up to `snapshot` by applying `edits` (in log order) and re-parsing once.
    ///
    /// Falls back to a full parse when there is no previous tree or the edits do not transform
    /// the previous text into `snapshot`. A parser failure discards the tree, so the next call
    /// starts from scratch; a partially built tree is never kept.
    pub fn reparse(
        &mut self,
        edits: &[Edit],
        snapshot: &DocumentSnapshot,
    ) -> Result<ParseOutcome, HighlightError> {
        let previous = self.current.take();

        if let Some(prev) = &previous
            && edits.is_empty()
            && prev.revision() == snapshot.revision()
            && prev.snapshot().len_bytes() == snapshot.len_bytes()
        {
            self.current = previous.clone();
            self.last_mode = Some(ParseMode::Skipped);
            return Ok(ParseOutcome {
                syntax: prev.clone(),
                changed_ranges: Vec::new(),
                mode: ParseMode::Skipped,
            });
        }

        let edited = match previous {
            None => None,
            Some(prev) => match edit_tree(&prev, edits, snapshot) {
                Ok(tree) => Some(tree),
                Err(err) => {
                    log::debug!(
                        "cannot reuse tree of revision {} for revision {}: {err}",
                        prev.revision(),
                        snapshot.revision()
                    );
                    None
                }
            },
        };

        let Some(tree) = self.parse(snapshot, edited.as_ref()) else {
            let revision = snapshot.revision();
            let count = self.failure_count(revision) + 1;
            self.failures = Some((revision, count));
            log::warn!("parse of revision {revision} failed ({count} attempt(s))");
            return Err(HighlightError::ParseFailed { revision });
        };
        self.failures = None;

        let (mode, changed_ranges) = match &edited {
            Some(old) => (
                ParseMode::Incremental,
                old.changed_ranges(&tree)
                    .map(|r| ByteRange::new(r.start_byte, r.end_byte))
                    .filter(|r| !r.is_empty())
                    .collect(),
            ),
            None => {
                let mode = if self.last_mode.is_none() {
                    ParseMode::Initial
                } else {
                    ParseMode::FullReparse
                };
                (mode, vec![snapshot.full_range()])
            }
        };

        let syntax = SyntaxTree {
            tree,
            snapshot: snapshot.clone(),
        };
        log::debug!(
            "parsed revision {} ({mode:?}, {} changed range(s))",
            syntax.revision(),
            changed_ranges.len()
        );
        self.current = Some(syntax.clone());
        self.last_mode = Some(mode);
        Ok(ParseOutcome {
            syntax,
            changed_ranges,
            mode,
        })
    }

    fn parse(&mut self, snapshot: &DocumentSnapshot, old: Option<&Tree>) -> Option<Tree> {
        #[cfg(test)]
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return None;
        }

        self.parser
            .parse_with_options(&mut move |byte, _| snapshot.chunk_from(byte), old, None)
    }
}

impl std::fmt::Debug for ParserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserAdapter")
            .field("revision", &self.current.as_ref().map(SyntaxTree::revision))
            .field("last_mode", &self.last_mode)
            .field("failures", &self.failures)
            .finish()
    }
}

fn to_point(point: TextPoint) -> Point {
    Point {
        row: point.row,
        column: point.column,
    }
}

/// Apply `edits` to a copy of `prev`'s tree, checking that they turn `prev`'s text into
/// `target`.
fn edit_tree(
    prev: &SyntaxTree,
    edits: &[Edit],
    target: &DocumentSnapshot,
) -> Result<Tree, HighlightError> {
    let mut tree = prev.tree.clone();
    let mut text = prev.snapshot.clone();

    for edit in edits {
        if edit.revision != text.revision() + 1 {
            return Err(HighlightError::DeltaMismatch);
        }

        let start_position = to_point(text.point_at(edit.range.start));
        let old_end_position = to_point(text.point_at(edit.range.end));
        text = text
            .apply_edit(edit)
            .map_err(|_| HighlightError::DeltaMismatch)?;
        let new_end_byte = edit.range.start + edit.replacement_len();

        tree.edit(&InputEdit {
            start_byte: edit.range.start,
            old_end_byte: edit.range.end,
            new_end_byte,
            start_position,
            old_end_position,
            new_end_position: to_point(text.point_at(new_end_byte)),
        });
    }

    if text.revision() != target.revision() || text.len_bytes() != target.len_bytes() {
        return Err(HighlightError::DeltaMismatch);
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarConfig;
    use highlight_core::Document;

    fn adapter() -> ParserAdapter {
        let config = GrammarConfig::new("rust", tree_sitter_rust::LANGUAGE.into(), "");
        ParserAdapter::new(&Grammar::without_patterns(&config)).unwrap()
    }

    #[test]
    fn test_initial_parse_covers_whole_document() {
        let doc = Document::new("fn main() {}\n");
        let mut adapter = adapter();

        let outcome = adapter.reparse(&[], &doc.snapshot()).unwrap();
        assert_eq!(outcome.mode, ParseMode::Initial);
        assert_eq!(outcome.changed_ranges, vec![ByteRange::new(0, 13)]);
        assert_eq!(outcome.syntax.root_node().kind(), "source_file");
        assert!(!outcome.syntax.root_node().has_error());
    }

    #[test]
    fn test_same_revision_is_skipped() {
        let doc = Document::new("fn main() {}\n");
        let mut adapter = adapter();
        adapter.reparse(&[], &doc.snapshot()).unwrap();

        let outcome = adapter.reparse(&[], &doc.snapshot()).unwrap();
        assert_eq!(outcome.mode, ParseMode::Skipped);
        assert!(outcome.changed_ranges.is_empty());
    }

    #[test]
    fn test_batched_edits_reparse_incrementally() {
        let mut doc = Document::new("fn a() {}\nfn b() {}\n");
        let mut adapter = adapter();
        adapter.reparse(&[], &doc.snapshot()).unwrap();

        let edits = vec![
            doc.insert(0, "// header\n").unwrap(),
            doc.insert(doc.len_bytes(), "fn c() {}\n").unwrap(),
        ];
        let outcome = adapter.reparse(&edits, &doc.snapshot()).unwrap();
        assert_eq!(outcome.mode, ParseMode::Incremental);
        assert_eq!(outcome.syntax.revision(), 2);
        assert!(!outcome.syntax.root_node().has_error());
        assert_eq!(outcome.syntax.root_node().child_count(), 4);
    }

    #[test]
    fn test_changed_ranges_can_exceed_the_edit() {
        let mut doc = Document::new("let a = 1;\nlet b = 2;\nlet c = 3;\n");
        let mut adapter = adapter();
        adapter.reparse(&[], &doc.snapshot()).unwrap();

        // An unterminated block comment swallows the rest of the file.
        let edit = doc.insert(0, "/*").unwrap();
        let outcome = adapter.reparse(&[edit], &doc.snapshot()).unwrap();
        assert_eq!(outcome.mode, ParseMode::Incremental);

        let last = outcome.changed_ranges.iter().map(|r| r.end).max().unwrap();
        assert!(last > 2, "changed ranges: {:?}", outcome.changed_ranges);
    }

    #[test]
    fn test_mismatched_edits_fall_back_to_full_parse() {
        let mut doc = Document::new("fn main() {}\n");
        let mut adapter = adapter();
        adapter.reparse(&[], &doc.snapshot()).unwrap();

        doc.insert(0, "// lost edit\n").unwrap();
        let second = doc.insert(0, "// seen edit\n").unwrap();

        let outcome = adapter.reparse(&[second], &doc.snapshot()).unwrap();
        assert_eq!(outcome.mode, ParseMode::FullReparse);
        assert_eq!(outcome.changed_ranges, vec![doc.snapshot().full_range()]);
        assert_eq!(outcome.syntax.revision(), doc.revision());
    }

    #[test]
    fn test_failed_parse_discards_tree_and_counts_failures() {
        let mut doc = Document::new("fn main() {}\n");
        let mut adapter = adapter();
        adapter.reparse(&[], &doc.snapshot()).unwrap();

        let edit = doc.insert(0, " ").unwrap();
        adapter.fail_next_parses(2);
        assert_eq!(
            adapter.reparse(std::slice::from_ref(&edit), &doc.snapshot()).unwrap_err(),
            HighlightError::ParseFailed { revision: 1 }
        );
        assert!(adapter.tree().is_none());
        assert_eq!(adapter.failure_count(1), 1);

        assert!(adapter.reparse(&[], &doc.snapshot()).is_err());
        assert_eq!(adapter.failure_count(1), 2);

        // No previous tree: the retry parses from scratch.
        let outcome = adapter.reparse(&[], &doc.snapshot()).unwrap();
        assert_eq!(outcome.mode, ParseMode::FullReparse);
        assert_eq!(adapter.failure_count(1), 0);
    }
}

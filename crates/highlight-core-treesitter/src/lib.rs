#![warn(missing_docs)]
//! `highlight-core-treesitter` - Tree-sitter incremental highlighter for `highlight-core`.
//!
//! This crate turns a stream of edits into classified style ranges:
//!
//! - an incremental parser adapter that re-parses each edit batch once, reusing the previous tree
//! - a query engine resolving overlapping captures by a deterministic precedence
//! - a [`Highlighter`] façade that keeps the range index correct while classification runs on a
//!   background thread
//!
//! Nothing here blocks the caller: regions that are not classified yet read back as
//! unclassified, and results computed for superseded text are discarded.
//!
//! ```rust
//! use highlight_core::{ByteRange, Document, StyleCategory};
//! use highlight_core_treesitter::{
//!     ClassificationSource, Grammar, GrammarConfig, Highlighter, HighlighterConfig, StyleMap,
//! };
//!
//! let mut doc = Document::new("let x = 1;");
//! let config = GrammarConfig::new(
//!     "rust",
//!     tree_sitter_rust::LANGUAGE.into(),
//!     r#""let" @keyword (identifier) @variable"#,
//! );
//! let grammar = Grammar::new(&config).unwrap();
//!
//! let styles = StyleMap::new().with_styles([("keyword", 1), ("variable", 2)]);
//! let mut hl = Highlighter::new(doc.snapshot(), styles, HighlighterConfig::default());
//! hl.set_language(ClassificationSource::tree_sitter(grammar)).unwrap();
//! hl.attach().unwrap();
//! assert_eq!(hl.style_at(4), StyleCategory::Styled(2));
//!
//! let edit = doc.insert(4, "foo").unwrap();
//! hl.text_did_change(doc.snapshot(), vec![edit]);
//! assert_eq!(hl.query(ByteRange::new(4, 8)), vec![highlight_core::StyleRange::styled(4..8, 2)]);
//! ```

mod error;
mod grammar;
mod highlighter;
mod parser;
mod query;
mod worker;

pub use error::HighlightError;
pub use grammar::{
    ClassificationSource, DEFAULT_PRIORITY, Grammar, GrammarConfig, GrammarRegistry,
    HighlightRules, StyleMap,
};
pub use highlighter::{Highlighter, HighlighterConfig};
pub use parser::{ParseMode, ParseOutcome, ParserAdapter, SyntaxTree};
pub use query::classify;

use highlight_core::{EditError, Revision};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced by the tree-sitter highlighter.
///
/// None of these stop text editing: callers receive them for diagnostics while the highlighter
/// keeps running in a degraded mode.
pub enum HighlightError {
    #[error("tree-sitter language error: {0}")]
    /// Setting the tree-sitter language on the parser failed (ABI mismatch).
    Language(String),

    #[error("tree-sitter query error: {0}")]
    /// Compiling the highlights query failed.
    Query(String),

    #[error("tree-sitter delta mismatch")]
    /// The edit batch does not transform the parsed text into the new snapshot.
    DeltaMismatch,

    #[error("parser produced no tree for revision {revision}")]
    /// The parser gave up (or was cancelled) without producing a tree.
    ParseFailed {
        /// Revision that failed to parse.
        revision: Revision,
    },

    #[error("unknown language '{0}'")]
    /// No grammar is registered under this language id.
    UnknownLanguage(String),

    #[error("highlight worker unavailable: {0}")]
    /// The background worker could not be started or has exited.
    Worker(String),

    #[error(transparent)]
    /// An edit was rejected.
    Edit(#[from] EditError),
}

//! Grammars, style maps and the grammar registry.

use crate::error::HighlightError;
use highlight_core::StyleId;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tree_sitter::{Language, Query};

/// Pattern priority used when a pattern sets none.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Configuration of one language grammar.
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    /// Language id (e.g. `"rust"`).
    pub name: String,
    /// Tree-sitter language.
    pub language: Language,
    /// Syntax highlighting query (`.scm`).
    pub highlights_query: String,
    /// File extensions (without the leading dot) mapped to this language.
    pub file_extensions: Vec<String>,
}

impl GrammarConfig {
    /// Create a config with a language id, language and highlights query.
    pub fn new(
        name: impl Into<String>,
        language: Language,
        highlights_query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language,
            highlights_query: highlights_query.into(),
            file_extensions: Vec::new(),
        }
    }

    /// Add file extensions handled by this grammar.
    pub fn with_file_extensions<const N: usize>(mut self, extensions: [&str; N]) -> Self {
        self.file_extensions
            .extend(extensions.iter().map(|ext| ext.trim_start_matches('.').to_string()));
        self
    }
}

/// Mapping from capture name (e.g. `"comment"`) to a style id.
///
/// Lookups fall back to progressively shorter dotted prefixes: `"function.method.call"` resolves
/// through `"function.method"` and then `"function"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap {
    styles: BTreeMap<String, StyleId>,
}

impl StyleMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set of capture name → style id mappings.
    pub fn with_styles<const N: usize>(mut self, styles: [(&str, StyleId); N]) -> Self {
        for (name, style_id) in styles {
            self.styles.insert(name.to_string(), style_id);
        }
        self
    }

    /// Map `capture` to `style_id`, returning the previous mapping.
    pub fn insert(&mut self, capture: impl Into<String>, style_id: StyleId) -> Option<StyleId> {
        self.styles.insert(capture.into(), style_id)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Returns `true` if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Resolve a capture name.
    pub fn resolve(&self, capture: &str) -> Option<StyleId> {
        if let Some(id) = self.styles.get(capture) {
            return Some(*id);
        }
        let mut prefix = capture;
        while let Some(dot) = prefix.rfind('.') {
            prefix = &prefix[..dot];
            if let Some(id) = self.styles.get(prefix) {
                return Some(*id);
            }
        }
        None
    }
}

/// A compiled grammar: language plus highlights query.
///
/// A grammar without a query has zero patterns and classifies everything as unclassified.
#[derive(Debug)]
pub struct Grammar {
    name: String,
    language: Language,
    query: Option<Query>,
    priorities: Vec<u32>,
}

impl Grammar {
    /// Compile `config`, failing on a malformed query.
    pub fn new(config: &GrammarConfig) -> Result<Self, HighlightError> {
        let query = Query::new(&config.language, &config.highlights_query)
            .map_err(|e| HighlightError::Query(e.to_string()))?;
        let priorities = (0..query.pattern_count())
            .map(|pattern| pattern_priority(&query, pattern))
            .collect();

        Ok(Self {
            name: config.name.clone(),
            language: config.language.clone(),
            query: Some(query),
            priorities,
        })
    }

    /// A grammar for `config`'s language with zero patterns.
    pub fn without_patterns(config: &GrammarConfig) -> Self {
        Self {
            name: config.name.clone(),
            language: config.language.clone(),
            query: None,
            priorities: Vec::new(),
        }
    }

    /// Compile `config`, falling back to zero patterns on a malformed query.
    ///
    /// The query error is returned next to the grammar so the caller can report it.
    pub fn new_or_without_patterns(config: &GrammarConfig) -> (Self, Option<HighlightError>) {
        match Self::new(config) {
            Ok(grammar) => (grammar, None),
            Err(err) => {
                log::warn!(
                    "highlights query for '{}' failed to compile, using zero patterns: {err}",
                    config.name
                );
                (Self::without_patterns(config), Some(err))
            }
        }
    }

    /// Language id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree-sitter language.
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Compiled highlights query, if any.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Number of patterns.
    pub fn pattern_count(&self) -> usize {
        self.priorities.len()
    }

    /// Priority of `pattern` (`#set! priority N`), [`DEFAULT_PRIORITY`] when unset.
    pub fn priority(&self, pattern: usize) -> u32 {
        self.priorities
            .get(pattern)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }
}

fn pattern_priority(query: &Query, pattern: usize) -> u32 {
    query
        .property_settings(pattern)
        .iter()
        .find(|prop| &*prop.key == "priority")
        .and_then(|prop| prop.value.as_deref())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_PRIORITY)
}

/// Immutable classification configuration: a grammar and its captures resolved against a
/// [`StyleMap`].
///
/// Built once per language or style change and shared with the worker.
#[derive(Debug, Clone)]
pub struct HighlightRules {
    grammar: Arc<Grammar>,
    capture_styles: Vec<Option<StyleId>>,
}

impl HighlightRules {
    /// Resolve every capture of `grammar` against `styles`.
    pub fn new(grammar: Arc<Grammar>, styles: &StyleMap) -> Self {
        let capture_styles = grammar
            .query()
            .map(|query| {
                query
                    .capture_names()
                    .iter()
                    .map(|name| styles.resolve(name))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            grammar,
            capture_styles,
        }
    }

    /// The grammar.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Style of capture `index`; `None` for captures the style map does not know.
    pub fn capture_style(&self, index: u32) -> Option<StyleId> {
        self.capture_styles.get(index as usize).copied().flatten()
    }
}

/// Where classifications come from, chosen once per language.
#[derive(Debug, Clone, Default)]
pub enum ClassificationSource {
    /// No grammar: everything is unclassified.
    #[default]
    Plain,
    /// A tree-sitter grammar.
    TreeSitter(Arc<Grammar>),
}

impl ClassificationSource {
    /// Wrap a compiled grammar.
    pub fn tree_sitter(grammar: Grammar) -> Self {
        Self::TreeSitter(Arc::new(grammar))
    }

    /// The grammar, if any.
    pub fn grammar(&self) -> Option<&Arc<Grammar>> {
        match self {
            Self::Plain => None,
            Self::TreeSitter(grammar) => Some(grammar),
        }
    }

    /// Language id (`"plain"` for [`ClassificationSource::Plain`]).
    pub fn name(&self) -> &str {
        match self {
            Self::Plain => "plain",
            Self::TreeSitter(grammar) => grammar.name(),
        }
    }
}

/// Registry of grammar configurations keyed by language id.
#[derive(Debug, Clone, Default)]
pub struct GrammarRegistry {
    configs: BTreeMap<String, GrammarConfig>,
}

impl GrammarRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a grammar, returning the configuration it replaces.
    pub fn register(&mut self, config: GrammarConfig) -> Option<GrammarConfig> {
        self.configs.insert(config.name.clone(), config)
    }

    /// Configuration for language id `name`.
    pub fn get(&self, name: &str) -> Option<&GrammarConfig> {
        self.configs.get(name)
    }

    /// Registered language ids, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    /// Language id handling files with extension `ext` (with or without the leading dot).
    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        let ext = ext.trim_start_matches('.');
        self.configs
            .values()
            .find(|config| config.file_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .map(|config| config.name.as_str())
    }

    /// Language id for `path`, based on its extension.
    pub fn language_for_path(&self, path: &Path) -> Option<&str> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.language_for_extension(ext))
    }

    /// Compile the grammar registered as `name`.
    pub fn load(&self, name: &str) -> Result<Grammar, HighlightError> {
        let config = self
            .get(name)
            .ok_or_else(|| HighlightError::UnknownLanguage(name.to_string()))?;
        Grammar::new(config)
    }

    /// Classification source for `name`, failing closed.
    ///
    /// Unknown languages resolve to [`ClassificationSource::Plain`]; malformed queries to a
    /// grammar with zero patterns. The error, if any, is returned alongside.
    pub fn source_for(&self, name: &str) -> (ClassificationSource, Option<HighlightError>) {
        match self.get(name) {
            None => (
                ClassificationSource::Plain,
                Some(HighlightError::UnknownLanguage(name.to_string())),
            ),
            Some(config) => {
                let (grammar, err) = Grammar::new_or_without_patterns(config);
                (ClassificationSource::tree_sitter(grammar), err)
            }
        }
    }
}

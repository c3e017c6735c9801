//! Snippet language parsers
//!
//! Each parser converts between a Python cell and the text of an inner
//! language shown in its editor:
//! - `python`: identity
//! - `markdown`: `mo.md(...)` around a string literal
//! - `sql`: `df = mo.sql(...)` with optional keyword arguments
//!
//! A parser never fails. Source it does not recognize comes back unchanged with
//! offset 0 and default metadata, and `is_supported` agrees with that decision.
//! [`ParserRegistry`] picks the first parser that supports a source.

pub mod markdown;
pub mod python;
pub mod quote;
pub mod sql;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use markdown::{MarkdownMetadata, MarkdownParser};
pub use python::PythonParser;
pub use quote::QuoteKind;
pub use sql::{SqlMetadata, SqlParser};

/// Failures inside a parser; they never escape `transform_in`
#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("failed to load Python grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),

    #[error("parser produced no syntax tree")]
    NoTree,

    #[error("source is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("unsupported shape: {0}")]
    Unsupported(&'static str),
}

/// Inner language of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    Python,
    Markdown,
    Sql,
}

impl LanguageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Markdown => "markdown",
            Self::Sql => "sql",
        }
    }
}

impl std::fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reading a cell into its inner language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseResult<M> {
    pub code: String,
    /// Character offset in the source where `code` starts
    pub offset: usize,
    pub metadata: M,
}

impl<M> ParseResult<M> {
    /// The unrecognized-source result
    pub fn passthrough(source: &str, metadata: M) -> Self {
        Self {
            code: source.to_string(),
            offset: 0,
            metadata,
        }
    }
}

/// Result of writing inner-language code back out as Python
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformOutResult {
    pub code: String,
    /// Character offset in `code` where the inner text starts
    pub offset: usize,
}

/// Bidirectional transform between a Python cell and an inner language
pub trait LanguageParser {
    /// Round-trip information that is not part of the inner text
    type Metadata: Clone;

    fn language(&self) -> LanguageKind;

    fn default_metadata(&self) -> Self::Metadata;

    fn transform_in(&self, source: &str) -> ParseResult<Self::Metadata>;

    fn transform_out(&self, code: &str, metadata: &Self::Metadata) -> TransformOutResult;

    /// Structural check that agrees with whether `transform_in` extracts
    fn is_supported(&self, source: &str) -> bool;
}

/// Metadata of whichever parser handled a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "language", rename_all = "lowercase")]
pub enum SnippetMetadata {
    Python,
    Markdown(MarkdownMetadata),
    Sql(SqlMetadata),
}

impl SnippetMetadata {
    #[must_use]
    pub fn language(&self) -> LanguageKind {
        match self {
            Self::Python => LanguageKind::Python,
            Self::Markdown(_) => LanguageKind::Markdown,
            Self::Sql(_) => LanguageKind::Sql,
        }
    }
}

/// Ordered set of parsers: markdown, then SQL, then Python as the fallback
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    python: PythonParser,
    markdown: MarkdownParser,
    sql: SqlParser,
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific SQL parser, e.g. one carrying configured defaults
    #[must_use]
    pub fn with_sql(mut self, sql: SqlParser) -> Self {
        self.sql = sql;
        self
    }

    #[must_use]
    pub fn sql(&self) -> &SqlParser {
        &self.sql
    }

    /// The first language whose parser supports `source`
    ///
    /// Blank source belongs to Python so an empty cell stays a plain cell.
    #[must_use]
    pub fn detect(&self, source: &str) -> LanguageKind {
        if source.trim().is_empty() {
            LanguageKind::Python
        } else if self.markdown.is_supported(source) {
            LanguageKind::Markdown
        } else if self.sql.is_supported(source) {
            LanguageKind::Sql
        } else {
            LanguageKind::Python
        }
    }

    /// Read `source` with the detected parser
    #[must_use]
    pub fn transform_in(&self, source: &str) -> ParseResult<SnippetMetadata> {
        self.transform_in_as(self.detect(source), source)
    }

    /// Read `source` with an explicitly chosen parser
    #[must_use]
    pub fn transform_in_as(&self, language: LanguageKind, source: &str) -> ParseResult<SnippetMetadata> {
        match language {
            LanguageKind::Python => wrap(self.python.transform_in(source), |()| SnippetMetadata::Python),
            LanguageKind::Markdown => wrap(self.markdown.transform_in(source), SnippetMetadata::Markdown),
            LanguageKind::Sql => wrap(self.sql.transform_in(source), SnippetMetadata::Sql),
        }
    }

    /// Write `code` back out with the parser the metadata came from
    #[must_use]
    pub fn transform_out(&self, code: &str, metadata: &SnippetMetadata) -> TransformOutResult {
        match metadata {
            SnippetMetadata::Python => self.python.transform_out(code, &()),
            SnippetMetadata::Markdown(metadata) => self.markdown.transform_out(code, metadata),
            SnippetMetadata::Sql(metadata) => self.sql.transform_out(code, metadata),
        }
    }
}

fn wrap<M>(result: ParseResult<M>, into: impl FnOnce(M) -> SnippetMetadata) -> ParseResult<SnippetMetadata> {
    ParseResult {
        code: result.code,
        offset: result.offset,
        metadata: into(result.metadata),
    }
}

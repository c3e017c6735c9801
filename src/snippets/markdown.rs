//! Markdown cells: `mo.md(...)` wrapping a single string literal
//!
//! The call shape is simple enough that delimiter matching over the fixed set
//! of prefix/quote combinations is unambiguous, so no grammar is involved.

use serde::{Deserialize, Serialize};

use super::quote::{
    char_offset, escape, extract_block, indent, needs_block_form, split_string_literal, QuoteKind,
};
use super::{LanguageKind, LanguageParser, ParseResult, TransformOutResult};

const CALL_OPEN: &str = "mo.md(";
const CALL_CLOSE: &str = ")";
const INDENT: &str = "    ";

/// How the markdown literal was quoted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownMetadata {
    /// One of `""`, `r`, `f`, `rf`, `fr`, case preserved
    pub quote_prefix: String,
    pub quote_kind: QuoteKind,
}

impl Default for MarkdownMetadata {
    fn default() -> Self {
        Self {
            quote_prefix: "r".to_string(),
            quote_kind: QuoteKind::TripleDouble,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

struct Extracted {
    code: String,
    offset: usize,
    metadata: MarkdownMetadata,
}

impl MarkdownParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn extract(source: &str) -> Option<Extracted> {
        let leading = source.len() - source.trim_start().len();
        let trimmed = source.trim();
        let inner = trimmed.strip_prefix(CALL_OPEN)?.strip_suffix(CALL_CLOSE)?;
        let inner_leading = inner.len() - inner.trim_start().len();
        let literal = split_string_literal(inner.trim())?;

        let (code, lead) = extract_block(literal.content, literal.quote);
        let byte_offset = leading + CALL_OPEN.len() + inner_leading + literal.content_start + lead;
        Some(Extracted {
            code,
            offset: char_offset(source, byte_offset),
            metadata: MarkdownMetadata {
                quote_prefix: literal.prefix.to_string(),
                quote_kind: literal.quote,
            },
        })
    }
}

impl LanguageParser for MarkdownParser {
    type Metadata = MarkdownMetadata;

    fn language(&self) -> LanguageKind {
        LanguageKind::Markdown
    }

    fn default_metadata(&self) -> Self::Metadata {
        MarkdownMetadata::default()
    }

    fn transform_in(&self, source: &str) -> ParseResult<Self::Metadata> {
        if source.trim().is_empty() {
            return ParseResult::passthrough("", self.default_metadata());
        }
        match Self::extract(source) {
            Some(extracted) => ParseResult {
                code: extracted.code,
                offset: extracted.offset,
                metadata: extracted.metadata,
            },
            None => {
                tracing::debug!("source is not a mo.md call; passing through");
                ParseResult::passthrough(source, self.default_metadata())
            }
        }
    }

    fn transform_out(&self, code: &str, metadata: &Self::Metadata) -> TransformOutResult {
        let prefix = &metadata.quote_prefix;

        if !needs_block_form(code) {
            let quote = metadata.quote_kind;
            let delimiter = quote.delimiter();
            let head = format!("{CALL_OPEN}{prefix}{delimiter}");
            return TransformOutResult {
                offset: head.chars().count(),
                code: format!("{head}{}{delimiter}{CALL_CLOSE}", escape(code, quote)),
            };
        }

        // Block layout needs triple quotes
        let quote = metadata.quote_kind.to_triple();
        let delimiter = quote.delimiter();
        let head = format!("{CALL_OPEN}\n{INDENT}{prefix}{delimiter}\n");
        let body = indent(&escape(code, quote), INDENT);
        let first_line_indented = code.split('\n').next().is_some_and(|line| !line.is_empty());
        let offset = head.chars().count() + if first_line_indented { INDENT.len() } else { 0 };
        TransformOutResult {
            offset,
            code: format!("{head}{body}\n{INDENT}{delimiter}\n{CALL_CLOSE}"),
        }
    }

    fn is_supported(&self, source: &str) -> bool {
        source.trim().is_empty() || Self::extract(source).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_in_triple_quoted() {
        let parser = MarkdownParser::new();
        let source = "mo.md(\n    r\"\"\"\n    # Hello\n\n    World\n    \"\"\"\n)";
        let result = parser.transform_in(source);
        assert_eq!(result.code, "# Hello\n\nWorld");
        assert_eq!(result.metadata.quote_prefix, "r");
        assert_eq!(result.metadata.quote_kind, QuoteKind::TripleDouble);
        assert_eq!(&source[result.offset..result.offset + 7], "# Hello");
    }

    #[test]
    fn test_transform_in_single_line() {
        let parser = MarkdownParser::new();
        let result = parser.transform_in("mo.md(f'Hi {name}')");
        assert_eq!(result.code, "Hi {name}");
        assert_eq!(result.offset, 8);
        assert_eq!(result.metadata.quote_prefix, "f");
        assert_eq!(result.metadata.quote_kind, QuoteKind::Single);
    }

    #[test]
    fn test_transform_in_unescapes_delimiter() {
        let parser = MarkdownParser::new();
        let result = parser.transform_in("mo.md(\"\"\"say \\\"\"\" here\"\"\")");
        assert_eq!(result.code, "say \"\"\" here");
    }

    #[test]
    fn test_unsupported_passes_through() {
        let parser = MarkdownParser::new();
        for source in ["print('hi')", "mo.md(text)", "mo.md('a' + 'b')", "x = mo.md('a')"] {
            assert!(!parser.is_supported(source), "{source}");
            let result = parser.transform_in(source);
            assert_eq!(result.code, source);
            assert_eq!(result.offset, 0);
            assert_eq!(result.metadata, MarkdownMetadata::default());
        }
    }

    #[test]
    fn test_empty_source_is_supported() {
        let parser = MarkdownParser::new();
        assert!(parser.is_supported(""));
        assert!(parser.is_supported("  \n"));
        assert_eq!(parser.transform_in("").code, "");
    }

    #[test]
    fn test_transform_out_multiline() {
        let parser = MarkdownParser::new();
        let out = parser.transform_out("# Title\n\nBody", &MarkdownMetadata::default());
        assert_eq!(out.code, "mo.md(\n    r\"\"\"\n    # Title\n\n    Body\n    \"\"\"\n)");
        assert_eq!(&out.code[out.offset..out.offset + 7], "# Title");
    }

    #[test]
    fn test_transform_out_single_line() {
        let parser = MarkdownParser::new();
        let metadata = MarkdownMetadata {
            quote_prefix: String::new(),
            quote_kind: QuoteKind::Double,
        };
        let out = parser.transform_out("say \"hi\"", &metadata);
        assert_eq!(out.code, "mo.md(\"say \\\"hi\\\"\")");
        assert_eq!(out.offset, 7);
    }

    #[test]
    fn test_trailing_backslash_uses_block_layout() {
        let parser = MarkdownParser::new();
        let out = parser.transform_out("line\\", &MarkdownMetadata::default());
        assert_eq!(out.code, "mo.md(\n    r\"\"\"\n    line\\\n    \"\"\"\n)");
        assert!(parser.is_supported(&out.code));
        let back = parser.transform_in(&out.code);
        assert_eq!(back.code, "line\\");
        assert_eq!(back.offset, out.offset);

        let metadata = MarkdownMetadata {
            quote_prefix: String::new(),
            quote_kind: QuoteKind::Single,
        };
        let out = parser.transform_out("hard break\\", &metadata);
        let back = parser.transform_in(&out.code);
        assert_eq!(back.code, "hard break\\");
        assert_eq!(back.metadata.quote_kind, QuoteKind::TripleSingle);
    }

    #[test]
    fn test_even_trailing_backslashes_stay_inline() {
        let parser = MarkdownParser::new();
        let out = parser.transform_out("path\\\\", &MarkdownMetadata::default());
        assert_eq!(out.code, "mo.md(r\"\"\"path\\\\\"\"\")");
        assert_eq!(parser.transform_in(&out.code).code, "path\\\\");
    }

    #[test]
    fn test_round_trip() {
        let parser = MarkdownParser::new();
        let source = "mo.md(\n    rf'''\n    ## {title}\n      - item\n    '''\n)";
        let first = parser.transform_in(source);
        let out = parser.transform_out(&first.code, &first.metadata);
        let second = parser.transform_in(&out.code);
        assert_eq!(second.code, first.code);
        assert_eq!(second.metadata, first.metadata);
    }
}

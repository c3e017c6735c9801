//! SQL cells: `df = mo.sql(...)`
//!
//! The cell is parsed with the tree-sitter Python grammar. It is supported when
//! the module holds optional leading comments and one assignment whose target
//! is a plain name and whose value calls `mo.sql` with a string literal plus at
//! most the `output` and `engine` keyword arguments.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::{Language, Node, Parser, Tree};

use super::quote::{
    char_offset, escape, extract_block, indent, needs_block_form, split_string_literal, QuoteKind,
};
use super::{LanguageKind, LanguageParser, ParseResult, SnippetError, TransformOutResult};

pub const DEFAULT_DATAFRAME_NAME: &str = "_df";
const DEFAULT_PREFIX: &str = "f";
const INDENT: &str = "    ";

static PYTHON: Lazy<Language> = Lazy::new(|| tree_sitter_python::LANGUAGE.into());

// Cheap gate before building a syntax tree
static SQL_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"mo\.sql\s*\(").expect("static pattern"));

/// Everything about a SQL cell that is not the query itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlMetadata {
    pub dataframe_name: String,
    pub quote_prefix: String,
    pub quote_kind: QuoteKind,
    /// `false` when the call passes `output=False`
    pub show_output: bool,
    /// Name passed as `engine=...`
    pub engine: Option<String>,
    /// Comment lines above the assignment, verbatim
    pub comment_lines: Vec<String>,
}

impl Default for SqlMetadata {
    fn default() -> Self {
        Self {
            dataframe_name: DEFAULT_DATAFRAME_NAME.to_string(),
            quote_prefix: DEFAULT_PREFIX.to_string(),
            quote_kind: QuoteKind::TripleDouble,
            show_output: true,
            engine: None,
            comment_lines: Vec::new(),
        }
    }
}

/// Parser for SQL cells, carrying the defaults used for fresh cells
#[derive(Debug, Clone)]
pub struct SqlParser {
    default_dataframe_name: String,
    default_engine: Option<String>,
}

impl Default for SqlParser {
    fn default() -> Self {
        Self {
            default_dataframe_name: DEFAULT_DATAFRAME_NAME.to_string(),
            default_engine: None,
        }
    }
}

struct Extracted {
    code: String,
    byte_offset: usize,
    metadata: SqlMetadata,
}

impl SqlParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_defaults(dataframe_name: impl Into<String>, engine: Option<String>) -> Self {
        Self {
            default_dataframe_name: dataframe_name.into(),
            default_engine: engine,
        }
    }

    fn extract(source: &str) -> Result<Extracted, SnippetError> {
        if !SQL_CALL.is_match(source) {
            return Err(SnippetError::Unsupported("no mo.sql call"));
        }
        let tree = parse_tree(source)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(SnippetError::Unsupported("syntax error"));
        }
        let bytes = source.as_bytes();

        let mut comment_lines = Vec::new();
        let mut statement = None;
        for child in named_children(root) {
            match child.kind() {
                "comment" if statement.is_none() => {
                    comment_lines.push(child.utf8_text(bytes)?.to_string());
                }
                "expression_statement" if statement.is_none() => statement = Some(child),
                _ => return Err(SnippetError::Unsupported("more than one statement")),
            }
        }
        let statement = statement.ok_or(SnippetError::Unsupported("no statement"))?;

        let expressions = named_children(statement);
        let &[assignment] = expressions.as_slice() else {
            return Err(SnippetError::Unsupported("not a single expression"));
        };
        if assignment.kind() != "assignment" || assignment.child_by_field_name("type").is_some() {
            return Err(SnippetError::Unsupported("not a plain assignment"));
        }
        let target = field(assignment, "left", "identifier")?;
        let call = field(assignment, "right", "call")?;
        let function = call
            .child_by_field_name("function")
            .ok_or(SnippetError::Unsupported("call without function"))?;
        if function.utf8_text(bytes)? != "mo.sql" {
            return Err(SnippetError::Unsupported("not mo.sql"));
        }
        let arguments = field(call, "arguments", "argument_list")?;

        let mut args = named_children(arguments).into_iter();
        let string = args
            .next()
            .filter(|node| node.kind() == "string")
            .ok_or(SnippetError::Unsupported("first argument is not a string"))?;

        let mut metadata = SqlMetadata {
            dataframe_name: target.utf8_text(bytes)?.to_string(),
            comment_lines,
            ..SqlMetadata::default()
        };
        let mut seen_output = false;
        for arg in args {
            if arg.kind() != "keyword_argument" {
                return Err(SnippetError::Unsupported("positional or commented argument"));
            }
            let name = field(arg, "name", "identifier")?.utf8_text(bytes)?;
            let value = arg
                .child_by_field_name("value")
                .ok_or(SnippetError::Unsupported("keyword without value"))?;
            match (name, value.kind()) {
                ("output", "true" | "false") if !seen_output => {
                    seen_output = true;
                    metadata.show_output = value.kind() == "true";
                }
                ("engine", "identifier") if metadata.engine.is_none() => {
                    metadata.engine = Some(value.utf8_text(bytes)?.to_string());
                }
                _ => return Err(SnippetError::Unsupported("unknown keyword argument")),
            }
        }

        let text = string.utf8_text(bytes)?;
        let literal = split_string_literal(text).ok_or(SnippetError::Unsupported("string literal"))?;
        metadata.quote_prefix = literal.prefix.to_string();
        metadata.quote_kind = literal.quote;
        let (code, lead) = extract_block(literal.content, literal.quote);

        Ok(Extracted {
            code,
            byte_offset: string.start_byte() + literal.content_start + lead,
            metadata,
        })
    }
}

fn parse_tree(source: &str) -> Result<Tree, SnippetError> {
    let mut parser = Parser::new();
    parser.set_language(&PYTHON)?;
    parser.parse(source, None).ok_or(SnippetError::NoTree)
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// Child in field `name`, required to be of node kind `kind`
fn field<'t>(node: Node<'t>, name: &'static str, kind: &str) -> Result<Node<'t>, SnippetError> {
    node.child_by_field_name(name)
        .filter(|child| child.kind() == kind)
        .ok_or(SnippetError::Unsupported(name))
}

impl LanguageParser for SqlParser {
    type Metadata = SqlMetadata;

    fn language(&self) -> LanguageKind {
        LanguageKind::Sql
    }

    fn default_metadata(&self) -> Self::Metadata {
        SqlMetadata {
            dataframe_name: self.default_dataframe_name.clone(),
            engine: self.default_engine.clone(),
            ..SqlMetadata::default()
        }
    }

    fn transform_in(&self, source: &str) -> ParseResult<Self::Metadata> {
        if source.trim().is_empty() {
            return ParseResult::passthrough("", self.default_metadata());
        }
        match Self::extract(source) {
            Ok(extracted) => ParseResult {
                code: extracted.code,
                offset: char_offset(source, extracted.byte_offset),
                metadata: extracted.metadata,
            },
            Err(e) => {
                debug!(error = %e, "source is not a SQL cell; passing through");
                ParseResult::passthrough(source, self.default_metadata())
            }
        }
    }

    fn transform_out(&self, code: &str, metadata: &Self::Metadata) -> TransformOutResult {
        let comments: String = metadata
            .comment_lines
            .iter()
            .map(|line| format!("{line}\n"))
            .collect();
        let name = &metadata.dataframe_name;
        let prefix = &metadata.quote_prefix;

        let mut keywords = Vec::new();
        if !metadata.show_output {
            keywords.push("output=False".to_string());
        }
        if let Some(engine) = &metadata.engine {
            keywords.push(format!("engine={engine}"));
        }

        if !metadata.quote_kind.is_triple() && !needs_block_form(code) {
            let quote = metadata.quote_kind;
            let delimiter = quote.delimiter();
            let head = format!("{comments}{name} = mo.sql({prefix}{delimiter}");
            let tail: String = keywords.iter().map(|kw| format!(", {kw}")).collect();
            return TransformOutResult {
                offset: head.chars().count(),
                code: format!("{head}{}{delimiter}{tail})", escape(code, quote)),
            };
        }

        let quote = metadata.quote_kind.to_triple();
        let delimiter = quote.delimiter();
        let head = format!("{comments}{name} = mo.sql(\n{INDENT}{prefix}{delimiter}\n");
        let body = indent(&escape(code, quote), INDENT);
        let tail: String = keywords.iter().map(|kw| format!(",\n{INDENT}{kw}")).collect();
        let first_line_indented = code.split('\n').next().is_some_and(|line| !line.is_empty());
        TransformOutResult {
            offset: head.chars().count() + if first_line_indented { INDENT.len() } else { 0 },
            code: format!("{head}{body}\n{INDENT}{delimiter}{tail}\n)"),
        }
    }

    fn is_supported(&self, source: &str) -> bool {
        source.trim().is_empty() || Self::extract(source).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_in_triple_quoted() {
        let parser = SqlParser::new();
        let source = "_df = mo.sql(\n    f\"\"\"\n    SELECT *\n    FROM t\n    \"\"\"\n)";
        let result = parser.transform_in(source);
        assert_eq!(result.code, "SELECT *\nFROM t");
        assert_eq!(result.offset, source.find("SELECT").unwrap());
        assert_eq!(result.metadata, SqlMetadata::default());
        assert!(parser.is_supported(source));
    }

    #[test]
    fn test_keyword_arguments() {
        let parser = SqlParser::new();
        let source = "res = mo.sql(f\"SELECT 1\", output=False, engine=duck)";
        let result = parser.transform_in(source);
        assert_eq!(result.code, "SELECT 1");
        assert_eq!(result.metadata.dataframe_name, "res");
        assert_eq!(result.metadata.quote_kind, QuoteKind::Double);
        assert!(!result.metadata.show_output);
        assert_eq!(result.metadata.engine.as_deref(), Some("duck"));

        let out = parser.transform_out(&result.code, &result.metadata);
        assert_eq!(out.code, source);
        assert_eq!(out.offset, result.offset);
    }

    #[test]
    fn test_leading_comments_are_kept() {
        let parser = SqlParser::new();
        let source = "# header\n# more\ndf = mo.sql(f'SELECT 2')";
        let result = parser.transform_in(source);
        assert_eq!(result.metadata.comment_lines, vec!["# header", "# more"]);
        assert_eq!(parser.transform_out(&result.code, &result.metadata).code, source);
    }

    #[test]
    fn test_offset_counts_characters() {
        let parser = SqlParser::new();
        let source = "# café\ndf = mo.sql(f\"SELECT 1\")";
        let result = parser.transform_in(source);
        assert_eq!(result.code, "SELECT 1");
        assert_eq!(result.offset, source.find("SELECT").unwrap() - 1);
    }

    #[test]
    fn test_unsupported_shapes_pass_through() {
        let parser = SqlParser::with_defaults("result", None);
        for source in [
            "df = mo.sql(query)",
            "mo.sql('SELECT 1')",
            "a, b = mo.sql('SELECT 1')",
            "df: int = mo.sql('SELECT 1')",
            "df = mo.sql('SELECT 1')\nprint(df)",
            "df = mo.sql('SELECT 1', limit=3)",
            "df = mo.sql('SELECT 1', output=maybe)",
            "df = mo.sql('a' 'b')",
            "df = mo.sql(",
            "df = other.sql('SELECT 1')",
            "x = 1",
        ] {
            assert!(!parser.is_supported(source), "{source}");
            let result = parser.transform_in(source);
            assert_eq!(result.code, source);
            assert_eq!(result.offset, 0);
            assert_eq!(result.metadata.dataframe_name, "result");
        }
    }

    #[test]
    fn test_transform_out_multiline_with_options() {
        let parser = SqlParser::new();
        let metadata = SqlMetadata {
            show_output: false,
            engine: Some("conn".to_string()),
            ..SqlMetadata::default()
        };
        let out = parser.transform_out("SELECT *\nFROM t", &metadata);
        assert_eq!(
            out.code,
            "_df = mo.sql(\n    f\"\"\"\n    SELECT *\n    FROM t\n    \"\"\",\n    output=False,\n    engine=conn\n)"
        );
        assert_eq!(&out.code[out.offset..out.offset + 8], "SELECT *");

        let back = parser.transform_in(&out.code);
        assert_eq!(back.code, "SELECT *\nFROM t");
        assert_eq!(back.metadata, metadata);
    }

    #[test]
    fn test_escaped_delimiter_round_trip() {
        let parser = SqlParser::new();
        let code = "SELECT '\"\"\"' AS q";
        let out = parser.transform_out(code, &SqlMetadata::default());
        let back = parser.transform_in(&out.code);
        assert_eq!(back.code, code);
    }

    #[test]
    fn test_single_quote_upgrades_for_multiline_code() {
        let parser = SqlParser::new();
        let metadata = SqlMetadata {
            quote_kind: QuoteKind::Single,
            ..SqlMetadata::default()
        };
        let out = parser.transform_out("SELECT 1\nUNION SELECT 2", &metadata);
        let back = parser.transform_in(&out.code);
        assert_eq!(back.code, "SELECT 1\nUNION SELECT 2");
        assert_eq!(back.metadata.quote_kind, QuoteKind::TripleSingle);
    }

    #[test]
    fn test_trailing_backslash_uses_block_layout() {
        let parser = SqlParser::new();
        for quote_kind in QuoteKind::ALL {
            let metadata = SqlMetadata {
                quote_kind,
                ..SqlMetadata::default()
            };
            let out = parser.transform_out("SELECT 1 \\", &metadata);
            assert!(out.code.contains("\n    SELECT 1 \\\n"), "{}", out.code);
            assert!(parser.is_supported(&out.code), "{}", out.code);
            let back = parser.transform_in(&out.code);
            assert_eq!(back.code, "SELECT 1 \\");
            assert_eq!(back.metadata.quote_kind, quote_kind.to_triple());
        }
    }

    #[test]
    fn test_empty_source_uses_configured_defaults() {
        let parser = SqlParser::with_defaults("result", Some("warehouse".to_string()));
        assert!(parser.is_supported(""));
        let result = parser.transform_in("");
        assert_eq!(result.code, "");
        assert_eq!(result.metadata.dataframe_name, "result");
        assert_eq!(result.metadata.engine.as_deref(), Some("warehouse"));
    }
}

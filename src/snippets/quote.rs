//! Python string literal helpers shared by the snippet parsers
//!
//! Handles the prefix/quote combinations the parsers accept, escaping of the
//! closing delimiter, and the dedent rules applied to extracted blocks.

use serde::{Deserialize, Serialize};

/// Quote style of a string literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteKind {
    #[default]
    TripleDouble,
    TripleSingle,
    Double,
    Single,
}

impl QuoteKind {
    /// Triple quotes first so `"""` is never read as an empty `""`
    pub const ALL: [Self; 4] = [Self::TripleDouble, Self::TripleSingle, Self::Double, Self::Single];

    #[must_use]
    pub const fn delimiter(self) -> &'static str {
        match self {
            Self::TripleDouble => "\"\"\"",
            Self::TripleSingle => "'''",
            Self::Double => "\"",
            Self::Single => "'",
        }
    }

    #[must_use]
    pub const fn is_triple(self) -> bool {
        matches!(self, Self::TripleDouble | Self::TripleSingle)
    }

    /// Triple-quoted form of the same quote character
    #[must_use]
    pub const fn to_triple(self) -> Self {
        match self {
            Self::Double | Self::TripleDouble => Self::TripleDouble,
            Self::Single | Self::TripleSingle => Self::TripleSingle,
        }
    }

    const fn quote_char(self) -> char {
        match self {
            Self::TripleDouble | Self::Double => '"',
            Self::TripleSingle | Self::Single => '\'',
        }
    }
}

/// Whether `prefix` is one of the accepted string prefixes (none, r, f, rf, fr)
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    matches!(prefix.to_ascii_lowercase().as_str(), "" | "r" | "f" | "rf" | "fr")
}

/// A string literal split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral<'a> {
    pub prefix: &'a str,
    pub quote: QuoteKind,
    /// Raw text between the quotes, still escaped
    pub content: &'a str,
    /// Byte offset of `content` within the literal
    pub content_start: usize,
}

/// Split a complete string literal such as `r"""text"""`
///
/// Returns `None` unless `literal` is exactly one literal: a valid prefix, a
/// matching pair of quotes, and no unescaped closing delimiter in between.
#[must_use]
pub fn split_string_literal(literal: &str) -> Option<StringLiteral<'_>> {
    let prefix_len = literal
        .find(|c: char| !matches!(c, 'r' | 'R' | 'f' | 'F'))
        .unwrap_or(literal.len());
    let (prefix, rest) = literal.split_at(prefix_len);
    if !is_valid_prefix(prefix) {
        return None;
    }

    let quote = QuoteKind::ALL
        .into_iter()
        .find(|kind| rest.starts_with(kind.delimiter()))?;
    let delimiter = quote.delimiter();
    if rest.len() < delimiter.len() * 2 || !rest.ends_with(delimiter) {
        return None;
    }

    let content = &rest[delimiter.len()..rest.len() - delimiter.len()];
    if find_unescaped(content, delimiter).is_some() || ends_with_escape(content) {
        return None;
    }
    if !quote.is_triple() && content.contains('\n') {
        return None;
    }

    Some(StringLiteral {
        prefix,
        quote,
        content,
        content_start: prefix_len + delimiter.len(),
    })
}

/// Byte index of the first `needle` not preceded by an odd run of backslashes
fn find_unescaped(haystack: &str, needle: &str) -> Option<usize> {
    // Overlapping positions count: `\""""` still closes at the second quote
    (0..haystack.len())
        .filter(|&index| haystack.is_char_boundary(index) && haystack[index..].starts_with(needle))
        .find(|&index| {
            let backslashes = haystack[..index].bytes().rev().take_while(|&b| b == b'\\').count();
            backslashes % 2 == 0
        })
}

fn ends_with_escape(content: &str) -> bool {
    content.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Whether `code` has to be written in the indented triple-quoted layout
///
/// Besides multi-line code this covers an odd trailing backslash run, which
/// would otherwise escape the first closing quote. In the block layout a newline
/// sits between the two.
#[must_use]
pub fn needs_block_form(code: &str) -> bool {
    code.contains('\n') || ends_with_escape(code)
}

/// Escape content so it cannot terminate a literal quoted with `quote`
///
/// Every quote character that would complete a closing delimiter gets a
/// backslash, as does a trailing one, which would merge with the closing
/// quotes. Existing backslash escapes are left alone.
#[must_use]
pub fn escape(content: &str, quote: QuoteKind) -> String {
    let quote_char = quote.quote_char();
    let closing_run = quote.delimiter().len();
    let mut escaped = String::with_capacity(content.len() + 4);
    let mut run = 0;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            escaped.push(c);
            if let Some(next) = chars.next() {
                escaped.push(next);
            }
            run = 0;
            continue;
        }
        if c == quote_char {
            if run + 1 == closing_run || chars.peek().is_none() {
                escaped.push('\\');
                run = 0;
            } else {
                run += 1;
            }
        } else {
            run = 0;
        }
        escaped.push(c);
    }
    escaped
}

/// Inverse of [`escape`]: drops the backslash in front of each quote character
#[must_use]
pub fn unescape(content: &str, quote: QuoteKind) -> String {
    let quote_char = quote.quote_char();
    let mut unescaped = String::with_capacity(content.len());
    let mut chars = content.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == quote_char => unescaped.push(next),
            Some(next) => {
                unescaped.push(c);
                unescaped.push(next);
            }
            None => unescaped.push(c),
        }
    }
    unescaped
}

/// Number of leading spaces/tabs on a line
fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Remove the common leading whitespace of all non-blank lines
#[must_use]
pub fn dedent(text: &str) -> String {
    let common = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(indent_width)
        .min()
        .unwrap_or(0);

    text.split('\n')
        .map(|line| &line[indent_width(line).min(common)..])
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every non-blank line
#[must_use]
pub fn indent(text: &str, prefix: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn raw literal content into the block an editor shows
///
/// Drops one newline right after the opening quotes and a whitespace-only last
/// line before the closing quotes, then dedents. Returns the block and the
/// byte offset in `content` where its first character comes from.
#[must_use]
pub fn extract_block(content: &str, quote: QuoteKind) -> (String, usize) {
    let mut body = content;
    let mut lead = 0;
    if let Some(rest) = body.strip_prefix('\n') {
        body = rest;
        lead = 1;
    }
    if let Some(last_newline) = body.rfind('\n') {
        if body[last_newline + 1..].trim().is_empty() {
            body = &body[..last_newline];
        }
    } else if body.trim().is_empty() {
        body = "";
    }

    let code = dedent(&unescape(body, quote));
    let first_line = body.split('\n').next().unwrap_or("");
    let removed = if first_line.trim().is_empty() {
        0
    } else {
        indent_width(first_line) - first_indent_kept(&code)
    };
    (code, lead + removed)
}

fn first_indent_kept(code: &str) -> usize {
    code.split('\n').next().map_or(0, indent_width)
}

/// Convert a byte offset in `text` to a character offset
#[must_use]
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte.min(text.len())].chars().count()
}

//! Plain Python cells

use super::{LanguageKind, LanguageParser, ParseResult, TransformOutResult};

/// Identity parser; every source is supported
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonParser;

impl PythonParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LanguageParser for PythonParser {
    type Metadata = ();

    fn language(&self) -> LanguageKind {
        LanguageKind::Python
    }

    fn default_metadata(&self) -> Self::Metadata {}

    fn transform_in(&self, source: &str) -> ParseResult<Self::Metadata> {
        ParseResult::passthrough(source, ())
    }

    fn transform_out(&self, code: &str, _metadata: &Self::Metadata) -> TransformOutResult {
        TransformOutResult {
            code: code.to_string(),
            offset: 0,
        }
    }

    fn is_supported(&self, _source: &str) -> bool {
        true
    }
}

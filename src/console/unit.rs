//! Output units emitted by a running cell.
//!
//! A unit is one chunk of content tagged with the channel it came from, its
//! mimetype and the time it was emitted. Only plain-text units on a logging
//! channel carry terminal control sequences; everything else is opaque.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Logical origin of an output unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Rich display output (the cell's return value)
    Output,
    Stdout,
    Stderr,
    Stdin,
    /// Debugger session output
    Pdb,
    /// Errors reported by the notebook runtime itself
    MarimoError,
    Media,
}

impl Channel {
    /// Whether text on this channel behaves like a terminal log
    #[must_use]
    pub const fn is_logging(self) -> bool {
        matches!(self, Self::Stdout | Self::Stderr | Self::MarimoError)
    }
}

/// Mimetype of an output unit's payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mimetype {
    TextPlain,
    TextHtml,
    TextMarkdown,
    Json,
    Traceback,
    Other(String),
}

impl Mimetype {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TextPlain => "text/plain",
            Self::TextHtml => "text/html",
            Self::TextMarkdown => "text/markdown",
            Self::Json => "application/json",
            Self::Traceback => "application/vnd.marimo+traceback",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for Mimetype {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text/plain" => Self::TextPlain,
            "text/html" => Self::TextHtml,
            "text/markdown" => Self::TextMarkdown,
            "application/json" => Self::Json,
            "application/vnd.marimo+traceback" => Self::Traceback,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Mimetype {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Mimetype> for String {
    fn from(value: Mimetype) -> Self {
        match value {
            Mimetype::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Mimetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an output unit
///
/// Strings always decode as [`OutputData::Text`]; any other JSON value is kept
/// as-is and never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputData {
    Text(String),
    Structured(serde_json::Value),
}

impl OutputData {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }
}

impl From<String> for OutputData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for OutputData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One discrete chunk of emitted content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputUnit {
    pub channel: Channel,
    pub mimetype: Mimetype,
    pub data: OutputData,
    #[serde(default)]
    pub timestamp: f64,
}

/// How the collapse pipeline treats a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind<'a> {
    /// Plain text on a logging channel; control sequences are interpreted
    Console(&'a str),
    /// Anything else; passed through untouched
    Opaque,
}

impl OutputUnit {
    /// Create a unit with arbitrary mimetype and payload
    #[must_use]
    pub fn new(
        channel: Channel,
        mimetype: impl Into<Mimetype>,
        data: impl Into<OutputData>,
        timestamp: f64,
    ) -> Self {
        Self {
            channel,
            mimetype: mimetype.into(),
            data: data.into(),
            timestamp,
        }
    }

    /// Create a `text/plain` unit
    #[must_use]
    pub fn text(channel: Channel, text: impl Into<String>, timestamp: f64) -> Self {
        Self::new(channel, Mimetype::TextPlain, OutputData::Text(text.into()), timestamp)
    }

    #[must_use]
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::text(Channel::Stdout, text, 0.0)
    }

    #[must_use]
    pub fn stderr(text: impl Into<String>) -> Self {
        Self::text(Channel::Stderr, text, 0.0)
    }

    #[must_use]
    pub fn kind(&self) -> UnitKind<'_> {
        match (&self.mimetype, &self.data) {
            (Mimetype::TextPlain, OutputData::Text(text)) if self.channel.is_logging() => {
                UnitKind::Console(text)
            }
            _ => UnitKind::Opaque,
        }
    }

    /// Text payload of a `text/plain` unit on any channel
    #[must_use]
    pub fn plain_text(&self) -> Option<&str> {
        match self.mimetype {
            Mimetype::TextPlain => self.data.as_text(),
            _ => None,
        }
    }

    /// Copy of this unit carrying different text
    #[must_use]
    pub fn with_text(&self, text: String) -> Self {
        Self {
            channel: self.channel,
            mimetype: self.mimetype.clone(),
            data: OutputData::Text(text),
            timestamp: self.timestamp,
        }
    }

    /// Decode a unit from one line of JSON
    ///
    /// # Errors
    /// Returns an error if the line is not a JSON object with the unit fields
    pub fn from_json_line(line: &str) -> Result<Self, UnitDecodeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(UnitDecodeError::Empty);
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}

/// Failure decoding a serialized output unit
#[derive(Debug, Error)]
pub enum UnitDecodeError {
    #[error("empty input line")]
    Empty,
    #[error("invalid output unit: {0}")]
    Json(#[from] serde_json::Error),
}

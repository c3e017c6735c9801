//! Tail-window truncation of collapsed output
//!
//! Keeps the most recent `max_lines` lines across all units and prepends a
//! single notice when anything was dropped. Non-text units count as one line
//! each no matter how large they render.

use super::unit::{Channel, OutputUnit};

/// Default notice; `{max_lines}` is replaced by the budget
pub const DEFAULT_TRUNCATION_NOTICE: &str = "Streaming output truncated to last {max_lines} lines.";

/// Line budget and the notice shown when it is exceeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationPolicy {
    /// `None` disables truncation; zero or negative keeps only the notice
    pub max_lines: Option<i64>,
    pub notice: String,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            max_lines: None,
            notice: DEFAULT_TRUNCATION_NOTICE.to_string(),
        }
    }
}

impl TruncationPolicy {
    #[must_use]
    pub fn with_max_lines(max_lines: i64) -> Self {
        Self {
            max_lines: Some(max_lines),
            ..Self::default()
        }
    }

    fn notice_unit(&self, max_lines: i64, timestamp: f64) -> OutputUnit {
        let text = self.notice.replace("{max_lines}", &max_lines.to_string());
        OutputUnit::text(Channel::Output, text, timestamp)
    }
}

/// Number of visible lines a unit takes up
///
/// A trailing partial line counts as one line; empty text has none.
#[must_use]
pub fn line_count(unit: &OutputUnit) -> usize {
    match unit.plain_text() {
        Some(text) => text.split_inclusive('\n').count(),
        None => 1,
    }
}

/// Keep the trailing `keep` lines of a text unit
fn tail_lines(unit: &OutputUnit, text: &str, keep: usize) -> OutputUnit {
    let total = text.split_inclusive('\n').count();
    let start = text
        .split_inclusive('\n')
        .take(total - keep)
        .map(str::len)
        .sum::<usize>();
    unit.with_text(text[start..].to_string())
}

/// Apply the tail window to an already-collapsed list
#[must_use]
pub fn truncate_outputs(units: &[OutputUnit], policy: &TruncationPolicy) -> Vec<OutputUnit> {
    let Some(max_lines) = policy.max_lines else {
        return units.to_vec();
    };

    let total: usize = units.iter().map(line_count).sum();
    let budget = usize::try_from(max_lines).unwrap_or(0);
    if total <= budget {
        return units.to_vec();
    }

    tracing::debug!(total, max_lines, "truncating streamed output");

    let oldest = units.first().map_or(0.0, |unit| unit.timestamp);
    let mut kept = Vec::new();
    let mut remaining = budget;

    for unit in units.iter().rev() {
        if remaining == 0 {
            break;
        }
        let lines = line_count(unit);
        if lines <= remaining {
            kept.push(unit.clone());
            remaining -= lines;
        } else {
            // Only text can take up more than one line
            if let Some(text) = unit.plain_text() {
                kept.push(tail_lines(unit, text, remaining));
            }
            remaining = 0;
        }
    }

    kept.push(policy.notice_unit(max_lines, oldest));
    kept.reverse();
    kept
}

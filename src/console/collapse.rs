//! Merge policy for consecutive output units
//!
//! Adjacent console units on the same channel are coalesced into one unit and
//! their control sequences applied. Everything else stays a standalone unit.
//! These functions are pure: inputs are borrowed and never modified, and every
//! call builds a fresh list.

use super::ansi_parser::interpret;
use super::truncate::{truncate_outputs, TruncationPolicy};
use super::unit::{OutputUnit, UnitKind};

/// Whether `next` continues the console text of `prev`
#[must_use]
pub fn can_merge(prev: &OutputUnit, next: &OutputUnit) -> bool {
    matches!(
        (prev.kind(), next.kind()),
        (UnitKind::Console(_), UnitKind::Console(_)) if prev.channel == next.channel
    )
}

/// Normalise a unit that starts a new run
///
/// A single raw chunk may carry its own `\r` or escape sequences, so console
/// units are rendered once even without a predecessor.
fn normalize(unit: &OutputUnit) -> OutputUnit {
    match unit.kind() {
        UnitKind::Console(text) => unit.with_text(interpret("", text)),
        UnitKind::Opaque => unit.clone(),
    }
}

/// Push `next` onto an owned, already-collapsed list
fn push_collapsed(out: &mut Vec<OutputUnit>, next: &OutputUnit) {
    if let Some(prev) = out.last_mut() {
        if can_merge(prev, next) {
            if let (UnitKind::Console(rendered), UnitKind::Console(raw)) = (prev.kind(), next.kind()) {
                // Timestamp of the first chunk is kept
                *prev = prev.with_text(interpret(rendered, raw));
                return;
            }
        }
    }
    out.push(normalize(next));
}

/// Collapse a whole list of raw units
#[must_use]
pub fn collapse_console_outputs(units: &[OutputUnit]) -> Vec<OutputUnit> {
    let mut out = Vec::with_capacity(units.len());
    for unit in units {
        push_collapsed(&mut out, unit);
    }
    out
}

/// Append one newly arrived unit to an already-collapsed list
#[must_use]
pub fn append_output(collapsed: &[OutputUnit], next: OutputUnit) -> Vec<OutputUnit> {
    let mut out = collapsed.to_vec();
    push_collapsed(&mut out, &next);
    out
}

/// Collapse, then keep at most `max_lines` lines
///
/// `None` disables truncation.
#[must_use]
pub fn collapse_with_budget(units: &[OutputUnit], max_lines: Option<i64>) -> Vec<OutputUnit> {
    let collapsed = collapse_console_outputs(units);
    let policy = TruncationPolicy {
        max_lines,
        ..TruncationPolicy::default()
    };
    truncate_outputs(&collapsed, &policy)
}

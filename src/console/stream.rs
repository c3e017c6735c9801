//! Stateful collapsing for live output
//!
//! Re-rendering from the previous string loses the cursor, so a progress bar
//! that moves up two lines on the next chunk would address the wrong text.
//! [`StatefulOutputUnit`] keeps the interpreter's line buffer and cursor alive
//! between chunks, and [`OutputStream`] drives one of them for the most recent
//! console run.

use tracing::debug;

use super::ansi_parser::Terminal;
use super::collapse::can_merge;
use super::truncate::{truncate_outputs, TruncationPolicy};
use super::unit::{OutputUnit, UnitKind};

/// An output unit that owns its interpreter state
#[derive(Debug)]
pub struct StatefulOutputUnit {
    unit: OutputUnit,
    terminal: Terminal,
}

impl StatefulOutputUnit {
    /// Start tracking a console unit
    ///
    /// Returns `None` for opaque units, which have nothing to interpret.
    #[must_use]
    pub fn new(unit: OutputUnit) -> Option<Self> {
        let UnitKind::Console(raw) = unit.kind() else {
            return None;
        };
        let mut terminal = Terminal::new();
        terminal.feed(raw);
        let unit = unit.with_text(terminal.render());
        Some(Self { unit, terminal })
    }

    /// Whether `next` belongs to this unit's run
    #[must_use]
    pub fn accepts(&self, next: &OutputUnit) -> bool {
        can_merge(&self.unit, next)
    }

    /// Feed another raw chunk of the same run
    pub fn push_raw(&mut self, chunk: &str) {
        self.terminal.feed(chunk);
        self.unit = self.unit.with_text(self.terminal.render());
    }

    /// The rendered unit as of the last chunk
    #[must_use]
    pub fn unit(&self) -> &OutputUnit {
        &self.unit
    }

    #[must_use]
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Drop the interpreter state and keep the rendered unit
    #[must_use]
    pub fn into_unit(self) -> OutputUnit {
        self.unit
    }
}

/// Incremental collapse over a single ordered stream of units
#[derive(Debug, Default)]
pub struct OutputStream {
    settled: Vec<OutputUnit>,
    live: Option<StatefulOutputUnit>,
    policy: TruncationPolicy,
}

impl OutputStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: TruncationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Accept a newly arrived unit
    pub fn push(&mut self, next: OutputUnit) {
        if let Some(live) = self.live.as_mut() {
            if live.accepts(&next) {
                if let UnitKind::Console(raw) = next.kind() {
                    live.push_raw(raw);
                    return;
                }
            }
        }

        if let Some(previous) = self.live.take() {
            debug!(channel = ?previous.unit().channel, "retiring live output unit");
            self.settled.push(previous.into_unit());
        }

        match next.kind() {
            UnitKind::Console(_) => self.live = StatefulOutputUnit::new(next),
            UnitKind::Opaque => self.settled.push(next),
        }
    }

    /// The unit currently carrying interpreter state, if any
    #[must_use]
    pub fn live(&self) -> Option<&StatefulOutputUnit> {
        self.live.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settled.is_empty() && self.live.is_none()
    }

    /// Number of collapsed units, before truncation
    #[must_use]
    pub fn len(&self) -> usize {
        self.settled.len() + usize::from(self.live.is_some())
    }

    /// Discard all output and interpreter state
    pub fn clear(&mut self) {
        self.settled.clear();
        self.live = None;
    }

    /// Fresh copy of the collapsed output with the line budget applied
    #[must_use]
    pub fn snapshot(&self) -> Vec<OutputUnit> {
        let mut units = Vec::with_capacity(self.len());
        units.extend(self.settled.iter().cloned());
        if let Some(live) = &self.live {
            units.push(live.unit().clone());
        }
        truncate_outputs(&units, &self.policy)
    }
}

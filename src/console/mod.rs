//! Console output collapsing
//!
//! This module turns the raw chunks a running cell emits into the minimal list
//! of units a view should render:
//! - `unit`: output units, channels and mimetypes
//! - `ansi_parser`: control sequence interpreter over a virtual line buffer
//! - `collapse`: merge policy for adjacent units (pure)
//! - `stream`: stateful variant that keeps the interpreter alive across chunks
//! - `truncate`: tail-window line budget
//!
//! # Architecture
//! ```text
//! raw units ──► collapse (merge + interpret) ──► truncate ──► rendered units
//!                   │
//!                   └── OutputStream keeps a StatefulOutputUnit for live runs
//! ```

pub mod ansi_parser;
pub mod collapse;
pub mod stream;
pub mod truncate;
pub mod unit;

pub use ansi_parser::{interpret, Screen, Terminal};
pub use collapse::{append_output, can_merge, collapse_console_outputs, collapse_with_budget};
pub use stream::{OutputStream, StatefulOutputUnit};
pub use truncate::{line_count, truncate_outputs, TruncationPolicy, DEFAULT_TRUNCATION_NOTICE};
pub use unit::{Channel, Mimetype, OutputData, OutputUnit, UnitDecodeError, UnitKind};

//! Cellout - console output collapsing and snippet parsing for notebook cells
//!
//! This library turns the raw output chunks a running cell produces into the
//! list a view should render, and converts cell source between Python and the
//! inner language an editor shows.
//!
//! # Modules
//!
//! - [`console`]: control sequence interpreter, merge policy, streaming and truncation
//! - [`snippets`]: markdown, SQL and Python cell parsers with a detection registry
//! - [`config`]: Configuration management and serialization

pub mod config;
pub mod console;
pub mod snippets;

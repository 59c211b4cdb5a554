//! Strand loader
//!
//! Resolves flow names to validated [`Flow`](strand_flow::Flow) values.
//! The filesystem provider maps a name to `<dir>/<name>.json`, caches parsed
//! flows keyed by file modification time, and lists the available flows when
//! a lookup misses.

mod error;
mod provider;

pub use error::LoadError;
pub use provider::{FlowProvider, FsFlowProvider, parse_flow};

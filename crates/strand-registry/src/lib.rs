//! Strand Registry
//!
//! A lookup table mapping function names to callable units of work. The
//! registry is built by the embedding process and injected into the engine;
//! the engine consults it read-only and knows nothing about a function's
//! internals beyond the input/output contract.

mod builtin;
mod error;
mod function;
mod registry;

pub use builtin::{EchoFunction, MergeFunction, register_builtins};
pub use error::{FunctionError, RegistryError};
pub use function::{FlowFunction, Inputs};
pub use registry::FunctionRegistry;

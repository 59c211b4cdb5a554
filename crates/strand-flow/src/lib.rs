//! Strand Flow
//!
//! This crate contains the flow definition types for Strand and the compiled
//! flow representation the engine executes.
//!
//! A flow arrives as JSON (via file, inline text, or database blob) and is
//! deserialized into [`FlowDef`]. Compiling the definition with
//! [`Flow::from_def`] validates it once - duplicate ids, reference grammar,
//! reference targets - and parses every `$`-prefixed input string into a typed
//! [`ValueExpr`] node so nothing is re-parsed per execution.

mod condition;
mod def;
mod error;
mod expr;
mod flow;

pub use condition::{CompareOp, Condition};
pub use def::{ConditionDef, FlowDef, FlowInputsDef, StepDef, TaskDef};
pub use error::FlowError;
pub use expr::ValueExpr;
pub use flow::{Flow, Step, Task};

//! Strand Engine
//!
//! The flow execution engine. It walks a compiled [`strand_flow::Flow`]'s
//! steps in declaration order; within a step it resolves every task's inputs
//! against the accumulated [`ResolutionContext`], invokes the registered
//! functions concurrently, records outputs under `(step_id, task_id)`, and
//! finally projects the exported task outputs into an [`ExportedResult`].
//!
//! One engine run owns one context exclusively; concurrent runs are fully
//! isolated. The single consistency guarantee: a task output is visible to
//! later steps only, never to same-step siblings.

mod context;
mod engine;
mod error;
mod events;
mod export;
mod resolve;

pub use context::ResolutionContext;
pub use engine::{EngineOptions, FailurePolicy, FlowEngine, FlowResult, TaskFailure};
pub use error::{ExecutionError, ResolveError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use export::{Export, ExportedResult, export};
pub use resolve::resolve;

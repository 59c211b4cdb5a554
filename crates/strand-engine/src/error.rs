//! Error types for flow execution.

use strand_registry::FunctionError;
use thiserror::Error;

/// Failure to evaluate a reference expression against the context.
///
/// Both variants indicate a static authoring defect (a misspelled id, a
/// reference to something never produced) and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
  /// The referenced flow parameter was declared but never bound.
  #[error("unbound flow parameter '{name}'")]
  UnboundParameter { name: String },

  /// The referenced task output is not present in the context (skipped task,
  /// failed task, or an id that never ran).
  #[error("unresolved reference to '$step.{step_id}.{task_id}'")]
  UnresolvedReference { step_id: String, task_id: String },
}

/// Errors that can occur during flow execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// A task names a function absent from the registry. Raised in preflight,
  /// before any task runs.
  #[error("unknown function '{function}' for task '{step_id}.{task_id}'")]
  UnknownFunction {
    step_id: String,
    task_id: String,
    function: String,
  },

  /// Failed to resolve a task's inputs.
  #[error("input resolution failed for task '{step_id}.{task_id}': {source}")]
  InputResolution {
    step_id: String,
    task_id: String,
    #[source]
    source: ResolveError,
  },

  /// Failed to resolve a `when` condition's reference.
  #[error("condition resolution failed for '{scope}': {source}")]
  ConditionResolution {
    /// `step_id` or `step_id.task_id`.
    scope: String,
    #[source]
    source: ResolveError,
  },

  /// The registered function itself failed.
  #[error("function '{function}' failed for task '{step_id}.{task_id}': {source}")]
  FunctionFailed {
    step_id: String,
    task_id: String,
    function: String,
    #[source]
    source: FunctionError,
  },

  /// Flow execution was cancelled.
  #[error("flow execution cancelled")]
  Cancelled,

  /// A spawned task could not be joined.
  #[error("task join error: {message}")]
  Join { message: String },
}

impl ExecutionError {
  /// The `step_id.task_id` coordinates of the failing task, if any.
  pub fn task_scope(&self) -> Option<(&str, &str)> {
    match self {
      ExecutionError::UnknownFunction {
        step_id, task_id, ..
      }
      | ExecutionError::InputResolution {
        step_id, task_id, ..
      }
      | ExecutionError::FunctionFailed {
        step_id, task_id, ..
      } => Some((step_id, task_id)),
      _ => None,
    }
  }
}

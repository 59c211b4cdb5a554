use thiserror::Error;

/// Errors detected while compiling a flow definition.
///
/// All of these are authoring defects: they are raised once at load time and
/// are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
  #[error("duplicate step id '{step_id}'")]
  DuplicateStepId { step_id: String },

  #[error("duplicate task id '{task_id}' in step '{step_id}'")]
  DuplicateTaskId { step_id: String, task_id: String },

  #[error("malformed reference '{reference}'")]
  MalformedReference { reference: String },

  #[error("reference '$flow.{name}' does not match a declared parameter")]
  UndeclaredParameter { name: String },

  #[error(
    "reference '$step.{step_id}.{task_id}' targets a step that is not strictly earlier (in {scope})"
  )]
  ForwardReference {
    step_id: String,
    task_id: String,
    /// The step or task declaring the offending reference.
    scope: String,
  },

  #[error("reference '$step.{step_id}.{task_id}' does not match any known task")]
  UnknownReferenceTarget { step_id: String, task_id: String },

  /// Exported outputs are keyed by task id in the result, so two exported
  /// tasks may not share one even across steps.
  #[error(
    "task id '{task_id}' is exported from both step '{first_step_id}' and step '{second_step_id}'"
  )]
  DuplicateExportId {
    task_id: String,
    first_step_id: String,
    second_step_id: String,
  },

  #[error("default declared for unknown parameter '{name}'")]
  UndeclaredDefault { name: String },

  #[error("unknown comparison operator '{op}'")]
  UnknownOperator { op: String },
}

use thiserror::Error;

/// Batch-level orchestration errors.
///
/// The graph errors are authoring defects raised before any generation runs;
/// none of these are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QaError {
  /// The predecessor graph contains a cycle.
  #[error("dependency cycle among questions: {}", ids.join(", "))]
  DependencyCycle { ids: Vec<String> },

  #[error("duplicate question id '{id}'")]
  DuplicateQuestionId { id: String },

  #[error("question '{id}' depends on unknown question '{predecessor_id}'")]
  UnknownPredecessor { id: String, predecessor_id: String },

  /// The batch was cancelled before completing.
  #[error("question answering cancelled")]
  Cancelled,

  /// A generator crashed instead of returning an error.
  #[error("answer generation aborted: {message}")]
  GenerationPanicked { message: String },
}

/// Failure reported by an answer generator for a single question.
///
/// Recoverable at the batch level: the offending question's record is marked
/// invalid instead of aborting sibling questions.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct GenerateError {
  pub message: String,
}

impl GenerateError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

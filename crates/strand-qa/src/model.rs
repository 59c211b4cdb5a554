//! Question and answer records.
//!
//! Field names follow the camelCase wire shape of the surrounding processor
//! protocol, so a flow can pass question payloads through untouched.

use serde::{Deserialize, Serialize};

/// A unit of work: one question with optional predecessor dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub question: String,
  #[serde(default)]
  pub answer_type: String,
  #[serde(default)]
  pub guidelines: String,
  #[serde(default)]
  pub expected_answer: String,
  /// Ids of questions whose answers must be available before this one runs.
  #[serde(default)]
  pub input_question_ids: Vec<String>,
}

/// The answer produced for one question.
///
/// Created exactly once per question, never mutated after creation, and
/// ordered in the final export to match the original question order
/// regardless of execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
  pub id: String,
  pub question: String,
  #[serde(default)]
  pub expected_answer: String,
  /// Generated content with citations.
  #[serde(default)]
  pub sourced_content: String,
  #[serde(default)]
  pub explanation: String,
  /// Validity score in [0, 1]; 0.0 marks a failed or blocked answer.
  #[serde(default)]
  pub answer_validity: f64,
  #[serde(default)]
  pub validity_explanation: String,
  /// Opaque annotation payloads; the upstream protocol accepts arbitrary
  /// annotation shapes, so no fixed struct is warranted here.
  #[serde(default)]
  pub annotations: Vec<serde_json::Value>,
  /// Predecessor question ids this answer depended on.
  #[serde(default)]
  pub input_question_ids: Vec<String>,
}

impl QuestionAnswer {
  /// Whether the answer was produced successfully.
  pub fn is_valid(&self) -> bool {
    self.answer_validity > 0.0
  }
}

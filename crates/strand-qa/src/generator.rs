use async_trait::async_trait;

use crate::error::GenerateError;
use crate::model::{Question, QuestionAnswer};

/// What a generator produces for one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedAnswer {
  /// Generated content with citations.
  pub sourced_content: String,
  pub explanation: String,
  /// Validity score in [0, 1].
  pub answer_validity: f64,
  pub validity_explanation: String,
  pub annotations: Vec<serde_json::Value>,
}

/// The answer generation seam.
///
/// Implementations are typically long-latency external calls (search plus
/// generation); the orchestrator awaits them concurrently for independent
/// questions. `predecessors` carries the answer record of every question the
/// current one declared a dependency on, in declaration order.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
  async fn generate(
    &self,
    question: &Question,
    predecessors: &[QuestionAnswer],
  ) -> Result<GeneratedAnswer, GenerateError>;
}

/// A deterministic generator for dry runs and tests.
///
/// Answers with the question's expected answer when one is supplied,
/// otherwise echoes the question text; notes how much predecessor context
/// was available.
pub struct EchoAnswerer;

#[async_trait]
impl AnswerGenerator for EchoAnswerer {
  async fn generate(
    &self,
    question: &Question,
    predecessors: &[QuestionAnswer],
  ) -> Result<GeneratedAnswer, GenerateError> {
    let content = if question.expected_answer.is_empty() {
      format!("echo: {}", question.question)
    } else {
      question.expected_answer.clone()
    };

    Ok(GeneratedAnswer {
      sourced_content: content,
      explanation: format!("answered with {} predecessor answer(s)", predecessors.len()),
      answer_validity: 1.0,
      validity_explanation: String::new(),
      annotations: Vec::new(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_echo_answerer_prefers_expected_answer() {
    let question = Question {
      id: "q1".to_string(),
      question: "What?".to_string(),
      expected_answer: "42".to_string(),
      ..Default::default()
    };

    let answer = EchoAnswerer.generate(&question, &[]).await.unwrap();
    assert_eq!(answer.sourced_content, "42");
    assert_eq!(answer.answer_validity, 1.0);
  }

  #[tokio::test]
  async fn test_echo_answerer_falls_back_to_question() {
    let question = Question {
      id: "q1".to_string(),
      question: "What?".to_string(),
      ..Default::default()
    };

    let answer = EchoAnswerer.generate(&question, &[]).await.unwrap();
    assert_eq!(answer.sourced_content, "echo: What?");
  }
}

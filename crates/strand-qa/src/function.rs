use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use strand_registry::{FlowFunction, FunctionError, Inputs};
use tokio_util::sync::CancellationToken;

use crate::generator::AnswerGenerator;
use crate::model::{Question, QuestionAnswer};
use crate::orchestrator::{FailedPredecessorPolicy, QaOrchestrator};

/// Exposes the orchestrator to flows as a registered function.
///
/// Inputs:
/// - `questions` (required): array of question objects.
/// - `previous_answers` (optional): answer records from an earlier batch,
///   available as predecessor context for this one.
///
/// Output: `{ "answers": [...] }` in the original question order.
pub struct AnswerQuestionsFunction<G: AnswerGenerator + 'static> {
  orchestrator: QaOrchestrator<G>,
}

impl<G: AnswerGenerator + 'static> AnswerQuestionsFunction<G> {
  pub fn new(generator: Arc<G>) -> Self {
    Self {
      orchestrator: QaOrchestrator::new(generator),
    }
  }

  pub fn with_policy(generator: Arc<G>, policy: FailedPredecessorPolicy) -> Self {
    Self {
      orchestrator: QaOrchestrator::with_policy(generator, policy),
    }
  }
}

#[async_trait]
impl<G: AnswerGenerator + 'static> FlowFunction for AnswerQuestionsFunction<G> {
  async fn call(&self, inputs: Inputs) -> Result<Value, FunctionError> {
    let questions = inputs
      .get("questions")
      .ok_or_else(|| FunctionError::invalid_input("missing required input 'questions'"))?;
    let questions: Vec<Question> = serde_json::from_value(questions.clone())
      .map_err(|e| FunctionError::invalid_input(format!("invalid 'questions' input: {e}")))?;

    let previous_answers: Vec<QuestionAnswer> = match inputs.get("previous_answers") {
      Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
        FunctionError::invalid_input(format!("invalid 'previous_answers' input: {e}"))
      })?,
      None => Vec::new(),
    };

    let answers = self
      .orchestrator
      .answer_with_context(questions, previous_answers, CancellationToken::new())
      .await
      .map_err(|e| FunctionError::failed(e.to_string()))?;

    Ok(json!({ "answers": answers }))
  }
}

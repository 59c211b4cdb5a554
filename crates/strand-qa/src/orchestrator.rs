//! Dependency-aware scheduling of question batches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::QaError;
use crate::generator::AnswerGenerator;
use crate::model::{Question, QuestionAnswer};

/// How a question whose predecessor failed is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailedPredecessorPolicy {
  /// Mark the dependent invalid without running it. Default.
  #[default]
  Block,
  /// Run the dependent with the successful predecessor answers only.
  Degrade,
}

/// Runs a batch of questions in dependency order.
///
/// An item becomes eligible once every declared predecessor has an answer
/// record; simultaneously eligible items run concurrently, with ties broken
/// by original input order. The final sequence always matches the input
/// order regardless of execution order.
pub struct QaOrchestrator<G: AnswerGenerator + 'static> {
  generator: Arc<G>,
  policy: FailedPredecessorPolicy,
}

impl<G: AnswerGenerator + 'static> QaOrchestrator<G> {
  pub fn new(generator: Arc<G>) -> Self {
    Self::with_policy(generator, FailedPredecessorPolicy::default())
  }

  pub fn with_policy(generator: Arc<G>, policy: FailedPredecessorPolicy) -> Self {
    Self { generator, policy }
  }

  /// Answer a batch of questions.
  pub async fn answer(
    &self,
    questions: Vec<Question>,
    cancel: CancellationToken,
  ) -> Result<Vec<QuestionAnswer>, QaError> {
    self.answer_with_context(questions, Vec::new(), cancel).await
  }

  /// Answer a batch with previously produced answers as extra context.
  ///
  /// Predecessor ids may refer to questions in this batch or to entries of
  /// `previous_answers` (question chaining across batches).
  pub async fn answer_with_context(
    &self,
    questions: Vec<Question>,
    previous_answers: Vec<QuestionAnswer>,
    cancel: CancellationToken,
  ) -> Result<Vec<QuestionAnswer>, QaError> {
    validate(&questions, &previous_answers)?;

    info!(
      questions = questions.len(),
      previous_answers = previous_answers.len(),
      "qa_batch_started"
    );

    // Records of everything answered so far, including prior-batch context.
    let mut answered: HashMap<String, QuestionAnswer> = HashMap::new();
    let mut failed: HashSet<String> = HashSet::new();
    for answer in previous_answers {
      if !answer.is_valid() {
        failed.insert(answer.id.clone());
      }
      answered.insert(answer.id.clone(), answer);
    }

    let mut pending: Vec<usize> = (0..questions.len()).collect();

    while !pending.is_empty() {
      if cancel.is_cancelled() {
        warn!("qa_batch_cancelled");
        return Err(QaError::Cancelled);
      }

      // Input order makes eligibility ties stable and deterministic.
      let eligible: Vec<usize> = pending
        .iter()
        .copied()
        .filter(|&i| {
          questions[i]
            .input_question_ids
            .iter()
            .all(|id| answered.contains_key(id))
        })
        .collect();

      // Acyclicity was validated up front, so progress is guaranteed.
      debug_assert!(!eligible.is_empty(), "no eligible questions despite acyclic graph");
      if eligible.is_empty() {
        break;
      }
      pending.retain(|i| !eligible.contains(i));

      let mut handles = Vec::new();
      for i in eligible {
        let question = questions[i].clone();

        let has_failed_predecessor = question
          .input_question_ids
          .iter()
          .any(|id| failed.contains(id));
        if has_failed_predecessor && self.policy == FailedPredecessorPolicy::Block {
          warn!(id = %question.id, "question_blocked_by_failed_predecessor");
          failed.insert(question.id.clone());
          answered.insert(
            question.id.clone(),
            blocked_record(&question),
          );
          continue;
        }

        // Valid predecessor answers, in declaration order. Under Degrade a
        // failed predecessor's record is simply withheld.
        let predecessors: Vec<QuestionAnswer> = question
          .input_question_ids
          .iter()
          .filter_map(|id| answered.get(id))
          .filter(|a| a.is_valid())
          .cloned()
          .collect();

        let generator = self.generator.clone();
        handles.push(tokio::spawn(async move {
          let result = generator.generate(&question, &predecessors).await;
          (question, result)
        }));
      }

      let results = tokio::select! {
          results = futures::future::join_all(handles) => results,
          _ = cancel.cancelled() => {
            warn!("qa_batch_cancelled");
            return Err(QaError::Cancelled);
          }
      };

      for result in results {
        let (question, outcome) = match result {
          Ok(pair) => pair,
          Err(e) => {
            // A panicked generator left no question context to record an
            // invalid answer under; abort the whole batch.
            error!(error = %e, "qa_generation_join_error");
            return Err(QaError::GenerationPanicked {
              message: e.to_string(),
            });
          }
        };

        let record = match outcome {
          Ok(generated) => {
            info!(id = %question.id, "question_answered");
            QuestionAnswer {
              id: question.id.clone(),
              question: question.question.clone(),
              expected_answer: question.expected_answer.clone(),
              sourced_content: generated.sourced_content,
              explanation: generated.explanation,
              answer_validity: generated.answer_validity.clamp(0.0, 1.0),
              validity_explanation: generated.validity_explanation,
              annotations: generated.annotations,
              input_question_ids: question.input_question_ids.clone(),
            }
          }
          Err(e) => {
            error!(id = %question.id, error = %e, "question_failed");
            failed.insert(question.id.clone());
            QuestionAnswer {
              id: question.id.clone(),
              question: question.question.clone(),
              expected_answer: question.expected_answer.clone(),
              answer_validity: 0.0,
              validity_explanation: e.message,
              input_question_ids: question.input_question_ids.clone(),
              ..Default::default()
            }
          }
        };
        if !record.is_valid() {
          failed.insert(record.id.clone());
        }
        answered.insert(record.id.clone(), record);
      }
    }

    // Assemble in the original input order, not execution order.
    let mut ordered = Vec::with_capacity(questions.len());
    for question in &questions {
      if let Some(record) = answered.remove(&question.id) {
        ordered.push(record);
      }
    }

    info!(answers = ordered.len(), "qa_batch_completed");
    Ok(ordered)
  }
}

fn blocked_record(question: &Question) -> QuestionAnswer {
  QuestionAnswer {
    id: question.id.clone(),
    question: question.question.clone(),
    expected_answer: question.expected_answer.clone(),
    answer_validity: 0.0,
    validity_explanation: "blocked: a predecessor question failed".to_string(),
    input_question_ids: question.input_question_ids.clone(),
    ..Default::default()
  }
}

/// Validate ids, predecessor targets, and acyclicity before anything runs.
fn validate(questions: &[Question], previous_answers: &[QuestionAnswer]) -> Result<(), QaError> {
  let mut ids: HashSet<&str> = HashSet::new();
  for question in questions {
    if !ids.insert(&question.id) {
      return Err(QaError::DuplicateQuestionId {
        id: question.id.clone(),
      });
    }
  }

  let previous_ids: HashSet<&str> = previous_answers.iter().map(|a| a.id.as_str()).collect();
  for question in questions {
    for predecessor in &question.input_question_ids {
      if !ids.contains(predecessor.as_str()) && !previous_ids.contains(predecessor.as_str()) {
        return Err(QaError::UnknownPredecessor {
          id: question.id.clone(),
          predecessor_id: predecessor.clone(),
        });
      }
    }
  }

  detect_cycle(questions)
}

/// DFS with coloring over the batch-internal predecessor edges.
///
/// 0 = unvisited, 1 = in progress, 2 = done. A back edge to an in-progress
/// node is a cycle; the error names the ids on the cycle path.
fn detect_cycle(questions: &[Question]) -> Result<(), QaError> {
  let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
  let mut color: HashMap<&str, u8> = questions.iter().map(|q| (q.id.as_str(), 0u8)).collect();

  fn dfs<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a Question>,
    color: &mut HashMap<&'a str, u8>,
    stack: &mut Vec<&'a str>,
  ) -> Option<Vec<String>> {
    color.insert(id, 1);
    stack.push(id);

    if let Some(question) = by_id.get(id) {
      for predecessor in &question.input_question_ids {
        match color.get(predecessor.as_str()) {
          Some(1) => {
            // Back edge: the cycle is the stack from the predecessor onward.
            let start = stack
              .iter()
              .position(|&s| s == predecessor.as_str())
              .unwrap_or(0);
            return Some(stack[start..].iter().map(|s| s.to_string()).collect());
          }
          Some(0) => {
            if let Some(q) = by_id.get(predecessor.as_str()) {
              if let Some(cycle) = dfs(&q.id, by_id, color, stack) {
                return Some(cycle);
              }
            }
          }
          _ => {}
        }
      }
    }

    color.insert(id, 2);
    stack.pop();
    None
  }

  let mut stack = Vec::new();
  for question in questions {
    if color.get(question.id.as_str()) == Some(&0) {
      if let Some(ids) = dfs(&question.id, &by_id, &mut color, &mut stack) {
        return Err(QaError::DependencyCycle { ids });
      }
    }
  }

  Ok(())
}

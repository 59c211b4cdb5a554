//! Strand QA
//!
//! Dependency-aware question answering. A batch of questions may declare that
//! individual questions depend on the answers of others; the orchestrator
//! validates the predecessor graph is acyclic, runs each question only after
//! its predecessors have answers (independent questions run concurrently),
//! and assembles the results in the original input order.
//!
//! The orchestrator is exposed to flows as a registered function
//! ([`AnswerQuestionsFunction`]); the execution engine treats it as any other
//! unit of work.

mod error;
mod function;
mod generator;
mod model;
mod orchestrator;

pub use error::{GenerateError, QaError};
pub use function::AnswerQuestionsFunction;
pub use generator::{AnswerGenerator, EchoAnswerer, GeneratedAnswer};
pub use model::{Question, QuestionAnswer};
pub use orchestrator::{FailedPredecessorPolicy, QaOrchestrator};

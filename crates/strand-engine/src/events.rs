//! Execution events and notifiers for observability.
//!
//! Events are emitted during flow execution so consumers can observe
//! progress, persist state, stream to UIs, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
  FlowStarted {
    execution_id: String,
    flow_id: String,
  },

  StepStarted {
    execution_id: String,
    step_id: String,
  },

  /// A step's `when` condition evaluated false.
  StepSkipped {
    execution_id: String,
    step_id: String,
  },

  TaskStarted {
    execution_id: String,
    step_id: String,
    task_id: String,
  },

  TaskCompleted {
    execution_id: String,
    step_id: String,
    task_id: String,
    output: serde_json::Value,
  },

  TaskFailed {
    execution_id: String,
    step_id: String,
    task_id: String,
    error: String,
  },

  /// A task's `when` condition evaluated false.
  TaskSkipped {
    execution_id: String,
    step_id: String,
    task_id: String,
  },

  FlowCompleted {
    execution_id: String,
  },

  FlowFailed {
    execution_id: String,
    error: String,
  },
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event - implementations decide what to
/// do with them (persist, broadcast, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {
    // Intentionally empty
  }
}

/// A notifier that sends events to an unbounded channel.
///
/// Unbounded so a slow consumer never blocks the engine; volume is one event
/// per task transition, so growth stays small in practice.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

//! Result export.
//!
//! A pure projection of the context's recorded outputs down to the tasks
//! whose definition declared `export_to_flow = true`, preserving step/task
//! declaration order.

use serde::{Deserialize, Serialize};
use strand_flow::Flow;

use crate::context::ResolutionContext;

/// One exported task output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
  pub step_id: String,
  pub task_id: String,
  pub value: serde_json::Value,
}

/// The flow's final result payload, ordered by declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportedResult {
  entries: Vec<Export>,
}

impl ExportedResult {
  pub fn entries(&self) -> &[Export] {
    &self.entries
  }

  /// Look up an exported value by task id.
  pub fn get(&self, task_id: &str) -> Option<&serde_json::Value> {
    self
      .entries
      .iter()
      .find(|e| e.task_id == task_id)
      .map(|e| &e.value)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Render as a JSON object keyed by task id.
  ///
  /// `entries()` remains the order-preserving representation; this is a
  /// convenience for callers that want the `{task_id: value}` shape.
  pub fn to_json(&self) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = self
      .entries
      .iter()
      .map(|e| (e.task_id.clone(), e.value.clone()))
      .collect();
    serde_json::Value::Object(map)
  }
}

/// Collect every exported task output from the context.
///
/// Skipped and failed tasks have no recorded output and are omitted.
pub fn export(ctx: &ResolutionContext, flow: &Flow) -> ExportedResult {
  let mut entries = Vec::new();
  for step in &flow.steps {
    for task in &step.tasks {
      if !task.export_to_flow {
        continue;
      }
      if let Some(value) = ctx.output(&step.step_id, &task.task_id) {
        entries.push(Export {
          step_id: step.step_id.clone(),
          task_id: task.task_id.clone(),
          value: value.clone(),
        });
      }
    }
  }
  ExportedResult { entries }
}

use std::collections::{HashMap, HashSet};

use strand_flow::Flow;

/// The mutable accumulator for one engine run.
///
/// Holds the resolved flow parameter bindings and every recorded task output
/// keyed by `(step_id, task_id)`. Owned exclusively by one run; grows
/// monotonically as steps complete and is never mutated retroactively.
#[derive(Debug, Default)]
pub struct ResolutionContext {
  params: HashMap<String, serde_json::Value>,
  outputs: HashMap<(String, String), serde_json::Value>,
  skipped: HashSet<(String, String)>,
  failed: HashSet<(String, String)>,
}

impl ResolutionContext {
  /// Seed a context from the caller-supplied parameter values, filling any
  /// declared parameter absent from `initial_params` with its default.
  ///
  /// Declared parameters with neither a supplied value nor a default stay
  /// unbound; a later reference to one fails as `UnboundParameter`.
  pub fn new(flow: &Flow, initial_params: serde_json::Map<String, serde_json::Value>) -> Self {
    let mut params: HashMap<String, serde_json::Value> = initial_params.into_iter().collect();
    for (name, default) in &flow.defaults {
      params
        .entry(name.clone())
        .or_insert_with(|| default.clone());
    }

    Self {
      params,
      ..Default::default()
    }
  }

  pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
    self.params.get(name)
  }

  pub fn output(&self, step_id: &str, task_id: &str) -> Option<&serde_json::Value> {
    self
      .outputs
      .get(&(step_id.to_string(), task_id.to_string()))
  }

  pub fn record_output(&mut self, step_id: &str, task_id: &str, value: serde_json::Value) {
    self
      .outputs
      .insert((step_id.to_string(), task_id.to_string()), value);
  }

  pub fn record_skipped(&mut self, step_id: &str, task_id: &str) {
    self
      .skipped
      .insert((step_id.to_string(), task_id.to_string()));
  }

  pub fn record_failed(&mut self, step_id: &str, task_id: &str) {
    self
      .failed
      .insert((step_id.to_string(), task_id.to_string()));
  }

  pub fn is_skipped(&self, step_id: &str, task_id: &str) -> bool {
    self
      .skipped
      .contains(&(step_id.to_string(), task_id.to_string()))
  }

  pub fn is_failed(&self, step_id: &str, task_id: &str) -> bool {
    self
      .failed
      .contains(&(step_id.to_string(), task_id.to_string()))
  }

  /// Number of recorded task outputs.
  pub fn output_count(&self) -> usize {
    self.outputs.len()
  }
}

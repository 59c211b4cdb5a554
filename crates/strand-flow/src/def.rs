use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A flow definition as authored in JSON, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDef {
  #[serde(default = "default_version")]
  pub version: String,
  pub flow_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub inputs: FlowInputsDef,
  #[serde(default)]
  pub steps: Vec<StepDef>,
}

fn default_version() -> String {
  "1.0".to_string()
}

/// Declared flow parameters and their optional default literals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowInputsDef {
  /// Parameter name -> declared type (informational, e.g. "str", "list").
  #[serde(default)]
  pub parameters: HashMap<String, String>,
  /// Parameter name -> default literal, used when the caller omits the value.
  #[serde(default)]
  pub defaults: HashMap<String, serde_json::Value>,
}

/// A sequential execution barrier containing one or more tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub step_id: String,
  #[serde(default)]
  pub tasks: Vec<TaskDef>,
  /// Optional condition; a false condition skips the whole step.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when: Option<ConditionDef>,
}

/// One invocation of a registered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub task_id: String,
  pub function: String,
  /// Input name -> literal or reference expression ("$flow.X", "$step.S.T").
  #[serde(default)]
  pub inputs: HashMap<String, serde_json::Value>,
  /// Promote this task's output into the flow's exported result.
  #[serde(default)]
  pub export_to_flow: bool,
  /// Optional condition; a false condition skips this task only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when: Option<ConditionDef>,
}

/// A comparison between a resolved reference and a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDef {
  #[serde(rename = "ref")]
  pub reference: String,
  pub op: String,
  pub value: serde_json::Value,
}

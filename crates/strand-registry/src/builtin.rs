//! Builtin utility functions.
//!
//! These cover the common plumbing cases in flow files (echoing a value
//! forward, merging objects) and are what the CLI registers for dry runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{FunctionError, RegistryError};
use crate::function::{FlowFunction, Inputs};
use crate::registry::FunctionRegistry;

/// Returns its input unchanged.
///
/// With exactly one input the bare value is returned; with several, the whole
/// input object is.
pub struct EchoFunction;

#[async_trait]
impl FlowFunction for EchoFunction {
  async fn call(&self, inputs: Inputs) -> Result<serde_json::Value, FunctionError> {
    if inputs.len() == 1 {
      let value = inputs.into_iter().next().map(|(_, v)| v);
      return Ok(value.unwrap_or(serde_json::Value::Null));
    }
    Ok(serde_json::Value::Object(inputs))
  }
}

/// Merges object-valued inputs into a single object.
///
/// Later inputs (by name order) win on key collisions.
pub struct MergeFunction;

#[async_trait]
impl FlowFunction for MergeFunction {
  async fn call(&self, inputs: Inputs) -> Result<serde_json::Value, FunctionError> {
    let mut merged = serde_json::Map::new();
    for (name, value) in inputs {
      match value {
        serde_json::Value::Object(fields) => merged.extend(fields),
        other => {
          return Err(FunctionError::invalid_input(format!(
            "merge input '{}' is not an object: {}",
            name, other
          )));
        }
      }
    }
    Ok(serde_json::Value::Object(merged))
  }
}

/// Register the builtin functions into a registry.
pub fn register_builtins(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
  registry.register("echo", Arc::new(EchoFunction))?;
  registry.register("merge", Arc::new(MergeFunction))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn inputs(value: serde_json::Value) -> Inputs {
    match value {
      serde_json::Value::Object(map) => map,
      _ => panic!("expected object"),
    }
  }

  #[tokio::test]
  async fn test_echo_single_input_returns_bare_value() {
    let out = EchoFunction.call(inputs(json!({"x": "hello"}))).await.unwrap();
    assert_eq!(out, json!("hello"));
  }

  #[tokio::test]
  async fn test_echo_multiple_inputs_returns_object() {
    let out = EchoFunction
      .call(inputs(json!({"a": 1, "b": 2})))
      .await
      .unwrap();
    assert_eq!(out, json!({"a": 1, "b": 2}));
  }

  #[tokio::test]
  async fn test_merge_objects() {
    let out = MergeFunction
      .call(inputs(json!({"a": {"x": 1}, "b": {"y": 2}})))
      .await
      .unwrap();
    assert_eq!(out, json!({"x": 1, "y": 2}));
  }

  #[tokio::test]
  async fn test_merge_rejects_non_object() {
    let result = MergeFunction.call(inputs(json!({"a": [1, 2]}))).await;
    assert!(matches!(result, Err(FunctionError::InvalidInput { .. })));
  }

  #[test]
  fn test_register_builtins() {
    let mut registry = FunctionRegistry::new();
    register_builtins(&mut registry).unwrap();
    assert!(registry.contains("echo"));
    assert!(registry.contains("merge"));
  }
}

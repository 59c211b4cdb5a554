use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use strand_engine::{
  EngineOptions, ExecutionError, FailurePolicy, FlowEngine, ResolveError,
};
use strand_flow::{Flow, FlowDef};
use strand_registry::{
  FlowFunction, FunctionError, FunctionRegistry, Inputs, register_builtins,
};
use tokio_util::sync::CancellationToken;

/// Counts invocations, then echoes its inputs.
struct CountingFunction {
  calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FlowFunction for CountingFunction {
  async fn call(&self, inputs: Inputs) -> Result<serde_json::Value, FunctionError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(serde_json::Value::Object(inputs))
  }
}

/// Sleeps before counting, to observe whether the engine waited for it.
struct SlowCountingFunction {
  calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FlowFunction for SlowCountingFunction {
  async fn call(&self, inputs: Inputs) -> Result<serde_json::Value, FunctionError> {
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(serde_json::Value::Object(inputs))
  }
}

/// Always fails.
struct FailingFunction;

#[async_trait]
impl FlowFunction for FailingFunction {
  async fn call(&self, _inputs: Inputs) -> Result<serde_json::Value, FunctionError> {
    Err(FunctionError::failed("upstream search error"))
  }
}

/// Uppercases its "x" input.
struct UpperFunction;

#[async_trait]
impl FlowFunction for UpperFunction {
  async fn call(&self, inputs: Inputs) -> Result<serde_json::Value, FunctionError> {
    let x = inputs
      .get("x")
      .and_then(|v| v.as_str())
      .ok_or_else(|| FunctionError::invalid_input("missing string input 'x'"))?;
    Ok(json!(x.to_uppercase()))
  }
}

fn registry_with(extra: Vec<(&str, Arc<dyn FlowFunction>)>) -> Arc<FunctionRegistry> {
  let mut registry = FunctionRegistry::new();
  register_builtins(&mut registry).unwrap();
  for (name, function) in extra {
    registry.register(name, function).unwrap();
  }
  Arc::new(registry)
}

fn compile(def: serde_json::Value) -> Flow {
  let def: FlowDef = serde_json::from_value(def).unwrap();
  Flow::from_def(def).unwrap()
}

fn params(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
  match value {
    serde_json::Value::Object(map) => map,
    _ => panic!("expected object"),
  }
}

#[tokio::test]
async fn test_echo_flow_end_to_end() {
  let flow = compile(json!({
    "flow_id": "echo-flow",
    "inputs": {"parameters": {"p": "str"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "t1", "function": "echo", "inputs": {"x": "$flow.p"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![]));
  let result = engine
    .execute(&flow, params(json!({"p": "hello"})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.exports.to_json(), json!({"t1": "hello"}));
  assert!(result.failures.is_empty());
}

#[tokio::test]
async fn test_later_step_sees_earlier_output() {
  let flow = compile(json!({
    "flow_id": "chain",
    "inputs": {"parameters": {"p": "str"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "t1", "function": "echo", "inputs": {"x": "$flow.p"}}
      ]},
      {"step_id": "s2", "tasks": [
        {"task_id": "t2", "function": "upper", "inputs": {"x": "$step.s1.t1"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![("upper", Arc::new(UpperFunction))]));
  let result = engine
    .execute(&flow, params(json!({"p": "hello"})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.exports.to_json(), json!({"t2": "HELLO"}));
}

#[tokio::test]
async fn test_step_failure_stops_the_run() {
  let calls = Arc::new(AtomicUsize::new(0));
  let flow = compile(json!({
    "flow_id": "failing",
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "t1", "function": "fail", "inputs": {}}
      ]},
      {"step_id": "s2", "tasks": [
        {"task_id": "t2", "function": "count", "inputs": {"r": "$step.s1.t1"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![
    ("fail", Arc::new(FailingFunction)),
    (
      "count",
      Arc::new(CountingFunction {
        calls: calls.clone(),
      }),
    ),
  ]));

  let err = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap_err();

  match err {
    ExecutionError::FunctionFailed {
      step_id, task_id, ..
    } => {
      assert_eq!(step_id, "s1");
      assert_eq!(task_id, "t1");
    }
    other => panic!("expected FunctionFailed, got {:?}", other),
  }
  // Step 2 never ran.
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_export_fidelity() {
  let flow = compile(json!({
    "flow_id": "exports",
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "hidden", "function": "echo", "inputs": {"x": "internal"}},
        {"task_id": "visible", "function": "echo", "inputs": {"x": "public"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![]));
  let result = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.exports.to_json(), json!({"visible": "public"}));
  assert_eq!(result.exports.get("hidden"), None);
}

#[tokio::test]
async fn test_empty_flow_yields_empty_result() {
  let flow = compile(json!({"flow_id": "empty", "steps": []}));

  let engine = FlowEngine::new(registry_with(vec![]));
  let result = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.exports.is_empty());
}

#[tokio::test]
async fn test_idempotent_with_deterministic_functions() {
  let flow = compile(json!({
    "flow_id": "repeat",
    "inputs": {"parameters": {"p": "str"}, "defaults": {"p": "same"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "t1", "function": "echo", "inputs": {"x": "$flow.p"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![]));
  let first = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap();
  let second = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(first.exports, second.exports);
}

#[tokio::test]
async fn test_intra_step_fan_out() {
  let calls = Arc::new(AtomicUsize::new(0));
  let flow = compile(json!({
    "flow_id": "fanout",
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "a", "function": "count", "inputs": {"n": 1}, "export_to_flow": true},
        {"task_id": "b", "function": "count", "inputs": {"n": 2}, "export_to_flow": true},
        {"task_id": "c", "function": "count", "inputs": {"n": 3}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![(
    "count",
    Arc::new(CountingFunction {
      calls: calls.clone(),
    }),
  )]));
  let result = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 3);
  assert_eq!(
    result.exports.to_json(),
    json!({"a": {"n": 1}, "b": {"n": 2}, "c": {"n": 3}})
  );
}

#[tokio::test]
async fn test_cancelled_before_start() {
  let flow = compile(json!({
    "flow_id": "cancelled",
    "steps": [
      {"step_id": "s1", "tasks": [{"task_id": "t1", "function": "echo", "inputs": {}}]}
    ]
  }));

  let cancel = CancellationToken::new();
  cancel.cancel();

  let engine = FlowEngine::new(registry_with(vec![]));
  let err = engine
    .execute(&flow, params(json!({})), cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, ExecutionError::Cancelled));
}

#[tokio::test]
async fn test_tolerate_task_failures() {
  let flow = compile(json!({
    "flow_id": "tolerant",
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "bad", "function": "fail", "inputs": {}},
        {"task_id": "good", "function": "echo", "inputs": {"x": "ok"}, "export_to_flow": true}
      ]},
      {"step_id": "s2", "tasks": [
        {"task_id": "dependent", "function": "echo", "inputs": {"x": "$step.s1.bad"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::with_options(
    registry_with(vec![("fail", Arc::new(FailingFunction))]),
    EngineOptions {
      failure_policy: FailurePolicy::TolerateTaskFailures,
    },
  );
  let result = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap();

  // The sibling completed; the dependent's input resolution failed too.
  assert_eq!(result.exports.to_json(), json!({"good": "ok"}));
  assert_eq!(result.failures.len(), 2);
  assert_eq!(result.failures[0].task_id, "bad");
  assert_eq!(result.failures[1].task_id, "dependent");
  assert!(matches!(
    result.failures[1].error,
    ExecutionError::InputResolution {
      source: ResolveError::UnresolvedReference { .. },
      ..
    }
  ));
}

#[tokio::test]
async fn test_condition_skips_step() {
  let flow = compile(json!({
    "flow_id": "routing",
    "inputs": {"parameters": {"fits": "bool"}},
    "steps": [
      {"step_id": "small", "when": {"ref": "$flow.fits", "op": "==", "value": true}, "tasks": [
        {"task_id": "direct", "function": "echo", "inputs": {"x": "direct"}, "export_to_flow": true}
      ]},
      {"step_id": "large", "when": {"ref": "$flow.fits", "op": "==", "value": false}, "tasks": [
        {"task_id": "search", "function": "echo", "inputs": {"x": "search"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![]));
  let result = engine
    .execute(&flow, params(json!({"fits": false})), CancellationToken::new())
    .await
    .unwrap();

  // Only the matching branch exports.
  assert_eq!(result.exports.to_json(), json!({"search": "search"}));
}

#[tokio::test]
async fn test_reference_to_skipped_task_is_unresolved() {
  let flow = compile(json!({
    "flow_id": "skipped-ref",
    "inputs": {"parameters": {"enabled": "bool"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "t1", "function": "echo", "inputs": {"x": "v"},
         "when": {"ref": "$flow.enabled", "op": "==", "value": true}}
      ]},
      {"step_id": "s2", "tasks": [
        {"task_id": "t2", "function": "echo", "inputs": {"x": "$step.s1.t1"}}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![]));
  let err = engine
    .execute(
      &flow,
      params(json!({"enabled": false})),
      CancellationToken::new(),
    )
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ExecutionError::InputResolution {
      source: ResolveError::UnresolvedReference { .. },
      ..
    }
  ));
}

#[tokio::test]
async fn test_unknown_function_fails_preflight() {
  let calls = Arc::new(AtomicUsize::new(0));
  let flow = compile(json!({
    "flow_id": "preflight",
    "steps": [
      {"step_id": "s1", "tasks": [{"task_id": "t1", "function": "count", "inputs": {}}]},
      {"step_id": "s2", "tasks": [{"task_id": "t2", "function": "nonexistent", "inputs": {}}]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![(
    "count",
    Arc::new(CountingFunction {
      calls: calls.clone(),
    }),
  )]));
  let err = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ExecutionError::UnknownFunction { function, .. } if function == "nonexistent"
  ));
  // Preflight rejects before anything runs.
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failfast_step_barrier_holds_on_resolution_error() {
  let calls = Arc::new(AtomicUsize::new(0));
  let flow = compile(json!({
    "flow_id": "barrier",
    "inputs": {"parameters": {"enabled": "bool"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "gate", "function": "echo", "inputs": {"x": "v"},
         "when": {"ref": "$flow.enabled", "op": "==", "value": true}}
      ]},
      {"step_id": "s2", "tasks": [
        {"task_id": "sibling", "function": "slow", "inputs": {}},
        {"task_id": "bad", "function": "echo", "inputs": {"x": "$step.s1.gate"}}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![(
    "slow",
    Arc::new(SlowCountingFunction {
      calls: calls.clone(),
    }),
  )]));
  let err = engine
    .execute(
      &flow,
      params(json!({"enabled": false})),
      CancellationToken::new(),
    )
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ExecutionError::InputResolution {
      source: ResolveError::UnresolvedReference { .. },
      ..
    }
  ));
  // The already-spawned sibling finished inside the run, not detached
  // after it: the step barrier holds on the abort path too.
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tolerated_condition_resolution_failure() {
  let flow = compile(json!({
    "flow_id": "tolerant-when",
    "inputs": {"parameters": {"enabled": "bool"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "gate", "function": "echo", "inputs": {"x": "v"},
         "when": {"ref": "$flow.enabled", "op": "==", "value": true}}
      ]},
      {"step_id": "s2", "tasks": [
        {"task_id": "guarded", "function": "echo", "inputs": {},
         "when": {"ref": "$step.s1.gate", "op": "==", "value": "v"}},
        {"task_id": "ok", "function": "echo", "inputs": {"x": "still runs"}, "export_to_flow": true}
      ]}
    ]
  }));

  let engine = FlowEngine::with_options(
    registry_with(vec![]),
    EngineOptions {
      failure_policy: FailurePolicy::TolerateTaskFailures,
    },
  );
  let result = engine
    .execute(
      &flow,
      params(json!({"enabled": false})),
      CancellationToken::new(),
    )
    .await
    .unwrap();

  // A condition that cannot resolve is a task failure like any other
  // under the tolerant policy; the sibling still ran.
  assert_eq!(result.exports.to_json(), json!({"ok": "still runs"}));
  assert_eq!(result.failures.len(), 1);
  assert_eq!(result.failures[0].task_id, "guarded");
  assert!(matches!(
    result.failures[0].error,
    ExecutionError::ConditionResolution { .. }
  ));
}

#[tokio::test]
async fn test_unbound_parameter() {
  let flow = compile(json!({
    "flow_id": "unbound",
    "inputs": {"parameters": {"p": "str"}},
    "steps": [
      {"step_id": "s1", "tasks": [
        {"task_id": "t1", "function": "echo", "inputs": {"x": "$flow.p"}}
      ]}
    ]
  }));

  let engine = FlowEngine::new(registry_with(vec![]));
  let err = engine
    .execute(&flow, params(json!({})), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ExecutionError::InputResolution {
      source: ResolveError::UnboundParameter { name },
      ..
    } if name == "p"
  ));
}

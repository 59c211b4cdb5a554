use async_trait::async_trait;

use crate::error::FunctionError;

/// Resolved named inputs passed to a function invocation.
pub type Inputs = serde_json::Map<String, serde_json::Value>;

/// A callable unit of work invocable by name from a flow task.
///
/// Implementations are potentially long-latency external calls (search,
/// generation); the engine awaits them without blocking unrelated tasks in
/// the same step. The returned value is recorded verbatim as the task's
/// output.
#[async_trait]
pub trait FlowFunction: Send + Sync {
  async fn call(&self, inputs: Inputs) -> Result<serde_json::Value, FunctionError>;
}

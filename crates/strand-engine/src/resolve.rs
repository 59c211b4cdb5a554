//! Variable reference resolution.
//!
//! Resolution is a pure function of the expression and the current context
//! snapshot - no side effects, no caching beyond the context itself.

use strand_flow::ValueExpr;

use crate::context::ResolutionContext;
use crate::error::ResolveError;

/// Evaluate a parsed expression against the context.
pub fn resolve(
  expr: &ValueExpr,
  ctx: &ResolutionContext,
) -> Result<serde_json::Value, ResolveError> {
  match expr {
    ValueExpr::Literal(value) => Ok(value.clone()),
    ValueExpr::Param(name) => match ctx.param(name) {
      Some(value) => Ok(value.clone()),
      None => Err(ResolveError::UnboundParameter { name: name.clone() }),
    },
    ValueExpr::TaskOutput { step_id, task_id } => match ctx.output(step_id, task_id) {
      Some(value) => Ok(value.clone()),
      None => Err(ResolveError::UnresolvedReference {
        step_id: step_id.clone(),
        task_id: task_id.clone(),
      }),
    },
    ValueExpr::Array(items) => {
      let mut resolved = Vec::with_capacity(items.len());
      for item in items {
        resolved.push(resolve(item, ctx)?);
      }
      Ok(serde_json::Value::Array(resolved))
    }
    ValueExpr::Object(fields) => {
      let mut resolved = serde_json::Map::new();
      for (key, val) in fields {
        resolved.insert(key.clone(), resolve(val, ctx)?);
      }
      Ok(serde_json::Value::Object(resolved))
    }
  }
}

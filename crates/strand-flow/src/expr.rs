//! The variable reference grammar.
//!
//! An input value is either a literal or a reference string of one of two
//! closed forms:
//!
//! - `$flow.<param>` - a flow parameter binding
//! - `$step.<step_id>.<task_id>` - the recorded output of an earlier task
//!
//! References may also appear inside literal arrays and objects, so a task
//! can pass `[{"question": "$flow.query"}]` and have the inner reference
//! resolved in place. Parsing happens once at compile time; any other
//! `$`-prefixed string is a malformed reference.

use crate::error::FlowError;

/// A parsed input expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
  /// A literal scalar carried through verbatim.
  Literal(serde_json::Value),
  /// `$flow.<name>` - a flow parameter lookup.
  Param(String),
  /// `$step.<step_id>.<task_id>` - a prior task's output.
  TaskOutput { step_id: String, task_id: String },
  /// An array literal whose elements may contain references.
  Array(Vec<ValueExpr>),
  /// An object literal whose values may contain references.
  Object(Vec<(String, ValueExpr)>),
}

impl ValueExpr {
  /// Parse a raw JSON input value into an expression tree.
  pub fn parse(value: &serde_json::Value) -> Result<Self, FlowError> {
    match value {
      serde_json::Value::String(s) if s.starts_with('$') => Self::parse_reference(s),
      serde_json::Value::Array(items) => {
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
          parsed.push(Self::parse(item)?);
        }
        Ok(ValueExpr::Array(parsed))
      }
      serde_json::Value::Object(fields) => {
        let mut parsed = Vec::with_capacity(fields.len());
        for (key, val) in fields {
          parsed.push((key.clone(), Self::parse(val)?));
        }
        Ok(ValueExpr::Object(parsed))
      }
      other => Ok(ValueExpr::Literal(other.clone())),
    }
  }

  fn parse_reference(reference: &str) -> Result<Self, FlowError> {
    let malformed = || FlowError::MalformedReference {
      reference: reference.to_string(),
    };

    let mut segments = reference.split('.');
    match segments.next() {
      Some("$flow") => {
        let name = segments.next().ok_or_else(malformed)?;
        if name.is_empty() || segments.next().is_some() {
          return Err(malformed());
        }
        Ok(ValueExpr::Param(name.to_string()))
      }
      Some("$step") => {
        let step_id = segments.next().ok_or_else(malformed)?;
        let task_id = segments.next().ok_or_else(malformed)?;
        if step_id.is_empty() || task_id.is_empty() || segments.next().is_some() {
          return Err(malformed());
        }
        Ok(ValueExpr::TaskOutput {
          step_id: step_id.to_string(),
          task_id: task_id.to_string(),
        })
      }
      _ => Err(malformed()),
    }
  }

  /// Visit every reference node in this expression tree.
  pub fn for_each_reference<F>(&self, visit: &mut F)
  where
    F: FnMut(&ValueExpr),
  {
    match self {
      ValueExpr::Param(_) | ValueExpr::TaskOutput { .. } => visit(self),
      ValueExpr::Array(items) => {
        for item in items {
          item.for_each_reference(visit);
        }
      }
      ValueExpr::Object(fields) => {
        for (_, val) in fields {
          val.for_each_reference(visit);
        }
      }
      ValueExpr::Literal(_) => {}
    }
  }
}

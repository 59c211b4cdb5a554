//! Conditional execution of steps and tasks.
//!
//! A condition compares a resolved reference against a literal. A false
//! condition skips the step or task without recording an output.

use serde_json::Value;

use crate::def::ConditionDef;
use crate::error::FlowError;
use crate::expr::ValueExpr;

/// Comparison operators usable in a `when` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl CompareOp {
  pub fn parse(op: &str) -> Result<Self, FlowError> {
    match op {
      "==" => Ok(CompareOp::Eq),
      "!=" => Ok(CompareOp::Ne),
      "<" => Ok(CompareOp::Lt),
      "<=" => Ok(CompareOp::Le),
      ">" => Ok(CompareOp::Gt),
      ">=" => Ok(CompareOp::Ge),
      other => Err(FlowError::UnknownOperator {
        op: other.to_string(),
      }),
    }
  }

  /// Compare two resolved values.
  ///
  /// Equality works on any value. Ordering works on numbers and on strings;
  /// an ordering comparison between other types is false.
  pub fn compare(&self, left: &Value, right: &Value) -> bool {
    match self {
      CompareOp::Eq => left == right,
      CompareOp::Ne => left != right,
      CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
        let ordering = match (left, right) {
          (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
          },
          (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
          _ => None,
        };
        match ordering {
          Some(ordering) => match self {
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
            _ => unreachable!(),
          },
          None => false,
        }
      }
    }
  }
}

/// A compiled `when` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
  pub expr: ValueExpr,
  pub op: CompareOp,
  pub value: Value,
}

impl Condition {
  pub(crate) fn from_def(def: &ConditionDef) -> Result<Self, FlowError> {
    Ok(Self {
      expr: ValueExpr::parse(&Value::String(def.reference.clone()))?,
      op: CompareOp::parse(&def.op)?,
      value: def.value.clone(),
    })
  }

  /// Evaluate against an already-resolved reference value.
  pub fn holds(&self, resolved: &Value) -> bool {
    self.op.compare(resolved, &self.value)
  }
}

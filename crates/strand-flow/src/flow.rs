use std::collections::{HashMap, HashSet};

use crate::condition::Condition;
use crate::def::{FlowDef, StepDef, TaskDef};
use crate::error::FlowError;
use crate::expr::ValueExpr;

/// A compiled flow, ready for execution.
///
/// Immutable once built and safe to share across concurrent runs. All
/// reference expressions have been parsed and checked against the declaration
/// invariants: step ids unique, task ids unique within their step, and every
/// `$step` reference targeting a strictly earlier step - the invariant that
/// makes intra-step tasks safe to run concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
  pub flow_id: String,
  pub version: String,
  pub name: Option<String>,
  /// Parameter name -> declared type.
  pub parameters: HashMap<String, String>,
  /// Parameter name -> default literal.
  pub defaults: HashMap<String, serde_json::Value>,
  pub steps: Vec<Step>,
}

/// A compiled step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  pub step_id: String,
  pub tasks: Vec<Task>,
  pub when: Option<Condition>,
}

/// A compiled task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
  pub task_id: String,
  pub function: String,
  pub inputs: Vec<(String, ValueExpr)>,
  pub export_to_flow: bool,
  pub when: Option<Condition>,
}

impl Flow {
  /// Compile a flow definition, validating it in full.
  pub fn from_def(def: FlowDef) -> Result<Self, FlowError> {
    for name in def.inputs.defaults.keys() {
      if !def.inputs.parameters.contains_key(name) {
        return Err(FlowError::UndeclaredDefault { name: name.clone() });
      }
    }

    // Tasks of strictly earlier steps, grown as steps compile.
    let mut earlier: HashMap<String, HashSet<String>> = HashMap::new();
    // Exported task id -> owning step, for the cross-step uniqueness check.
    let mut exported: HashMap<String, String> = HashMap::new();
    let mut steps = Vec::with_capacity(def.steps.len());

    for step_def in &def.steps {
      if earlier.contains_key(&step_def.step_id) {
        return Err(FlowError::DuplicateStepId {
          step_id: step_def.step_id.clone(),
        });
      }

      let step = compile_step(step_def, &def, &earlier)?;

      for task in step.tasks.iter().filter(|t| t.export_to_flow) {
        if let Some(first_step_id) =
          exported.insert(task.task_id.clone(), step.step_id.clone())
        {
          return Err(FlowError::DuplicateExportId {
            task_id: task.task_id.clone(),
            first_step_id,
            second_step_id: step.step_id.clone(),
          });
        }
      }

      earlier.insert(
        step.step_id.clone(),
        step.tasks.iter().map(|t| t.task_id.clone()).collect(),
      );
      steps.push(step);
    }

    Ok(Self {
      flow_id: def.flow_id,
      version: def.version,
      name: def.name,
      parameters: def.inputs.parameters,
      defaults: def.inputs.defaults,
      steps,
    })
  }

  pub fn get_step(&self, step_id: &str) -> Option<&Step> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }
}

fn compile_step(
  step_def: &StepDef,
  def: &FlowDef,
  earlier: &HashMap<String, HashSet<String>>,
) -> Result<Step, FlowError> {
  let mut task_ids: HashSet<&str> = HashSet::new();
  let mut tasks = Vec::with_capacity(step_def.tasks.len());

  for task_def in &step_def.tasks {
    if !task_ids.insert(&task_def.task_id) {
      return Err(FlowError::DuplicateTaskId {
        step_id: step_def.step_id.clone(),
        task_id: task_def.task_id.clone(),
      });
    }
    tasks.push(compile_task(task_def, &step_def.step_id, def, earlier)?);
  }

  let when = match &step_def.when {
    Some(cond_def) => {
      let cond = Condition::from_def(cond_def)?;
      check_references(&cond.expr, &step_def.step_id, def, earlier)?;
      Some(cond)
    }
    None => None,
  };

  Ok(Step {
    step_id: step_def.step_id.clone(),
    tasks,
    when,
  })
}

fn compile_task(
  task_def: &TaskDef,
  step_id: &str,
  def: &FlowDef,
  earlier: &HashMap<String, HashSet<String>>,
) -> Result<Task, FlowError> {
  let scope = format!("{}.{}", step_id, task_def.task_id);

  let mut inputs: Vec<(String, ValueExpr)> = Vec::with_capacity(task_def.inputs.len());
  for (name, raw) in &task_def.inputs {
    let expr = ValueExpr::parse(raw)?;
    check_references(&expr, &scope, def, earlier)?;
    inputs.push((name.clone(), expr));
  }
  // HashMap iteration order is arbitrary; keep inputs deterministic.
  inputs.sort_by(|a, b| a.0.cmp(&b.0));

  let when = match &task_def.when {
    Some(cond_def) => {
      let cond = Condition::from_def(cond_def)?;
      check_references(&cond.expr, &scope, def, earlier)?;
      Some(cond)
    }
    None => None,
  };

  Ok(Task {
    task_id: task_def.task_id.clone(),
    function: task_def.function.clone(),
    inputs,
    export_to_flow: task_def.export_to_flow,
    when,
  })
}

/// Check every reference in an expression tree against the declaration
/// invariants for the given scope.
fn check_references(
  expr: &ValueExpr,
  scope: &str,
  def: &FlowDef,
  earlier: &HashMap<String, HashSet<String>>,
) -> Result<(), FlowError> {
  let mut error = None;
  expr.for_each_reference(&mut |reference| {
    if error.is_some() {
      return;
    }
    error = match reference {
      ValueExpr::Param(name) => {
        if def.inputs.parameters.contains_key(name) {
          None
        } else {
          Some(FlowError::UndeclaredParameter { name: name.clone() })
        }
      }
      ValueExpr::TaskOutput { step_id, task_id } => match earlier.get(step_id) {
        Some(tasks) if tasks.contains(task_id) => None,
        Some(_) => Some(FlowError::UnknownReferenceTarget {
          step_id: step_id.clone(),
          task_id: task_id.clone(),
        }),
        // The step is not an earlier one: either it comes later (or is the
        // current step), or it does not exist at all.
        None => {
          if def.steps.iter().any(|s| s.step_id == *step_id) {
            Some(FlowError::ForwardReference {
              step_id: step_id.clone(),
              task_id: task_id.clone(),
              scope: scope.to_string(),
            })
          } else {
            Some(FlowError::UnknownReferenceTarget {
              step_id: step_id.clone(),
              task_id: task_id.clone(),
            })
          }
        }
      },
      _ => None,
    };
  });

  match error {
    Some(e) => Err(e),
    None => Ok(()),
  }
}

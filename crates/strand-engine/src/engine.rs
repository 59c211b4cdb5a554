//! The flow execution engine.

use std::sync::Arc;

use strand_flow::{Condition, Flow, Step, Task};
use strand_registry::FunctionRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::ResolutionContext;
use crate::error::ExecutionError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::export::{ExportedResult, export};
use crate::resolve::resolve;

/// What the engine does when a task fails (or its inputs fail to resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
  /// Abort the run at the end of the failing step. Default.
  #[default]
  FailFast,
  /// Record the failure and keep executing unrelated work. References to the
  /// failed task's output still fail as unresolved.
  TolerateTaskFailures,
}

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
  pub failure_policy: FailurePolicy,
}

/// A recorded task failure from a run with `TolerateTaskFailures`.
#[derive(Debug)]
pub struct TaskFailure {
  pub step_id: String,
  pub task_id: String,
  pub error: ExecutionError,
}

/// Result of a complete flow execution.
#[derive(Debug)]
pub struct FlowResult {
  pub execution_id: String,
  /// Exported task outputs in declaration order.
  pub exports: ExportedResult,
  /// Task failures tolerated by the failure policy (empty under fail-fast).
  pub failures: Vec<TaskFailure>,
}

/// The flow execution engine.
///
/// Walks steps in declaration order; within a step, runs all tasks
/// concurrently. Generic over `N: ExecutionNotifier` to allow different
/// notification strategies; use [`FlowEngine::new`] for a default engine with
/// no-op notifications.
pub struct FlowEngine<N: ExecutionNotifier = NoopNotifier> {
  registry: Arc<FunctionRegistry>,
  options: EngineOptions,
  notifier: N,
}

impl FlowEngine<NoopNotifier> {
  /// Create a new engine with default options and no-op notifications.
  pub fn new(registry: Arc<FunctionRegistry>) -> Self {
    Self::with_notifier(registry, EngineOptions::default(), NoopNotifier)
  }

  pub fn with_options(registry: Arc<FunctionRegistry>, options: EngineOptions) -> Self {
    Self::with_notifier(registry, options, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> FlowEngine<N> {
  /// Create a new engine with a custom notifier.
  pub fn with_notifier(registry: Arc<FunctionRegistry>, options: EngineOptions, notifier: N) -> Self {
    Self {
      registry,
      options,
      notifier,
    }
  }

  /// Execute a flow with the given initial parameter bindings.
  ///
  /// One call owns one [`ResolutionContext`] exclusively; concurrent calls
  /// are fully isolated. On cancellation, in-flight function calls are
  /// dropped, already-recorded outputs are preserved, and no further steps
  /// start.
  #[instrument(
    name = "flow_execute",
    skip(self, flow, initial_params, cancel),
    fields(flow_id = %flow.flow_id)
  )]
  pub async fn execute(
    &self,
    flow: &Flow,
    initial_params: serde_json::Map<String, serde_json::Value>,
    cancel: CancellationToken,
  ) -> Result<FlowResult, ExecutionError> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    // Unknown function names are configuration errors: surface them before
    // any task runs.
    self.preflight(flow)?;

    info!(
      execution_id = %execution_id,
      flow_id = %flow.flow_id,
      steps = flow.steps.len(),
      "flow_started"
    );
    self.notifier.notify(ExecutionEvent::FlowStarted {
      execution_id: execution_id.clone(),
      flow_id: flow.flow_id.clone(),
    });

    let mut ctx = ResolutionContext::new(flow, initial_params);
    let mut failures = Vec::new();

    let result = self
      .run_steps(flow, &mut ctx, &mut failures, &execution_id, &cancel)
      .await;

    match result {
      Ok(()) => {
        info!(execution_id = %execution_id, "flow_completed");
        self.notifier.notify(ExecutionEvent::FlowCompleted {
          execution_id: execution_id.clone(),
        });
        Ok(FlowResult {
          execution_id,
          exports: export(&ctx, flow),
          failures,
        })
      }
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "flow_failed");
        self.notifier.notify(ExecutionEvent::FlowFailed {
          execution_id: execution_id.clone(),
          error: e.to_string(),
        });
        Err(e)
      }
    }
  }

  /// Check that every task's function is registered.
  fn preflight(&self, flow: &Flow) -> Result<(), ExecutionError> {
    for step in &flow.steps {
      for task in &step.tasks {
        if !self.registry.contains(&task.function) {
          return Err(ExecutionError::UnknownFunction {
            step_id: step.step_id.clone(),
            task_id: task.task_id.clone(),
            function: task.function.clone(),
          });
        }
      }
    }
    Ok(())
  }

  /// Walk the steps in declaration order. Step N+1 never starts until every
  /// task of step N has completed or failed.
  async fn run_steps(
    &self,
    flow: &Flow,
    ctx: &mut ResolutionContext,
    failures: &mut Vec<TaskFailure>,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError> {
    for step in &flow.steps {
      if cancel.is_cancelled() {
        warn!(execution_id = %execution_id, "flow cancelled");
        return Err(ExecutionError::Cancelled);
      }

      // A step condition failure has no owning task to charge a failure
      // record to, so it is fatal under either policy. Task conditions go
      // through the failure policy in run_step.
      if let Some(when) = &step.when {
        if !self.condition_holds(when, ctx, &step.step_id)? {
          info!(execution_id = %execution_id, step_id = %step.step_id, "step_skipped");
          self.notifier.notify(ExecutionEvent::StepSkipped {
            execution_id: execution_id.to_string(),
            step_id: step.step_id.clone(),
          });
          for task in &step.tasks {
            ctx.record_skipped(&step.step_id, &task.task_id);
          }
          continue;
        }
      }

      info!(execution_id = %execution_id, step_id = %step.step_id, "step_started");
      self.notifier.notify(ExecutionEvent::StepStarted {
        execution_id: execution_id.to_string(),
        step_id: step.step_id.clone(),
      });

      self
        .run_step(step, ctx, failures, execution_id, cancel)
        .await?;
    }

    Ok(())
  }

  /// Run all tasks of one step concurrently and record their outputs.
  async fn run_step(
    &self,
    step: &Step,
    ctx: &mut ResolutionContext,
    failures: &mut Vec<TaskFailure>,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError> {
    let mut handles = Vec::with_capacity(step.tasks.len());
    // A pre-spawn failure under fail-fast must not return while sibling
    // handles are in flight; the step is a barrier even on the abort path.
    // The error is held here and reported after the drain below.
    let mut step_error = None;

    for task in &step.tasks {
      if let Some(when) = &task.when {
        let scope = format!("{}.{}", step.step_id, task.task_id);
        match self.condition_holds(when, ctx, &scope) {
          Ok(true) => {}
          Ok(false) => {
            info!(
              execution_id = %execution_id,
              step_id = %step.step_id,
              task_id = %task.task_id,
              "task_skipped"
            );
            self.notifier.notify(ExecutionEvent::TaskSkipped {
              execution_id: execution_id.to_string(),
              step_id: step.step_id.clone(),
              task_id: task.task_id.clone(),
            });
            ctx.record_skipped(&step.step_id, &task.task_id);
            continue;
          }
          Err(e) => {
            if let Err(e) = self.note_task_failure(step, task, e, ctx, failures, execution_id) {
              step_error = Some(e);
              break;
            }
            continue;
          }
        }
      }

      // Resolve inputs against the context snapshot; only prior steps'
      // outputs are visible, which is what licenses the fan-out below.
      let inputs = match self.resolve_inputs(task, &step.step_id, ctx) {
        Ok(inputs) => inputs,
        Err(e) => {
          if let Err(e) = self.note_task_failure(step, task, e, ctx, failures, execution_id) {
            step_error = Some(e);
            break;
          }
          continue;
        }
      };

      info!(
        execution_id = %execution_id,
        step_id = %step.step_id,
        task_id = %task.task_id,
        function = %task.function,
        "task_started"
      );
      self.notifier.notify(ExecutionEvent::TaskStarted {
        execution_id: execution_id.to_string(),
        step_id: step.step_id.clone(),
        task_id: task.task_id.clone(),
      });

      let function =
        self
          .registry
          .get(&task.function)
          .ok_or_else(|| ExecutionError::UnknownFunction {
            step_id: step.step_id.clone(),
            task_id: task.task_id.clone(),
            function: task.function.clone(),
          })?;

      let step_id = step.step_id.clone();
      let task_id = task.task_id.clone();
      let function_name = task.function.clone();
      let task_cancel = cancel.clone();

      handles.push(tokio::spawn(async move {
        let result = tokio::select! {
            result = function.call(inputs) => result,
            _ = task_cancel.cancelled() => return (task_id, Err(ExecutionError::Cancelled)),
        };
        let result = result.map_err(|e| ExecutionError::FunctionFailed {
          step_id,
          task_id: task_id.clone(),
          function: function_name,
          source: e,
        });
        (task_id, result)
      }));
    }

    // Wait for the whole step; a sequential barrier between steps.
    let results = tokio::select! {
        results = futures::future::join_all(handles) => results,
        _ = cancel.cancelled() => {
          warn!(execution_id = %execution_id, step_id = %step.step_id, "flow cancelled during step");
          return Err(ExecutionError::Cancelled);
        }
    };

    for result in results {
      let (task_id, outcome) = result.map_err(|e| ExecutionError::Join {
        message: e.to_string(),
      })?;

      match outcome {
        Ok(output) => {
          info!(
            execution_id = %execution_id,
            step_id = %step.step_id,
            task_id = %task_id,
            output = %output,
            "task_completed"
          );
          self.notifier.notify(ExecutionEvent::TaskCompleted {
            execution_id: execution_id.to_string(),
            step_id: step.step_id.clone(),
            task_id: task_id.clone(),
            output: output.clone(),
          });
          ctx.record_output(&step.step_id, &task_id, output);
        }
        Err(ExecutionError::Cancelled) => return Err(ExecutionError::Cancelled),
        Err(e) => {
          error!(
            execution_id = %execution_id,
            step_id = %step.step_id,
            task_id = %task_id,
            error = %e,
            "task_failed"
          );
          self.notifier.notify(ExecutionEvent::TaskFailed {
            execution_id: execution_id.to_string(),
            step_id: step.step_id.clone(),
            task_id: task_id.clone(),
            error: e.to_string(),
          });
          match self.options.failure_policy {
            FailurePolicy::FailFast => {
              // Keep draining results; sibling outputs stay recorded.
              if step_error.is_none() {
                step_error = Some(e);
              }
            }
            FailurePolicy::TolerateTaskFailures => {
              ctx.record_failed(&step.step_id, &task_id);
              failures.push(TaskFailure {
                step_id: step.step_id.clone(),
                task_id,
                error: e,
              });
            }
          }
        }
      }
    }

    match step_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Resolve all of a task's inputs into a named value map.
  fn resolve_inputs(
    &self,
    task: &Task,
    step_id: &str,
    ctx: &ResolutionContext,
  ) -> Result<serde_json::Map<String, serde_json::Value>, ExecutionError> {
    let mut resolved = serde_json::Map::new();
    for (name, expr) in &task.inputs {
      let value = resolve(expr, ctx).map_err(|e| ExecutionError::InputResolution {
        step_id: step_id.to_string(),
        task_id: task.task_id.clone(),
        source: e,
      })?;
      resolved.insert(name.clone(), value);
    }
    Ok(resolved)
  }

  /// Evaluate a `when` condition against the current context.
  fn condition_holds(
    &self,
    when: &Condition,
    ctx: &ResolutionContext,
    scope: &str,
  ) -> Result<bool, ExecutionError> {
    let resolved =
      resolve(&when.expr, ctx).map_err(|e| ExecutionError::ConditionResolution {
        scope: scope.to_string(),
        source: e,
      })?;
    Ok(when.holds(&resolved))
  }

  /// Record a task failure that happened before the function was invoked.
  fn note_task_failure(
    &self,
    step: &Step,
    task: &Task,
    error: ExecutionError,
    ctx: &mut ResolutionContext,
    failures: &mut Vec<TaskFailure>,
    execution_id: &str,
  ) -> Result<(), ExecutionError> {
    error!(
      execution_id = %execution_id,
      step_id = %step.step_id,
      task_id = %task.task_id,
      error = %error,
      "task_failed"
    );
    self.notifier.notify(ExecutionEvent::TaskFailed {
      execution_id: execution_id.to_string(),
      step_id: step.step_id.clone(),
      task_id: task.task_id.clone(),
      error: error.to_string(),
    });

    match self.options.failure_policy {
      FailurePolicy::FailFast => Err(error),
      FailurePolicy::TolerateTaskFailures => {
        ctx.record_failed(&step.step_id, &task.task_id);
        failures.push(TaskFailure {
          step_id: step.step_id.clone(),
          task_id: task.task_id.clone(),
          error,
        });
        Ok(())
      }
    }
  }
}

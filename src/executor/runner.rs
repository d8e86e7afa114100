// Main Executor implementation

use crate::executor::config::ExecutorConfig;
use crate::executor::error::{AttemptError, PlanError};
use crate::executor::types::{ExecutionState, Step, StepStatus};
use crate::template;
use crate::tool::{Outcome, PlanContext, Tool, ToolDescriptor, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Runs plans against a fixed tool registry.
///
/// Holds no per-plan state, so one instance serves concurrent plans.
pub struct Executor {
    config: ExecutorConfig,
    registry: Arc<ToolRegistry>,
}

impl Executor {
    pub fn new(registry: ToolRegistry, config: ExecutorConfig) -> Self {
        debug!(
            max_retries = config.max_retries,
            tool_timeout_ms = config.tool_timeout.as_millis() as u64,
            tools = registry.len(),
            "initializing executor"
        );
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Descriptors of the registered tools, for planners
    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }

    /// Execute `steps` in order, mutating each step's status/result/error.
    ///
    /// Stops at the first step whose final outcome is a failure. Side effects
    /// of earlier steps are not undone.
    pub async fn execute_plan(
        &self,
        actor_id: &str,
        steps: &mut [Step],
        context: &PlanContext,
    ) -> Result<ExecutionState, PlanError> {
        let started = Instant::now();
        let mut state = ExecutionState::new();

        info!(actor = %actor_id, steps = steps.len(), "executing plan");

        for (index, step) in steps.iter_mut().enumerate() {
            let Some(tool) = self.registry.lookup(&step.tool) else {
                error!(step = index, tool = %step.tool, "tool not registered");
                step.status = StepStatus::Failed;
                step.error = Some(format!("tool_not_registered: {}", step.tool));
                return Err(PlanError::ToolNotRegistered(step.tool.clone()));
            };

            let key = step.key().to_string();
            step.status = StepStatus::Processing;
            let input = template::render(&step.input, &state.to_value());

            info!(step = index, alias = %key, tool = %step.tool, "running step");
            let outcome = self.run_with_retry(tool.as_ref(), &key, input, context).await;

            step.record(&outcome);
            if state.insert(key.clone(), outcome.clone()).is_some() {
                warn!(alias = %key, "alias reused, earlier outcome overwritten");
            }

            if let Outcome::Failure(reason) = &outcome {
                error!(step = index, alias = %key, error = %reason, "step failed, aborting plan");
                return Err(PlanError::StepFailed {
                    alias: key,
                    index,
                    detail: outcome,
                });
            }
        }

        info!(
            actor = %actor_id,
            steps = state.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "plan completed"
        );
        Ok(state)
    }

    /// Up to `max_retries + 1` attempts. A thrown error, a timeout and a
    /// failure outcome all consume one attempt.
    async fn run_with_retry(
        &self,
        tool: &dyn Tool,
        alias: &str,
        input: Value,
        context: &PlanContext,
    ) -> Outcome {
        let max_attempts = self.config.max_attempts();
        let mut last = Outcome::failure("unhandled_error: no attempt made");

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            last = match self.attempt(tool, input.clone(), context).await {
                Ok(outcome) => outcome,
                Err(e) => Outcome::failure(format!("unhandled_error: {e}")),
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            match &last {
                Outcome::Success(_) => {
                    debug!(alias = %alias, attempt, duration_ms, "attempt succeeded");
                    return last;
                }
                Outcome::Failure(reason) => {
                    warn!(
                        alias = %alias,
                        attempt,
                        max_attempts,
                        duration_ms,
                        error = %reason,
                        "attempt failed"
                    );
                }
            }

            if attempt < max_attempts && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        last
    }

    /// One attempt raced against the tool timeout. The losing future is dropped.
    async fn attempt(
        &self,
        tool: &dyn Tool,
        input: Value,
        context: &PlanContext,
    ) -> Result<Outcome, AttemptError> {
        let limit = self.config.tool_timeout;
        match timeout(limit, tool.invoke(input, context)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AttemptError::Timeout(limit.as_millis() as u64)),
        }
    }
}

// Error types for Executor module

use crate::tool::{Outcome, ToolError};
use thiserror::Error;

/// Terminal plan-level failures
#[derive(Debug, Error)]
pub enum PlanError {
    /// Configuration error, never retried
    #[error("tool_not_registered: {0}")]
    ToolNotRegistered(String),

    /// A step exhausted its attempts; carries the step's final outcome
    #[error("step_failed: {alias}")]
    StepFailed {
        alias: String,
        index: usize,
        detail: Outcome,
    },
}

impl PlanError {
    /// The failing step's outcome, if the plan got that far
    pub fn detail(&self) -> Option<&Outcome> {
        match self {
            PlanError::ToolNotRegistered(_) => None,
            PlanError::StepFailed { detail, .. } => Some(detail),
        }
    }
}

/// Why a single attempt did not produce an outcome. Consumed by the retry loop.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("tool_timeout after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Threw(#[from] ToolError),
}

/// Plan parsing errors
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("Invalid plan JSON: {0}")]
    Json(#[from] serde_json::Error),
}

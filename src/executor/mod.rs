// Executor module - runs a plan's steps in order with timeout and retry

pub mod config;
pub mod error;
pub mod runner;
pub mod types;

pub use config::ExecutorConfig;
pub use error::{AttemptError, PlanError, PlanParseError};
pub use runner::Executor;
pub use types::{ExecutionState, Plan, Step, StepStatus};

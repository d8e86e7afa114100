// Error types for Sandbox module

use crate::queue::QueueError;
use thiserror::Error;

/// Sandbox error types
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Forbidden command: contains '{0}'")]
    Forbidden(String),

    #[error("Execution timeout after {0}ms")]
    Timeout(u64),

    #[error("Failed to spawn sandbox runtime '{0}': {1}")]
    Spawn(String, String),

    #[error("Failed to capture output: {0}")]
    OutputCapture(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

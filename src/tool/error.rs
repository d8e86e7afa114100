// Error types for Tool module

use thiserror::Error;

/// Errors a tool raises instead of returning an outcome
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid input for tool '{0}': {1}")]
    InvalidInput(String, String),

    #[error("Tool '{0}' failed to execute: {1}")]
    Execution(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ToolError>;

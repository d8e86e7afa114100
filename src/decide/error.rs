// Error types for Decide module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecideError {
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Exhausted: max retries ({retries}) exceeded, last error: {last_error}")]
    Exhausted { retries: u32, last_error: String },

    #[error("Unparsable model answer: {0}")]
    BadAnswer(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecideError>;

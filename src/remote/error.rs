// Error types for Remote module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("repoUrl required")]
    MissingRepoUrl,

    #[error("Only repositories under {allowed} are allowed: {url}")]
    InvalidRepoUrl { url: String, allowed: String },

    #[error("Invalid secret '{0}': keys must be identifiers and values single-line")]
    InvalidSecret(String),

    #[error("Remote session error: {0}")]
    Session(String),

    #[error("{stderr}")]
    BatchFailed { code: i32, stderr: String },

    #[error("Could not determine start command")]
    DecisionUnavailable,
}

impl RemoteError {
    /// Local validation failures; the remote host was never contacted
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RemoteError::MissingRepoUrl
                | RemoteError::InvalidRepoUrl { .. }
                | RemoteError::InvalidSecret(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

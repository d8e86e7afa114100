// Executor configuration

use crate::env::parse_env_var;
use std::path::PathBuf;
use std::time::Duration;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Retries after the first attempt; each step runs at most `max_retries + 1` times
    pub max_retries: u32,
    /// Per-attempt tool timeout
    pub tool_timeout: Duration,
    /// Pause between attempts (zero retries immediately)
    pub retry_delay: Duration,
    /// Path to tools.toml description overrides
    pub tools_toml_path: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            tool_timeout: Duration::from_secs(60),
            retry_delay: Duration::ZERO,
            tools_toml_path: PathBuf::from("tools.toml"),
        }
    }
}

impl ExecutorConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            max_retries: parse_env_var("PLANRUN_MAX_RETRIES", defaults.max_retries),
            tool_timeout: Duration::from_secs(parse_env_var(
                "PLANRUN_TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )),
            retry_delay: Duration::from_millis(parse_env_var("PLANRUN_RETRY_DELAY_MS", 0u64)),
            tools_toml_path: std::env::var("PLANRUN_TOOLS_TOML")
                .map(PathBuf::from)
                .unwrap_or(defaults.tools_toml_path),
        }
    }

    /// Total attempts per step
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

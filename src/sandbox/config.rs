// Sandbox configuration

use crate::env::{env_string, parse_env_var};
use std::time::Duration;

/// Commands containing any of these substrings are rejected
pub const DEFAULT_DENYLIST: [&str; 4] = ["rm", "sudo", "shutdown", "reboot"];

/// Sandbox execution descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    /// Container runtime CLI
    pub runtime: String,
    /// Base image commands run in
    pub image: String,
    /// Memory ceiling passed to `--memory`
    pub memory: String,
    /// CPU ceiling passed to `--cpus`
    pub cpus: String,
    /// Wall-clock limit per run; the process is killed on expiry
    pub timeout: Duration,
    /// Forbidden command substrings
    pub denylist: Vec<String>,
    /// Maximum bytes kept from each of stdout and stderr
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "ubuntu".to_string(),
            memory: "128m".to_string(),
            cpus: "0.5".to_string(),
            timeout: Duration::from_millis(10_000),
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let denylist = env_string("SANDBOX_DENYLIST")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.denylist);

        Self {
            runtime: env_string("SANDBOX_RUNTIME").unwrap_or(defaults.runtime),
            image: env_string("SANDBOX_IMAGE").unwrap_or(defaults.image),
            memory: env_string("SANDBOX_MEMORY").unwrap_or(defaults.memory),
            cpus: env_string("SANDBOX_CPUS").unwrap_or(defaults.cpus),
            timeout: Duration::from_millis(parse_env_var(
                "SANDBOX_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )),
            denylist,
            max_output_bytes: defaults.max_output_bytes,
        }
    }

    /// Arguments for `<runtime> run ...`. Networking is always disabled.
    pub fn run_args(&self, container_name: &str, command: &str) -> Vec<String> {
        [
            "run",
            "--rm",
            "--name",
            container_name,
            "--network",
            "none",
            "--memory",
            self.memory.as_str(),
            "--cpus",
            self.cpus.as_str(),
            self.image.as_str(),
            "bash",
            "-c",
            command,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

// Terminal tool - exposes the sandbox runner to plans

use crate::sandbox::error::SandboxError;
use crate::sandbox::runner::SandboxRunner;
use crate::tool::{Outcome, PlanContext, Result, Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

pub const TERMINAL_TOOL: &str = "terminal";

/// Terminal tool input parameters
#[derive(Debug, Deserialize)]
struct TerminalInput {
    #[serde(default)]
    cmd: Option<String>,
}

/// Runs one shell command per call inside the sandbox
pub struct TerminalTool {
    runner: Arc<SandboxRunner>,
    description: String,
}

impl TerminalTool {
    pub fn new(runner: Arc<SandboxRunner>, description: impl Into<String>) -> Self {
        Self {
            runner,
            description: description.into(),
        }
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(TERMINAL_TOOL, self.description.clone())
    }

    async fn invoke(&self, input: serde_json::Value, _context: &PlanContext) -> Result<Outcome> {
        let TerminalInput { cmd } = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidInput(TERMINAL_TOOL.to_string(), e.to_string()))?;

        let Some(cmd) = cmd.filter(|c| !c.trim().is_empty()) else {
            return Ok(Outcome::failure("cmd required"));
        };

        match self.runner.run(&cmd, None).await {
            Ok(output) if output.exit_code != 0 || !output.stderr.is_empty() => {
                let stderr = output.stderr.trim();
                let error = if stderr.is_empty() {
                    format!("exit_code {}", output.exit_code)
                } else {
                    format!("exit_code {}: {}", output.exit_code, stderr)
                };
                Ok(Outcome::failure(error))
            }
            Ok(output) => Ok(Outcome::success(serde_json::to_value(&output)?)),
            Err(SandboxError::Forbidden(token)) => {
                warn!(token = %token, "terminal command matched denylist");
                Ok(Outcome::failure("Forbidden command"))
            }
            Err(e) => Err(ToolError::Execution(TERMINAL_TOOL.to_string(), e.to_string())),
        }
    }
}

/// Default terminal tool description
pub fn default_terminal_description() -> String {
    r#"Execute a shell command inside a disposable, network-less container.
Input: {"cmd": "<shell command>"}.
Memory and CPU are capped and long-running commands are killed.
Stdout, stderr and the exit code are returned."#
        .to_string()
}

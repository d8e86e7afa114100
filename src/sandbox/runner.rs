// Sandbox runner - denylist check and admission before execution

use crate::queue::AdmissionQueue;
use crate::sandbox::backend::{DockerBackend, ExecOutput, SandboxBackend};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::error::{Result, SandboxError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Validates commands and runs them through the shared admission queue
pub struct SandboxRunner {
    config: SandboxConfig,
    queue: Arc<AdmissionQueue>,
    backend: Arc<dyn SandboxBackend>,
}

impl SandboxRunner {
    pub fn new(
        config: SandboxConfig,
        queue: Arc<AdmissionQueue>,
        backend: Arc<dyn SandboxBackend>,
    ) -> Self {
        Self {
            config,
            queue,
            backend,
        }
    }

    /// Runner backed by the container runtime named in `config`
    pub fn docker(config: SandboxConfig, queue: Arc<AdmissionQueue>) -> Self {
        let backend = Arc::new(DockerBackend::new(config.clone()));
        Self::new(config, queue, backend)
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Substring match against the denylist. Purely syntactic, so it is a
    /// floor rather than a security boundary.
    pub fn check_command(&self, command: &str) -> Result<()> {
        match self.config.denylist.iter().find(|token| command.contains(token.as_str())) {
            Some(token) => Err(SandboxError::Forbidden(token.clone())),
            None => Ok(()),
        }
    }

    /// Run `command`, defaulting to the configured timeout
    pub async fn run(&self, command: &str, timeout: Option<Duration>) -> Result<ExecOutput> {
        if let Err(e) = self.check_command(command) {
            warn!(command = %preview(command), error = %e, "command rejected");
            return Err(e);
        }

        let limit = timeout.unwrap_or(self.config.timeout);
        debug!(
            command = %preview(command),
            timeout_ms = limit.as_millis() as u64,
            running = self.queue.running(),
            waiting = self.queue.waiting(),
            "submitting sandbox run"
        );

        let start = Instant::now();
        let output = self
            .queue
            .submit(self.backend.run_local_sandboxed(command, limit))
            .await??;

        info!(
            command = %preview(command),
            exit_code = output.exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "sandbox run finished"
        );
        Ok(output)
    }
}

fn preview(command: &str) -> String {
    command.chars().take(100).collect()
}

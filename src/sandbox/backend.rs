// Sandbox backends - how a validated command actually gets executed

use crate::sandbox::config::SandboxConfig;
use crate::sandbox::error::{Result, SandboxError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Captured result of one sandboxed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal
    pub exit_code: i32,
}

/// Narrow seam over the process runtime so callers can be tested with fakes
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Run `command` in isolation, killing it once `timeout` elapses
    async fn run_local_sandboxed(&self, command: &str, timeout: Duration) -> Result<ExecOutput>;
}

/// Runs commands in throwaway containers via the configured runtime CLI
pub struct DockerBackend {
    config: SandboxConfig,
}

impl DockerBackend {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }
}

/// Force-remove a container, waiting at most 5s for the runtime to answer
async fn remove_container(runtime: &str, name: &str) {
    let removal = Command::new(runtime)
        .args(["rm", "-f", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(Duration::from_secs(5), removal).await {
        Ok(Ok(status)) if status.success() => debug!(container = %name, "container removed"),
        Ok(Ok(status)) => warn!(container = %name, code = ?status.code(), "container removal failed"),
        Ok(Err(e)) => warn!(container = %name, error = %e, "container removal failed"),
        Err(_) => warn!(container = %name, "container removal timed out"),
    }
}

/// Removes the named container when dropped while still armed.
///
/// Killing the runtime client does not stop the container, so a run future
/// dropped from outside (executor timeout, shutdown) must clean up here.
struct ContainerGuard {
    runtime: String,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn arm(runtime: &str, name: &str) -> Self {
        Self {
            runtime: runtime.to_string(),
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(container = %self.name, "sandbox run abandoned, removing container");

        // Detached: the removal outlives this process if it is shutting down.
        let spawned = if tokio::runtime::Handle::try_current().is_ok() {
            Command::new(&self.runtime)
                .args(["rm", "-f", self.name.as_str()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map(drop)
        } else {
            std::process::Command::new(&self.runtime)
                .args(["rm", "-f", self.name.as_str()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map(drop)
        };
        if let Err(e) = spawned {
            warn!(container = %self.name, error = %e, "failed to start container removal");
        }
    }
}

#[async_trait]
impl SandboxBackend for DockerBackend {
    async fn run_local_sandboxed(&self, command: &str, timeout: Duration) -> Result<ExecOutput> {
        let name = format!("planrun-sbx-{}", Uuid::new_v4().simple());
        let args = self.config.run_args(&name, command);
        let guard = ContainerGuard::arm(&self.config.runtime, &name);

        debug!(container = %name, image = %self.config.image, "starting sandbox container");

        let result = run_with_deadline(
            &self.config.runtime,
            &args,
            timeout,
            self.config.max_output_bytes,
        )
        .await;

        match &result {
            Err(SandboxError::Timeout(_)) => {
                guard.disarm();
                remove_container(&self.config.runtime, &name).await;
            }
            // capture failed mid-run, the container may still be alive
            Err(SandboxError::OutputCapture(_)) => drop(guard),
            _ => guard.disarm(),
        }
        result
    }
}

/// Spawn `program`, capture its output, and SIGKILL it if `limit` elapses first.
pub async fn run_with_deadline(
    program: &str,
    args: &[String],
    limit: Duration,
    max_output_bytes: usize,
) -> Result<ExecOutput> {
    let start = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SandboxError::Spawn(program.to_string(), e.to_string()))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::OutputCapture("stdout not piped".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| SandboxError::OutputCapture("stderr not piped".to_string()))?;

    let finished = tokio::time::timeout(limit, async {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (_, _, status) = futures::try_join!(
            stdout.read_to_end(&mut out),
            stderr.read_to_end(&mut err),
            child.wait()
        )?;
        Ok::<_, std::io::Error>((out, err, status))
    })
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match finished {
        Ok(Ok((out, err, status))) => {
            let output = ExecOutput {
                stdout: truncate_output(String::from_utf8_lossy(&out).into_owned(), max_output_bytes),
                stderr: truncate_output(String::from_utf8_lossy(&err).into_owned(), max_output_bytes),
                exit_code: status.code().unwrap_or(-1),
            };
            info!(
                program = %program,
                duration_ms,
                exit_code = output.exit_code,
                stdout_bytes = output.stdout.len(),
                stderr_bytes = output.stderr.len(),
                "sandbox process exited"
            );
            Ok(output)
        }
        Ok(Err(e)) => Err(SandboxError::OutputCapture(e.to_string())),
        Err(_) => {
            // no grace period
            if let Err(e) = child.kill().await {
                warn!(program = %program, error = %e, "failed to kill timed out process");
            }
            warn!(program = %program, duration_ms, "sandbox timeout, process killed");
            Err(SandboxError::Timeout(limit.as_millis() as u64))
        }
    }
}

fn truncate_output(mut s: String, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cut = max_bytes;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s.push_str("\n... [output truncated]");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let output = run_with_deadline("sh", &sh("echo out; echo err >&2; exit 3"), Duration::from_secs(5), 1024)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn test_timeout_kills_within_margin() {
        let start = Instant::now();
        let result = run_with_deadline("sh", &sh("sleep 5"), Duration::from_millis(200), 1024).await;

        assert!(matches!(result, Err(SandboxError::Timeout(200))));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_missing_runtime_is_spawn_error() {
        let result = run_with_deadline(
            "planrun-definitely-not-a-runtime",
            &[],
            Duration::from_secs(1),
            1024,
        )
        .await;
        assert!(matches!(result, Err(SandboxError::Spawn(..))));
    }

    /// Runtime stand-in that logs its argv and blocks on `run`
    #[cfg(unix)]
    fn fake_runtime() -> (std::path::PathBuf, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("planrun-rt-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        let log = dir.join("argv.log");
        let script = dir.join("fake-runtime");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\nif [ \"$1\" = run ]; then exec sleep 100; fi\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    fn logged_calls(log: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    /// Name given to `run --name`, and whether `rm -f` was issued for it
    fn removal_issued(calls: &[String]) -> bool {
        let name = calls
            .iter()
            .find_map(|c| c.strip_prefix("run --rm --name "))
            .and_then(|rest| rest.split_whitespace().next());
        match name {
            Some(name) => calls.iter().any(|c| c == &format!("rm -f {name}")),
            None => false,
        }
    }

    fn backend_for(script: &std::path::Path) -> DockerBackend {
        DockerBackend::new(SandboxConfig {
            runtime: script.display().to_string(),
            ..SandboxConfig::default()
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_outer_cancellation_removes_container() {
        let (script, log) = fake_runtime();
        // let any fork that inherited the script's write handle exec first
        tokio::time::sleep(Duration::from_millis(50)).await;
        let backend = backend_for(&script);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(300),
            backend.run_local_sandboxed("sleep 100", Duration::from_secs(2)),
        )
        .await;
        assert!(cancelled.is_err());

        let mut calls = Vec::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            calls = logged_calls(&log);
            if removal_issued(&calls) {
                break;
            }
        }
        assert!(removal_issued(&calls), "runtime calls: {calls:?}");
        let _ = std::fs::remove_dir_all(script.parent().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_removes_container() {
        let (script, log) = fake_runtime();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let backend = backend_for(&script);

        let result = backend
            .run_local_sandboxed("sleep 100", Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(SandboxError::Timeout(200))));
        let calls = logged_calls(&log);
        assert!(removal_issued(&calls), "runtime calls: {calls:?}");
        let _ = std::fs::remove_dir_all(script.parent().unwrap());
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let truncated = truncate_output("héllo".to_string(), 2);
        assert!(truncated.starts_with('h'));
        assert!(truncated.ends_with("[output truncated]"));
        assert_eq!(truncate_output("short".to_string(), 10), "short");
    }
}

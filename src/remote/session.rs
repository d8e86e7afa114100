// Remote session transport

use crate::remote::{RemoteConfig, RemoteError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Captured output of a successful batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutput {
    pub output: String,
    pub error: String,
}

/// Narrow seam over the remote host so the orchestrator can be driven by fakes
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run `commands` as one batch in a single session, stopping at the first non-zero exit
    async fn run_remote_batch(&self, commands: &[String]) -> Result<BatchOutput>;
}

/// Join commands so the remote shell aborts on the first failure
pub fn join_batch(commands: &[String]) -> String {
    commands.join(" && ")
}

/// Single-quote `s` for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Whether a 255 exit came from the ssh client itself rather than the remote batch.
///
/// ssh exits 255 on its own errors, but so does a remote command that exits
/// 255. The client always explains its failures on stderr, so a 255 with an
/// empty or unrecognized stderr is attributed to the batch.
pub fn is_client_failure(stderr: &str) -> bool {
    const CLIENT_ERRORS: [&str; 6] = [
        "Permission denied (",
        "Host key verification failed",
        "Connection closed by",
        "Connection timed out during banner exchange",
        "kex_exchange_identification",
        "Could not resolve hostname",
    ];
    let stderr = stderr.trim_start();
    stderr.starts_with("ssh:") || CLIENT_ERRORS.iter().any(|marker| stderr.contains(marker))
}

/// Map a non-zero ssh exit to a session or batch failure
pub fn exit_error(code: i32, stderr: String) -> RemoteError {
    if code == 255 && is_client_failure(&stderr) {
        return RemoteError::Session(stderr.trim().to_string());
    }
    let stderr = if stderr.trim().is_empty() {
        format!("Command failed with code {code}")
    } else {
        stderr
    };
    RemoteError::BatchFailed { code, stderr }
}

/// Batches executed through the system `ssh` client in non-interactive mode
pub struct SshSession {
    config: RemoteConfig,
}

impl SshSession {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    pub fn ssh_args(&self, script: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.config.key_path.display().to_string(),
            "-p".to_string(),
            self.config.ssh_port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=15".to_string(),
            self.config.destination(),
            script.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn run_remote_batch(&self, commands: &[String]) -> Result<BatchOutput> {
        let script = join_batch(commands);
        let start = Instant::now();
        debug!(destination = %self.config.destination(), commands = commands.len(), "starting remote batch");

        // Dropping this future kills the local client only; the remote command keeps running.
        let output = Command::new("ssh")
            .args(self.ssh_args(&script))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RemoteError::Session(format!("failed to start ssh: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let duration_ms = start.elapsed().as_millis() as u64;

        match output.status.code() {
            Some(0) => {
                info!(duration_ms, output_bytes = stdout.len(), "remote batch finished");
                Ok(BatchOutput {
                    output: stdout,
                    error: stderr,
                })
            }
            Some(code) => {
                warn!(duration_ms, code, stderr = %stderr.trim(), "remote batch failed");
                Err(exit_error(code, stderr))
            }
            None => Err(RemoteError::Session("ssh terminated by signal".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_batch() {
        let commands = vec!["cd ~/apps".to_string(), "ls".to_string()];
        assert_eq!(join_batch(&commands), "cd ~/apps && ls");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's; rm -rf /"), r"'it'\''s; rm -rf /'");
    }

    #[test]
    fn test_client_failures_told_apart_from_batch_exit_255() {
        assert!(is_client_failure(
            "ssh: connect to host 10.0.0.5 port 22: Connection refused\n"
        ));
        assert!(is_client_failure("deploy@10.0.0.5: Permission denied (publickey).\n"));
        assert!(is_client_failure("Host key verification failed.\n"));

        assert!(!is_client_failure(""));
        assert!(!is_client_failure("npm ERR! missing script: build\n"));
    }

    #[test]
    fn test_exit_255_from_batch_is_batch_failure() {
        let refused = exit_error(255, "ssh: connect to host h port 22: Connection refused\n".into());
        assert!(matches!(refused, RemoteError::Session(ref m) if m.contains("Connection refused")));

        let batch = exit_error(255, String::new());
        assert!(matches!(batch, RemoteError::BatchFailed { code: 255, .. }));
        assert_eq!(batch.to_string(), "Command failed with code 255");

        let failed = exit_error(1, "fatal: not a git repository\n".into());
        assert_eq!(failed.to_string(), "fatal: not a git repository\n");
    }

    #[test]
    fn test_ssh_args_end_with_destination_and_script() {
        let mut config = RemoteConfig::new("10.0.0.5", "deploy");
        config.key_path = "/keys/id".into();
        let args = SshSession::new(config).ssh_args("uptime");

        assert_eq!(args[0..4], ["-i", "/keys/id", "-p", "22"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(args[args.len() - 2..], ["deploy@10.0.0.5", "uptime"]);
    }
}

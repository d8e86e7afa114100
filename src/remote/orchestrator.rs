// Remote orchestrator - inspect, decide, then build and run on the remote host

use crate::decide::StartDecider;
use crate::decide::markers::{FILES_END, FILES_START, MANIFEST_END, MANIFEST_START, NO_MANIFEST};
use crate::remote::session::{RemoteSession, SshSession, shell_quote};
use crate::remote::{PortAllocator, RemoteConfig, RemoteError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A running deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub app_id: String,
    pub start_command: String,
    pub url: String,
    pub logs: String,
}

/// Drives the inspection and build/run batches around one decision step.
///
/// Nothing here is retried. A retried deploy starts over with a new app id, and
/// workspaces or images left by a failed attempt stay on the host.
pub struct RemoteOrchestrator {
    config: RemoteConfig,
    session: Arc<dyn RemoteSession>,
    decider: Arc<dyn StartDecider>,
    ports: PortAllocator,
}

impl RemoteOrchestrator {
    pub fn new(
        config: RemoteConfig,
        session: Arc<dyn RemoteSession>,
        decider: Arc<dyn StartDecider>,
    ) -> Self {
        let ports = PortAllocator::new(config.base_port);
        Self {
            config,
            session,
            decider,
            ports,
        }
    }

    /// Orchestrator talking to the configured host over ssh
    pub fn over_ssh(config: RemoteConfig, decider: Arc<dyn StartDecider>) -> Self {
        let session = Arc::new(SshSession::new(config.clone()));
        Self::new(config, session, decider)
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn validate_repo_url<'a>(&self, repo_url: Option<&'a str>) -> Result<&'a str> {
        let url = repo_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(RemoteError::MissingRepoUrl)?;

        let allowed = &self.config.allowed_origin;
        let rest = url.strip_prefix(allowed.as_str()).unwrap_or_default();
        if rest.is_empty() || url.chars().any(char::is_whitespace) {
            return Err(RemoteError::InvalidRepoUrl {
                url: url.to_string(),
                allowed: allowed.clone(),
            });
        }
        Ok(url)
    }

    fn workspace(&self, app_id: &str) -> String {
        format!("{}/{}", self.config.apps_dir, app_id)
    }

    /// Secrets live beside the workspace, outside the image build context
    pub fn secrets_path(&self, app_id: &str) -> String {
        format!("{}/{}.env", self.config.apps_dir, app_id)
    }

    /// Clone into a fresh workspace and dump its file list and manifest
    pub fn inspect_commands(&self, repo_url: &str, app_id: &str) -> Vec<String> {
        vec![
            format!("mkdir -p {}", self.config.apps_dir),
            format!("cd {}", self.config.apps_dir),
            format!("git clone {} {}", shell_quote(repo_url), app_id),
            format!("cd {app_id}"),
            format!("echo {FILES_START}"),
            "ls".to_string(),
            format!("echo {FILES_END}"),
            format!("echo {MANIFEST_START}"),
            format!("if [ -f package.json ]; then cat package.json; else echo {NO_MANIFEST}; fi"),
            format!("echo {MANIFEST_END}"),
        ]
    }

    /// Build descriptor lines for the discovered start command
    pub fn dockerfile(&self, start_command: &str) -> Vec<String> {
        let cmd = Value::from(start_command.split_whitespace().collect::<Vec<_>>());
        let port = self.config.container_port;
        vec![
            format!("FROM {}", self.config.base_image),
            "WORKDIR /app".to_string(),
            "COPY package*.json ./".to_string(),
            "RUN npm install".to_string(),
            "COPY . .".to_string(),
            format!("ENV PORT={port}"),
            format!("EXPOSE {port}"),
            format!("CMD {cmd}"),
        ]
    }

    /// Write the descriptor and secrets, build the image and start the container
    pub fn build_commands(
        &self,
        app_id: &str,
        start_command: &str,
        port: u16,
        secrets: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        let mut commands = vec![format!("cd {}", self.workspace(app_id))];

        let env_file = if secrets.is_empty() {
            None
        } else {
            let path = self.secrets_path(app_id);
            check_secrets(secrets)?;
            let lines: Vec<_> = secrets
                .iter()
                .map(|(key, value)| shell_quote(&format!("{key}={value}")))
                .collect();
            commands.push(format!("printf '%s\\n' {} > {path}", lines.join(" ")));
            commands.push(format!("chmod 600 {path}"));
            Some(path)
        };

        let descriptor: Vec<_> = self
            .dockerfile(start_command)
            .iter()
            .map(|line| shell_quote(line))
            .collect();
        commands.push(format!("printf '%s\\n' {} > Dockerfile", descriptor.join(" ")));
        commands.push(format!("docker build -t {app_id} ."));

        let mount = env_file
            .map(|path| format!(" --env-file {path}"))
            .unwrap_or_default();
        commands.push(format!(
            "docker run -d --name {app_id} -p {port}:{}{mount} {app_id}",
            self.config.container_port
        ));

        Ok(commands)
    }

    /// Deploy `repo_url`, returning where it can be reached
    pub async fn deploy(
        &self,
        repo_url: Option<&str>,
        port: Option<u16>,
        secrets: &BTreeMap<String, String>,
    ) -> Result<Deployment> {
        let repo_url = self.validate_repo_url(repo_url)?;
        check_secrets(secrets)?;
        let port = port.unwrap_or_else(|| self.ports.next_port());
        let app_id = new_app_id();

        info!(repo = %repo_url, app_id = %app_id, port, "deploying repository");

        let inspection = self
            .session
            .run_remote_batch(&self.inspect_commands(repo_url, &app_id))
            .await?;
        debug!(app_id = %app_id, output_bytes = inspection.output.len(), "inspection finished");

        let start_command = match self.decider.decide(&inspection.output).await {
            Ok(Some(command)) => command,
            Ok(None) => {
                warn!(app_id = %app_id, "no start command inferred");
                return Err(RemoteError::DecisionUnavailable);
            }
            Err(e) => {
                error!(app_id = %app_id, error = %e, "decision step failed");
                return Err(RemoteError::DecisionUnavailable);
            }
        };
        info!(app_id = %app_id, start_command = %start_command, "start command decided");

        let commands = self.build_commands(&app_id, &start_command, port, secrets)?;
        let run = self.session.run_remote_batch(&commands).await?;

        let url = format!("http://{}:{}", self.config.host, port);
        info!(app_id = %app_id, url = %url, "deployment running");

        Ok(Deployment {
            app_id,
            start_command,
            url,
            logs: run.output,
        })
    }
}

/// `app-<unix millis>-<6 hex>`; unique across concurrent deploys
pub fn new_app_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("app-{}-{}", Utc::now().timestamp_millis(), &suffix[..6])
}

/// Keys must be identifiers and values single-line to survive an env file
fn check_secrets(secrets: &BTreeMap<String, String>) -> Result<()> {
    match secrets
        .iter()
        .find(|(key, value)| !is_env_key(key) || value.contains(['\n', '\r']))
    {
        Some((key, _)) => Err(RemoteError::InvalidSecret(key.clone())),
        None => Ok(()),
    }
}

fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decide::ManifestDecider;

    fn orchestrator() -> RemoteOrchestrator {
        RemoteOrchestrator::over_ssh(
            RemoteConfig::new("203.0.113.7", "deploy"),
            Arc::new(ManifestDecider),
        )
    }

    #[test]
    fn test_repo_url_validation() {
        let o = orchestrator();
        assert!(matches!(o.validate_repo_url(None), Err(RemoteError::MissingRepoUrl)));
        assert!(matches!(o.validate_repo_url(Some("  ")), Err(RemoteError::MissingRepoUrl)));
        assert!(matches!(
            o.validate_repo_url(Some("https://gitlab.com/a/b")),
            Err(RemoteError::InvalidRepoUrl { .. })
        ));
        assert!(o.validate_repo_url(Some("https://github.com/")).is_err());
        assert!(o.validate_repo_url(Some("https://github.com/a/b c")).is_err());
        assert_eq!(
            o.validate_repo_url(Some("https://github.com/a/b")).unwrap(),
            "https://github.com/a/b"
        );
    }

    #[test]
    fn test_inspect_commands_quote_repo() {
        let commands = orchestrator().inspect_commands("https://github.com/a/b", "app-1");
        assert_eq!(commands[2], "git clone 'https://github.com/a/b' app-1");
        assert!(commands.contains(&"echo FILES_START".to_string()));
        assert!(commands.last().unwrap().contains("PACKAGE_END"));
    }

    #[test]
    fn test_dockerfile_embeds_start_command() {
        let lines = orchestrator().dockerfile("node src/app.js");
        assert_eq!(lines[0], "FROM node:20");
        assert_eq!(lines.last().unwrap(), r#"CMD ["node","src/app.js"]"#);
        assert!(lines.contains(&"EXPOSE 4000".to_string()));
    }

    #[test]
    fn test_build_without_secrets() {
        let commands = orchestrator()
            .build_commands("app-1", "npm start", 5001, &BTreeMap::new())
            .unwrap();
        assert_eq!(commands[0], "cd ~/apps/app-1");
        assert_eq!(commands.last().unwrap(), "docker run -d --name app-1 -p 5001:4000 app-1");
        assert!(!commands.iter().any(|c| c.contains(".env")));
    }

    #[test]
    fn test_secrets_mounted_not_baked() {
        let mut secrets = BTreeMap::new();
        secrets.insert("API_KEY".to_string(), "s3cr'et".to_string());
        let commands = orchestrator()
            .build_commands("app-1", "npm start", 5001, &secrets)
            .unwrap();

        assert_eq!(commands[1], r"printf '%s\n' 'API_KEY=s3cr'\''et' > ~/apps/app-1.env");
        assert_eq!(
            commands.last().unwrap(),
            "docker run -d --name app-1 -p 5001:4000 --env-file ~/apps/app-1.env app-1"
        );
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let mut secrets = BTreeMap::new();
        secrets.insert("BAD KEY".to_string(), "v".to_string());
        assert!(matches!(
            orchestrator().build_commands("app-1", "npm start", 5001, &secrets),
            Err(RemoteError::InvalidSecret(_))
        ));

        let mut secrets = BTreeMap::new();
        secrets.insert("OK".to_string(), "line1\nline2".to_string());
        assert!(orchestrator().build_commands("app-1", "npm start", 5001, &secrets).is_err());
    }

    #[test]
    fn test_app_ids_unique() {
        assert_ne!(new_app_id(), new_app_id());
        assert!(new_app_id().starts_with("app-"));
    }
}

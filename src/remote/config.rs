// Remote host configuration

use crate::env::{env_string, parse_env_var};
use crate::remote::{RemoteError, Result};
use std::path::PathBuf;

/// Remote host and deployment configuration
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Host address deployments go to (also used in returned URLs)
    pub host: String,
    /// SSH username
    pub user: String,
    /// Private key file for SSH
    pub key_path: PathBuf,
    /// SSH port
    pub ssh_port: u16,
    /// Repository URLs must start with this prefix
    pub allowed_origin: String,
    /// First host port handed out when a step does not pick one
    pub base_port: u16,
    /// Port the application listens on inside its container
    pub container_port: u16,
    /// Base image of the generated build descriptor
    pub base_image: String,
    /// Remote directory holding workspaces and secrets files
    pub apps_dir: String,
}

impl RemoteConfig {
    /// Config with defaults for everything but the host and user
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            key_path: default_key_path(),
            ssh_port: 22,
            allowed_origin: "https://github.com/".to_string(),
            base_port: 5000,
            container_port: 4000,
            base_image: "node:20".to_string(),
            apps_dir: "~/apps".to_string(),
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env_string("REMOTE_HOST")
            .ok_or_else(|| RemoteError::ConfigMissing("REMOTE_HOST".into()))?;
        let user = env_string("REMOTE_USER")
            .ok_or_else(|| RemoteError::ConfigMissing("REMOTE_USER".into()))?;

        let defaults = Self::new(host, user);
        Ok(Self {
            key_path: env_string("REMOTE_SSH_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path.clone()),
            ssh_port: parse_env_var("REMOTE_PORT", defaults.ssh_port),
            allowed_origin: env_string("DEPLOY_ALLOWED_ORIGIN")
                .unwrap_or(defaults.allowed_origin.clone()),
            base_port: parse_env_var("DEPLOY_BASE_PORT", defaults.base_port),
            container_port: parse_env_var("DEPLOY_CONTAINER_PORT", defaults.container_port),
            base_image: env_string("DEPLOY_BASE_IMAGE").unwrap_or(defaults.base_image.clone()),
            apps_dir: env_string("DEPLOY_APPS_DIR").unwrap_or(defaults.apps_dir.clone()),
            ..defaults
        })
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

fn default_key_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".ssh").join("id_rsa"))
        .unwrap_or_else(|| PathBuf::from(".ssh/id_rsa"))
}

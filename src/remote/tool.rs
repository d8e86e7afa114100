// Deploy tool - exposes the remote orchestrator to plans

use crate::remote::orchestrator::RemoteOrchestrator;
use crate::tool::{Outcome, PlanContext, Result, Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

pub const DEPLOY_TOOL: &str = "deploy_repo";

/// Deploy tool input parameters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployInput {
    #[serde(default)]
    repo_url: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

/// Deploys a repository to the configured host; secrets come from the plan context's `env`
pub struct DeployTool {
    orchestrator: Arc<RemoteOrchestrator>,
    description: String,
}

impl DeployTool {
    pub fn new(orchestrator: Arc<RemoteOrchestrator>, description: impl Into<String>) -> Self {
        Self {
            orchestrator,
            description: description.into(),
        }
    }
}

#[async_trait]
impl Tool for DeployTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(DEPLOY_TOOL, self.description.clone())
    }

    async fn invoke(&self, input: serde_json::Value, context: &PlanContext) -> Result<Outcome> {
        let DeployInput { repo_url, port } = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidInput(DEPLOY_TOOL.to_string(), e.to_string()))?;

        match self
            .orchestrator
            .deploy(repo_url.as_deref(), port, &context.env)
            .await
        {
            Ok(deployment) => Ok(Outcome::success(serde_json::to_value(&deployment)?)),
            Err(e) if e.is_validation() => {
                warn!(error = %e, "deploy request rejected");
                Ok(Outcome::failure(e.to_string()))
            }
            Err(e) => {
                error!(error = %e, "deployment error");
                Ok(Outcome::failure(e.to_string()))
            }
        }
    }
}

/// Default deploy tool description
pub fn default_deploy_description() -> String {
    r#"Deploy a GitHub repository to the preconfigured remote host.
Input: {"repoUrl": "https://github.com/<owner>/<repo>", "port": <optional host port>}.
Returns the app id, start command, reachable URL and build logs."#
        .to_string()
}

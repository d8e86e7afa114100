// Remote module - multi-phase deployment to a pre-configured host over SSH

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod port;
pub mod session;
pub mod tool;

pub use config::RemoteConfig;
pub use error::{RemoteError, Result};
pub use orchestrator::{Deployment, RemoteOrchestrator};
pub use port::PortAllocator;
pub use session::{BatchOutput, RemoteSession, SshSession, join_batch, shell_quote};
pub use tool::{DEPLOY_TOOL, DeployTool, default_deploy_description};

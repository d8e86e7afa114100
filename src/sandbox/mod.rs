// Sandbox module - isolated, resource-capped execution of shell commands

pub mod backend;
pub mod config;
pub mod error;
pub mod runner;
pub mod tool;

pub use backend::{DockerBackend, ExecOutput, SandboxBackend};
pub use config::SandboxConfig;
pub use error::{Result, SandboxError};
pub use runner::SandboxRunner;
pub use tool::{TERMINAL_TOOL, TerminalTool, default_terminal_description};

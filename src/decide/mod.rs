// Decide module - infers how a freshly cloned project should be started

pub mod error;
pub mod llm;
pub mod manifest;

pub use error::{DecideError, Result};
pub use llm::{LlmDecider, LlmDeciderConfig};
pub use manifest::{Inspection, ManifestDecider};

use async_trait::async_trait;

/// Sentinels wrapping each section of the remote inspection output
pub mod markers {
    pub const FILES_START: &str = "FILES_START";
    pub const FILES_END: &str = "FILES_END";
    pub const MANIFEST_START: &str = "PACKAGE_START";
    pub const MANIFEST_END: &str = "PACKAGE_END";
    pub const NO_MANIFEST: &str = "NO_PACKAGE_JSON";
}

/// Opaque decision capability consulted between inspection and build.
///
/// `Ok(None)` means no start command could be inferred.
#[async_trait]
pub trait StartDecider: Send + Sync {
    async fn decide(&self, inspection: &str) -> Result<Option<String>>;
}

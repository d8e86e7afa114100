// Tool module - capability contract shared by every tool and the registry

pub mod error;
pub mod registry;
pub mod types;

pub use error::{Result, ToolError};
pub use registry::{ToolRegistry, load_tool_descriptions};
pub use types::{Outcome, PlanContext, ToolDescriptor};

use async_trait::async_trait;
use serde_json::Value;

/// A capability unit the executor can invoke.
///
/// `Ok(Outcome::Failure(..))` is a logical failure reported by the tool itself.
/// `Err(..)` means the tool could not run at all (the "threw" path).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name and description of the tool
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with rendered JSON input and the caller's context
    async fn invoke(&self, input: Value, context: &PlanContext) -> Result<Outcome>;

    /// Get tool name
    fn name(&self) -> String {
        self.descriptor().name
    }
}

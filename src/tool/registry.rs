// Tool registry and tools.toml description loading
#![allow(clippy::collapsible_if)]

use crate::tool::{Result, Tool, ToolDescriptor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name-keyed store of tools. The last registration for a name wins.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning the one it replaced if any
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name();
        let previous = self.tools.insert(name.clone(), tool);
        if previous.is_some() {
            warn!(tool = %name, "tool registered twice, replacing previous registration");
        } else {
            debug!(tool = %name, "tool registered");
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Descriptors of every registered tool, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Load tool description overrides from a TOML file.
///
/// Each top-level table is a tool name with an optional `description` key.
/// A missing file yields no overrides.
pub fn load_tool_descriptions(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        debug!(path = %path.display(), "tools.toml not found, using default descriptions");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    let config: toml::Table = content.parse()?;

    let mut descriptions = HashMap::new();
    for (key, value) in &config {
        if let Some(desc) = value.get("description") {
            if let Some(s) = desc.as_str() {
                descriptions.insert(key.clone(), s.to_string());
            }
        }
    }

    debug!(path = %path.display(), tool_count = descriptions.len(), "loaded tool descriptions from config");
    Ok(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Outcome, PlanContext};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Tool for Named {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new(self.0, self.1)
        }

        async fn invoke(&self, _input: Value, _context: &PlanContext) -> Result<Outcome> {
            Ok(Outcome::success(self.1))
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(Arc::new(Named("echo", "first"))).is_none());
        assert!(registry.register(Arc::new(Named("echo", "second"))).is_some());

        assert_eq!(registry.len(), 1);
        let tool = registry.lookup("echo").unwrap();
        assert_eq!(tool.descriptor().description, "second");
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_descriptors_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named("terminal", "t")));
        registry.register(Arc::new(Named("deploy_repo", "d")));

        let names: Vec<_> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["deploy_repo", "terminal"]);
    }

    #[test]
    fn test_missing_descriptions_file() {
        let descriptions =
            load_tool_descriptions(Path::new("/nonexistent/planrun/tools.toml")).unwrap();
        assert!(descriptions.is_empty());
    }
}

// Rule-based start command inference from the inspection output

use crate::decide::markers::{FILES_END, FILES_START, MANIFEST_END, MANIFEST_START, NO_MANIFEST};
use crate::decide::{Result, StartDecider};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Parsed inspection sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inspection {
    pub files: Vec<String>,
    /// `package.json` contents, if present and valid JSON
    pub manifest: Option<Value>,
}

impl Inspection {
    pub fn parse(output: &str) -> Self {
        let files = section(output, FILES_START, FILES_END)
            .map(|s| {
                s.split_whitespace()
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let manifest = section(output, MANIFEST_START, MANIFEST_END)
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != NO_MANIFEST)
            .and_then(|s| match serde_json::from_str::<Value>(s) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "manifest is not valid JSON");
                    None
                }
            });

        Self { files, manifest }
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }
}

/// Text between the first `start` marker line and the following `end` marker
fn section<'a>(output: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = output.find(start)? + start.len();
    let len = output[from..].find(end)?;
    Some(&output[from..from + len])
}

/// Node.js conventions: `scripts.start`, then `main`, then `index.js`
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestDecider;

impl ManifestDecider {
    pub fn infer(inspection: &Inspection) -> Option<String> {
        if let Some(manifest) = &inspection.manifest {
            if manifest.pointer("/scripts/start").and_then(Value::as_str).is_some() {
                return Some("npm start".to_string());
            }
            if let Some(main) = manifest.get("main").and_then(Value::as_str) {
                if !main.trim().is_empty() {
                    return Some(format!("node {}", main.trim()));
                }
            }
        }
        if inspection.has_file("index.js") {
            return Some("node index.js".to_string());
        }
        None
    }
}

#[async_trait]
impl StartDecider for ManifestDecider {
    async fn decide(&self, inspection: &str) -> Result<Option<String>> {
        let parsed = Inspection::parse(inspection);
        let decision = Self::infer(&parsed);
        debug!(
            files = parsed.files.len(),
            has_manifest = parsed.manifest.is_some(),
            start_command = ?decision,
            "manifest decision"
        );
        Ok(decision)
    }
}

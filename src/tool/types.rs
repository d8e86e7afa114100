// Data types for Tool module

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Name and human-readable description of a registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Caller-supplied data handed unchanged to every tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanContext {
    /// Who requested the plan
    #[serde(default)]
    pub actor_id: String,
    /// Environment values a tool may forward (e.g. deploy secrets)
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl PlanContext {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

/// Result of one tool call.
///
/// Serialized as `{"ok": true, "result": ...}` or `{"ok": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawOutcome", try_from = "RawOutcome")]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

impl Outcome {
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success(result.into())
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure(error.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// The wire shape as a JSON value, used as template scope
    pub fn to_value(&self) -> Value {
        match self {
            Self::Success(result) => json!({ "ok": true, "result": result }),
            Self::Failure(error) => json!({ "ok": false, "error": error }),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawOutcome {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Outcome> for RawOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(result) => RawOutcome {
                ok: true,
                result: Some(result),
                error: None,
            },
            Outcome::Failure(error) => RawOutcome {
                ok: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<RawOutcome> for Outcome {
    type Error = String;

    fn try_from(raw: RawOutcome) -> Result<Self, Self::Error> {
        if raw.ok {
            Ok(Outcome::Success(raw.result.unwrap_or(Value::Null)))
        } else {
            Ok(Outcome::Failure(
                raw.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_shape() {
        let ok = serde_json::to_value(Outcome::success(json!({"a": 1}))).unwrap();
        assert_eq!(ok, json!({"ok": true, "result": {"a": 1}}));

        let failed = serde_json::to_value(Outcome::failure("boom")).unwrap();
        assert_eq!(failed, json!({"ok": false, "error": "boom"}));
        assert_eq!(Outcome::failure("boom").to_value(), failed);
    }

    #[test]
    fn test_outcome_failure_without_error_text() {
        let outcome: Outcome = serde_json::from_value(json!({"ok": false})).unwrap();
        assert_eq!(outcome.error(), Some("unknown_error"));
    }

    #[test]
    fn test_context_defaults() {
        let ctx: PlanContext = serde_json::from_value(json!({"actorId": "u1"})).unwrap();
        assert_eq!(ctx.actor_id, "u1");
        assert!(ctx.env.is_empty());
    }
}

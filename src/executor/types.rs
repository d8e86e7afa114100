// Data types for Executor module

use crate::executor::PlanParseError;
use crate::tool::Outcome;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Lifecycle of a step within one plan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One tool invocation in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub tool: String,
    #[serde(default = "empty_input")]
    pub input: Value,
    /// Key under which the outcome is stored and referenced
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn empty_input() -> Value {
    Value::Object(Map::new())
}

impl Step {
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self {
            tool: tool.into(),
            input,
            alias: None,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Storage key: the alias, or the tool name when no alias was given
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.tool)
    }

    pub(crate) fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success(result) => {
                self.status = StepStatus::Completed;
                self.result = Some(result.clone());
                self.error = None;
            }
            Outcome::Failure(error) => {
                self.status = StepStatus::Failed;
                self.result = None;
                self.error = Some(error.clone());
            }
        }
    }
}

/// An ordered list of steps as produced by a planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Parse planner output. `null` means there is nothing to execute.
    pub fn from_json(raw: &str) -> Result<Self, PlanParseError> {
        let plan: Option<Plan> = serde_json::from_str(raw)?;
        Ok(plan.unwrap_or_default())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcomes of the steps executed so far, keyed by alias in first-insertion order.
///
/// Re-using an alias overwrites the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    entries: Vec<(String, Outcome)>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, outcome: Outcome) -> Option<Outcome> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, outcome)),
            None => {
                self.entries.push((key, outcome));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Outcome> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.entries.iter().map(|(k, o)| (k.as_str(), o))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Template scope: `{ alias: {ok, result|error}, ... }`
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.entries.len());
        for (key, outcome) in &self.entries {
            map.insert(key.clone(), outcome.to_value());
        }
        Value::Object(map)
    }
}

impl Serialize for ExecutionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, outcome) in &self.entries {
            map.serialize_entry(key, outcome)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_from_planner_output() {
        let plan = Plan::from_json(
            r#"{"steps": [
                {"tool": "web_search", "input": {"query": "rust"}, "as": "search1"},
                {"tool": "terminal", "input": {"cmd": "ls"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].key(), "search1");
        assert_eq!(plan.steps[1].key(), "terminal");
        assert_eq!(plan.steps[1].status, StepStatus::Pending);
    }

    #[test]
    fn test_null_plan_is_empty() {
        assert!(Plan::from_json("null").unwrap().is_empty());
        assert!(Plan::from_json("{}").unwrap().is_empty());
        assert!(Plan::from_json("[").is_err());
    }

    #[test]
    fn test_missing_input_defaults_to_object() {
        let plan = Plan::from_json(r#"{"steps": [{"tool": "noop"}]}"#).unwrap();
        assert_eq!(plan.steps[0].input, json!({}));
    }

    #[test]
    fn test_alias_collision_overwrites_in_place() {
        let mut state = ExecutionState::new();
        state.insert("a", Outcome::success(1));
        state.insert("b", Outcome::success(2));
        let replaced = state.insert("a", Outcome::failure("later"));

        assert_eq!(replaced, Some(Outcome::success(1)));
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(state.get("a"), Some(&Outcome::failure("later")));
    }

    #[test]
    fn test_state_serializes_in_order() {
        let mut state = ExecutionState::new();
        state.insert("zeta", Outcome::success("z"));
        state.insert("alpha", Outcome::success("a"));

        let text = serde_json::to_string(&state).unwrap();
        assert_eq!(
            text,
            r#"{"zeta":{"ok":true,"result":"z"},"alpha":{"ok":true,"result":"a"}}"#
        );
    }
}

// Template module - `{{alias.path}}` substitution over step inputs

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

const PLACEHOLDER_PATTERN: &str = r"\{\{(.+?)\}\}";

// Constant pattern, compiled by `test_placeholder_pattern_compiles`
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"));

/// Render a step input against the outcomes recorded so far.
///
/// Returns a fresh tree: every string holding `{{a.b.c}}` placeholders has each
/// one replaced by the string form of the value at that path in `scope`.
/// Unresolvable paths render as the empty string. Object keys and non-string
/// values are copied unchanged.
pub fn render(template: &Value, scope: &Value) -> Value {
    match template {
        Value::String(s) => Value::String(render_str(s, scope)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render(v, scope)).collect()),
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, value) in fields {
                out.insert(key.clone(), render(value, scope));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn render_str(s: &str, scope: &Value) -> String {
    if !s.contains("{{") {
        return s.to_string();
    }
    PLACEHOLDER
        .replace_all(s, |caps: &Captures<'_>| {
            lookup(scope, caps[1].trim()).map(stringify).unwrap_or_default()
        })
        .into_owned()
}

/// Walk a dotted path; numeric segments index into arrays.
pub fn lookup<'a>(scope: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(scope, |node, segment| match node {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        // compact JSON for numbers, bools, arrays and objects
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Value {
        json!({
            "search1": { "ok": true, "result": { "snippet": "x", "hits": [ {"link": "a"}, {"link": "b"} ], "count": 2 } },
            "term1": { "ok": false, "error": "Forbidden command" }
        })
    }

    #[test]
    fn test_placeholder_pattern_compiles() {
        assert!(Regex::new(PLACEHOLDER_PATTERN).is_ok());
        assert_eq!(PLACEHOLDER.captures_len(), 2);
    }

    #[test]
    fn test_substitutes_nested_path() {
        let rendered = render(&json!({"q": "got {{search1.result.snippet}}"}), &scope());
        assert_eq!(rendered, json!({"q": "got x"}));
    }

    #[test]
    fn test_missing_path_renders_empty() {
        let rendered = render(&json!({"q": "[{{missing.path}}]"}), &scope());
        assert_eq!(rendered, json!({"q": "[]"}));

        let rendered = render(&json!("{{search1.result.snippet.deeper}}"), &scope());
        assert_eq!(rendered, json!(""));
    }

    #[test]
    fn test_array_index_and_non_string_values() {
        let rendered = render(
            &json!({
                "links": ["{{search1.result.hits.1.link}}", 7, true, null],
                "n": "{{ search1.result.count }} results",
                "why": "{{term1.error}}"
            }),
            &scope(),
        );
        assert_eq!(
            rendered,
            json!({
                "links": ["b", 7, true, null],
                "n": "2 results",
                "why": "Forbidden command"
            })
        );
    }

    #[test]
    fn test_objects_render_as_json() {
        let rendered = render(&json!("{{search1.result.hits.0}}"), &scope());
        assert_eq!(rendered, json!(r#"{"link":"a"}"#));
    }

    #[test]
    fn test_multiple_placeholders_and_unclosed_braces() {
        let rendered = render(
            &json!("{{search1.ok}}/{{term1.ok}} {{not closed"),
            &scope(),
        );
        assert_eq!(rendered, json!("true/false {{not closed"));
    }

    #[test]
    fn test_template_left_untouched() {
        let template = json!({"q": "{{search1.result.snippet}}"});
        let mut rendered = render(&template, &scope());
        rendered["q"] = json!("mutated");
        assert_eq!(template, json!({"q": "{{search1.result.snippet}}"}));
    }
}

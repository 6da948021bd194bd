//! Template expansion for patch values.
//!
//! Any string may contain `${dotted.path}` placeholders that are resolved
//! against a snapshot of the current schema document. Missing paths render
//! as the empty string. A backslash inhibits expansion: `\${...}` comes
//! out as the literal `${...}`.
//!
//! When the *entire* string is a single placeholder the resolved value is
//! substituted as-is, preserving its JSON type. This is what lets a row
//! payload travel through `value: "${state.params.temp_rowData}"` without
//! being flattened to a string.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::path;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\\?)\$\{([^}]*)\}").expect("placeholder regex"))
}

fn whole_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\{([^}]*)\}$").expect("whole placeholder regex"))
}

/// Render a resolved value into string form for in-string substitution.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Expand placeholders inside one string against `snapshot`.
///
/// Returns a non-string `Value` only for the whole-placeholder case.
pub fn expand_str(snapshot: &Value, input: &str) -> Value {
    if let Some(caps) = whole_placeholder_re().captures(input) {
        let p = &caps[1];
        return path::get(snapshot, p).cloned().unwrap_or(Value::String(String::new()));
    }

    let expanded = placeholder_re().replace_all(input, |caps: &regex::Captures| {
        if !caps[1].is_empty() {
            // Escaped: drop the backslash, keep the placeholder text.
            format!("${{{}}}", &caps[2])
        } else {
            path::get(snapshot, &caps[2]).map(stringify).unwrap_or_default()
        }
    });
    Value::String(expanded.into_owned())
}

/// Recursively expand placeholders in any JSON value.
pub fn expand_value(snapshot: &Value, value: &Value) -> Value {
    match value {
        Value::String(s) => expand_str(snapshot, s),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| expand_value(snapshot, v)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand_value(snapshot, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> Value {
        json!({
            "state": {
                "params": {
                    "name": "Ann",
                    "next_id": 2,
                    "temp_rowData": {"id": 2, "name": "Bob"},
                    "flag": true
                },
                "runtime": {}
            }
        })
    }

    #[test]
    fn interpolates_into_strings() {
        let v = expand_str(&snapshot(), "hello ${state.params.name}!");
        assert_eq!(v, json!("hello Ann!"));
    }

    #[test]
    fn numbers_and_bools_render_inline() {
        let v = expand_str(&snapshot(), "id=${state.params.next_id} f=${state.params.flag}");
        assert_eq!(v, json!("id=2 f=true"));
    }

    #[test]
    fn missing_paths_render_empty() {
        let v = expand_str(&snapshot(), "[${state.params.nope}]");
        assert_eq!(v, json!("[]"));
    }

    #[test]
    fn whole_placeholder_preserves_type_and_shape() {
        let v = expand_str(&snapshot(), "${state.params.temp_rowData}");
        assert_eq!(v, json!({"id": 2, "name": "Bob"}));

        let v = expand_str(&snapshot(), "${state.params.next_id}");
        assert_eq!(v, json!(2));
    }

    #[test]
    fn whole_placeholder_missing_is_empty_string() {
        let v = expand_str(&snapshot(), "${state.params.nope}");
        assert_eq!(v, json!(""));
    }

    #[test]
    fn backslash_escapes_expansion() {
        let v = expand_str(&snapshot(), r"literal \${state.params.name}");
        assert_eq!(v, json!("literal ${state.params.name}"));
    }

    #[test]
    fn recurses_through_records_and_lists() {
        let input = json!({
            "id": "${state.params.next_id}",
            "tags": ["${state.params.name}", "fixed"],
            "n": 7
        });
        let v = expand_value(&snapshot(), &input);
        assert_eq!(v, json!({"id": 2, "tags": ["Ann", "fixed"], "n": 7}));
    }
}

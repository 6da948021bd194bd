//! Completion-criteria evaluation for `validate_completion`.
//!
//! An agent asserts what the UI should look like after its work; each
//! criterion is checked against the current schema document and the call
//! reports a pass ratio plus per-criterion detail and recommendations.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::path;
use crate::schema::UiSchema;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criterion {
    FieldExists {
        path: String,
        #[serde(default)]
        description: Option<String>,
    },
    FieldValue {
        path: String,
        value: Value,
        #[serde(default)]
        description: Option<String>,
    },
    BlockCount {
        count: usize,
        #[serde(default)]
        description: Option<String>,
    },
    ActionExists {
        path: String,
        #[serde(default)]
        description: Option<String>,
    },
    Custom {
        condition: String,
        #[serde(default)]
        description: Option<String>,
    },
}

struct Checked {
    label: String,
    passed: bool,
    detail: String,
}

/// Evaluate `criteria` against `schema`, returning the structured
/// `{evaluation, summary, recommendations}` body.
pub fn evaluate(schema: &UiSchema, intent: &str, criteria: &[Criterion]) -> Value {
    let doc = schema.to_doc();
    let results: Vec<Checked> = criteria.iter().map(|c| check(schema, &doc, c)).collect();

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let ratio = if total == 0 {
        1.0
    } else {
        passed as f64 / total as f64
    };

    let detailed: Vec<Value> = results
        .iter()
        .map(|r| {
            json!({
                "criterion": r.label,
                "passed": r.passed,
                "detail": r.detail,
            })
        })
        .collect();

    let recommendations: Vec<String> = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("unmet: {} ({})", r.label, r.detail))
        .collect();

    let summary = if passed == total {
        format!("all {total} criteria passed for intent '{intent}'")
    } else {
        format!("{passed}/{total} criteria passed for intent '{intent}'")
    };

    json!({
        "evaluation": {
            "passed": passed,
            "total": total,
            "ratio": ratio,
            "detailed": detailed,
        },
        "summary": summary,
        "recommendations": recommendations,
    })
}

fn check(schema: &UiSchema, doc: &Value, criterion: &Criterion) -> Checked {
    match criterion {
        Criterion::FieldExists { path, description } => {
            let found = matches!(path::get(doc, path), Some(v) if !v.is_null());
            Checked {
                label: description.clone().unwrap_or_else(|| format!("field_exists({path})")),
                passed: found,
                detail: if found {
                    format!("'{path}' resolves")
                } else {
                    format!("'{path}' does not resolve")
                },
            }
        }
        Criterion::FieldValue {
            path,
            value,
            description,
        } => {
            let actual = path::get(doc, path);
            let passed = actual.map(|a| values_match(a, value)).unwrap_or(false);
            Checked {
                label: description
                    .clone()
                    .unwrap_or_else(|| format!("field_value({path})")),
                passed,
                detail: format!("expected {value}, found {}", actual.unwrap_or(&Value::Null)),
            }
        }
        Criterion::BlockCount { count, description } => {
            let actual = schema.blocks.len();
            Checked {
                label: description
                    .clone()
                    .unwrap_or_else(|| format!("block_count({count})")),
                passed: actual == *count,
                detail: format!("expected {count} blocks, found {actual}"),
            }
        }
        Criterion::ActionExists { path, description } => {
            let found = action_exists(schema, doc, path);
            Checked {
                label: description
                    .clone()
                    .unwrap_or_else(|| format!("action_exists({path})")),
                passed: found,
                detail: if found {
                    format!("action '{path}' present")
                } else {
                    format!("action '{path}' missing")
                },
            }
        }
        Criterion::Custom {
            condition,
            description,
        } => {
            let (passed, detail) = check_custom(schema, doc, condition);
            Checked {
                label: description.clone().unwrap_or_else(|| condition.clone()),
                passed,
                detail,
            }
        }
    }
}

/// An `action_exists` target may be a dotted path or a bare action id.
fn action_exists(schema: &UiSchema, doc: &Value, target: &str) -> bool {
    if target.contains('.') {
        return path::get(doc, target).is_some();
    }
    schema.actions.iter().any(|a| a.id == target)
        || schema
            .blocks
            .iter()
            .any(|b| b.find_action(target).is_some())
}

/// The small prefix DSL accepted by `custom` criteria:
/// `has_field:PATH`, `field_value:PATH:STR`, `count_blocks:N`,
/// `has_action:ID`.
fn check_custom(schema: &UiSchema, doc: &Value, condition: &str) -> (bool, String) {
    if let Some(p) = condition.strip_prefix("has_field:") {
        let found = path::get(doc, p).is_some();
        return (found, format!("has_field '{p}': {found}"));
    }
    if let Some(rest) = condition.strip_prefix("field_value:") {
        let Some((p, expected)) = rest.split_once(':') else {
            return (false, "field_value needs PATH:STR".into());
        };
        let actual = path::get(doc, p);
        let passed = actual
            .map(|a| values_match(a, &Value::String(expected.to_string())))
            .unwrap_or(false);
        return (
            passed,
            format!("expected '{expected}', found {}", actual.unwrap_or(&Value::Null)),
        );
    }
    if let Some(n) = condition.strip_prefix("count_blocks:") {
        let Ok(expected) = n.trim().parse::<usize>() else {
            return (false, format!("bad block count '{n}'"));
        };
        let actual = schema.blocks.len();
        return (actual == expected, format!("expected {expected}, found {actual}"));
    }
    if let Some(id) = condition.strip_prefix("has_action:") {
        let found = action_exists(schema, doc, id);
        return (found, format!("has_action '{id}': {found}"));
    }
    (false, format!("unknown condition '{condition}'"))
}

/// Comparison with string coercion, matching list-predicate semantics.
fn values_match(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    let coerce = |v: &Value| match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    coerce(actual) == coerce(expected)
}

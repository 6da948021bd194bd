//! Patch application.
//!
//! The engine works on the schema's document form (`UiSchema::to_doc`).
//! Each patch mutates the document and the result is revalidated into the
//! typed model before it becomes visible; a patch whose result fails
//! variant validation is rolled back and skipped. Batches are not atomic:
//! later patches see the mutations of earlier ones, and a failing patch
//! never stops the rest of the batch.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PatchError;
use crate::path;
use crate::schema::UiSchema;
use crate::template;

use super::{PatchOp, SchemaPatch};

/// Result of applying one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Patches that took effect, with templates already expanded. These
    /// are what goes to history and out to subscribers.
    pub applied: Vec<SchemaPatch>,
    /// Patches that were dropped, with the reason.
    pub skipped: Vec<(SchemaPatch, PatchError)>,
    /// True when any applied patch was structural, in which case the
    /// delivery layer must ship a full `schema_update`.
    pub structural: bool,
}

impl BatchOutcome {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Apply `patches` to `schema` in input order.
pub fn apply_batch(schema: &mut UiSchema, patches: &[SchemaPatch]) -> BatchOutcome {
    let mut doc = schema.to_doc();
    let mut outcome = BatchOutcome::default();

    for patch in patches {
        let before = doc.clone();
        let result = apply_one(&mut doc, &before, patch);
        match result {
            Ok(applied) => match UiSchema::from_doc(doc.clone()) {
                Ok(next) => {
                    *schema = next;
                    // Re-serialize so later patches in the batch see the
                    // normalized document (defaults filled in).
                    doc = schema.to_doc();
                    outcome.structural |= applied.is_structural();
                    debug!(op = ?applied.op, path = %applied.path, "patch applied");
                    outcome.applied.push(applied);
                }
                Err(e) => {
                    warn!(op = ?patch.op, path = %patch.path, error = %e, "patch dropped: shape");
                    doc = before;
                    outcome
                        .skipped
                        .push((patch.clone(), PatchError::shape(&patch.path, e.to_string())));
                }
            },
            Err(e) => {
                warn!(op = ?patch.op, path = %patch.path, error = %e, "patch dropped");
                doc = before;
                outcome.skipped.push((patch.clone(), e));
            }
        }
    }
    outcome
}

/// Apply a single patch to the working document. `snapshot` is the
/// pre-patch document that templates are expanded against.
fn apply_one(
    doc: &mut Value,
    snapshot: &Value,
    patch: &SchemaPatch,
) -> Result<SchemaPatch, PatchError> {
    match patch.op {
        PatchOp::Set => apply_set(doc, patch),
        PatchOp::Add => apply_add(doc, patch),
        PatchOp::Remove => apply_remove(doc, patch),
        PatchOp::AppendToList => apply_insert(doc, snapshot, patch, true),
        PatchOp::PrependToList => apply_insert(doc, snapshot, patch, false),
        PatchOp::UpdateListItem => apply_update_list_item(doc, snapshot, patch),
        PatchOp::RemoveFromList => apply_remove_from_list(doc, snapshot, patch),
        PatchOp::RemoveLast => apply_remove_last(doc, patch),
        PatchOp::Merge => apply_merge(doc, snapshot, patch),
        PatchOp::Increment => apply_delta(doc, patch, 1),
        PatchOp::Decrement => apply_delta(doc, patch, -1),
        PatchOp::Toggle => apply_toggle(doc, patch),
        PatchOp::ClearAllParams => apply_clear_all_params(doc, patch),
        PatchOp::FilterList => apply_filter_list(doc, snapshot, patch),
    }
}

// ============================================================================
// set / add / remove
// ============================================================================

fn apply_set(doc: &mut Value, patch: &SchemaPatch) -> Result<SchemaPatch, PatchError> {
    let segs = path::segments(&patch.path);
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    // Replacing one field migrates its key's mirror when the key changes.
    if segs.len() == 5
        && segs[0] == "blocks"
        && is_digits(segs[1])
        && segs[2] == "props"
        && segs[3] == "fields"
        && is_digits(segs[4])
    {
        let old_key = path::get(doc, &format!("{}.key", patch.path))
            .and_then(Value::as_str)
            .map(str::to_string);
        let new_key = patch
            .value
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string);
        path::set(doc, &patch.path, patch.value.clone())?;
        if let (Some(old), Some(new)) = (old_key, new_key) {
            migrate_param_key(doc, &old, &new)?;
        }
        return Ok(patch.clone());
    }

    // Renaming a field key in place: same migration.
    if segs.len() == 6
        && segs[0] == "blocks"
        && is_digits(segs[1])
        && segs[2] == "props"
        && segs[3] == "fields"
        && is_digits(segs[4])
        && segs[5] == "key"
    {
        let old_key = path::get(doc, &patch.path)
            .and_then(Value::as_str)
            .map(str::to_string);
        let new_key = patch.value.as_str().map(str::to_string);
        path::set(doc, &patch.path, patch.value.clone())?;
        if let (Some(old), Some(new)) = (old_key, new_key) {
            migrate_param_key(doc, &old, &new)?;
        }
        return Ok(patch.clone());
    }

    // Any other write under `blocks` can change the field-key population
    // (a whole block, its props, a fields list, or the blocks array
    // itself). Diff the keys mentioned before and after: keys no block
    // mentions anymore lose their mirror, new keys get one initialized
    // to "".
    if segs.first() == Some(&"blocks") {
        let before = all_field_keys(doc);
        path::set(doc, &patch.path, patch.value.clone())?;
        let after = all_field_keys(doc);
        let params = params_mut(doc)?;
        for k in &before {
            if !after.contains(k) {
                params.remove(k);
            }
        }
        for k in &after {
            if !params.contains_key(k) {
                params.insert(k.clone(), Value::String(String::new()));
            }
        }
        return Ok(patch.clone());
    }

    path::set(doc, &patch.path, patch.value.clone())?;
    Ok(patch.clone())
}

fn apply_add(doc: &mut Value, patch: &SchemaPatch) -> Result<SchemaPatch, PatchError> {
    enum Target {
        List,
        Empty,
        Missing,
        Other(&'static str),
    }
    let target = match path::get(doc, &patch.path) {
        Some(Value::Array(_)) => Target::List,
        Some(Value::Null) => Target::Empty,
        Some(other) => Target::Other(path::json_kind(other)),
        None => Target::Missing,
    };
    match target {
        Target::List => {
            if let Some(Value::Array(items)) = path::get_mut(doc, &patch.path) {
                items.push(patch.value.clone());
            }
        }
        Target::Empty => {
            // An empty optional sequence (`props.fields` never set).
            path::set_with(doc, &patch.path, Value::Array(vec![patch.value.clone()]), true)?;
        }
        Target::Missing => {
            // Create the subtree.
            path::set_with(doc, &patch.path, patch.value.clone(), true)?;
        }
        Target::Other(kind) => {
            return Err(PatchError::addressing(
                &patch.path,
                format!("cannot add to {kind}"),
            ));
        }
    }

    // Mirror initialization for structural adds.
    if patch.path.ends_with("props.fields") {
        init_field_mirrors(doc, std::slice::from_ref(&patch.value))?;
    } else if patch.path == "blocks" {
        if let Some(fields) = patch.value.pointer("/props/fields").and_then(Value::as_array) {
            init_field_mirrors(doc, fields)?;
        }
    }
    Ok(patch.clone())
}

fn apply_remove(doc: &mut Value, patch: &SchemaPatch) -> Result<SchemaPatch, PatchError> {
    let (key, needle) = predicate_parts(&patch.path, &patch.value)?;
    let Some(Value::Array(items)) = path::get_mut(doc, &patch.path) else {
        return Err(PatchError::addressing(&patch.path, "target is not a list"));
    };

    let mut removed = Vec::new();
    items.retain(|item| {
        let matched = item.get(&key).map(|v| loose_eq(v, &needle)).unwrap_or(false);
        if matched {
            removed.push(item.clone());
        }
        !matched
    });

    if patch.path.ends_with("props.fields") {
        drop_field_mirrors(doc, &removed)?;
    } else if patch.path == "blocks" {
        for block in &removed {
            if let Some(fields) = block.pointer("/props/fields").and_then(Value::as_array) {
                let fields = fields.clone();
                drop_field_mirrors(doc, &fields)?;
            }
        }
    }
    Ok(patch.clone())
}

// ============================================================================
// list operations
// ============================================================================

fn apply_insert(
    doc: &mut Value,
    snapshot: &Value,
    patch: &SchemaPatch,
    append: bool,
) -> Result<SchemaPatch, PatchError> {
    let expanded = template::expand_value(snapshot, &patch.value);
    let items = extract_items(&expanded);
    let list = list_at(doc, &patch.path)?;
    if append {
        list.extend(items);
    } else {
        for (i, item) in items.into_iter().enumerate() {
            list.insert(i, item);
        }
    }
    Ok(SchemaPatch::new(patch.op, &patch.path, expanded))
}

fn apply_update_list_item(
    doc: &mut Value,
    snapshot: &Value,
    patch: &SchemaPatch,
) -> Result<SchemaPatch, PatchError> {
    let expanded = template::expand_value(snapshot, &patch.value);
    let (key, needle) = predicate_parts(&patch.path, &expanded)?;
    let updates = expanded
        .get("updates")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| PatchError::shape(&patch.path, "'updates' must be a record"))?;

    let list = list_at(doc, &patch.path)?;
    for item in list.iter_mut() {
        let matched = item.get(&key).map(|v| loose_eq(v, &needle)).unwrap_or(false);
        if matched {
            if let Some(obj) = item.as_object_mut() {
                for (k, v) in &updates {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }
    }
    Ok(SchemaPatch::new(patch.op, &patch.path, expanded))
}

fn apply_remove_from_list(
    doc: &mut Value,
    snapshot: &Value,
    patch: &SchemaPatch,
) -> Result<SchemaPatch, PatchError> {
    let expanded = template::expand_value(snapshot, &patch.value);
    let (key, needle) = predicate_parts(&patch.path, &expanded)?;
    let remove_all = expanded.get("index").and_then(Value::as_i64) == Some(-1);

    let list = list_at(doc, &patch.path)?;
    if remove_all {
        list.retain(|item| {
            !item.get(&key).map(|v| loose_eq(v, &needle)).unwrap_or(false)
        });
    } else if let Some(pos) = list
        .iter()
        .position(|item| item.get(&key).map(|v| loose_eq(v, &needle)).unwrap_or(false))
    {
        list.remove(pos);
    }
    Ok(SchemaPatch::new(patch.op, &patch.path, expanded))
}

fn apply_remove_last(doc: &mut Value, patch: &SchemaPatch) -> Result<SchemaPatch, PatchError> {
    let list = list_at(doc, &patch.path)?;
    list.pop();
    Ok(patch.clone())
}

fn apply_filter_list(
    doc: &mut Value,
    snapshot: &Value,
    patch: &SchemaPatch,
) -> Result<SchemaPatch, PatchError> {
    let expanded = template::expand_value(snapshot, &patch.value);
    let key = expanded
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| PatchError::shape(&patch.path, "filter predicate needs 'key'"))?
        .to_string();
    let operator = expanded
        .get("operator")
        .and_then(Value::as_str)
        .unwrap_or("==")
        .to_string();
    let needle = expanded.get("value").cloned().unwrap_or(Value::Null);

    let list = list_at(doc, &patch.path)?;
    // Keep the complement: items matching the predicate are removed.
    list.retain(|item| !predicate_matches(item, &key, &operator, &needle));
    Ok(SchemaPatch::new(patch.op, &patch.path, expanded))
}

// ============================================================================
// scalar / record operations
// ============================================================================

fn apply_delta(doc: &mut Value, patch: &SchemaPatch, sign: i64) -> Result<SchemaPatch, PatchError> {
    let current = path::get(doc, &patch.path).map(to_integer).unwrap_or(0);
    let delta = match &patch.value {
        Value::Null => 1,
        other => to_integer(other),
    };
    path::set(doc, &patch.path, Value::from(current + sign * delta))?;
    Ok(patch.clone())
}

fn apply_toggle(doc: &mut Value, patch: &SchemaPatch) -> Result<SchemaPatch, PatchError> {
    let current = path::get(doc, &patch.path)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    path::set(doc, &patch.path, Value::Bool(!current))?;
    Ok(patch.clone())
}

fn apply_merge(
    doc: &mut Value,
    snapshot: &Value,
    patch: &SchemaPatch,
) -> Result<SchemaPatch, PatchError> {
    let expanded = template::expand_value(snapshot, &patch.value);
    let incoming = expanded
        .as_object()
        .ok_or_else(|| PatchError::shape(&patch.path, "merge value must be a record"))?
        .clone();

    let missing = matches!(path::get(doc, &patch.path), None | Some(Value::Null));
    if missing {
        if path::allows_create(&patch.path) {
            path::set(doc, &patch.path, Value::Object(Map::new()))?;
        } else {
            return Err(PatchError::addressing(&patch.path, "target does not resolve"));
        }
    }
    let target = path::get_mut(doc, &patch.path)
        .ok_or_else(|| PatchError::addressing(&patch.path, "target does not resolve"))?;
    match target {
        Value::Object(map) => {
            for (k, v) in incoming {
                map.insert(k, v);
            }
            Ok(SchemaPatch::new(patch.op, &patch.path, expanded))
        }
        other => {
            let kind = path::json_kind(other);
            Err(PatchError::addressing(
                &patch.path,
                format!("cannot merge into {kind}"),
            ))
        }
    }
}

fn apply_clear_all_params(doc: &mut Value, patch: &SchemaPatch) -> Result<SchemaPatch, PatchError> {
    let params = params_mut(doc)?;
    for (_, v) in params.iter_mut() {
        *v = Value::String(String::new());
    }
    Ok(patch.clone())
}

// ============================================================================
// helpers
// ============================================================================

/// Resolve the list a list-op targets. A missing or null target under a
/// state bag is created as an empty list; anywhere else it is an error.
fn list_at<'a>(doc: &'a mut Value, p: &str) -> Result<&'a mut Vec<Value>, PatchError> {
    let needs_create = matches!(path::get(doc, p), None | Some(Value::Null));
    if needs_create {
        if path::allows_create(p) {
            path::set(doc, p, Value::Array(Vec::new()))?;
        } else {
            return Err(PatchError::addressing(p, "target list does not resolve"));
        }
    }
    match path::get_mut(doc, p) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => {
            let kind = path::json_kind(other);
            Err(PatchError::addressing(p, format!("target is {kind}, not a list")))
        }
        None => Err(PatchError::addressing(p, "target list does not resolve")),
    }
}

/// Accept both payload shapes: `{items: [...]}`, a bare list, or a single
/// item (wrapped). New integrations should prefer the explicit `items`
/// list.
fn extract_items(value: &Value) -> Vec<Value> {
    if let Some(items) = value.get("items").and_then(Value::as_array) {
        return items.clone();
    }
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn predicate_parts(p: &str, value: &Value) -> Result<(String, Value), PatchError> {
    let key = value
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| PatchError::shape(p, "predicate needs a 'key'"))?
        .to_string();
    let needle = value.get("value").cloned().unwrap_or(Value::Null);
    Ok((key, needle))
}

/// Equality with string coercion on both sides, so template-produced
/// strings match numeric ids.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match_string(a) == match_string(b)
}

fn match_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn predicate_matches(item: &Value, key: &str, operator: &str, needle: &Value) -> bool {
    let Some(actual) = item.get(key) else {
        return false;
    };
    match operator {
        "==" => loose_eq(actual, needle),
        "!=" => !loose_eq(actual, needle),
        "<" | "<=" | ">" | ">=" => {
            let (Some(a), Some(b)) = (to_number(actual), to_number(needle)) else {
                return false;
            };
            match operator {
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            }
        }
        _ => false,
    }
}

fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn to_integer(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => *b as i64,
        _ => 0,
    }
}

fn params_mut(doc: &mut Value) -> Result<&mut Map<String, Value>, PatchError> {
    doc.pointer_mut("/state/params")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| PatchError::addressing("state.params", "state bag missing"))
}

fn collect_keys(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|f| f.get("key").and_then(Value::as_str).map(str::to_string))
        .collect()
}

/// Every field key mentioned by any block in the document.
fn all_field_keys(doc: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(blocks) = doc.get("blocks").and_then(Value::as_array) {
        for block in blocks {
            if let Some(fields) = block.pointer("/props/fields").and_then(Value::as_array) {
                keys.extend(collect_keys(fields));
            }
        }
    }
    keys
}

fn init_field_mirrors(doc: &mut Value, fields: &[Value]) -> Result<(), PatchError> {
    let keys = collect_keys(fields);
    let params = params_mut(doc)?;
    for k in keys {
        if !params.contains_key(&k) {
            params.insert(k, Value::String(String::new()));
        }
    }
    Ok(())
}

/// Drop the mirrors of removed fields, keeping any key some surviving
/// block still mentions.
fn drop_field_mirrors(doc: &mut Value, fields: &[Value]) -> Result<(), PatchError> {
    let keys = collect_keys(fields);
    let survivors = all_field_keys(doc);
    let params = params_mut(doc)?;
    for k in keys {
        if !survivors.contains(&k) {
            params.remove(&k);
        }
    }
    Ok(())
}

fn migrate_param_key(doc: &mut Value, old: &str, new: &str) -> Result<(), PatchError> {
    if old == new {
        return Ok(());
    }
    let params = params_mut(doc)?;
    let carried = params.remove(old);
    let value = carried.unwrap_or(Value::String(String::new()));
    params.entry(new.to_string()).or_insert(value);
    Ok(())
}

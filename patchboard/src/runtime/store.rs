//! Instance store: the registry of named schema instances.

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::error::RuntimeError;
use crate::patch::{self, SchemaPatch};
use crate::schema::UiSchema;

/// Sentinel instance id that turns a patch call into instance creation.
pub const CREATE_SENTINEL: &str = "__CREATE__";
/// Sentinel instance id that turns a patch call into instance deletion.
pub const DELETE_SENTINEL: &str = "__DELETE__";

/// A mapping from instance identity to its authoritative schema.
#[derive(Debug, Default)]
pub struct InstanceStore {
    instances: HashMap<String, UiSchema>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&UiSchema> {
        self.instances.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut UiSchema> {
        self.instances.get_mut(id)
    }

    /// Upsert.
    pub fn set(&mut self, id: impl Into<String>, schema: UiSchema) {
        self.instances.insert(id.into(), schema);
    }

    pub fn delete(&mut self, id: &str) -> Option<UiSchema> {
        self.instances.remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Id plus summary for every instance, for the listing surfaces.
    pub fn summaries(&self) -> Vec<Value> {
        self.ids()
            .into_iter()
            .filter_map(|id| {
                self.instances.get(&id).map(|s| {
                    serde_json::json!({
                        "instance_id": id,
                        "page_key": s.page_key,
                        "blocks_count": s.blocks.len(),
                        "actions_count": s.actions.len(),
                    })
                })
            })
            .collect()
    }

    /// Materialize a new instance from an initial patch series.
    ///
    /// The caller's `set` patches for meta/state/blocks/actions run through
    /// the regular patch engine against a blank schema, so creation obeys
    /// the same invariants as any later mutation.
    pub fn create(
        &mut self,
        id: impl Into<String>,
        patches: &[SchemaPatch],
    ) -> Result<usize, RuntimeError> {
        let id = id.into();
        let mut schema = UiSchema::new(id.clone());
        let outcome = patch::apply_batch(&mut schema, patches);
        info!(
            instance = %id,
            applied = outcome.applied_count(),
            skipped = outcome.skipped.len(),
            "instance created"
        );
        let applied = outcome.applied_count();
        self.instances.insert(id, schema);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchOp;
    use serde_json::json;

    #[test]
    fn create_materializes_via_the_engine() {
        let mut store = InstanceStore::new();
        let applied = store
            .create(
                "users",
                &[
                    SchemaPatch::set("page_key", json!("users")),
                    SchemaPatch::new(
                        PatchOp::Add,
                        "blocks",
                        json!({"id": "form", "props": {"fields": [
                            {"type": "text", "key": "name", "label": "Name"}
                        ]}}),
                    ),
                ],
            )
            .unwrap();
        assert_eq!(applied, 2);
        let s = store.get("users").unwrap();
        assert_eq!(s.page_key, "users");
        assert_eq!(s.blocks.len(), 1);
        // Mirror initialized by the engine during creation.
        assert_eq!(s.state.params["name"], json!(""));
    }

    #[test]
    fn summaries_are_sorted_and_shaped() {
        let mut store = InstanceStore::new();
        store.set("b", UiSchema::new("beta"));
        store.set("a", UiSchema::new("alpha"));
        let sums = store.summaries();
        assert_eq!(sums[0]["instance_id"], json!("a"));
        assert_eq!(sums[0]["page_key"], json!("alpha"));
        assert_eq!(sums[1]["blocks_count"], json!(0));
    }

    #[test]
    fn delete_removes() {
        let mut store = InstanceStore::new();
        store.set("x", UiSchema::new("x"));
        assert!(store.exists("x"));
        store.delete("x");
        assert!(!store.exists("x"));
    }
}

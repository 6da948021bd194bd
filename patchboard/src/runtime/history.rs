//! Per-instance append-only patch history.
//!
//! Every successfully applied patch is recorded with a per-instance
//! monotonic id and a timestamp. Records hold the outgoing patch
//! dictionary as applied (templates already expanded), so replay is
//! deterministic modulo re-expansion against the then-current state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::patch::SchemaPatch;

#[derive(Debug, Clone, Serialize)]
pub struct PatchRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub patch: SchemaPatch,
}

#[derive(Debug, Default)]
pub struct PatchHistory {
    records: HashMap<String, Vec<PatchRecord>>,
    counters: HashMap<String, u64>,
}

impl PatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one applied patch, returning its id.
    pub fn save(&mut self, instance: &str, patch: SchemaPatch) -> u64 {
        let counter = self.counters.entry(instance.to_string()).or_insert(0);
        *counter += 1;
        let id = *counter;
        self.records
            .entry(instance.to_string())
            .or_default()
            .push(PatchRecord {
                id,
                timestamp: Utc::now(),
                patch,
            });
        id
    }

    pub fn get_all(&self, instance: &str) -> &[PatchRecord] {
        self.records.get(instance).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_by_id(&self, instance: &str, id: u64) -> Option<&PatchRecord> {
        self.records
            .get(instance)
            .and_then(|rs| rs.iter().find(|r| r.id == id))
    }

    pub fn count(&self, instance: &str) -> usize {
        self.records.get(instance).map(Vec::len).unwrap_or(0)
    }

    pub fn clear(&mut self, instance: &str) {
        self.records.remove(instance);
        self.counters.remove(instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_monotonic_per_instance() {
        let mut h = PatchHistory::new();
        assert_eq!(h.save("a", SchemaPatch::set("state.params.x", json!(1))), 1);
        assert_eq!(h.save("a", SchemaPatch::set("state.params.x", json!(2))), 2);
        assert_eq!(h.save("b", SchemaPatch::set("state.params.x", json!(1))), 1);
        assert_eq!(h.count("a"), 2);
        assert_eq!(h.count("b"), 1);
        assert_eq!(h.count("missing"), 0);
    }

    #[test]
    fn lookup_by_id_for_replay() {
        let mut h = PatchHistory::new();
        h.save("a", SchemaPatch::set("state.params.x", json!(1)));
        let id = h.save("a", SchemaPatch::set("state.params.y", json!(2)));
        let rec = h.get_by_id("a", id).unwrap();
        assert_eq!(rec.patch.path, "state.params.y");
        assert!(h.get_by_id("a", 99).is_none());
    }

    #[test]
    fn clear_resets_the_counter() {
        let mut h = PatchHistory::new();
        h.save("a", SchemaPatch::set("state.params.x", json!(1)));
        h.clear("a");
        assert_eq!(h.count("a"), 0);
        assert_eq!(h.save("a", SchemaPatch::set("state.params.x", json!(1))), 1);
    }
}

//! The process-wide runtime: instance store, history, connections.
//!
//! All mutation funnels through one `Runtime` behind a `tokio` RwLock
//! (see [`SharedRuntime`]). Patch application never awaits while the
//! write guard is held, so for a given instance patches serialize in
//! lock-acquisition order and subscribers observe them in the order the
//! server applied them.

mod connections;
mod delivery;
mod history;
mod store;

pub use connections::ConnectionRegistry;
pub use delivery::OutboundMessage;
pub use history::{PatchHistory, PatchRecord};
pub use store::{InstanceStore, CREATE_SENTINEL, DELETE_SENTINEL};

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::patch::{self, SchemaPatch};
use crate::schema::UiSchema;

pub type SharedRuntime = Arc<RwLock<Runtime>>;

pub fn shared(runtime: Runtime) -> SharedRuntime {
    Arc::new(RwLock::new(runtime))
}

/// Result of one modifying call against an instance.
#[derive(Debug)]
pub struct ApplyReport {
    /// `(history id, applied patch)` pairs, in application order.
    pub applied: Vec<(u64, SchemaPatch)>,
    pub skipped: usize,
    pub structural: bool,
}

impl ApplyReport {
    pub fn patches_applied(&self) -> usize {
        self.applied.len()
    }
}

#[derive(Debug)]
pub struct Runtime {
    pub store: InstanceStore,
    pub history: PatchHistory,
    pub connections: ConnectionRegistry,
    active_instance: String,
}

impl Runtime {
    pub fn new(default_instance: impl Into<String>) -> Self {
        Self {
            store: InstanceStore::new(),
            history: PatchHistory::new(),
            connections: ConnectionRegistry::new(),
            active_instance: default_instance.into(),
        }
    }

    pub fn active_instance(&self) -> &str {
        &self.active_instance
    }

    /// The instance an unqualified agent call addresses.
    pub fn resolve_instance<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.active_instance)
    }

    pub fn schema(&self, instance: &str) -> Result<&UiSchema, RuntimeError> {
        self.store.get(instance).ok_or_else(|| RuntimeError::UnknownInstance {
            instance: instance.to_string(),
        })
    }

    /// Apply a batch to an instance, record history, and fan the result
    /// out to its subscribers. This is the single write path shared by
    /// the HTTP surface, the agent tools and the event pipeline.
    pub fn apply_and_deliver(
        &mut self,
        instance: &str,
        patches: &[SchemaPatch],
    ) -> Result<ApplyReport, RuntimeError> {
        let schema = self
            .store
            .get_mut(instance)
            .ok_or_else(|| RuntimeError::UnknownInstance {
                instance: instance.to_string(),
            })?;

        let outcome = patch::apply_batch(schema, patches);
        let snapshot = outcome.structural.then(|| schema.to_doc());

        let mut applied = Vec::with_capacity(outcome.applied.len());
        for p in outcome.applied {
            let id = self.history.save(instance, p.clone());
            applied.push((id, p));
        }

        // Structural edits cannot be expressed as flat dotted-path writes
        // on the client; ship the whole schema once instead.
        if let Some(doc) = snapshot {
            self.connections
                .send_to_instance(instance, &OutboundMessage::schema_update(instance, doc));
        } else {
            for (id, p) in &applied {
                self.connections.send_to_instance(
                    instance,
                    &OutboundMessage::patch(instance, Some(*id), p.clone()),
                );
            }
        }

        Ok(ApplyReport {
            applied,
            skipped: outcome.skipped.len(),
            structural: outcome.structural,
        })
    }

    /// The uniform modifying entry point, including the `__CREATE__` /
    /// `__DELETE__` sentinel modes of the patch endpoint.
    pub fn patch_entry(
        &mut self,
        instance_id: &str,
        patches: &[SchemaPatch],
        new_instance_id: Option<&str>,
        target_instance_id: Option<&str>,
    ) -> Result<PatchCallResult, RuntimeError> {
        match instance_id {
            CREATE_SENTINEL => {
                let new_id = new_instance_id.ok_or_else(|| {
                    RuntimeError::InvalidRequest("__CREATE__ requires new_instance_id".into())
                })?;
                let applied = self.store.create(new_id, patches)?;
                // A reconnecting browser may already be subscribed.
                if let Ok(schema) = self.schema(new_id) {
                    let doc = schema.to_doc();
                    self.connections
                        .send_to_instance(new_id, &OutboundMessage::schema_update(new_id, doc));
                }
                Ok(PatchCallResult::Created {
                    instance_id: new_id.to_string(),
                    patches_applied: applied,
                })
            }
            DELETE_SENTINEL => {
                let target = target_instance_id.ok_or_else(|| {
                    RuntimeError::InvalidRequest("__DELETE__ requires target_instance_id".into())
                })?;
                if self.store.delete(target).is_none() {
                    return Err(RuntimeError::UnknownInstance {
                        instance: target.to_string(),
                    });
                }
                self.history.clear(target);
                info!(instance = %target, "instance deleted");
                Ok(PatchCallResult::Deleted {
                    instance_id: target.to_string(),
                })
            }
            _ => {
                let report = self.apply_and_deliver(instance_id, patches)?;
                Ok(PatchCallResult::Patched {
                    instance_id: instance_id.to_string(),
                    report,
                })
            }
        }
    }

    /// Mark `instance` active and tell every subscriber, on every
    /// instance, to switch to it.
    pub fn access(&mut self, instance: &str) -> Result<Value, RuntimeError> {
        let doc = self.schema(instance)?.to_doc();
        self.active_instance = instance.to_string();
        self.connections
            .broadcast(&OutboundMessage::switch_instance(instance, doc.clone()));
        Ok(doc)
    }

    /// Re-apply a recorded patch through the normal pipeline.
    pub fn replay(&mut self, instance: &str, patch_id: u64) -> Result<ApplyReport, RuntimeError> {
        let record = self
            .history
            .get_by_id(instance, patch_id)
            .ok_or_else(|| {
                RuntimeError::InvalidRequest(format!("no patch {patch_id} for '{instance}'"))
            })?
            .patch
            .clone();
        self.apply_and_deliver(instance, &[record])
    }

    /// Register a subscriber and hand back its handle, receiver and the
    /// initial full schema for first sync.
    pub fn subscribe(
        &mut self,
        instance: &str,
    ) -> Result<(Uuid, UnboundedReceiver<OutboundMessage>, Value), RuntimeError> {
        let doc = self.schema(instance)?.to_doc();
        let (id, rx) = self.connections.add(instance);
        Ok((id, rx, doc))
    }

    pub fn unsubscribe(&mut self, instance: &str, id: Uuid) {
        self.connections.remove(instance, id);
    }
}

/// Outcome of [`Runtime::patch_entry`].
#[derive(Debug)]
pub enum PatchCallResult {
    Patched { instance_id: String, report: ApplyReport },
    Created { instance_id: String, patches_applied: usize },
    Deleted { instance_id: String },
}

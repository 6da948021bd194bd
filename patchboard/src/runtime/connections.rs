//! Connection registry and fan-out.
//!
//! Subscribers are opaque handles: a uuid plus an unbounded sender the
//! WebSocket task drains. The registry is indifferent to transport;
//! delivery is best-effort per recipient, and a handle whose channel is
//! gone is pruned on the next send that touches it.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

use super::delivery::OutboundMessage;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_instance: HashMap<String, HashMap<Uuid, UnboundedSender<OutboundMessage>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber for `instance`, returning its handle id
    /// and the receiving end for the transport task to drain.
    pub fn add(&mut self, instance: &str) -> (Uuid, UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.by_instance
            .entry(instance.to_string())
            .or_default()
            .insert(id, tx);
        info!(%instance, handle = %id, "subscriber connected");
        (id, rx)
    }

    /// Drop one subscriber; the instance's entry goes away with its last
    /// handle.
    pub fn remove(&mut self, instance: &str, id: Uuid) {
        if let Some(handles) = self.by_instance.get_mut(instance) {
            handles.remove(&id);
            if handles.is_empty() {
                self.by_instance.remove(instance);
            }
            info!(%instance, handle = %id, "subscriber disconnected");
        }
    }

    pub fn connection_count(&self, instance: &str) -> usize {
        self.by_instance.get(instance).map(HashMap::len).unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.by_instance.values().map(HashMap::len).sum()
    }

    /// Deliver `message` to every subscriber of `instance`. A dead
    /// recipient never blocks a live one; failed handles are pruned
    /// before returning. Returns the number of live deliveries.
    pub fn send_to_instance(&mut self, instance: &str, message: &OutboundMessage) -> usize {
        let Some(handles) = self.by_instance.get_mut(instance) else {
            return 0;
        };
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, tx) in handles.iter() {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in &dead {
            handles.remove(id);
            debug!(%instance, handle = %id, "pruned dead subscriber");
        }
        if handles.is_empty() {
            self.by_instance.remove(instance);
        }
        delivered
    }

    /// Deliver `message` to every subscriber of every instance.
    pub fn broadcast(&mut self, message: &OutboundMessage) -> usize {
        let instances: Vec<String> = self.by_instance.keys().cloned().collect();
        instances
            .iter()
            .map(|i| self.send_to_instance(i, message))
            .sum()
    }
}

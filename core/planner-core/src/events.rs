//! Identity reconciliation events.
//!
//! The authenticate endpoint never reveals the real user id, so the client
//! learns it from the `owner` field of the first resource it creates. A cache
//! that sees such a field publishes [`IdentityEvent::OwnerIdentityObserved`];
//! the identity and session managers subscribe and each correct their own
//! state. No component reaches into another's state directly.
//!
//! Delivery is synchronous: when `publish` returns, every listener has
//! applied the correction.

use std::sync::{Arc, Mutex};

use crate::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// The server attributed a resource to `owner_id`. Treated as more
    /// authoritative than any locally held user id.
    OwnerIdentityObserved { owner_id: String },
}

pub trait IdentityListener: Send + Sync {
    fn on_identity_event(&self, event: &IdentityEvent);
}

#[derive(Default)]
pub struct IdentityEvents {
    listeners: Mutex<Vec<Arc<dyn IdentityListener>>>,
}

impl IdentityEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn IdentityListener>) {
        lock(&self.listeners).push(listener);
    }

    pub fn publish(&self, event: IdentityEvent) {
        // Snapshot so a listener may subscribe/publish without deadlocking.
        let listeners: Vec<_> = lock(&self.listeners).clone();
        tracing::debug!(?event, listeners = listeners.len(), "Publishing identity event");
        for listener in listeners {
            listener.on_identity_event(&event);
        }
    }

    /// Publishes `OwnerIdentityObserved` unless `owner_id` is blank.
    pub fn owner_observed(&self, owner_id: &str) {
        if owner_id.trim().is_empty() {
            return;
        }
        self.publish(IdentityEvent::OwnerIdentityObserved {
            owner_id: owner_id.to_string(),
        });
    }
}

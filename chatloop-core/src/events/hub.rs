//! Fan-out of inbound gateway events to scoped listeners

use crate::models::InboundEvent;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Callback attached to the inbound event stream
#[async_trait]
pub trait Listener: Send + Sync {
    /// Called once per dispatched event. Implementations filter for themselves.
    async fn handle(&self, event: &InboundEvent);
}

type Registry = DashMap<Uuid, Arc<dyn Listener>>;

/// Inbound event stream shared by command handlers.
///
/// The gateway reader calls [`EventHub::dispatch`] for every event; prompts and
/// pagination attach temporary listeners with [`EventHub::subscribe`].
#[derive(Clone, Default)]
pub struct EventHub {
    listeners: Arc<Registry>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener. It stays registered until the returned guard is dropped.
    pub fn subscribe(&self, listener: Arc<dyn Listener>) -> ListenerGuard {
        let id = Uuid::new_v4();
        self.listeners.insert(id, listener);
        tracing::trace!(listener = %id, "listener attached");
        ListenerGuard {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Deliver an event to every attached listener, in registration-independent order.
    ///
    /// Returns the number of listeners that received the event.
    pub async fn dispatch(&self, event: &InboundEvent) -> usize {
        let snapshot: Vec<(Uuid, Arc<dyn Listener>)> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            // Skip listeners detached by an earlier listener of this same event
            if !self.listeners.contains_key(&id) {
                continue;
            }
            listener.handle(event).await;
            delivered += 1;
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Registration handle; detaches its listener on drop.
pub struct ListenerGuard {
    id: Uuid,
    listeners: Arc<Registry>,
}

impl ListenerGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Detach now. Calling this more than once is harmless.
    pub fn detach(&self) {
        if self.listeners.remove(&self.id).is_some() {
            tracing::trace!(listener = %self.id, "listener detached");
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.detach();
    }
}

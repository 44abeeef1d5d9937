//! Inbound event stream

mod hub;

pub use hub::{EventHub, Listener, ListenerGuard};

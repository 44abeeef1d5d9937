//! Blocking gate and its timeout renewer

mod lock;
mod renewer;

pub use lock::{Gate, GateError, GateOpener};
pub use renewer::TimeoutRenewer;

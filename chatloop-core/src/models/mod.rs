//! Data models for chatloop

pub mod configuration;
pub mod message;

pub use configuration::*;
pub use message::*;

//! # Chatloop Core Library
//!
//! Blocking prompts and reaction pagination for chat bots. A command handler asks a
//! user something and suspends until the matching reply, a cancel press or a timeout;
//! or it hands a message over to reaction buttons that drive an index.
//!
//! The messaging network stays outside: inbound events are fed to an
//! [`events::EventHub`], outbound calls go through a [`transport::ChatTransport`].

pub mod events;
pub mod gate;
pub mod interact;
pub mod models;
pub mod services;
pub mod transport;

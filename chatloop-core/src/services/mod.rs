//! Services shared by the bot binary and command handlers

pub mod interaction;
pub mod logging;

pub use interaction::InteractionService;

//! Transport abstraction for outbound chat calls
//!
//! The core never talks to a messaging network itself. Everything it does to a
//! channel (sending the prompt, adding reaction buttons, cleaning up) goes
//! through a [`ChatTransport`], and transport errors are handed back to the
//! caller untouched. Retry and rate-limit policy belong to the transport.

use crate::models::{ChannelId, Emoji, Message, OutgoingMessage, UserId};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

mod memory;
mod rate_limit;

pub use memory::{CallKind, MemoryTransport, TransportCall};
pub use rate_limit::RateLimitedTransport;

/// Error raised by a transport implementation
pub type TransportError = Box<dyn Error + Send + Sync>;

/// Outbound operations the prompt and pagination controllers rely on
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &str;

    /// Account the transport posts as; only its messages can carry controls
    fn bot_user_id(&self) -> UserId;

    /// Post a message and return it as the channel now shows it
    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<Message, TransportError>;

    async fn edit_message(
        &self,
        message: &Message,
        update: &OutgoingMessage,
    ) -> Result<Message, TransportError>;

    async fn delete_message(&self, message: &Message) -> Result<(), TransportError>;

    /// React to a message as the bot
    async fn add_reaction(&self, message: &Message, emoji: &Emoji) -> Result<(), TransportError>;

    /// Remove one user's reaction from a message
    async fn remove_reaction(
        &self,
        message: &Message,
        user_id: UserId,
        emoji: &Emoji,
    ) -> Result<(), TransportError>;

    async fn remove_all_reactions(&self, message: &Message) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn bot_user_id(&self) -> UserId {
        (**self).bot_user_id()
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        (**self).send_message(channel_id, message).await
    }

    async fn edit_message(
        &self,
        message: &Message,
        update: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        (**self).edit_message(message, update).await
    }

    async fn delete_message(&self, message: &Message) -> Result<(), TransportError> {
        (**self).delete_message(message).await
    }

    async fn add_reaction(&self, message: &Message, emoji: &Emoji) -> Result<(), TransportError> {
        (**self).add_reaction(message, emoji).await
    }

    async fn remove_reaction(
        &self,
        message: &Message,
        user_id: UserId,
        emoji: &Emoji,
    ) -> Result<(), TransportError> {
        (**self).remove_reaction(message, user_id, emoji).await
    }

    async fn remove_all_reactions(&self, message: &Message) -> Result<(), TransportError> {
        (**self).remove_all_reactions(message).await
    }
}

//! Minimum spacing between reaction calls

use super::{ChatTransport, TransportError};
use crate::models::{ChannelId, Emoji, Message, OutgoingMessage, UserId};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Wraps a transport so reaction add/remove calls are spaced at least
/// `min_interval` apart, measured from the end of the previous reaction call.
/// Message send/edit/delete calls pass straight through.
pub struct RateLimitedTransport<T> {
    inner: T,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<T: ChatTransport> RateLimitedTransport<T> {
    pub fn new(inner: T, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn paced<F, R>(&self, call: F) -> Result<R, TransportError>
    where
        F: Future<Output = Result<R, TransportError>>,
    {
        let mut last_call = self.last_call.lock().await;
        if let Some(at) = *last_call {
            tokio::time::sleep_until(at + self.min_interval).await;
        }
        let result = call.await;
        *last_call = Some(Instant::now());
        result
    }
}

#[async_trait]
impl<T: ChatTransport> ChatTransport for RateLimitedTransport<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn bot_user_id(&self) -> UserId {
        self.inner.bot_user_id()
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        self.inner.send_message(channel_id, message).await
    }

    async fn edit_message(
        &self,
        message: &Message,
        update: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        self.inner.edit_message(message, update).await
    }

    async fn delete_message(&self, message: &Message) -> Result<(), TransportError> {
        self.inner.delete_message(message).await
    }

    async fn add_reaction(&self, message: &Message, emoji: &Emoji) -> Result<(), TransportError> {
        self.paced(self.inner.add_reaction(message, emoji)).await
    }

    async fn remove_reaction(
        &self,
        message: &Message,
        user_id: UserId,
        emoji: &Emoji,
    ) -> Result<(), TransportError> {
        self.paced(self.inner.remove_reaction(message, user_id, emoji))
            .await
    }

    async fn remove_all_reactions(&self, message: &Message) -> Result<(), TransportError> {
        self.paced(self.inner.remove_all_reactions(message)).await
    }
}

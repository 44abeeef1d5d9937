//! In-process transport that records every outbound call

use super::{ChatTransport, TransportError};
use crate::models::{ChannelId, Emoji, Embed, Message, MessageId, OutgoingMessage, UserId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

/// Message ids handed out by the memory transport start here
const FIRST_MESSAGE_ID: u64 = 1_000;

/// One outbound call as seen by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Send {
        message: Message,
        embed: Option<Embed>,
    },
    Edit {
        message_id: MessageId,
        content: OutgoingMessage,
    },
    Delete {
        message_id: MessageId,
    },
    AddReaction {
        message_id: MessageId,
        emoji: Emoji,
    },
    RemoveReaction {
        message_id: MessageId,
        user_id: UserId,
        emoji: Emoji,
    },
    RemoveAllReactions {
        message_id: MessageId,
    },
}

/// Kind of a [`TransportCall`], used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Send,
    Edit,
    Delete,
    AddReaction,
    RemoveReaction,
    RemoveAllReactions,
}

impl TransportCall {
    pub fn kind(&self) -> CallKind {
        match self {
            TransportCall::Send { .. } => CallKind::Send,
            TransportCall::Edit { .. } => CallKind::Edit,
            TransportCall::Delete { .. } => CallKind::Delete,
            TransportCall::AddReaction { .. } => CallKind::AddReaction,
            TransportCall::RemoveReaction { .. } => CallKind::RemoveReaction,
            TransportCall::RemoveAllReactions { .. } => CallKind::RemoveAllReactions,
        }
    }
}

/// Transport backed by memory. Used by the console bot and by tests.
pub struct MemoryTransport {
    bot_user_id: UserId,
    next_id: AtomicU64,
    calls: Mutex<Vec<TransportCall>>,
    failing: Mutex<HashSet<CallKind>>,
    observer: Option<UnboundedSender<TransportCall>>,
}

impl MemoryTransport {
    pub fn new(bot_user_id: UserId) -> Self {
        Self {
            bot_user_id,
            next_id: AtomicU64::new(FIRST_MESSAGE_ID),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            observer: None,
        }
    }

    /// Also forward every successful call to `observer` as it happens
    pub fn with_observer(mut self, observer: UnboundedSender<TransportCall>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Reserve a message id; shared with inbound messages so ids never collide
    pub fn allocate_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Make every later call of `kind` fail
    pub fn fail_on(&self, kind: CallKind) {
        lock(&self.failing).insert(kind);
    }

    /// Snapshot of all successful calls so far
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<TransportCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.kind() == kind)
            .cloned()
            .collect()
    }

    fn record(&self, call: TransportCall) -> Result<(), TransportError> {
        if lock(&self.failing).contains(&call.kind()) {
            return Err(format!("{:?} call rejected", call.kind()).into());
        }
        if let Some(observer) = &self.observer {
            let _ = observer.send(call.clone());
        }
        lock(&self.calls).push(call);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        let sent = Message::new(
            self.allocate_id(),
            channel_id,
            self.bot_user_id,
            message.content.clone(),
        );
        self.record(TransportCall::Send {
            message: sent.clone(),
            embed: message.embed.clone(),
        })?;
        Ok(sent)
    }

    async fn edit_message(
        &self,
        message: &Message,
        update: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        self.record(TransportCall::Edit {
            message_id: message.id,
            content: update.clone(),
        })?;
        Ok(Message {
            content: update.content.clone(),
            ..message.clone()
        })
    }

    async fn delete_message(&self, message: &Message) -> Result<(), TransportError> {
        self.record(TransportCall::Delete {
            message_id: message.id,
        })
    }

    async fn add_reaction(&self, message: &Message, emoji: &Emoji) -> Result<(), TransportError> {
        self.record(TransportCall::AddReaction {
            message_id: message.id,
            emoji: emoji.clone(),
        })
    }

    async fn remove_reaction(
        &self,
        message: &Message,
        user_id: UserId,
        emoji: &Emoji,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::RemoveReaction {
            message_id: message.id,
            user_id,
            emoji: emoji.clone(),
        })
    }

    async fn remove_all_reactions(&self, message: &Message) -> Result<(), TransportError> {
        self.record(TransportCall::RemoveAllReactions {
            message_id: message.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_assigns_ids_and_records() {
        let transport = MemoryTransport::new(UserId(1));
        let first = transport
            .send_message(ChannelId(42), &"one".into())
            .await
            .unwrap();
        let second = transport
            .send_message(ChannelId(42), &"two".into())
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.author_id, UserId(1));
        assert_eq!(transport.calls_of(CallKind::Send).len(), 2);
    }

    #[tokio::test]
    async fn test_fail_on_rejects_calls() {
        let transport = MemoryTransport::new(UserId(1));
        transport.fail_on(CallKind::AddReaction);
        let message = Message::new(MessageId(5), ChannelId(42), UserId(1), "x");

        assert!(transport.add_reaction(&message, &"▶".into()).await.is_err());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_calls() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = MemoryTransport::new(UserId(1)).with_observer(tx);
        let message = Message::new(MessageId(5), ChannelId(42), UserId(1), "x");

        transport.delete_message(&message).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportCall::Delete {
                message_id: MessageId(5)
            })
        );
    }
}

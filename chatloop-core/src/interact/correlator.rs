//! Matching inbound events to a pending prompt

use crate::events::Listener;
use crate::gate::{GateOpener, TimeoutRenewer};
use crate::models::{ChannelId, Emoji, InboundEvent, Message, MessageId, UserId};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type CheckFn = dyn Fn(Message) -> BoxFuture<'static, bool> + Send + Sync;

/// Acceptance check for prompt responses.
///
/// A response the validator rejects keeps the prompt waiting and restarts its timeout.
/// A validator that panics counts as a rejection.
#[derive(Clone)]
pub struct Validator(Arc<CheckFn>);

impl Validator {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let check = Arc::new(check);
        Self(Arc::new(move |message: Message| {
            let check = Arc::clone(&check);
            async move { check(&message) }.boxed()
        }))
    }

    /// Validator that may await, e.g. to tell the user why a response was rejected
    pub fn new_async<F, Fut>(check: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        Self(Arc::new(move |message: Message| check(message).boxed()))
    }

    pub async fn check(&self, message: &Message) -> bool {
        let pending = match panic::catch_unwind(AssertUnwindSafe(|| (self.0)(message.clone()))) {
            Ok(pending) => pending,
            Err(_) => {
                tracing::warn!(message = %message.id, "validator panicked; treating response as invalid");
                return false;
            }
        };
        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(valid) => valid,
            Err(_) => {
                tracing::warn!(message = %message.id, "validator panicked; treating response as invalid");
                false
            }
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

#[derive(Default)]
struct RequestState {
    /// Prompt plus every observed response, for optional cleanup
    messages: Vec<Message>,
    response: Option<Message>,
    cancelled: bool,
}

/// One in-flight prompt: who we are waiting for, where, and what arrived so far.
pub(crate) struct PendingRequest {
    channel_id: ChannelId,
    user_id: UserId,
    validator: Option<Validator>,
    opener: GateOpener,
    renewer: Option<TimeoutRenewer>,
    state: Mutex<RequestState>,
}

/// What a [`PendingRequest`] ended with
pub(crate) struct Outcome {
    pub messages: Vec<Message>,
    pub response: Option<Message>,
    pub cancelled: bool,
}

impl PendingRequest {
    pub fn new(
        channel_id: ChannelId,
        user_id: UserId,
        validator: Option<Validator>,
        opener: GateOpener,
        renewer: Option<TimeoutRenewer>,
    ) -> Self {
        Self {
            channel_id,
            user_id,
            validator,
            opener,
            renewer,
            state: Mutex::new(RequestState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RequestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, message: Message) {
        self.lock().messages.push(message);
    }

    pub fn arm_timeout(&self) {
        if let Some(renewer) = &self.renewer {
            renewer.arm();
        }
    }

    pub fn stop_timeout(&self) {
        if let Some(renewer) = &self.renewer {
            renewer.cancel();
        }
    }

    /// Release the wait without a response. Returns false if something else won.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        if !self.opener.open() {
            return false;
        }
        state.cancelled = true;
        self.stop_timeout();
        true
    }

    pub fn finish(&self) -> Outcome {
        let mut state = self.lock();
        Outcome {
            messages: std::mem::take(&mut state.messages),
            response: state.response.take(),
            cancelled: state.cancelled,
        }
    }

    fn is_from_target(&self, message: &Message) -> bool {
        message.channel_id == self.channel_id && message.author_id == self.user_id
    }

    async fn offer(&self, message: &Message) {
        if !self.is_from_target(message) || self.opener.is_spent() {
            return;
        }

        let valid = match &self.validator {
            Some(validator) => validator.check(message).await,
            None => true,
        };

        // The state lock is held across the gate release so the woken caller
        // always observes the response together with the release.
        let mut state = self.lock();
        if self.opener.is_spent() {
            return;
        }
        state.messages.push(message.clone());
        if valid {
            if self.opener.open() {
                state.response = Some(message.clone());
                self.stop_timeout();
                tracing::debug!(channel = %self.channel_id, user = %self.user_id, message = %message.id, "prompt answered");
            }
        } else {
            tracing::debug!(channel = %self.channel_id, user = %self.user_id, message = %message.id, "prompt response rejected");
            if let Some(renewer) = &self.renewer {
                renewer.reset();
            }
        }
    }
}

/// Listener resolving a [`PendingRequest`] from message-created events
pub(crate) struct Correlator {
    request: Arc<PendingRequest>,
}

impl Correlator {
    pub fn new(request: Arc<PendingRequest>) -> Self {
        Self { request }
    }
}

#[async_trait]
impl Listener for Correlator {
    async fn handle(&self, event: &InboundEvent) {
        if let InboundEvent::MessageCreated(message) = event {
            self.request.offer(message).await;
        }
    }
}

/// Listener cancelling a [`PendingRequest`] when its user presses the cancel reaction
pub(crate) struct CancelButton {
    request: Arc<PendingRequest>,
    message_id: MessageId,
    emoji: Emoji,
}

impl CancelButton {
    pub fn new(request: Arc<PendingRequest>, message_id: MessageId, emoji: Emoji) -> Self {
        Self {
            request,
            message_id,
            emoji,
        }
    }
}

#[async_trait]
impl Listener for CancelButton {
    async fn handle(&self, event: &InboundEvent) {
        let InboundEvent::ReactionAdded(reaction) = event else {
            return;
        };
        if reaction.message_id == self.message_id
            && reaction.user_id == self.request.user_id
            && reaction.emoji == self.emoji
            && self.request.cancel()
        {
            tracing::debug!(message = %self.message_id, user = %reaction.user_id, "prompt canceled");
        }
    }
}

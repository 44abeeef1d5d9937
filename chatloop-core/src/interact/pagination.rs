//! Reaction-driven index controls on a single message

use super::InteractError;
use crate::events::{EventHub, Listener};
use crate::gate::{Gate, TimeoutRenewer};
use crate::models::{Emoji, InboundEvent, Message, MessageId, PaginationExit, UserId};
use crate::transport::ChatTransport;
use async_trait::async_trait;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Directional control attached to a paginated message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    First,
    Back,
    Stop,
    Forward,
    Last,
}

impl Button {
    /// Buttons in the order they are added to the message
    pub const ALL: [Button; 5] = [
        Button::First,
        Button::Back,
        Button::Stop,
        Button::Forward,
        Button::Last,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Button::First => "⏮",
            Button::Back => "◀",
            Button::Stop => "⏹",
            Button::Forward => "▶",
            Button::Last => "⏭",
        }
    }

    pub fn emoji(self) -> Emoji {
        Emoji::from(self.symbol())
    }

    pub fn from_emoji(emoji: &Emoji) -> Option<Button> {
        Button::ALL
            .into_iter()
            .find(|button| button.symbol() == emoji.as_str())
    }

    /// Index after pressing this button, or `None` when the press changes nothing.
    /// `Stop` never moves the index.
    pub fn next_index(self, index: i64, range: &RangeInclusive<i64>) -> Option<i64> {
        let (lo, hi) = (*range.start(), *range.end());
        let next = match self {
            Button::First => lo,
            Button::Back => index.checked_sub(1)?,
            Button::Forward => index.checked_add(1)?,
            Button::Last => hi,
            Button::Stop => return None,
        };
        (next != index && range.contains(&next)).then_some(next)
    }
}

/// Idle timeout and exit behavior of a pagination run
#[derive(Debug, Clone, Default)]
pub struct PaginationOptions {
    /// Stop after this long without a press; measured from the last press
    pub timeout: Option<Duration>,
    /// Defaults to the start of the range
    pub starting_index: Option<i64>,
    pub exit: PaginationExit,
}

/// Listener queueing presses from the owning user.
///
/// Every press is queued before it releases the gate, so a press that lands while an
/// earlier one is being rendered is kept for the next turn of the loop.
struct Presses {
    message_id: MessageId,
    user_id: UserId,
    gate: Gate,
    queue: mpsc::UnboundedSender<Button>,
}

#[async_trait]
impl Listener for Presses {
    async fn handle(&self, event: &InboundEvent) {
        let InboundEvent::ReactionAdded(reaction) = event else {
            return;
        };
        if reaction.message_id != self.message_id || reaction.user_id != self.user_id {
            return;
        }
        let Some(button) = Button::from_emoji(&reaction.emoji) else {
            return;
        };

        if self.queue.send(button).is_ok() {
            // A release already pending covers this press too
            self.gate.release();
        }
    }
}

/// Live state of one pagination run
struct PaginationState<'a, F> {
    transport: &'a dyn ChatTransport,
    message: &'a Message,
    user_id: UserId,
    range: RangeInclusive<i64>,
    timeout: Option<Duration>,
    index: i64,
    gate: Gate,
    presses: mpsc::UnboundedReceiver<Button>,
    on_index_change: F,
}

impl<F, Fut> PaginationState<'_, F>
where
    F: FnMut(i64) -> Fut + Send,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn run(&mut self) -> Result<(), InteractError> {
        for button in Button::ALL {
            self.transport
                .add_reaction(self.message, &button.emoji())
                .await?;
        }

        loop {
            let button = match self.presses.try_recv() {
                Ok(button) => button,
                Err(_) => match self.wait_for_press().await? {
                    Some(button) => button,
                    None => {
                        tracing::debug!(message = %self.message.id, index = self.index, "pagination timed out");
                        return Ok(());
                    }
                },
            };
            if button == Button::Stop {
                tracing::debug!(message = %self.message.id, index = self.index, "pagination stopped");
                return Ok(());
            }

            if let Some(next) = button.next_index(self.index, &self.range) {
                self.index = next;
                tracing::trace!(message = %self.message.id, ?button, index = next, "page changed");
                (self.on_index_change)(next)
                    .await
                    .map_err(InteractError::Render)?;
            }
            self.transport
                .remove_reaction(self.message, self.user_id, &button.emoji())
                .await?;
        }
    }

    /// Wait for the next press, or `None` once the idle timeout has fired.
    async fn wait_for_press(&mut self) -> Result<Option<Button>, InteractError> {
        loop {
            // Fresh countdown per wait, so the timeout runs from the last press
            let renewer = self.timeout.map(|timeout| {
                let renewer = TimeoutRenewer::new(timeout, self.gate.opener());
                renewer.arm();
                renewer
            });
            self.gate.close().await?;
            let timed_out = renewer.as_ref().is_some_and(TimeoutRenewer::has_fired);
            drop(renewer);

            if let Ok(button) = self.presses.try_recv() {
                return Ok(Some(button));
            }
            if timed_out {
                return Ok(None);
            }
            // Released by a press that was already taken from the queue
        }
    }
}

/// Drive an index within `index_range` from reaction buttons on `message`.
///
/// `message` must have been sent by the bot. `on_index_change` runs after every press that moves the index. The loop ends when
/// `user_id` presses stop, the idle timeout elapses, or the callback fails; in every
/// case the message is then cleaned up per `options.exit`. Returns the final index.
pub async fn paginate<F, Fut>(
    transport: &dyn ChatTransport,
    hub: &EventHub,
    message: &Message,
    user_id: UserId,
    index_range: RangeInclusive<i64>,
    options: PaginationOptions,
    on_index_change: F,
) -> Result<i64, InteractError>
where
    F: FnMut(i64) -> Fut + Send,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    let (lo, hi) = (*index_range.start(), *index_range.end());
    let index = options.starting_index.unwrap_or(lo);
    if !index_range.contains(&index) {
        return Err(InteractError::InvalidStartIndex { index, lo, hi });
    }

    if message.author_id != transport.bot_user_id() {
        return Err(InteractError::NotBotMessage {
            message_id: message.id,
            author_id: message.author_id,
        });
    }

    let gate = Gate::new();
    let (queue, presses) = mpsc::unbounded_channel();
    let listener = hub.subscribe(Arc::new(Presses {
        message_id: message.id,
        user_id,
        gate: gate.clone(),
        queue,
    }));

    tracing::debug!(message = %message.id, user = %user_id, lo, hi, index, "pagination started");

    let mut state = PaginationState {
        transport,
        message,
        user_id,
        range: index_range,
        timeout: options.timeout,
        index,
        gate,
        presses,
        on_index_change,
    };
    let outcome = state.run().await;
    drop(listener);

    let cleanup = match options.exit {
        PaginationExit::RemoveReactions => transport.remove_all_reactions(message).await,
        PaginationExit::DeleteMessage => transport.delete_message(message).await,
    };

    match (outcome, cleanup) {
        (Ok(()), Ok(())) => Ok(state.index),
        (Ok(()), Err(error)) => Err(InteractError::Transport(error)),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(cleanup_error)) => {
            tracing::warn!(message = %message.id, error = %cleanup_error, "pagination cleanup failed");
            Err(error)
        }
    }
}

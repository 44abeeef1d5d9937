//! Blocking request/response prompts

use super::correlator::{CancelButton, Correlator, PendingRequest, Validator};
use super::InteractError;
use crate::events::EventHub;
use crate::gate::{Gate, TimeoutRenewer};
use crate::models::{ChannelId, Emoji, Message, OutgoingMessage, UserId};
use crate::transport::ChatTransport;
use std::sync::Arc;
use std::time::Duration;

/// How a prompt waits and cleans up
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// Give up after this long without a valid response; every rejected response restarts it
    pub timeout: Option<Duration>,
    /// Reaction added to the prompt that the user can press to cancel
    pub cancel_reaction: Option<Emoji>,
    /// Delete the prompt and every response once the prompt ends
    pub clean: bool,
    /// Check a response must pass to end the prompt
    pub validator: Option<Validator>,
}

impl PromptOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_reaction(mut self, emoji: impl Into<Emoji>) -> Self {
        self.cancel_reaction = Some(emoji.into());
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Ask `user_id` something in `channel_id` and wait for their answer.
///
/// Returns the accepted response, or `None` when the prompt timed out or the user
/// pressed the cancel reaction. Without a timeout or cancel reaction this waits until
/// a valid response arrives. Transport errors are returned as they are; when adding the
/// cancel reaction fails, a `clean` prompt still deletes the message it sent.
pub async fn prompt(
    transport: &dyn ChatTransport,
    hub: &EventHub,
    channel_id: ChannelId,
    user_id: UserId,
    content: impl Into<OutgoingMessage>,
    options: PromptOptions,
) -> Result<Option<Message>, InteractError> {
    let PromptOptions {
        timeout,
        cancel_reaction,
        clean,
        validator,
    } = options;

    let gate = Gate::new();
    let renewer = timeout.map(|duration| TimeoutRenewer::new(duration, gate.opener()));
    let request = Arc::new(PendingRequest::new(
        channel_id,
        user_id,
        validator,
        gate.opener(),
        renewer,
    ));

    tracing::debug!(channel = %channel_id, user = %user_id, ?timeout, "prompt started");

    // Listen before sending so an instant reply cannot slip past.
    let correlator = hub.subscribe(Arc::new(Correlator::new(Arc::clone(&request))));

    let prompt_message = transport
        .send_message(channel_id, &content.into())
        .await?;
    request.record(prompt_message.clone());

    let cancel_button = match cancel_reaction {
        Some(emoji) => {
            let guard = hub.subscribe(Arc::new(CancelButton::new(
                Arc::clone(&request),
                prompt_message.id,
                emoji.clone(),
            )));
            if let Err(error) = transport.add_reaction(&prompt_message, &emoji).await {
                drop(guard);
                drop(correlator);
                if clean {
                    let outcome = request.finish();
                    if let Err(cleanup_error) = delete_all(transport, &outcome.messages).await {
                        tracing::warn!(channel = %channel_id, error = %cleanup_error, "prompt cleanup failed");
                    }
                }
                return Err(error.into());
            }
            Some(guard)
        }
        None => None,
    };

    request.arm_timeout();
    gate.close().await?;

    let offered_cancel = cancel_button.is_some();
    drop(correlator);
    drop(cancel_button);
    request.stop_timeout();

    let outcome = request.finish();
    match (&outcome.response, outcome.cancelled) {
        (Some(response), _) => {
            tracing::info!(channel = %channel_id, user = %user_id, message = %response.id, "prompt resolved")
        }
        (None, true) => tracing::info!(channel = %channel_id, user = %user_id, "prompt canceled"),
        (None, false) => tracing::info!(channel = %channel_id, user = %user_id, "prompt timed out"),
    }

    if clean {
        delete_all(transport, &outcome.messages).await?;
    } else if offered_cancel {
        transport.remove_all_reactions(&prompt_message).await?;
    }

    Ok(outcome.response)
}

/// Prompt the author of `message` in the channel it was sent in
pub async fn prompt_author(
    transport: &dyn ChatTransport,
    hub: &EventHub,
    message: &Message,
    content: impl Into<OutgoingMessage>,
    options: PromptOptions,
) -> Result<Option<Message>, InteractError> {
    prompt(
        transport,
        hub,
        message.channel_id,
        message.author_id,
        content,
        options,
    )
    .await
}

/// Attempt every deletion; report the first failure
async fn delete_all(transport: &dyn ChatTransport, messages: &[Message]) -> Result<(), InteractError> {
    let mut first_error = None;
    for message in messages {
        if let Err(error) = transport.delete_message(message).await {
            tracing::warn!(message = %message.id, error = %error, "failed to clean up prompt message");
            first_error.get_or_insert(error);
        }
    }
    match first_error {
        Some(error) => Err(InteractError::Transport(error)),
        None => Ok(()),
    }
}

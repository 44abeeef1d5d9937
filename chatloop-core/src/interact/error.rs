//! Errors surfaced by prompts and pagination

use crate::gate::GateError;
use crate::models::{MessageId, UserId};
use crate::transport::TransportError;

/// Failure of a prompt or pagination call.
///
/// Timeouts and cancellations are not errors; they show up as `Ok(None)` from a prompt
/// and as a normal return from pagination.
#[derive(Debug, thiserror::Error)]
pub enum InteractError {
    /// Gate misuse; a bug in the caller, never retried
    #[error(transparent)]
    Gate(#[from] GateError),

    /// Controls can only be attached to a message the bot sent
    #[error("message {message_id} was sent by {author_id}, not the bot")]
    NotBotMessage { message_id: MessageId, author_id: UserId },

    #[error("starting index {index} is outside {lo}..={hi}")]
    InvalidStartIndex { index: i64, lo: i64, hi: i64 },

    /// Outbound call failed; passed through from the transport uninterpreted
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The pagination render callback failed
    #[error("render callback failed: {0}")]
    Render(#[source] anyhow::Error),
}

impl From<TransportError> for InteractError {
    fn from(error: TransportError) -> Self {
        InteractError::Transport(error)
    }
}

//! Console channel: typed lines or a script become inbound chat events

use super::commands::{self, Command};
use super::render;
use anyhow::{bail, Context, Result};
use chatloop_core::models::{ChannelId, Emoji, InboundEvent, Message, MessageId, Reaction, UserId};
use chatloop_core::services::InteractionService;
use chatloop_core::transport::{ChatTransport, MemoryTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleLine {
    /// Message typed by the console user
    Say(String),
    /// Console user reacts to a message
    React { message_id: MessageId, emoji: Emoji },
    /// Pause before reading the next line
    Wait(Duration),
    /// Raw gateway event, written as JSON
    Event(InboundEvent),
    Quit,
    /// Blank line or comment
    Skip,
}

/// Parse a console or script line.
///
/// `:react <message id> <emoji>`, `:wait <ms>` and `:quit` are directives, a line starting
/// with `{` is a JSON event, `//` starts a comment. Anything else is said by the user.
pub fn parse_line(line: &str) -> Result<ConsoleLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("//") {
        return Ok(ConsoleLine::Skip);
    }
    if trimmed.starts_with('{') {
        let event: InboundEvent =
            serde_json::from_str(trimmed).context("invalid JSON event")?;
        return Ok(ConsoleLine::Event(event));
    }
    let Some(directive) = trimmed.strip_prefix(':') else {
        return Ok(ConsoleLine::Say(trimmed.to_string()));
    };

    let mut parts = directive.split_whitespace();
    match parts.next() {
        Some("react") => {
            let (Some(id), Some(emoji)) = (parts.next(), parts.next()) else {
                bail!("usage: :react <message id> <emoji>");
            };
            let id: u64 = id.parse().with_context(|| format!("invalid message id: {}", id))?;
            Ok(ConsoleLine::React {
                message_id: MessageId(id),
                emoji: Emoji::from(emoji),
            })
        }
        Some("wait") => {
            let ms = parts.next().context("usage: :wait <milliseconds>")?;
            let ms: u64 = ms.parse().with_context(|| format!("invalid duration: {}", ms))?;
            Ok(ConsoleLine::Wait(Duration::from_millis(ms)))
        }
        Some("quit") => Ok(ConsoleLine::Quit),
        Some(other) => bail!("unknown directive :{}", other),
        None => bail!("empty directive"),
    }
}

/// The console user's side of the chat, feeding the bot's event hub
pub struct Console {
    service: InteractionService,
    ids: Arc<MemoryTransport>,
    channel_id: ChannelId,
    user_id: UserId,
    tasks: JoinSet<()>,
}

impl Console {
    /// `ids` allocates inbound message ids from the same sequence as bot messages
    pub fn new(
        service: InteractionService,
        ids: Arc<MemoryTransport>,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Self {
        Self {
            service,
            ids,
            channel_id,
            user_id,
            tasks: JoinSet::new(),
        }
    }

    /// Feed every line of `reader`, then wait for running commands to finish.
    ///
    /// `:quit` aborts whatever is still running instead of waiting for it.
    pub async fn run<R>(mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            match parse_line(&line) {
                Ok(ConsoleLine::Quit) => {
                    if !self.tasks.is_empty() {
                        tracing::debug!(pending = self.tasks.len(), "aborting running commands");
                    }
                    self.tasks.shutdown().await;
                    return Ok(());
                }
                Ok(parsed) => self.feed(parsed).await,
                Err(error) => eprintln!("{:#}", error),
            }
        }

        while let Some(result) = self.tasks.join_next().await {
            if let Err(error) = result {
                tracing::warn!(error = %error, "command task failed");
            }
        }
        Ok(())
    }

    async fn feed(&mut self, line: ConsoleLine) {
        match line {
            ConsoleLine::Say(content) => {
                let message = Message::new(self.ids.allocate_id(), self.channel_id, self.user_id, content);
                println!("{}", render::render_inbound(&message));
                self.deliver(InboundEvent::MessageCreated(message)).await;
            }
            ConsoleLine::React { message_id, emoji } => {
                let reaction = Reaction {
                    message_id,
                    channel_id: self.channel_id,
                    user_id: self.user_id,
                    emoji,
                };
                self.deliver(InboundEvent::ReactionAdded(reaction)).await;
            }
            ConsoleLine::Wait(duration) => tokio::time::sleep(duration).await,
            ConsoleLine::Event(event) => self.deliver(event).await,
            ConsoleLine::Quit | ConsoleLine::Skip => {}
        }
    }

    async fn deliver(&mut self, event: InboundEvent) {
        let delivered = self.service.hub().dispatch(&event).await;
        tracing::trace!(delivered, "event dispatched");

        let InboundEvent::MessageCreated(message) = event else {
            return;
        };
        // The bot never reacts to its own messages
        if message.author_id == self.ids.bot_user_id() {
            return;
        }
        if let Some(command) = Command::parse(&message.content) {
            let service = self.service.clone();
            self.tasks.spawn(async move {
                if let Err(error) = commands::run(service, command, message).await {
                    chatloop_core::services::logging::log_error(
                        &format!("{:#}", error),
                        Some(command.name()),
                    );
                }
            });
        }
    }
}

//! Interaction service handed to command handlers

use crate::events::EventHub;
use crate::interact::{self, InteractError, PaginationOptions, PromptOptions};
use crate::models::{ChannelId, Configuration, Emoji, Message, OutgoingMessage, UserId};
use crate::transport::ChatTransport;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Bot context for prompts and pagination: the outbound transport, the inbound
/// event stream and the configured defaults. Cheap to clone into command tasks.
#[derive(Clone)]
pub struct InteractionService {
    transport: Arc<dyn ChatTransport>,
    hub: EventHub,
    config: Arc<Configuration>,
}

impl InteractionService {
    pub fn new(transport: Arc<dyn ChatTransport>, hub: EventHub, config: Configuration) -> Self {
        Self {
            transport,
            hub,
            config: Arc::new(config),
        }
    }

    pub fn transport(&self) -> &dyn ChatTransport {
        self.transport.as_ref()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Prompt options prefilled from configuration: timeout and cancel reaction
    pub fn default_prompt_options(&self) -> PromptOptions {
        PromptOptions {
            timeout: self.config.prompt_timeout(),
            cancel_reaction: Some(Emoji::new(self.config.cancel_reaction.clone())),
            ..PromptOptions::default()
        }
    }

    pub fn default_pagination_options(&self) -> PaginationOptions {
        PaginationOptions {
            timeout: self.config.pagination_timeout(),
            starting_index: None,
            exit: self.config.pagination_exit,
        }
    }

    pub async fn send(
        &self,
        channel_id: ChannelId,
        content: impl Into<OutgoingMessage>,
    ) -> Result<Message, InteractError> {
        Ok(self
            .transport
            .send_message(channel_id, &content.into())
            .await?)
    }

    pub async fn prompt(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        content: impl Into<OutgoingMessage>,
        options: PromptOptions,
    ) -> Result<Option<Message>, InteractError> {
        interact::prompt(
            self.transport(),
            &self.hub,
            channel_id,
            user_id,
            content,
            options,
        )
        .await
    }

    /// Prompt the author of `message` in its channel
    pub async fn prompt_author(
        &self,
        message: &Message,
        content: impl Into<OutgoingMessage>,
        options: PromptOptions,
    ) -> Result<Option<Message>, InteractError> {
        interact::prompt_author(self.transport(), &self.hub, message, content, options).await
    }

    pub async fn paginate<F, Fut>(
        &self,
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
        interact::paginate(
            self.transport(),
            &self.hub,
            message,
            user_id,
            index_range,
            options,
            on_index_change,
        )
        .await
    }
}

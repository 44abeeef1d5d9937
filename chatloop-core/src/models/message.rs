//! Chat message, reaction and inbound event data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Channel identifier
    ChannelId
);
snowflake!(
    /// User identifier
    UserId
);
snowflake!(
    /// Message identifier
    MessageId
);

/// Unicode emoji or custom emoji name used as a reaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Emoji(pub String);

impl Emoji {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Emoji {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as seen in a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(
        id: MessageId,
        channel_id: ChannelId,
        author_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel_id,
            author_id,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A reaction added to a message by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub emoji: Emoji,
}

/// Event delivered by the messaging gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "message")]
    MessageCreated(Message),
    #[serde(rename = "reaction")]
    ReactionAdded(Reaction),
}

impl InboundEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            InboundEvent::MessageCreated(message) => message.channel_id,
            InboundEvent::ReactionAdded(reaction) => reaction.channel_id,
        }
    }

    /// Author of a message, or the user who reacted
    pub fn user_id(&self) -> UserId {
        match self {
            InboundEvent::MessageCreated(message) => message.author_id,
            InboundEvent::ReactionAdded(reaction) => reaction.user_id,
        }
    }
}

/// Optional rich block attached to an outgoing message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

/// Body of a message the bot sends or edits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embed: None,
        }
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for OutgoingMessage {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

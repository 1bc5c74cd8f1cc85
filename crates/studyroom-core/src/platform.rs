//! Chat platform contract.
//!
//! The core never talks to a concrete chat service. It only needs to send a
//! message to a channel and later edit it; adapters live in
//! [`crate::integrations`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platform mention markup (`<@id>`).
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interactive element attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    Button {
        custom_id: String,
        label: String,
    },
    Select {
        custom_id: String,
        placeholder: String,
        options: Vec<String>,
        min_values: usize,
        max_values: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            components: Vec::new(),
        }
    }

    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }
}

impl From<String> for OutgoingMessage {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

impl From<&str> for OutgoingMessage {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

/// Send/update surface of a chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post a new message and return its id.
    async fn send(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, DeliveryError>;

    /// Replace the content of a previously sent message.
    async fn edit(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError>;
}

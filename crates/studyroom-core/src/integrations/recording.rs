//! In-memory messenger that keeps every message it is given.
//!
//! Used by tests and by `--dry-run` style hosts that want to inspect output
//! instead of posting it.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::platform::{ChannelId, MessageId, Messenger, OutgoingMessage};

/// A message as it currently stands, plus how many times it was edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    pub message: OutgoingMessage,
    pub edits: usize,
}

#[derive(Default)]
struct Inner {
    messages: Vec<RecordedMessage>,
    broken_channels: HashSet<ChannelId>,
}

#[derive(Default)]
pub struct RecordingMessenger {
    inner: Mutex<Inner>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `channel` fail from now on.
    pub fn break_channel(&self, channel: &ChannelId) {
        self.lock().broken_channels.insert(channel.clone());
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.lock().messages.clone()
    }

    /// Current content of every message in `channel`, in send order.
    pub fn contents(&self, channel: &ChannelId) -> Vec<String> {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.channel == *channel)
            .map(|m| m.message.content.clone())
            .collect()
    }

    pub fn get(&self, id: &MessageId) -> Option<RecordedMessage> {
        self.lock().messages.iter().find(|m| m.id == *id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, DeliveryError> {
        let mut inner = self.lock();
        if inner.broken_channels.contains(channel) {
            return Err(DeliveryError::Rejected(format!("unknown channel {channel}")));
        }
        let id = MessageId(format!("m{}", inner.messages.len() + 1));
        inner.messages.push(RecordedMessage {
            id: id.clone(),
            channel: channel.clone(),
            message,
            edits: 0,
        });
        Ok(id)
    }

    async fn edit(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        let mut inner = self.lock();
        if inner.broken_channels.contains(channel) {
            return Err(DeliveryError::Rejected(format!("unknown channel {channel}")));
        }
        let recorded = inner
            .messages
            .iter_mut()
            .find(|m| m.id == *message_id)
            .ok_or_else(|| DeliveryError::UnknownMessage(message_id.to_string()))?;
        recorded.message = message;
        recorded.edits += 1;
        Ok(())
    }
}

//! Terminal messenger for the console host.
//!
//! New messages are printed on their own lines. Edits redraw a single status
//! line in place, so a ticking pomodoro does not flood the terminal.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::platform::{ChannelId, Component, MessageId, Messenger, OutgoingMessage};

#[derive(Default)]
struct State {
    next_id: u64,
    /// An edited line is on screen without a trailing newline.
    inline: bool,
}

#[derive(Default)]
pub struct ConsoleMessenger {
    state: Mutex<State>,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Render components as a trailing hint line.
fn component_hint(components: &[Component]) -> Option<String> {
    if components.is_empty() {
        return None;
    }
    let parts: Vec<String> = components
        .iter()
        .map(|c| match c {
            Component::Button { custom_id, label } => format!("[{label}] ({custom_id})"),
            Component::Select {
                options,
                max_values,
                ..
            } => format!(
                "select up to {max_values} with /select: {}",
                options.join(", ")
            ),
        })
        .collect();
    Some(parts.join("  "))
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, DeliveryError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = MessageId(state.next_id.to_string());

        let mut out = std::io::stdout().lock();
        if state.inline {
            writeln!(out).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
            state.inline = false;
        }
        let mut text = format!("[#{channel}] {}", message.content);
        if let Some(hint) = component_hint(&message.components) {
            text.push_str("\n    ");
            text.push_str(&hint);
        }
        writeln!(out, "{text}").map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        Ok(id)
    }

    async fn edit(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        let mut state = self.lock();
        let line = message.content.replace('\n', " | ");
        let mut out = std::io::stdout().lock();
        write!(out, "\r\x1b[2K[#{channel}] ({message_id}) {line}")
            .and_then(|_| out.flush())
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        state.inline = true;
        Ok(())
    }
}

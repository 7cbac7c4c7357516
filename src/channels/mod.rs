//! Messaging channel boundary
//!
//! The dispatch loop only sees this trait and the two message structs, so
//! it can be tested with a mock channel.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramChannel;

use crate::Result;

/// A message arriving from a channel
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform message identifier
    pub id: String,
    /// Chat the message arrived in
    pub chat_id: String,
    /// Sender identifier; rate limiting and history key on this
    pub sender_id: String,
    /// Sender display name
    pub sender_name: String,
    /// Message text
    pub text: String,
    /// Whether this is a direct message
    pub is_dm: bool,
}

/// A message to send to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Chat to deliver to
    pub chat_id: String,
    /// Message text (may contain markdown)
    pub text: String,
    /// Optional message ID to reply to
    pub reply_to: Option<String>,
}

impl OutgoingMessage {
    /// Create a plain message
    #[must_use]
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            reply_to: None,
        }
    }

    /// Create a reply to an existing message
    #[must_use]
    pub fn reply(
        chat_id: impl Into<String>,
        text: impl Into<String>,
        reply_to: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            reply_to: Some(reply_to.into()),
        }
    }
}

/// Trait for messaging channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Connect to the channel
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from the channel
    async fn disconnect(&mut self) -> Result<()>;

    /// Send a message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send a typing indicator while the bot is working
    ///
    /// Default implementation is a no-op for channels without typing
    async fn send_typing(&self, _chat_id: &str) -> Result<()> {
        Ok(())
    }
}

//! Telegram channel adapter
//!
//! Receives messages via long-polling `getUpdates` and sends through the
//! Bot API, converting markdown to Telegram HTML and chunking long replies.

mod api;
pub mod chunking;
pub mod html;
pub mod polling;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::{Channel, IncomingMessage, OutgoingMessage};
use crate::{Error, Result};

use retry::RetryPolicy;

pub use types::{BotCommand, BotIdentity};

/// Buffer size for the incoming-message channel
const CHANNEL_CAPACITY: usize = 100;

/// Telegram channel adapter
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    token: String,
    client: Client,
    message_tx: Option<mpsc::Sender<IncomingMessage>>,
    connected: bool,
    retry: RetryPolicy,
    identity: Option<BotIdentity>,
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: Client::new(),
            message_tx: None,
            connected: false,
            retry: RetryPolicy::default(),
            identity: None,
        }
    }

    /// Create with a message receiver for polling mode
    ///
    /// Returns the channel and a receiver for incoming messages
    #[must_use]
    pub fn with_receiver(token: String) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut channel = Self::new(token);
        channel.message_tx = Some(tx);
        (channel, rx)
    }

    /// The bot's own identity, known after [`Channel::connect`]
    #[must_use]
    pub fn identity(&self) -> Option<&BotIdentity> {
        self.identity.as_ref()
    }

    /// Publish the command menu shown in Telegram clients
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn register_commands(&self, commands: &[BotCommand]) -> Result<()> {
        self.set_my_commands(commands).await
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<()> {
        let me = self.get_me().await?;
        tracing::info!(
            username = me.username.as_deref().unwrap_or(&me.first_name),
            "Telegram channel connected"
        );
        self.identity = Some(me);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        tracing::info!("Telegram channel disconnected");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let chat_id: i64 = message
            .chat_id
            .parse()
            .map_err(|_| Error::Channel("invalid chat ID".to_string()))?;
        let reply_to: Option<i64> = message.reply_to.as_ref().and_then(|id| id.parse().ok());

        for (index, chunk) in chunking::split_message(&message.text, chunking::MESSAGE_LIMIT)
            .iter()
            .enumerate()
        {
            // Only the first chunk replies; the rest follow plainly
            let reply = if index == 0 { reply_to } else { None };
            self.send_message(chat_id, chunk, reply).await?;
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        let chat_id: i64 = chat_id
            .parse()
            .map_err(|_| Error::Channel("invalid chat ID".to_string()))?;
        self.send_chat_action(chat_id, "typing").await
    }
}

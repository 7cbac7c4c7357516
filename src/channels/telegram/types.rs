//! Telegram Bot API request/response types

use serde::{Deserialize, Serialize};

/// Telegram Bot API base URL
pub(crate) const API_BASE: &str = "https://api.telegram.org/bot";

/// Telegram sendMessage request
#[derive(Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_web_page_preview: Option<bool>,
}

/// Telegram sendChatAction request
#[derive(Serialize)]
pub(crate) struct SendChatActionRequest<'a> {
    pub chat_id: i64,
    pub action: &'a str,
}

/// Telegram setMyCommands request
#[derive(Serialize)]
pub(crate) struct SetMyCommandsRequest<'a> {
    pub commands: &'a [BotCommand],
}

/// A bot command for Telegram's command menu
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    /// Command name without the leading slash
    pub command: String,
    /// One-line description shown in the menu
    pub description: String,
}

/// The bot's own identity, from getMe
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    /// Numeric bot user ID
    pub id: i64,
    /// Bot display name
    pub first_name: String,
    /// Bot username, without the @
    #[serde(default)]
    pub username: Option<String>,
}

/// Telegram API response wrapper
#[derive(Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

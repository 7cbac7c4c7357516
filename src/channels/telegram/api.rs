//! Raw Telegram Bot API calls

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::html::markdown_to_html;
use super::retry;
use super::types::{
    API_BASE, ApiResponse, BotCommand, BotIdentity, SendChatActionRequest, SendMessageRequest,
    SetMyCommandsRequest,
};
use crate::{Error, Result};

impl super::TelegramChannel {
    /// Call a Bot API method, retrying recoverable failures with backoff.
    ///
    /// Rate limits (429, honoring `retry_after`), server errors, and
    /// network-level failures retry up to the policy's limit; API-level
    /// rejections (`ok: false` with 4xx) fail immediately.
    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{API_BASE}{}/{method}", self.token);
        let mut attempt = 0;

        loop {
            match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();

                    if status.is_success() {
                        return parse_response(method, &body);
                    }

                    if !retry::is_recoverable(status.as_u16()) || attempt >= self.retry.max_retries
                    {
                        return Err(Error::Channel(format!(
                            "Telegram {method} error: {status} - {body}"
                        )));
                    }

                    let delay = retry::delay_for_attempt(
                        &self.retry,
                        attempt,
                        retry::parse_retry_after(&body),
                    );
                    tracing::warn!(method, %status, attempt, ?delay, "Telegram API error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempt >= self.retry.max_retries {
                        return Err(Error::Channel(format!("Telegram {method} error: {e}")));
                    }

                    let delay = retry::delay_for_attempt(&self.retry, attempt, None);
                    tracing::warn!(method, error = %e, attempt, ?delay, "Telegram request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }

    /// Fetch the bot's own identity
    pub(crate) async fn get_me(&self) -> Result<BotIdentity> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Send a message, converting markdown to HTML with a plain-text
    /// fallback when Telegram rejects the markup.
    pub(crate) async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let html = markdown_to_html(text);
        let request = SendMessageRequest {
            chat_id,
            text: &html,
            parse_mode: Some("HTML"),
            reply_to_message_id: reply_to,
            disable_web_page_preview: Some(true),
        };

        match self.call::<_, serde_json::Value>("sendMessage", &request).await {
            Ok(_) => {
                tracing::debug!(chat_id, "Telegram message sent");
                Ok(())
            }
            Err(Error::Channel(description)) if description.contains("can't parse entities") => {
                tracing::debug!(chat_id, "HTML rejected, resending as plain text");
                let fallback = SendMessageRequest {
                    chat_id,
                    text,
                    parse_mode: None,
                    reply_to_message_id: reply_to,
                    disable_web_page_preview: Some(true),
                };
                self.call::<_, serde_json::Value>("sendMessage", &fallback)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    /// Send a chat action ("typing")
    pub(crate) async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let request = SendChatActionRequest { chat_id, action };
        self.call::<_, bool>("sendChatAction", &request).await?;
        Ok(())
    }

    /// Publish the bot's command menu
    pub(crate) async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let request = SetMyCommandsRequest { commands };
        self.call::<_, bool>("setMyCommands", &request).await?;
        Ok(())
    }
}

fn parse_response<Resp: DeserializeOwned>(method: &str, body: &str) -> Result<Resp> {
    let parsed: ApiResponse<Resp> = serde_json::from_str(body)
        .map_err(|e| Error::Channel(format!("Telegram response parse error: {e}")))?;

    if !parsed.ok {
        return Err(Error::Channel(format!(
            "Telegram {method} failed: {}",
            parsed.description.unwrap_or_default()
        )));
    }

    parsed
        .result
        .ok_or_else(|| Error::Channel(format!("Telegram {method} returned no result")))
}

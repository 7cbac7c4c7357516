//! Telegram polling mode - getUpdates loop and message conversion

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use super::types::API_BASE;
use crate::channels::IncomingMessage;

/// Long-poll wait passed to getUpdates, in seconds
const LONG_POLL_SECS: u64 = 25;

/// Per-request timeout; must exceed the long-poll wait
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// Bounded memory for the duplicate-update guard
const SEEN_CAPACITY: usize = 1024;

/// Response from Telegram getUpdates API
#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

/// A single update from getUpdates
#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
}

/// Message payload of an update
#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
}

/// Chat info from polling
#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

/// Sender info from polling
#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    is_bot: bool,
    first_name: String,
}

/// Bounded set of already-processed update IDs.
///
/// Offset tracking already drops in-order duplicates; this also catches
/// re-delivery after an offset reset on the Telegram side.
#[derive(Debug, Default)]
struct SeenUpdates {
    ids: HashSet<i64>,
    order: VecDeque<i64>,
}

impl SeenUpdates {
    /// Record `id`; returns `false` if it was already present.
    fn insert(&mut self, id: i64) -> bool {
        if !self.ids.insert(id) {
            return false;
        }

        self.order.push_back(id);
        while self.order.len() > SEEN_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

impl super::TelegramChannel {
    /// Spawn a background task that long-polls Telegram's getUpdates API.
    ///
    /// Received messages are forwarded into the mpsc channel. Any existing
    /// webhook is deleted first so getUpdates works. `retry_interval` is
    /// the pause after a failed poll.
    pub fn start_polling(&self, retry_interval: Duration) -> tokio::task::JoinHandle<()> {
        let token = self.token.clone();
        let client = self.client.clone();
        let tx = self
            .message_tx
            .clone()
            .expect("start_polling requires a message_tx (use with_receiver)");

        tokio::spawn(async move {
            poll_loop(token, client, tx, retry_interval).await;
        })
    }
}

/// Run the polling loop (background task)
async fn poll_loop(
    token: String,
    client: reqwest::Client,
    tx: mpsc::Sender<IncomingMessage>,
    retry_interval: Duration,
) {
    // Delete any existing webhook so getUpdates works
    let delete_url = format!("{API_BASE}{token}/deleteWebhook");
    if let Err(e) = client.post(&delete_url).send().await {
        tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
    }

    let mut offset: Option<i64> = None;
    let mut seen = SeenUpdates::default();

    loop {
        let url = format!("{API_BASE}{token}/getUpdates");
        let mut params = serde_json::json!({
            "timeout": LONG_POLL_SECS,
            "allowed_updates": ["message"],
        });
        if let Some(next) = offset {
            params["offset"] = serde_json::json!(next);
        }

        let outcome = client
            .post(&url)
            .json(&params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        match outcome {
            Ok(response) => {
                let body = response.text().await.unwrap_or_default();
                match serde_json::from_str::<UpdatesResponse>(&body) {
                    Ok(updates) if updates.ok => {
                        for update in updates.result {
                            offset = Some(update.update_id + 1);

                            if !seen.insert(update.update_id) {
                                continue;
                            }

                            if let Some(msg) = into_incoming(update) {
                                if tx.send(msg).await.is_err() {
                                    tracing::info!("message receiver closed, stopping poll loop");
                                    return;
                                }
                            }
                        }
                    }
                    Ok(_) => {
                        tracing::warn!("Telegram getUpdates returned ok=false");
                        tokio::time::sleep(retry_interval).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Telegram getUpdates parse error");
                        tokio::time::sleep(retry_interval).await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Telegram getUpdates error");
                tokio::time::sleep(retry_interval).await;
            }
        }
    }
}

/// Convert a polling update into an [`IncomingMessage`].
///
/// Non-text messages and messages from other bots are dropped.
fn into_incoming(update: Update) -> Option<IncomingMessage> {
    let msg = update.message?;
    let text = msg.text?;

    if msg.from.as_ref().is_some_and(|u| u.is_bot) {
        return None;
    }

    let sender_id = msg
        .from
        .as_ref()
        .map_or_else(|| msg.chat.id.to_string(), |u| u.id.to_string());
    let sender_name = msg
        .from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone());

    Some(IncomingMessage {
        id: msg.message_id.to_string(),
        chat_id: msg.chat.id.to_string(),
        sender_id,
        sender_name,
        text,
        is_dm: msg.chat.kind == "private",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_from(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn converts_text_message() {
        let update = update_from(
            r#"{
                "update_id": 7,
                "message": {
                    "message_id": 99,
                    "chat": {"id": 1234, "type": "private"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Ada"},
                    "text": "hello"
                }
            }"#,
        );

        let msg = into_incoming(update).unwrap();
        assert_eq!(msg.id, "99");
        assert_eq!(msg.chat_id, "1234");
        assert_eq!(msg.sender_id, "42");
        assert_eq!(msg.sender_name, "Ada");
        assert_eq!(msg.text, "hello");
        assert!(msg.is_dm);
    }

    #[test]
    fn group_chats_are_not_dms() {
        let update = update_from(
            r#"{
                "update_id": 8,
                "message": {
                    "message_id": 1,
                    "chat": {"id": -100, "type": "supergroup"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Ada"},
                    "text": "hi all"
                }
            }"#,
        );

        assert!(!into_incoming(update).unwrap().is_dm);
    }

    #[test]
    fn drops_bot_and_non_text_messages() {
        let from_bot = update_from(
            r#"{
                "update_id": 9,
                "message": {
                    "message_id": 2,
                    "chat": {"id": 1, "type": "private"},
                    "from": {"id": 43, "is_bot": true, "first_name": "OtherBot"},
                    "text": "beep"
                }
            }"#,
        );
        assert!(into_incoming(from_bot).is_none());

        let no_text = update_from(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 3,
                    "chat": {"id": 1, "type": "private"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Ada"}
                }
            }"#,
        );
        assert!(into_incoming(no_text).is_none());
    }

    #[test]
    fn seen_updates_dedupes_and_stays_bounded() {
        let mut seen = SeenUpdates::default();
        assert!(seen.insert(1));
        assert!(!seen.insert(1));
        assert!(seen.insert(2));

        for id in 3..(SEEN_CAPACITY as i64 + 10) {
            seen.insert(id);
        }
        assert!(seen.ids.len() <= SEEN_CAPACITY);
        // Evicted IDs may be seen again
        assert!(seen.insert(1));
    }
}

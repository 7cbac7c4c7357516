//! Anthropic messages adapter
//!
//! Same shape as the chat-completions APIs except the system prompt is a
//! top-level field and the reply arrives as a list of content blocks.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatProvider, GenerationConfig};
use crate::history::{Role, Turn};
use crate::{Error, Result};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic messages provider
pub struct AnthropicProvider {
    client: Client,
    api_key: SecretString,
    generation: GenerationConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    #[must_use]
    pub fn new(api_key: SecretString, generation: GenerationConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            generation,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, system: &str, history: &[Turn], user_text: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.generation.model,
            system: (!system.is_empty()).then_some(system),
            messages: build_messages(history, user_text),
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "anthropic returned {status}: {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("anthropic response read failed: {e}")))?;

        extract_reply(&body)
    }
}

fn build_messages<'a>(history: &'a [Turn], user_text: &'a str) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    for turn in history {
        messages.push(WireMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        });
    }
    messages.push(WireMessage {
        role: Role::User.as_str(),
        content: user_text,
    });
    messages
}

/// Concatenate the text blocks of a messages response.
fn extract_reply(body: &str) -> Result<String> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("anthropic response parse failed: {e}")))?;

    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(Error::Provider(
            "anthropic returned an empty completion".to_string(),
        ));
    }

    Ok(text)
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_precedes_new_message() {
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let messages = build_messages(&history, "bye");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].content, "bye");
    }

    #[test]
    fn joins_text_blocks() {
        let body = r#"{"content":[
            {"type":"text","text":"Hello"},
            {"type":"tool_use","id":"x","name":"y","input":{}},
            {"type":"text","text":" world"}
        ]}"#;
        assert_eq!(extract_reply(body).unwrap(), "Hello world");
    }

    #[test]
    fn empty_content_is_an_error() {
        assert!(extract_reply(r#"{"content":[]}"#).is_err());
    }
}

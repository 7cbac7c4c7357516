//! OpenAI chat completions adapter

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatProvider, GenerationConfig};
use crate::history::{Role, Turn};
use crate::{Error, Result};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: SecretString,
    generation: GenerationConfig,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
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
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, system: &str, history: &[Turn], user_text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.generation.model,
            messages: build_messages(system, history, user_text),
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };

        let response = self
            .client
            .post(API_URL)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("openai returned {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("openai response read failed: {e}")))?;

        extract_reply(&body)
    }
}

/// Assemble the wire message list: system, prior turns, then the new user
/// message.
fn build_messages<'a>(
    system: &'a str,
    history: &'a [Turn],
    user_text: &'a str,
) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !system.is_empty() {
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
    }
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

/// Pull the first choice's content out of a chat-completions response body.
fn extract_reply(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("openai response parse failed: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::Provider("openai returned an empty completion".to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
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
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

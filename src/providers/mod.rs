//! Chat-completion provider adapters
//!
//! Each provider implements [`ChatProvider`] over its own HTTP API. The
//! three wire formats are nearly identical; differences (auth headers,
//! system prompt placement, response shape) stay private to each adapter.

mod anthropic;
mod openai;
mod openrouter;

use async_trait::async_trait;

use crate::config::Config;
use crate::history::Turn;
use crate::{Error, Result};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;

/// Generation parameters shared by all providers
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model identifier understood by the provider
    pub model: String,
    /// Response token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// A chat-completion backend
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Generate a reply to `user_text` given the system prompt and prior
    /// turns (oldest first).
    async fn complete(&self, system: &str, history: &[Turn], user_text: &str) -> Result<String>;
}

/// Which provider backs the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages
    Anthropic,
    /// OpenRouter chat completions
    OpenRouter,
}

impl ProviderKind {
    /// Model used when the config names none
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::OpenRouter => "openai/gpt-4o-mini",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(Error::Config(format!(
                "unknown provider {other:?}, expected openai, anthropic, or openrouter"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::OpenRouter => "openrouter",
        };
        f.write_str(name)
    }
}

/// Build the configured provider.
///
/// # Errors
///
/// Returns a configuration error if the selected provider's API key is not
/// set.
pub fn build(config: &Config) -> Result<Box<dyn ChatProvider>> {
    let generation = GenerationConfig {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };

    let missing = |var: &str| Error::Config(format!("{var} is not set"));

    let provider: Box<dyn ChatProvider> = match config.provider {
        ProviderKind::OpenAi => {
            let key = config
                .keys
                .openai
                .clone()
                .ok_or_else(|| missing("OPENAI_API_KEY"))?;
            Box::new(OpenAiProvider::new(key, generation))
        }
        ProviderKind::Anthropic => {
            let key = config
                .keys
                .anthropic
                .clone()
                .ok_or_else(|| missing("ANTHROPIC_API_KEY"))?;
            Box::new(AnthropicProvider::new(key, generation))
        }
        ProviderKind::OpenRouter => {
            let key = config
                .keys
                .openrouter
                .clone()
                .ok_or_else(|| missing("OPENROUTER_API_KEY"))?;
            Box::new(OpenRouterProvider::new(key, generation))
        }
    };

    Ok(provider)
}

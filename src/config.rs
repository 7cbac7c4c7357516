//! Configuration management for the Finch bot
//!
//! Settings load from an optional TOML file with environment variables
//! layered on top; secrets come from the environment only. Invalid values
//! are fatal at startup rather than at call time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::providers::ProviderKind;
use crate::{Error, Result};

/// Default sliding-window length for rate limiting
const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Default requests allowed per window per user
const DEFAULT_MAX_REQUESTS: usize = 10;

/// Default retained exchanges per user
const DEFAULT_MAX_EXCHANGES: usize = 10;

/// Default news cache TTL
const DEFAULT_NEWS_TTL_SECS: u64 = 300;

/// Default news page size
const DEFAULT_NEWS_PAGE_SIZE: usize = 10;

/// Default pause between failed polls
const DEFAULT_POLL_RETRY_MS: u64 = 2_000;

/// Default response token cap
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default system prompt
const DEFAULT_SYSTEM_PROMPT: &str = "You are Finch, a concise and friendly assistant chatting \
     over Telegram. Answer plainly; use short paragraphs and markdown sparingly.";

/// Finch bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: SecretString,

    /// Which chat-completion provider backs the bot
    pub provider: ProviderKind,

    /// Provider and news API keys
    pub keys: ApiKeys,

    /// Model identifier for chat completions
    pub model: String,

    /// Response token cap
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// System prompt prepended to every conversation
    pub system_prompt: String,

    /// Rate limiter settings
    pub rate_limit: RateLimitConfig,

    /// Retained exchanges per user
    pub max_exchanges: usize,

    /// News service settings
    pub news: NewsConfig,

    /// Pause between failed Telegram polls
    pub poll_retry: Duration,
}

/// Rate limiter settings
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sliding-window length
    pub window: Duration,
    /// Requests allowed per window per user; zero refuses everything
    pub max_requests: usize,
}

/// News service settings
#[derive(Debug, Clone)]
pub struct NewsConfig {
    /// News API key; the news path is disabled without one
    pub api_key: Option<SecretString>,
    /// Service base URL
    pub base_url: String,
    /// Cache TTL for query results
    pub cache_ttl: Duration,
    /// Headlines fetched per query
    pub page_size: usize,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key
    pub openai: Option<SecretString>,

    /// `Anthropic` API key
    pub anthropic: Option<SecretString>,

    /// `OpenRouter` API key
    pub openrouter: Option<SecretString>,
}

/// Optional TOML file contents; every field defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Provider name: openai, anthropic, or openrouter
    pub provider: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Response token cap
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// System prompt
    pub system_prompt: Option<String>,
    /// Rate limiter table
    #[serde(default)]
    pub rate_limit: FileRateLimit,
    /// History table
    #[serde(default)]
    pub history: FileHistory,
    /// News table
    #[serde(default)]
    pub news: FileNews,
    /// Pause between failed polls, in milliseconds
    pub poll_retry_ms: Option<u64>,
}

/// `[rate_limit]` table
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRateLimit {
    /// Window length in milliseconds
    pub window_ms: Option<u64>,
    /// Requests per window
    pub max_requests: Option<usize>,
}

/// `[history]` table
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileHistory {
    /// Retained exchanges per user
    pub max_exchanges: Option<usize>,
}

/// `[news]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileNews {
    /// Service base URL override
    pub base_url: Option<String>,
    /// Cache TTL in seconds
    pub cache_ttl_secs: Option<u64>,
    /// Headlines per query
    pub page_size: Option<usize>,
}

impl Config {
    /// Load configuration from the given file (or the default location) and
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable, a value fails to parse, or
    /// validation rejects the result.
    pub fn load(file_override: Option<&Path>) -> Result<Self> {
        let file = load_file(file_override)?;

        let telegram_token = env_secret("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN is not set".to_string()))?;

        let keys = ApiKeys {
            openai: env_secret("OPENAI_API_KEY"),
            anthropic: env_secret("ANTHROPIC_API_KEY"),
            openrouter: env_secret("OPENROUTER_API_KEY"),
        };

        let provider: ProviderKind = env_string("FINCH_PROVIDER")
            .or(file.provider)
            .map_or(Ok(ProviderKind::OpenAi), |s| s.parse())?;

        let model = env_string("FINCH_MODEL")
            .or(file.model)
            .unwrap_or_else(|| provider.default_model().to_string());

        let rate_limit = RateLimitConfig {
            window: Duration::from_millis(
                env_parse("FINCH_RATE_LIMIT_WINDOW_MS")?
                    .or(file.rate_limit.window_ms)
                    .unwrap_or(DEFAULT_WINDOW_MS),
            ),
            max_requests: env_parse("FINCH_RATE_LIMIT_MAX_REQUESTS")?
                .or(file.rate_limit.max_requests)
                .unwrap_or(DEFAULT_MAX_REQUESTS),
        };

        let news = NewsConfig {
            api_key: env_secret("NEWS_API_KEY"),
            base_url: env_string("FINCH_NEWS_BASE_URL")
                .or(file.news.base_url)
                .unwrap_or_else(|| "https://newsapi.org".to_string()),
            cache_ttl: Duration::from_secs(
                env_parse("FINCH_NEWS_CACHE_TTL_SECS")?
                    .or(file.news.cache_ttl_secs)
                    .unwrap_or(DEFAULT_NEWS_TTL_SECS),
            ),
            page_size: env_parse("FINCH_NEWS_PAGE_SIZE")?
                .or(file.news.page_size)
                .unwrap_or(DEFAULT_NEWS_PAGE_SIZE),
        };

        let config = Self {
            telegram_token,
            provider,
            keys,
            model,
            max_tokens: env_parse("FINCH_MAX_TOKENS")?
                .or(file.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: env_parse("FINCH_TEMPERATURE")?
                .or(file.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            system_prompt: env_string("FINCH_SYSTEM_PROMPT")
                .or(file.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            rate_limit,
            max_exchanges: env_parse("FINCH_MAX_HISTORY_EXCHANGES")?
                .or(file.history.max_exchanges)
                .unwrap_or(DEFAULT_MAX_EXCHANGES),
            news,
            poll_retry: Duration::from_millis(
                env_parse("FINCH_POLL_RETRY_MS")?
                    .or(file.poll_retry_ms)
                    .unwrap_or(DEFAULT_POLL_RETRY_MS),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    ///
    /// A zero request limit is allowed (the bot refuses everything, which
    /// is a meaningful setting); a zero window or zero history bound is
    /// not.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window.is_zero() {
            return Err(Error::Config(
                "rate limit window must be greater than zero".to_string(),
            ));
        }
        if self.max_exchanges == 0 {
            return Err(Error::Config(
                "history must retain at least one exchange".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature {} out of range 0.0..=2.0",
                self.temperature
            )));
        }
        if self.news.page_size == 0 {
            return Err(Error::Config("news page_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Default config file location (`~/.config/finch/config.toml` on Linux)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "finch", "finch")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Read and parse the config file.
///
/// An explicitly named file must exist; the default location is optional.
fn load_file(file_override: Option<&Path>) -> Result<FileConfig> {
    let path = match file_override {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let file = toml::from_str(&contents)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(file)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secret(name: &str) -> Option<SecretString> {
    env_string(name).map(SecretString::from)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    env_string(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| Error::Config(format!("{name} has invalid value {value:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            telegram_token: SecretString::from("token".to_string()),
            provider: ProviderKind::OpenAi,
            keys: ApiKeys::default(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            system_prompt: "be brief".to_string(),
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(60_000),
                max_requests: 10,
            },
            max_exchanges: 10,
            news: NewsConfig {
                api_key: None,
                base_url: "https://newsapi.org".to_string(),
                cache_ttl: Duration::from_secs(300),
                page_size: 10,
            },
            poll_retry: Duration::from_millis(2_000),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_limit_is_allowed() {
        let mut config = base_config();
        config.rate_limit.max_requests = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_window_is_fatal() {
        let mut config = base_config();
        config.rate_limit.window = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_exchanges_is_fatal() {
        let mut config = base_config();
        config.max_exchanges = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_is_fatal() {
        let mut config = base_config();
        config.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_config_parses_full_document() {
        let file: FileConfig = toml::from_str(
            r#"
            provider = "anthropic"
            model = "claude-3-5-haiku-latest"
            max_tokens = 512
            temperature = 0.3
            system_prompt = "terse"
            poll_retry_ms = 1500

            [rate_limit]
            window_ms = 30000
            max_requests = 5

            [history]
            max_exchanges = 4

            [news]
            cache_ttl_secs = 120
            page_size = 8
            "#,
        )
        .unwrap();

        assert_eq!(file.provider.as_deref(), Some("anthropic"));
        assert_eq!(file.rate_limit.window_ms, Some(30_000));
        assert_eq!(file.rate_limit.max_requests, Some(5));
        assert_eq!(file.history.max_exchanges, Some(4));
        assert_eq!(file.news.cache_ttl_secs, Some(120));
        assert_eq!(file.poll_retry_ms, Some(1_500));
    }

    #[test]
    fn empty_file_config_is_fine() {
        let file: FileConfig = toml::from_str("").unwrap();
        assert!(file.provider.is_none());
        assert!(file.rate_limit.window_ms.is_none());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("webhook_url = \"x\"").is_err());
    }
}

//! Finch - Telegram chatbot bridging chat-completion APIs
//!
//! This library provides the core functionality for the Finch bot:
//! - Per-user sliding-window rate limiting and bounded conversation history
//! - Telegram channel adapter (long-polling Bot API)
//! - Chat-completion provider adapters (OpenAI, Anthropic, OpenRouter)
//! - Market-news interception with keyword sentiment scoring
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Telegram Bot API                    │
//! │        getUpdates polling  │  sendMessage           │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Dispatcher                         │
//! │  Commands │ RateLimiter │ News+Sentiment │ History  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Chat-completion provider                  │
//! │     OpenAI  │  Anthropic  │  OpenRouter             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod history;
pub mod limits;
pub mod news;
pub mod providers;

pub use config::Config;
pub use daemon::{Daemon, Dispatcher};
pub use error::{Error, Result};
pub use history::{ConversationStore, Role, StoreStats, Turn};
pub use limits::{LimiterStats, RateLimiter};
pub use news::{Article, NewsService, Sentiment, SentimentReport};
pub use providers::{ChatProvider, ProviderKind};

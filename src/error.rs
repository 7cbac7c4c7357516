//! Error types for the Finch bot

use thiserror::Error;

/// Result type alias for Finch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Finch bot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Chat-completion provider error
    #[error("provider error: {0}")]
    Provider(String),

    /// News service error
    #[error("news error: {0}")]
    News(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

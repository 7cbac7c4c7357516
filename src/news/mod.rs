//! Market news fetching and caching
//!
//! A thin client for a NewsAPI-style REST service. Responses are cached per
//! query key with a TTL so repeated questions inside the cache window never
//! hit the wire, and headlines can be narrowed with substring filters.

pub mod sentiment;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mini_moka::sync::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::NewsConfig;
use crate::{Error, Result};

pub use sentiment::{Sentiment, SentimentReport};

/// Request timeout for news fetches
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Cache capacity; query keys are few (one per distinct topic)
const CACHE_CAPACITY: u64 = 64;

/// A normalized news article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Headline text
    pub title: String,
    /// Publishing outlet
    pub source: String,
    /// Link to the story
    pub url: String,
    /// Optional summary paragraph
    pub description: Option<String>,
    /// Publication timestamp when the service provides one
    pub published_at: Option<DateTime<Utc>>,
}

/// Client for a NewsAPI-compatible service with a TTL response cache
pub struct NewsService {
    client: Client,
    api_key: SecretString,
    base_url: String,
    page_size: usize,
    cache: Cache<String, Arc<Vec<Article>>>,
}

impl NewsService {
    /// Create a service from config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key is missing.
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("NEWS_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.clone(),
            page_size: config.page_size,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(config.cache_ttl)
                .build(),
        })
    }

    /// Fetch headlines, optionally narrowed to a topic.
    ///
    /// Topic-less calls return business top-headlines; topical calls search
    /// the everything endpoint sorted by recency. Results are cached per
    /// normalized topic for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service reports one.
    pub async fn headlines(&self, topic: Option<&str>) -> Result<Arc<Vec<Article>>> {
        let key = topic.map_or_else(|| "top".to_string(), str::to_lowercase);

        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(topic = %key, "news cache hit");
            return Ok(cached);
        }

        let articles = Arc::new(self.fetch(topic).await?);
        self.cache.insert(key, Arc::clone(&articles));
        Ok(articles)
    }

    async fn fetch(&self, topic: Option<&str>) -> Result<Vec<Article>> {
        let page_size = self.page_size.to_string();
        let (path, params) = match topic {
            Some(query) => (
                "/v2/everything",
                vec![
                    ("q", query.to_string()),
                    ("sortBy", "publishedAt".to_string()),
                    ("language", "en".to_string()),
                    ("pageSize", page_size),
                ],
            ),
            None => (
                "/v2/top-headlines",
                vec![
                    ("category", "business".to_string()),
                    ("language", "en".to_string()),
                    ("pageSize", page_size),
                ],
            ),
        };

        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("X-Api-Key", self.api_key.expose_secret())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::News(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::News(format!("response read failed: {e}")))?;

        if !status.is_success() {
            return Err(Error::News(format!("service returned {status}: {body}")));
        }

        let articles = parse_articles(&body)?;
        tracing::debug!(count = articles.len(), topic = ?topic, "news fetched");
        Ok(articles)
    }
}

/// Keep only articles whose title or description contains every term,
/// case-insensitively.
#[must_use]
pub fn filter_by_terms(articles: &[Article], terms: &str) -> Vec<Article> {
    let needles: Vec<String> = terms
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    if needles.is_empty() {
        return articles.to_vec();
    }

    articles
        .iter()
        .filter(|article| {
            let haystack = format!(
                "{} {}",
                article.title.to_lowercase(),
                article.description.as_deref().unwrap_or("").to_lowercase()
            );
            needles.iter().all(|needle| haystack.contains(needle))
        })
        .cloned()
        .collect()
}

/// Parse a NewsAPI-style response body into articles.
///
/// Entries without a usable title (including the service's `[Removed]`
/// placeholders) are skipped.
fn parse_articles(body: &str) -> Result<Vec<Article>> {
    let raw: RawResponse =
        serde_json::from_str(body).map_err(|e| Error::News(format!("bad response body: {e}")))?;

    if raw.status != "ok" {
        let message = raw.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(Error::News(format!("service error: {message}")));
    }

    let articles = raw
        .articles
        .into_iter()
        .filter(|a| !a.title.trim().is_empty() && a.title != "[Removed]")
        .map(|a| Article {
            title: a.title,
            source: a.source.name,
            url: a.url,
            description: a.description.filter(|d| !d.trim().is_empty()),
            published_at: a.published_at,
        })
        .collect();

    Ok(articles)
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    source: RawSource,
    title: String,
    #[serde(default)]
    description: Option<String>,
    url: String,
    #[serde(rename = "publishedAt", default)]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: String,
}

//! Daemon - the bot service
//!
//! Wires the Telegram channel, rate limiter, conversation store, provider,
//! and news service together, then dispatches inbound messages one at a
//! time until shut down.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;

use crate::channels::telegram::BotCommand;
use crate::channels::{Channel, IncomingMessage, OutgoingMessage, TelegramChannel};
use crate::commands::{self, Command, Route};
use crate::config::Config;
use crate::history::ConversationStore;
use crate::limits::RateLimiter;
use crate::news::{self, Article, NewsService, SentimentReport};
use crate::providers::{self, ChatProvider};
use crate::Result;

/// Shown when the provider call fails
const APOLOGY: &str =
    "Sorry, I'm having trouble thinking right now. Please try again in a moment.";

/// Shown when the news fetch fails
const NEWS_APOLOGY: &str = "Couldn't fetch the news right now. Please try again later.";

/// Headlines included in a news reply
const NEWS_REPLY_COUNT: usize = 5;

/// The Finch daemon - owns configuration and runs the dispatch loop
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the bot until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if startup wiring fails; runtime message errors are
    /// logged and do not stop the loop.
    pub async fn run(self) -> Result<()> {
        let token = self.config.telegram_token.expose_secret().to_string();
        let (mut channel, mut rx) = TelegramChannel::with_receiver(token);
        channel.connect().await?;

        let menu: Vec<BotCommand> = commands::MENU
            .iter()
            .map(|(command, description)| BotCommand {
                command: (*command).to_string(),
                description: (*description).to_string(),
            })
            .collect();
        if let Err(e) = channel.register_commands(&menu).await {
            tracing::warn!(error = %e, "failed to register command menu");
        }

        let poll_handle = channel.start_polling(self.config.poll_retry);

        let limiter = Arc::new(RateLimiter::new(
            self.config.rate_limit.max_requests,
            self.config.rate_limit.window,
        ));
        limiter.spawn_sweeper();

        let store = Arc::new(ConversationStore::new(self.config.max_exchanges));
        let provider = providers::build(&self.config)?;

        let news = if self.config.news.api_key.is_some() {
            Some(NewsService::new(&self.config.news)?)
        } else {
            tracing::info!("NEWS_API_KEY not set; news interception disabled");
            None
        };

        tracing::info!(
            provider = provider.name(),
            model = %self.config.model,
            limit = self.config.rate_limit.max_requests,
            window = ?self.config.rate_limit.window,
            "finch ready"
        );

        let dispatcher = Dispatcher::new(
            channel,
            Arc::clone(&limiter),
            store,
            provider,
            news,
            self.config.system_prompt.clone(),
        );

        // One message at a time; a slow provider call delays the next
        // message rather than racing it
        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(msg) => dispatcher.dispatch(msg).await,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
            }
        }

        limiter.stop();
        poll_handle.abort();

        let Dispatcher { mut channel, .. } = dispatcher;
        channel.disconnect().await?;
        Ok(())
    }
}

/// Routes inbound messages to commands, the news path, or the model.
///
/// Generic over the channel (and holding a boxed provider) so tests can
/// substitute mocks for both.
pub struct Dispatcher<C: Channel> {
    channel: C,
    limiter: Arc<RateLimiter>,
    store: Arc<ConversationStore>,
    provider: Box<dyn ChatProvider>,
    news: Option<NewsService>,
    system_prompt: String,
}

impl<C: Channel> Dispatcher<C> {
    /// Assemble a dispatcher from its parts
    #[must_use]
    pub fn new(
        channel: C,
        limiter: Arc<RateLimiter>,
        store: Arc<ConversationStore>,
        provider: Box<dyn ChatProvider>,
        news: Option<NewsService>,
        system_prompt: String,
    ) -> Self {
        Self {
            channel,
            limiter,
            store,
            provider,
            news,
            system_prompt,
        }
    }

    /// Handle one inbound message to completion.
    ///
    /// Never fails; errors are logged and turned into user-facing notices.
    pub async fn dispatch(&self, msg: IncomingMessage) {
        tracing::info!(
            sender = %msg.sender_name,
            chat = %msg.chat_id,
            dm = msg.is_dm,
            "message received"
        );

        match commands::route(&msg.text) {
            Route::Command(command) => self.handle_command(command, &msg).await,
            Route::Market { topic } => {
                if !self.acquire_or_notify(&msg).await {
                    return;
                }
                if self.news.is_some() {
                    self.handle_news(topic.as_deref(), &msg).await;
                } else {
                    // Without a news key the question still deserves an
                    // answer; let the model have it
                    self.handle_chat(&msg).await;
                }
            }
            Route::Chat => {
                if self.acquire_or_notify(&msg).await {
                    self.handle_chat(&msg).await;
                }
            }
        }
    }

    /// Gate a request on the rate limiter, notifying the user when denied.
    async fn acquire_or_notify(&self, msg: &IncomingMessage) -> bool {
        if self.limiter.try_acquire(&msg.sender_id) {
            return true;
        }

        let wait = self.limiter.time_until_reset(&msg.sender_id);
        tracing::debug!(sender = %msg.sender_id, ?wait, "rate limited");
        self.send(OutgoingMessage::reply(
            msg.chat_id.clone(),
            throttle_notice(wait),
            msg.id.clone(),
        ))
        .await;
        false
    }

    async fn handle_command(&self, command: Command, msg: &IncomingMessage) {
        match command {
            Command::Start => {
                self.send(OutgoingMessage::text(
                    msg.chat_id.clone(),
                    start_text(&msg.sender_name),
                ))
                .await;
            }
            Command::Help => {
                self.send(OutgoingMessage::text(msg.chat_id.clone(), help_text()))
                    .await;
            }
            Command::Clear => {
                let text = if self.store.clear(&msg.sender_id) {
                    "Conversation history cleared. We're starting fresh."
                } else {
                    "Nothing to clear; we haven't talked yet."
                };
                self.send(OutgoingMessage::text(msg.chat_id.clone(), text)).await;
            }
            Command::Stats => {
                let text = format_stats(
                    self.limiter.remaining_requests(&msg.sender_id),
                    self.limiter.limit(),
                    self.limiter.stats(),
                    self.store.stats(),
                );
                self.send(OutgoingMessage::text(msg.chat_id.clone(), text)).await;
            }
            Command::News { topic } => {
                if self.acquire_or_notify(msg).await {
                    self.handle_news(topic.as_deref(), msg).await;
                }
            }
            Command::Unknown(name) => {
                self.send(OutgoingMessage::text(
                    msg.chat_id.clone(),
                    format!("Unknown command /{name}. Try /help."),
                ))
                .await;
            }
        }
    }

    async fn handle_news(&self, topic: Option<&str>, msg: &IncomingMessage) {
        let Some(service) = &self.news else {
            self.send(OutgoingMessage::text(
                msg.chat_id.clone(),
                "The news service is not configured.",
            ))
            .await;
            return;
        };

        self.typing(&msg.chat_id).await;

        match service.headlines(topic).await {
            Ok(articles) => {
                let list = narrow(&articles, topic);
                if list.is_empty() {
                    let text = topic.map_or_else(
                        || "No recent headlines found.".to_string(),
                        |t| format!("No recent headlines found about {t}."),
                    );
                    self.send(OutgoingMessage::text(msg.chat_id.clone(), text)).await;
                    return;
                }

                let report = news::sentiment::score(
                    list.iter()
                        .flat_map(|a| [a.title.as_str()].into_iter().chain(a.description.as_deref())),
                );
                let text = format_news_reply(topic, &list, &report);
                self.send(OutgoingMessage::reply(
                    msg.chat_id.clone(),
                    text,
                    msg.id.clone(),
                ))
                .await;
            }
            Err(e) => {
                tracing::error!(error = %e, topic = ?topic, "news fetch failed");
                self.send(OutgoingMessage::text(msg.chat_id.clone(), NEWS_APOLOGY))
                    .await;
            }
        }
    }

    async fn handle_chat(&self, msg: &IncomingMessage) {
        self.typing(&msg.chat_id).await;

        let history = self.store.history(&msg.sender_id);
        match self
            .provider
            .complete(&self.system_prompt, &history, &msg.text)
            .await
        {
            Ok(reply) => {
                self.store.append_exchange(&msg.sender_id, &msg.text, &reply);
                self.send(OutgoingMessage::reply(
                    msg.chat_id.clone(),
                    reply,
                    msg.id.clone(),
                ))
                .await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    provider = self.provider.name(),
                    "completion failed"
                );
                self.send(OutgoingMessage::text(msg.chat_id.clone(), APOLOGY)).await;
            }
        }
    }

    async fn typing(&self, chat_id: &str) {
        if let Err(e) = self.channel.send_typing(chat_id).await {
            tracing::debug!(error = %e, "typing indicator failed");
        }
    }

    async fn send(&self, message: OutgoingMessage) {
        if let Err(e) = self.channel.send(message).await {
            tracing::error!(error = %e, "send failed");
        }
    }
}

/// Keep topic-filtered headlines when the filter still matches something;
/// the service already queried server-side, so an empty local match falls
/// back to the full batch.
fn narrow(articles: &[Article], topic: Option<&str>) -> Vec<Article> {
    match topic {
        Some(terms) => {
            let filtered = news::filter_by_terms(articles, terms);
            if filtered.is_empty() {
                articles.to_vec()
            } else {
                filtered
            }
        }
        None => articles.to_vec(),
    }
}

fn throttle_notice(wait: Duration) -> String {
    let minutes = wait.as_secs().div_ceil(60).max(1);
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!(
        "\u{23F3} You're sending messages too quickly. Please retry in about {minutes} {unit}."
    )
}

fn start_text(name: &str) -> String {
    format!(
        "Hi {name}! I'm Finch. Ask me anything and I'll answer; ask about \
         news or investments and I'll bring fresh headlines with a market \
         mood read. See /help for commands."
    )
}

fn help_text() -> String {
    let mut text = String::from("Here's what I can do:\n");
    for (command, description) in commands::MENU {
        text.push_str(&format!("/{command} \u{2014} {description}\n"));
    }
    text.push_str("\nAnything else you send goes straight to the model.");
    text
}

fn format_stats(
    remaining: usize,
    limit: usize,
    limiter: crate::limits::LimiterStats,
    store: crate::history::StoreStats,
) -> String {
    format!(
        "\u{1F4CA} **Usage**\n\
         Your requests left this window: {remaining}/{limit}\n\
         Active users: {}\n\
         Requests in current windows: {}\n\
         Conversations held: {} ({} turns)",
        limiter.active_users, limiter.total_requests, store.active_users, store.total_turns
    )
}

fn format_news_reply(
    topic: Option<&str>,
    articles: &[Article],
    report: &SentimentReport,
) -> String {
    let mut text = String::new();

    match topic {
        Some(t) => text.push_str(&format!("**Latest on {t}**\n")),
        None => text.push_str("**Latest market headlines**\n"),
    }

    text.push_str(&format!(
        "{} Mood: {} (score {:+.2}; {} bullish / {} bearish signals)\n\n",
        report.sentiment.emoji(),
        report.sentiment,
        report.score,
        report.bullish_hits,
        report.bearish_hits
    ));

    for article in articles.iter().take(NEWS_REPLY_COUNT) {
        text.push_str(&format!(
            "\u{2022} [{}]({}) \u{2014} {}\n",
            article.title, article.url, article.source
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::Sentiment;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            source: "Wire".to_string(),
            url: "https://example.com".to_string(),
            description: None,
            published_at: None,
        }
    }

    #[test]
    fn throttle_notice_rounds_up_to_minutes() {
        assert!(throttle_notice(Duration::from_secs(61)).contains("2 minutes"));
        assert!(throttle_notice(Duration::from_secs(60)).contains("1 minute."));
        assert!(throttle_notice(Duration::from_secs(5)).contains("1 minute."));
        assert!(throttle_notice(Duration::ZERO).contains("1 minute."));
    }

    #[test]
    fn help_lists_every_menu_command() {
        let help = help_text();
        for (command, _) in commands::MENU {
            assert!(help.contains(&format!("/{command}")), "missing /{command}");
        }
    }

    #[test]
    fn news_reply_caps_headline_count() {
        let articles: Vec<Article> = (0..10).map(|i| article(&format!("headline {i}"))).collect();
        let report = news::sentiment::score(articles.iter().map(|a| a.title.as_str()));
        let reply = format_news_reply(None, &articles, &report);

        assert_eq!(reply.matches('\u{2022}').count(), NEWS_REPLY_COUNT);
        assert!(reply.contains("Latest market headlines"));
    }

    #[test]
    fn news_reply_mentions_topic_and_mood() {
        let articles = vec![article("Shares surge on strong profits")];
        let report = news::sentiment::score(articles.iter().map(|a| a.title.as_str()));
        let reply = format_news_reply(Some("acme"), &articles, &report);

        assert!(reply.contains("Latest on acme"));
        assert!(reply.contains("bullish"));
        assert_eq!(report.sentiment, Sentiment::Bullish);
    }

    #[test]
    fn narrow_falls_back_when_filter_empties() {
        let articles = vec![article("Oil prices climb")];
        assert_eq!(narrow(&articles, Some("zzz")).len(), 1);
        assert_eq!(narrow(&articles, Some("oil")).len(), 1);
        assert_eq!(narrow(&articles, None).len(), 1);
    }
}

//! Bot command parsing and message routing
//!
//! Decides what an inbound message is: a slash command, a market/news
//! question worth intercepting, or plain chat for the model.

/// Commands registered in Telegram's command menu
pub const MENU: &[(&str, &str)] = &[
    ("start", "Introduce the bot"),
    ("help", "List available commands"),
    ("news", "Market headlines and sentiment, optionally for a topic"),
    ("clear", "Forget our conversation so far"),
    ("stats", "Usage and rate-limit snapshot"),
];

/// Keywords that flag a message as a news question
const NEWS_TRIGGERS: &[&str] = &["news", "headline", "headlines"];

/// Keywords that flag a message as an investment question
const MARKET_TRIGGERS: &[&str] = &[
    "invest",
    "investment",
    "investing",
    "stock",
    "stocks",
    "share",
    "shares",
    "market",
    "markets",
    "etf",
    "portfolio",
    "crypto",
    "bitcoin",
    "ethereum",
    "nasdaq",
    "dow",
];

/// Trigger and filler words stripped when extracting a topic from a
/// heuristic match; the single letters absorb contraction remnants left by
/// the word splitter ("what's" → "what", "s")
const TOPIC_STOPWORDS: &[&str] = &[
    "a", "about", "any", "anything", "are", "can", "d", "do", "for", "give", "got", "have",
    "how", "i", "in", "is", "latest", "ll", "m", "me", "of", "on", "please", "re", "recent",
    "s", "should", "show", "t", "tell", "the", "there", "today", "us", "ve", "what", "whats",
    "you",
];

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/clear`
    Clear,
    /// `/stats`
    Stats,
    /// `/news [topic]`
    News {
        /// Optional topic filter following the command
        topic: Option<String>,
    },
    /// Any other `/something`
    Unknown(String),
}

impl Command {
    /// Parse `text` as a slash command.
    ///
    /// Accepts the `/cmd@botname` form Telegram produces in group chats.
    /// Returns `None` when the text is not a command at all.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let rest = trimmed.strip_prefix('/')?;
        if rest.is_empty() {
            return None;
        }

        let mut words = rest.split_whitespace();
        let head = words.next()?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let argument = words.collect::<Vec<_>>().join(" ");

        let command = match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "clear" => Self::Clear,
            "stats" => Self::Stats,
            "news" => Self::News {
                topic: (!argument.is_empty()).then_some(argument),
            },
            _ => Self::Unknown(name),
        };

        Some(command)
    }
}

/// Where an inbound message should be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A slash command
    Command(Command),
    /// A news/investment question, intercepted before the model
    Market {
        /// Topic terms extracted from the message, if any survive
        topic: Option<String>,
    },
    /// Everything else goes to the chat model
    Chat,
}

/// Classify an inbound message.
#[must_use]
pub fn route(text: &str) -> Route {
    if let Some(command) = Command::parse(text) {
        return Route::Command(command);
    }

    if looks_like_market_query(text) {
        return Route::Market {
            topic: extract_topic(text),
        };
    }

    Route::Chat
}

/// Keyword heuristic for news/investment questions.
///
/// Matches whole words only, so "newspaper" or "stockholm" do not trigger.
#[must_use]
pub fn looks_like_market_query(text: &str) -> bool {
    words_of(text).any(|word| {
        NEWS_TRIGGERS.contains(&word.as_str()) || MARKET_TRIGGERS.contains(&word.as_str())
    })
}

/// Pull topic terms out of a heuristic match by dropping trigger words and
/// conversational filler. Returns `None` when nothing substantive remains.
fn extract_topic(text: &str) -> Option<String> {
    let terms: Vec<String> = words_of(text)
        .filter(|word| {
            !NEWS_TRIGGERS.contains(&word.as_str())
                && !MARKET_TRIGGERS.contains(&word.as_str())
                && !TOPIC_STOPWORDS.contains(&word.as_str())
        })
        .collect();

    (!terms.is_empty()).then(|| terms.join(" "))
}

fn words_of(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

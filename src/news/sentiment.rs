//! Keyword-count sentiment scoring for headlines
//!
//! A fixed-vocabulary heuristic: count bullish and bearish words across a
//! batch of texts and reduce to a score in [-1, 1]. No weighting, no
//! negation handling; headlines are short enough that raw counts track the
//! overall tone.

use std::fmt;

/// Words counted as bullish signals
const BULLISH: &[&str] = &[
    "surge", "surges", "rally", "rallies", "gain", "gains", "soar", "soars", "jump", "jumps",
    "record", "beat", "beats", "growth", "profit", "profits", "upgrade", "upgraded", "bullish",
    "outperform", "rebound", "rebounds", "strong", "boost", "boosts", "optimism", "high",
    "climbs", "recovery",
];

/// Words counted as bearish signals
const BEARISH: &[&str] = &[
    "fall", "falls", "drop", "drops", "plunge", "plunges", "slump", "slumps", "loss", "losses",
    "crash", "crashes", "downgrade", "downgraded", "bearish", "miss", "misses", "decline",
    "declines", "fear", "fears", "recession", "layoff", "layoffs", "weak", "selloff", "low",
    "cut", "cuts", "warning", "tumbles", "slides",
];

/// Score thresholds for labelling
const LABEL_THRESHOLD: f64 = 0.2;

/// Overall tone of a headline batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    /// Bullish words dominate
    Bullish,
    /// Bearish words dominate
    Bearish,
    /// No clear signal either way
    Neutral,
}

impl Sentiment {
    /// Emoji used when rendering the label in chat
    #[must_use]
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Bullish => "\u{1F4C8}",
            Self::Bearish => "\u{1F4C9}",
            Self::Neutral => "\u{2796}",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        };
        f.write_str(label)
    }
}

/// Result of scoring a headline batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentReport {
    /// `(bullish - bearish) / (bullish + bearish)`, 0 when no hits
    pub score: f64,
    /// Bullish word occurrences
    pub bullish_hits: usize,
    /// Bearish word occurrences
    pub bearish_hits: usize,
    /// Label derived from the score
    pub sentiment: Sentiment,
}

/// Score a batch of texts.
pub fn score<'a>(texts: impl IntoIterator<Item = &'a str>) -> SentimentReport {
    let mut bullish_hits = 0;
    let mut bearish_hits = 0;

    for text in texts {
        for word in words_of(text) {
            if BULLISH.contains(&word.as_str()) {
                bullish_hits += 1;
            } else if BEARISH.contains(&word.as_str()) {
                bearish_hits += 1;
            }
        }
    }

    let total = bullish_hits + bearish_hits;
    #[allow(clippy::cast_precision_loss)]
    let score = if total == 0 {
        0.0
    } else {
        (bullish_hits as f64 - bearish_hits as f64) / total as f64
    };

    let sentiment = if score >= LABEL_THRESHOLD {
        Sentiment::Bullish
    } else if score <= -LABEL_THRESHOLD {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    };

    SentimentReport {
        score,
        bullish_hits,
        bearish_hits,
        sentiment,
    }
}

fn words_of(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

//! Retry with exponential backoff for Telegram Bot API calls

use std::time::{Duration, SystemTime};

/// Retry policy for Telegram Bot API calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts beyond the first
    pub max_retries: u32,
    /// Base delay, doubled each attempt
    pub base_delay: Duration,
    /// Delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Whether an HTTP status is worth retrying: rate limits (429) and server
/// errors (5xx).
#[must_use]
pub fn is_recoverable(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Extract the `retry_after` hint from a Telegram error body.
///
/// Telegram encodes the value in seconds at `parameters.retry_after`;
/// returns `None` when absent or the body is not JSON.
#[must_use]
pub fn parse_retry_after(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let seconds = value.get("parameters")?.get("retry_after")?.as_u64()?;
    Some(Duration::from_secs(seconds))
}

/// Delay before the next attempt.
///
/// A server-provided `retry_after` wins (capped at `max_delay`); otherwise
/// exponential backoff with 0-25% jitter derived from subsecond clock
/// nanos, which avoids pulling in a random number generator.
#[must_use]
pub fn delay_for_attempt(
    policy: &RetryPolicy,
    attempt: u32,
    retry_after: Option<Duration>,
) -> Duration {
    if let Some(hint) = retry_after {
        return hint.min(policy.max_delay);
    }

    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let jitter = base.mul_f64(f64::from(jitter_nanos % 250) / 1000.0);

    (base + jitter).min(policy.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_recoverable() {
        assert!(is_recoverable(429));
        assert!(is_recoverable(500));
        assert!(is_recoverable(503));
        assert!(is_recoverable(599));
    }

    #[test]
    fn client_errors_are_not_recoverable() {
        assert!(!is_recoverable(400));
        assert!(!is_recoverable(403));
        assert!(!is_recoverable(404));
        assert!(!is_recoverable(200));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let body = r#"{"ok":false,"error_code":429,"parameters":{"retry_after":17}}"#;
        assert_eq!(parse_retry_after(body), Some(Duration::from_secs(17)));
    }

    #[test]
    fn missing_retry_after_is_none() {
        assert_eq!(parse_retry_after(r#"{"ok":false}"#), None);
        assert_eq!(parse_retry_after("not json"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn retry_after_hint_wins_but_is_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(
            delay_for_attempt(&policy, 0, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            delay_for_attempt(&policy, 0, Some(Duration::from_secs(60))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn backoff_grows_and_respects_cap() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            ..RetryPolicy::default()
        };

        let d0 = delay_for_attempt(&policy, 0, None);
        let d2 = delay_for_attempt(&policy, 2, None);
        assert!(d0 >= Duration::from_millis(100));
        assert!(d2 >= Duration::from_millis(400));

        let capped = delay_for_attempt(&policy, 10, None);
        assert!(capped <= policy.max_delay);
    }

    #[test]
    fn jitter_stays_under_a_quarter_of_base() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            ..RetryPolicy::default()
        };

        for _ in 0..50 {
            let d = delay_for_attempt(&policy, 0, None);
            assert!(d >= Duration::from_millis(1000));
            assert!(d <= Duration::from_millis(1250));
        }
    }
}

//! Dispatch integration tests
//!
//! Drives the message flow end to end with a mock channel and a mock
//! provider: command handling, rate-limit gating, news fallback, and
//! history bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use finch_bot::channels::{Channel, IncomingMessage, OutgoingMessage};
use finch_bot::providers::ChatProvider;
use finch_bot::{ConversationStore, Dispatcher, Error, RateLimiter, Result, Turn};
use tokio::sync::Mutex;

/// Mock channel recording every sent message
struct MockChannel {
    connected: bool,
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
}

impl MockChannel {
    fn new(sent: Arc<Mutex<Vec<OutgoingMessage>>>) -> Self {
        Self {
            connected: true,
            sent,
        }
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Mock provider with a canned reply, recording what it was asked
struct MockProvider {
    reply: String,
    fail: bool,
    calls: Arc<Mutex<Vec<(usize, String)>>>,
}

impl MockProvider {
    fn new(reply: &str, calls: Arc<Mutex<Vec<(usize, String)>>>) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            calls,
        }
    }

    fn failing(calls: Arc<Mutex<Vec<(usize, String)>>>) -> Self {
        Self {
            reply: String::new(),
            fail: true,
            calls,
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, _system: &str, history: &[Turn], user_text: &str) -> Result<String> {
        self.calls
            .lock()
            .await
            .push((history.len(), user_text.to_string()));

        if self.fail {
            return Err(Error::Provider("mock outage".to_string()));
        }
        Ok(self.reply.clone())
    }
}

struct Harness {
    dispatcher: Dispatcher<MockChannel>,
    store: Arc<ConversationStore>,
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    calls: Arc<Mutex<Vec<(usize, String)>>>,
}

fn harness(limit: usize, provider_fails: bool) -> Harness {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Mutex::new(Vec::new()));

    let channel = MockChannel::new(Arc::clone(&sent));
    let provider: Box<dyn ChatProvider> = if provider_fails {
        Box::new(MockProvider::failing(Arc::clone(&calls)))
    } else {
        Box::new(MockProvider::new("canned reply", Arc::clone(&calls)))
    };

    let limiter = Arc::new(RateLimiter::new(limit, Duration::from_secs(60)));
    let store = Arc::new(ConversationStore::new(5));

    let dispatcher = Dispatcher::new(
        channel,
        limiter,
        Arc::clone(&store),
        provider,
        None,
        "be brief".to_string(),
    );

    Harness {
        dispatcher,
        store,
        sent,
        calls,
    }
}

fn message(text: &str) -> IncomingMessage {
    IncomingMessage {
        id: "1".to_string(),
        chat_id: "100".to_string(),
        sender_id: "42".to_string(),
        sender_name: "Ada".to_string(),
        text: text.to_string(),
        is_dm: true,
    }
}

#[tokio::test]
async fn chat_message_gets_model_reply_and_history() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("tell me a story")).await;

    let sent = h.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "canned reply");
    assert_eq!(sent[0].reply_to.as_deref(), Some("1"));

    let history = h.store.history("42");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], Turn::user("tell me a story"));
    assert_eq!(history[1], Turn::assistant("canned reply"));
}

#[tokio::test]
async fn second_message_carries_prior_turns() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("first")).await;
    h.dispatcher.dispatch(message("second")).await;

    let calls = h.calls.lock().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], (0, "first".to_string()));
    assert_eq!(calls[1], (2, "second".to_string()));
}

#[tokio::test]
async fn over_limit_messages_get_a_throttle_notice() {
    let h = harness(1, false);

    h.dispatcher.dispatch(message("one")).await;
    h.dispatcher.dispatch(message("two")).await;

    let sent = h.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text, "canned reply");
    assert!(sent[1].text.contains("too quickly"), "got: {}", sent[1].text);

    // The throttled message never reached the provider
    assert_eq!(h.calls.lock().await.len(), 1);
}

#[tokio::test]
async fn commands_bypass_the_rate_limit() {
    let h = harness(0, false);

    h.dispatcher.dispatch(message("/help")).await;

    let sent = h.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("/news"));
    assert!(h.calls.lock().await.is_empty());
}

#[tokio::test]
async fn clear_command_wipes_history() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("remember this")).await;
    assert_eq!(h.store.history("42").len(), 2);

    h.dispatcher.dispatch(message("/clear")).await;
    assert!(h.store.history("42").is_empty());

    let sent = h.sent.lock().await;
    assert!(sent[1].text.to_lowercase().contains("cleared"));
}

#[tokio::test]
async fn clear_with_no_history_says_so() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("/clear")).await;

    let sent = h.sent.lock().await;
    assert!(sent[0].text.contains("haven't talked"));
}

#[tokio::test]
async fn stats_command_reports_usage() {
    let h = harness(5, false);

    h.dispatcher.dispatch(message("hello")).await;
    h.dispatcher.dispatch(message("/stats")).await;

    let sent = h.sent.lock().await;
    let stats = &sent[1].text;
    assert!(stats.contains("4/5"), "got: {stats}");
    assert!(stats.contains("Active users: 1"), "got: {stats}");
}

#[tokio::test]
async fn provider_failure_sends_apology_and_keeps_history_clean() {
    let h = harness(10, true);

    h.dispatcher.dispatch(message("hello")).await;

    let sent = h.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("trouble"), "got: {}", sent[0].text);
    assert!(h.store.history("42").is_empty());
}

#[tokio::test]
async fn market_query_without_news_service_falls_back_to_chat() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("any news about tesla?")).await;

    let calls = h.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "any news about tesla?");
}

#[tokio::test]
async fn explicit_news_command_without_service_reports_unconfigured() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("/news tesla")).await;

    let sent = h.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("not configured"));
    assert!(h.calls.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_command_points_at_help() {
    let h = harness(10, false);

    h.dispatcher.dispatch(message("/frobnicate")).await;

    let sent = h.sent.lock().await;
    assert!(sent[0].text.contains("/help"));
    assert!(h.calls.lock().await.is_empty());
}

#[tokio::test]
async fn users_are_rate_limited_independently() {
    let h = harness(1, false);

    h.dispatcher.dispatch(message("from ada")).await;

    let mut other = message("from grace");
    other.sender_id = "43".to_string();
    other.sender_name = "Grace".to_string();
    h.dispatcher.dispatch(other).await;

    let sent = h.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text, "canned reply");
    assert_eq!(sent[1].text, "canned reply");
}

//! Per-user sliding-window rate limiting
//!
//! Each user accumulates request timestamps; a request is allowed while the
//! count of timestamps inside the trailing window stays below the limit.
//! Expired timestamps are pruned lazily on every read, and a background
//! sweeper reclaims entries for users that have gone quiet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Snapshot of limiter occupancy, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterStats {
    /// Users with at least one stored timestamp (expired or not)
    pub active_users: usize,
    /// Timestamps currently inside the window, summed across users
    pub total_requests: usize,
}

/// Sliding-window request limiter keyed by user ID
///
/// Constructed once at startup and shared by handle; the two-step
/// [`is_rate_limited`](Self::is_rate_limited) / [`record_request`](Self::record_request)
/// contract is kept for callers that only probe, while
/// [`try_acquire`](Self::try_acquire) performs both under one lock for the
/// dispatch path.
#[derive(Debug)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    limit: usize,
    window: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per `window` per user.
    ///
    /// A `limit` of zero refuses every request. The background sweeper is
    /// not started here; call [`spawn_sweeper`](Self::spawn_sweeper) from an
    /// async context once the owner is ready.
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
            sweeper: Mutex::new(None),
        }
    }

    /// Check whether `user_id` is currently over the limit.
    ///
    /// Prunes the user's expired timestamps in place, so repeated calls stay
    /// cheap even without the sweeper.
    pub fn is_rate_limited(&self, user_id: &str) -> bool {
        let mut map = lock(&self.requests);
        let Some(timestamps) = map.get_mut(user_id) else {
            return self.limit == 0;
        };

        let now = Instant::now();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        timestamps.len() >= self.limit
    }

    /// Record a request for `user_id` without enforcing the limit.
    pub fn record_request(&self, user_id: &str) {
        let mut map = lock(&self.requests);
        let timestamps = map.entry(user_id.to_string()).or_default();
        let now = Instant::now();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        timestamps.push(now);
    }

    /// Check and record in one step.
    ///
    /// Returns `true` and records the request if the user is under the
    /// limit; returns `false` and records nothing otherwise.
    pub fn try_acquire(&self, user_id: &str) -> bool {
        if self.limit == 0 {
            return false;
        }

        let mut map = lock(&self.requests);
        let timestamps = map.entry(user_id.to_string()).or_default();
        let now = Instant::now();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.limit {
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Requests `user_id` may still make inside the current window.
    pub fn remaining_requests(&self, user_id: &str) -> usize {
        let mut map = lock(&self.requests);
        let Some(timestamps) = map.get_mut(user_id) else {
            return self.limit;
        };

        let now = Instant::now();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        self.limit.saturating_sub(timestamps.len())
    }

    /// Time until the oldest stored request leaves the window.
    ///
    /// Zero when the user has no stored requests.
    pub fn time_until_reset(&self, user_id: &str) -> Duration {
        let mut map = lock(&self.requests);
        let Some(timestamps) = map.get_mut(user_id) else {
            return Duration::ZERO;
        };

        let now = Instant::now();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        // Appends are monotonic, so the first entry is the oldest
        timestamps.first().map_or(Duration::ZERO, |oldest| {
            (*oldest + self.window).saturating_duration_since(now)
        })
    }

    /// Prune expired timestamps for every user and drop empty entries.
    ///
    /// Runs periodically on the sweeper task; exposed so callers and tests
    /// can force a pass.
    pub fn sweep(&self) {
        let mut map = lock(&self.requests);
        let now = Instant::now();
        map.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.window);
            !timestamps.is_empty()
        });
    }

    /// Diagnostic snapshot of current occupancy.
    pub fn stats(&self) -> LimiterStats {
        let map = lock(&self.requests);
        let now = Instant::now();
        let total_requests = map
            .values()
            .map(|timestamps| {
                timestamps
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.window)
                    .count()
            })
            .sum();

        LimiterStats {
            active_users: map.len(),
            total_requests,
        }
    }

    /// Start the background sweeper, ticking once per window.
    ///
    /// Idempotent: a second call replaces the previous task. The task holds
    /// only the shared map, so stopping it never blocks request handling.
    pub fn spawn_sweeper(&self) {
        let requests = Arc::clone(&self.requests);
        let window = self.window;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(window);
            // The first tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut map = lock(&requests);
                let now = Instant::now();
                let before = map.len();
                map.retain(|_, timestamps| {
                    timestamps.retain(|t| now.duration_since(*t) < window);
                    !timestamps.is_empty()
                });
                let removed = before - map.len();
                drop(map);
                if removed > 0 {
                    tracing::debug!(removed, "rate limiter sweep reclaimed idle users");
                }
            }
        });

        if let Some(previous) = lock_sweeper(&self.sweeper).replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the background sweeper; used at shutdown.
    pub fn stop(&self) {
        if let Some(handle) = lock_sweeper(&self.sweeper).take() {
            handle.abort();
        }
    }

    /// Configured per-window request limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Configured window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(map: &Mutex<HashMap<String, Vec<Instant>>>) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Instant>>> {
    map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn lock_sweeper(slot: &Mutex<Option<JoinHandle<()>>>) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(!limiter.is_rate_limited("u1"));
            limiter.record_request("u1");
        }

        assert!(limiter.is_rate_limited("u1"));
    }

    #[test]
    fn zero_limit_always_limits() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        assert!(limiter.is_rate_limited("u1"));
        assert!(!limiter.try_acquire("u1"));
    }

    #[test]
    fn users_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("u1"));
        assert!(!limiter.try_acquire("u1"));
        assert!(limiter.try_acquire("u2"));
    }

    #[test]
    fn try_acquire_does_not_record_when_denied() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("u1"));
        assert!(!limiter.try_acquire("u1"));
        assert_eq!(limiter.stats().total_requests, 1);
    }

    #[test]
    fn remaining_decreases_to_zero() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert_eq!(limiter.remaining_requests("u1"), 2);
        limiter.record_request("u1");
        assert_eq!(limiter.remaining_requests("u1"), 1);
        limiter.record_request("u1");
        assert_eq!(limiter.remaining_requests("u1"), 0);
        limiter.record_request("u1");
        assert_eq!(limiter.remaining_requests("u1"), 0);
    }

    #[test]
    fn reset_time_zero_without_requests() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert_eq!(limiter.time_until_reset("u1"), Duration::ZERO);
    }

    #[test]
    fn reset_time_bounded_by_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        limiter.record_request("u1");
        let reset = limiter.time_until_reset("u1");
        assert!(reset > Duration::ZERO);
        assert!(reset <= Duration::from_secs(60));
    }

    #[test]
    fn window_expiry_unblocks() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        limiter.record_request("u1");
        limiter.record_request("u1");
        assert!(limiter.is_rate_limited("u1"));

        std::thread::sleep(Duration::from_millis(80));
        assert!(!limiter.is_rate_limited("u1"));
        assert_eq!(limiter.remaining_requests("u1"), 2);
    }

    #[test]
    fn sweep_drops_idle_users() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        limiter.record_request("u1");
        limiter.record_request("u2");
        assert_eq!(limiter.stats().active_users, 2);

        std::thread::sleep(Duration::from_millis(80));
        limiter.sweep();

        let stats = limiter.stats();
        assert_eq!(stats.active_users, 0);
        assert_eq!(stats.total_requests, 0);
    }

    #[test]
    fn sweep_keeps_users_with_valid_requests() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.record_request("u1");
        limiter.sweep();
        assert_eq!(limiter.stats().active_users, 1);
    }

    #[tokio::test]
    async fn sweeper_task_reclaims_in_background() {
        let limiter = RateLimiter::new(2, Duration::from_millis(30));
        limiter.record_request("u1");
        limiter.spawn_sweeper();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(limiter.stats().active_users, 0);

        limiter.stop();
    }
}

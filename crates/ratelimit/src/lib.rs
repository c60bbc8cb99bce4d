//! Per-key fixed-window rate limiting (§4.4).
//!
//! The contract is a single async `allow(key) -> bool`. This crate provides
//! the trait plus the single-process, in-memory variant; the distributed
//! (Redis-backed) variant lives in `saas-infra` since it needs a network
//! client, but shares the window-key format defined here.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Per-key, per-minute admission gate.
///
/// Implementations must guarantee: within any single wall-clock minute, at
/// most `limit` `allow` calls per key return `true` while the backing store
/// is healthy (§8, "Rate-window reset").
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, key: &str) -> Result<bool, RateLimitError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit backend unavailable: {0}")]
    Unavailable(String),
}

/// Minute-resolution fixed window, as an epoch count of whole minutes.
pub fn window_epoch_minute(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(60)
}

/// Seconds remaining until the current minute window rolls over; used to
/// size a distributed backend's key TTL (§4.4).
pub fn seconds_until_window_rolls(now: DateTime<Utc>) -> i64 {
    60 - now.timestamp().rem_euclid(60)
}

/// Redis (or any distributed store) window key format shared by both
/// variants: `"{prefix}:{window_epoch_minute}:{key}"`.
pub fn window_key(prefix: &str, now: DateTime<Utc>, key: &str) -> String {
    format!("{prefix}:{}:{key}", window_epoch_minute(now))
}

/// Single-process fixed-window limiter: an in-memory map guarded by a
/// mutex, `key -> (window_epoch_minute, count)` (§4.4).
pub struct InProcessRateLimiter {
    limit: u32,
    counters: Mutex<HashMap<String, (i64, u32)>>,
}

impl InProcessRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            limit: requests_per_minute.max(1),
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn allow_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let window = window_epoch_minute(now);
        let mut counters = self.counters.lock().expect("rate limiter poisoned");
        let entry = counters.entry(key.to_string()).or_insert((window, 0));
        if entry.0 != window {
            *entry = (window, 0);
        }
        if entry.1 >= self.limit {
            return false;
        }
        entry.1 += 1;
        true
    }
}

#[async_trait]
impl RateLimiter for InProcessRateLimiter {
    async fn allow(&self, key: &str) -> Result<bool, RateLimitError> {
        Ok(self.allow_at(key, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn admits_up_to_the_limit_then_denies() {
        let limiter = InProcessRateLimiter::new(2);
        assert!(limiter.allow("t1:agent").await.unwrap());
        assert!(limiter.allow("t1:agent").await.unwrap());
        assert!(!limiter.allow("t1:agent").await.unwrap());
    }

    #[test]
    fn window_resets_independent_of_prior_window() {
        let limiter = InProcessRateLimiter::new(1);
        let now = Utc::now();
        assert!(limiter.allow_at("k", now));
        assert!(!limiter.allow_at("k", now));
        let next_minute = now + Duration::seconds(60);
        assert!(limiter.allow_at("k", next_minute));
    }

    #[test]
    fn distinct_keys_have_independent_counters() {
        let limiter = InProcessRateLimiter::new(1);
        let now = Utc::now();
        assert!(limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }
}

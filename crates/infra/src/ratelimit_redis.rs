//! Redis-backed distributed rate limiter (optional, `redis` feature).
//!
//! Mirrors `event_bus::redis_pubsub`'s use of the synchronous `redis`
//! client: a blocking `INCR`+`EXPIRE` pair run on a blocking-pool thread so
//! the async trait never stalls the reactor. Grounded on
//! `policies/rate_limit.py`'s `RedisFixedWindowRateLimiter` (atomic
//! increment of a per-window key, `EXPIRE` sized to the window, fail-open
//! on backend errors per §4.4/§9).

use async_trait::async_trait;
use redis::Commands;

use saas_ratelimit::{window_key, RateLimitError, RateLimiter};

#[derive(Clone)]
pub struct DistributedRateLimiter {
    client: redis::Client,
    key_prefix: String,
    limit_per_minute: u32,
    fail_open: bool,
}

impl DistributedRateLimiter {
    pub fn new(
        redis_url: &str,
        key_prefix: impl Into<String>,
        limit_per_minute: u32,
        fail_open: bool,
    ) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(redis_url).map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
            limit_per_minute,
            fail_open,
        })
    }

    fn incr_and_check(&self, key: String) -> Result<bool, redis::RedisError> {
        let mut conn = self.client.get_connection()?;
        let count: u64 = conn.incr(&key, 1)?;
        if count == 1 {
            // First hit in this window: size the key's lifetime to it.
            let _: () = conn.expire(&key, 60)?;
        }
        Ok(count <= self.limit_per_minute as u64)
    }
}

#[async_trait]
impl RateLimiter for DistributedRateLimiter {
    async fn allow(&self, key: &str) -> Result<bool, RateLimitError> {
        let full_key = window_key(&self.key_prefix, chrono::Utc::now(), key);
        let this = self.clone();

        let result = tokio::task::spawn_blocking(move || this.incr_and_check(full_key))
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()));

        match result {
            Ok(Ok(allowed)) => Ok(allowed),
            Ok(Err(err)) if self.fail_open => {
                tracing::warn!(error = %err, "rate limit backend unavailable, failing open");
                Ok(true)
            }
            Ok(Err(err)) => Err(RateLimitError::Unavailable(err.to_string())),
            Err(err) if self.fail_open => {
                tracing::warn!(error = %err, "rate limit backend task failed, failing open");
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }
}

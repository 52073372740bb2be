//! Token bucket rate limiter for price providers.
//!
//! Each provider gets its own bucket with configurable capacity and refill rate,
//! plus a minimum spacing between consecutive grants so bursts never arrive
//! back to back faster than the provider tolerates.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::provider::RateLimit;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was refilled.
    last_update: Instant,
    /// Last time a token was handed out.
    last_grant: Option<Instant>,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
    min_spacing: Duration,
}

impl TokenBucket {
    fn with_config(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst.max(1));
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            last_grant: None,
            rate: f64::from(config.requests_per_minute.max(1)) / 60.0,
            capacity,
            min_spacing: config.min_spacing,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Time to wait before the next grant; zero means a token was taken.
    fn try_take(&mut self) -> Duration {
        let now = Instant::now();
        self.refill(now);

        let spacing_wait = self
            .last_grant
            .map(|last| (last + self.min_spacing).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        let token_wait = if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        };

        let wait = spacing_wait.max(token_wait);
        if wait.is_zero() {
            self.tokens -= 1.0;
            self.last_grant = Some(now);
        }
        wait
    }
}

/// Rate limiter configuration for a provider.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum requests per minute.
    pub requests_per_minute: u32,
    /// Maximum burst capacity.
    pub burst: u32,
    /// Minimum gap between two grants.
    pub min_spacing: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimit::default().into()
    }
}

impl From<RateLimit> for RateLimitConfig {
    fn from(limit: RateLimit) -> Self {
        Self {
            requests_per_minute: limit.requests_per_minute,
            burst: limit.burst,
            min_spacing: limit.min_delay,
        }
    }
}

/// Token bucket rate limiter for multiple providers.
///
/// Thread-safe rate limiter that maintains per-provider token buckets.
/// Buckets are created on demand from the registered configuration,
/// or from defaults when a provider was never configured.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    configs: Mutex<HashMap<String, RateLimitConfig>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is slightly inaccurate limiting.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimitConfig>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure rate limits for a specific provider, resetting its bucket.
    pub fn configure(&self, provider: &str, config: RateLimitConfig) {
        let mut configs = self.lock_configs();
        configs.insert(provider.to_string(), config);
        drop(configs);

        let mut buckets = self.lock_buckets();
        buckets.remove(provider);
    }

    /// Wait until the provider may be called again, then take a token.
    pub async fn acquire(&self, provider: &str) {
        loop {
            let wait_time = {
                let config = self.config_for(provider);
                let mut buckets = self.lock_buckets();
                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| TokenBucket::with_config(&config));
                bucket.try_take()
            };

            if wait_time.is_zero() {
                debug!("Rate limiter: acquired token for '{}'", provider);
                return;
            }

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, provider
            );
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Try to take a token without waiting.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let config = self.config_for(provider);
        let mut buckets = self.lock_buckets();
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::with_config(&config));
        bucket.try_take().is_zero()
    }

    pub fn reset(&self, provider: &str) {
        let mut buckets = self.lock_buckets();
        buckets.remove(provider);
    }

    fn config_for(&self, provider: &str) -> RateLimitConfig {
        self.lock_configs()
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rpm: u32, burst: u32, spacing_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: rpm,
            burst,
            min_spacing: Duration::from_millis(spacing_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_exhausted() {
        let limiter = RateLimiter::new();
        limiter.configure("BURST", config(60, 3, 0));

        for _ in 0..3 {
            assert!(limiter.try_acquire("BURST"));
        }
        assert!(!limiter.try_acquire("BURST"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_spacing_blocks_back_to_back_grants() {
        let limiter = RateLimiter::new();
        limiter.configure("SPACED", config(6000, 10, 200));

        assert!(limiter.try_acquire("SPACED"));
        // Tokens remain, but spacing has not elapsed.
        assert!(!limiter.try_acquire("SPACED"));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(limiter.try_acquire("SPACED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_spacing() {
        let limiter = RateLimiter::new();
        limiter.configure("WAIT", config(6000, 10, 250));

        let start = Instant::now();
        limiter.acquire("WAIT").await;
        limiter.acquire("WAIT").await;
        limiter.acquire("WAIT").await;

        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new();
        // One token per second, no burst headroom.
        limiter.configure("REFILL", config(60, 1, 0));

        let start = Instant::now();
        limiter.acquire("REFILL").await;
        limiter.acquire("REFILL").await;

        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_provider_isolation_and_reset() {
        let limiter = RateLimiter::new();
        limiter.configure("A", config(60, 1, 0));
        limiter.configure("B", config(60, 1, 0));

        assert!(limiter.try_acquire("A"));
        assert!(!limiter.try_acquire("A"));
        assert!(limiter.try_acquire("B"));

        limiter.reset("A");
        assert!(limiter.try_acquire("A"));
    }
}

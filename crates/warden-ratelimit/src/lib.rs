//! Warden Rate Limiter — per-key token-bucket throttling with bounded
//! memory (spec.md §4.2).
//!
//! [`RateLimiter::allow`] atomically checks, refills, and (if a token is
//! available) decrements a bucket addressed by an opaque string key.
//! Buckets are held in an LRU-bounded map so an unbounded set of keys
//! (e.g. one per remote user) cannot grow memory without limit.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::sync::Mutex;
use std::time::Instant;

use indexmap::IndexMap;

/// Burst capacity, in tokens, for a freshly created bucket.
pub const DEFAULT_MAX_TOKENS: f64 = 10.0;
/// Refill rate, tokens per second.
pub const DEFAULT_REFILL_RATE: f64 = 0.5;
/// Maximum number of distinct bucket keys held at once.
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Tunable parameters for a [`RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Burst capacity (maximum tokens a bucket can hold).
    pub max_tokens: f64,
    /// Refill rate, in tokens per second.
    pub refill_rate: f64,
    /// Maximum number of buckets kept before LRU eviction kicks in.
    pub max_buckets: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            refill_rate: DEFAULT_REFILL_RATE,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

/// A token-bucket rate limiter keyed by opaque string keys.
///
/// Each key's bucket is refilled lazily, only when accessed, by elapsed
/// wall-clock time times the configured refill rate, capped at
/// `max_tokens`. Past `max_buckets` distinct keys, the least-recently-used
/// bucket is evicted to make room (spec.md §4.2 "Sizing").
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: Mutex<IndexMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(IndexMap::new()),
        }
    }

    /// Create a limiter with spec.md §4.2 defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Check, refill, and (if possible) consume one token for `key`.
    ///
    /// Returns `true` and decrements the bucket if at least one token was
    /// available; returns `false` without changing the bucket otherwise.
    /// This check-refill-decrement sequence happens under a single lock
    /// acquisition, so it is atomic with respect to concurrent callers.
    pub fn allow(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        self.evict_if_needed(&mut buckets, key);

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.config.max_tokens,
            last_refill: now,
        });

        Self::refill(bucket, now, self.config.max_tokens, self.config.refill_rate);

        // Touch for LRU: move this key to the back (most-recently-used).
        if let Some(index) = buckets.get_index_of(key) {
            buckets.move_index(index, buckets.len() - 1);
        }

        let bucket = buckets.get_mut(key).expect("just inserted or touched");
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated seconds until one token becomes available for `key`.
    /// Returns `0.0` if a token is already available.
    #[must_use]
    pub fn retry_after(&self, key: &str) -> f64 {
        let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.config.max_tokens,
            last_refill: now,
        });
        Self::refill(bucket, now, self.config.max_tokens, self.config.refill_rate);

        if bucket.tokens >= 1.0 || self.config.refill_rate <= 0.0 {
            0.0
        } else {
            (1.0 - bucket.tokens) / self.config.refill_rate
        }
    }

    /// Number of distinct keys currently tracked.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    fn refill(bucket: &mut Bucket, now: Instant, max_tokens: f64, refill_rate: f64) {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(max_tokens);
        bucket.last_refill = now;
    }

    fn evict_if_needed(&self, buckets: &mut IndexMap<String, Bucket>, incoming_key: &str) {
        if buckets.len() < self.config.max_buckets || buckets.contains_key(incoming_key) {
            return;
        }
        // IndexMap insertion order doubles as recency order because
        // `allow`/`retry_after` move a touched key to the back; the
        // front is therefore the least-recently-used entry.
        buckets.shift_remove_index(0);
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_tokens", &self.config.max_tokens)
            .field("refill_rate", &self.config.refill_rate)
            .field("bucket_count", &self.bucket_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_then_blocks() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_tokens: 1.0,
            refill_rate: 0.0,
            max_buckets: 100,
        });
        assert!(limiter.allow("u1"));
        assert!(!limiter.allow("u1"));
        assert!(!limiter.allow("u1"));
    }

    #[test]
    fn allows_up_to_n_before_any_refill() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_tokens: 10.0,
            refill_rate: 0.0,
            max_buckets: 100,
        });
        for _ in 0..10 {
            assert!(limiter.allow("u1"));
        }
        assert!(!limiter.allow("u1"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_tokens: 1.0,
            refill_rate: 0.0,
            max_buckets: 100,
        });
        assert!(limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn retry_after_is_zero_when_token_available() {
        let limiter = RateLimiter::with_defaults();
        assert_eq!(limiter.retry_after("u1"), 0.0);
    }

    #[test]
    fn retry_after_is_positive_once_exhausted() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_tokens: 1.0,
            refill_rate: 0.5,
            max_buckets: 100,
        });
        assert!(limiter.allow("u1"));
        assert!(limiter.retry_after("u1") > 0.0);
    }

    #[test]
    fn evicts_least_recently_used_past_max_buckets() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_tokens: 1.0,
            refill_rate: 0.0,
            max_buckets: 2,
        });
        limiter.allow("a");
        limiter.allow("b");
        assert_eq!(limiter.bucket_count(), 2);
        limiter.allow("c");
        assert_eq!(limiter.bucket_count(), 2);
        // "a" should have been evicted; its bucket is now fresh, so a
        // call for it succeeds again even though it was exhausted before.
        assert!(limiter.allow("a"));
    }
}

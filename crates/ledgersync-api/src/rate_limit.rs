//! The rate limiter (component C6): a per-user token bucket keyed by
//! authenticated subject.
//!
//! This is a per-middleware instance, not a process-wide singleton —
//! see the Open Question resolution in `DESIGN.md`. Each [`RateLimiter`]
//! owns its own bucket map; the pipeline holds exactly one, shared via
//! `AppState`.

use dashmap::DashMap;
use uuid::Uuid;

use ledgersync_core::now_ms;

/// One bucket's mutable state.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill_ms: i64,
}

/// The outcome of an admission check, carrying everything the caller
/// needs to set the `X-RateLimit-*`/`Retry-After` headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix seconds at which the bucket will be full again.
    pub reset_at_secs: i64,
    /// Populated only when `allowed` is `false`.
    pub retry_after_secs: Option<u64>,
}

/// Bucket configuration, exposed verbatim via `GET /v1/sync/info`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub max_requests: u32,
    pub burst: u32,
}

impl RateLimitConfig {
    #[must_use]
    pub fn capacity(&self) -> f64 {
        f64::from(self.burst)
    }

    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.max_requests) / self.window_seconds as f64
    }
}

/// Per-user token-bucket rate limiter with a background sweeper for idle
/// buckets (evict buckets idle > 1 hour).
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<Uuid, Bucket>,
}

const IDLE_EVICTION_MS: i64 = 60 * 60 * 1000;

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Charges one token for `user_id`, creating a full bucket on first
    /// use. Implements the standard token-bucket refill/consume algorithm.
    pub fn admit(&self, user_id: Uuid) -> Admission {
        let now = now_ms();
        let capacity = self.config.capacity();
        let refill_rate = self.config.refill_rate();

        let mut entry = self
            .buckets
            .entry(user_id)
            .or_insert(Bucket {
                tokens: capacity,
                last_refill_ms: now,
            });

        let elapsed_secs = (now - entry.last_refill_ms).max(0) as f64 / 1000.0;
        entry.tokens = (entry.tokens + elapsed_secs * refill_rate).min(capacity);
        entry.last_refill_ms = now;

        let tokens_to_full = (capacity - entry.tokens).max(0.0);
        let secs_to_full = if refill_rate > 0.0 {
            tokens_to_full / refill_rate
        } else {
            0.0
        };
        let reset_at_secs = now / 1000 + secs_to_full.ceil() as i64;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            Admission {
                allowed: true,
                remaining: entry.tokens.floor() as u32,
                reset_at_secs,
                retry_after_secs: None,
            }
        } else {
            let tokens_needed = 1.0 - entry.tokens;
            let secs_to_next_token = if refill_rate > 0.0 {
                tokens_needed / refill_rate
            } else {
                f64::INFINITY
            };
            Admission {
                allowed: false,
                remaining: 0,
                reset_at_secs,
                retry_after_secs: Some((secs_to_next_token.ceil() as u64).max(1)),
            }
        }
    }

    /// Periodic sweep (every 10 min) evicting buckets untouched
    /// for over an hour.
    pub fn sweep_idle(&self) {
        let now = now_ms();
        self.buckets
            .retain(|_, bucket| now - bucket.last_refill_ms <= IDLE_EVICTION_MS);
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            window_seconds: 60,
            max_requests: 60,
            burst,
        }
    }

    #[test]
    fn burst_of_two_allows_two_then_denies_third() {
        let limiter = RateLimiter::new(config(2));
        let user = Uuid::new_v4();
        assert!(limiter.admit(user).allowed);
        assert!(limiter.admit(user).allowed);
        let third = limiter.admit(user);
        assert!(!third.allowed);
        assert!(third.retry_after_secs.unwrap() >= 1);
    }

    #[test]
    fn remaining_decreases_monotonically_within_a_burst() {
        let limiter = RateLimiter::new(config(5));
        let user = Uuid::new_v4();
        let first = limiter.admit(user).remaining;
        let second = limiter.admit(user).remaining;
        assert!(second <= first);
    }

    #[test]
    fn independent_users_do_not_share_buckets() {
        let limiter = RateLimiter::new(config(1));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(limiter.admit(a).allowed);
        assert!(!limiter.admit(a).allowed);
        assert!(limiter.admit(b).allowed);
    }

    #[test]
    fn sweep_idle_evicts_only_stale_buckets() {
        let limiter = RateLimiter::new(config(5));
        let user = Uuid::new_v4();
        limiter.admit(user);
        limiter.sweep_idle();
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn refill_rate_matches_spec_formula() {
        let cfg = config(10);
        assert!((cfg.refill_rate() - 1.0).abs() < f64::EPSILON);
    }
}

//! Token bucket used by each endpoint's scheduler.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use aptos_explorer_gateway::rate_limit::TokenBucket;
//!
//! let mut bucket = TokenBucket::new(2, Duration::from_secs(1));
//!
//! assert!(bucket.try_consume());
//! assert!(bucket.try_consume());
//! assert!(!bucket.try_consume());
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// A token bucket that regenerates `capacity` tokens per `window`.
///
/// Refill only credits whole tokens. Time that does not add up to a whole
/// token is carried over to the next refill, since `last_refill` only moves
/// when tokens are added.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Currently available tokens, `0 <= tokens <= capacity`
    tokens: f64,
    /// Maximum tokens
    capacity: u32,
    /// Time for a full bucket to regenerate
    window: Duration,
    /// Last time tokens were credited
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self::new_at(capacity, window, Instant::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    pub fn new_at(capacity: u32, window: Duration, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            capacity,
            window,
            last_refill: now,
        }
    }

    /// Credit tokens for the time elapsed since the last refill.
    pub fn refill(&mut self, now: Instant) {
        if self.window.is_zero() {
            self.tokens = self.capacity as f64;
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let to_add = (elapsed.as_nanos().saturating_mul(self.capacity as u128)
            / self.window.as_nanos())
        .min(self.capacity as u128) as f64;

        if to_add > 0.0 {
            self.tokens = (self.tokens + to_add).min(self.capacity as f64);
            self.last_refill = now;
        }
    }

    /// Take one token if available.
    ///
    /// Returns `false` without touching the bucket when it is empty.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time after which at least one token has regenerated.
    ///
    /// Rounded up to the nanosecond, so a refill one interval after the
    /// last one always credits a token.
    pub fn token_interval(&self) -> Duration {
        let nanos = self.window.as_nanos().div_ceil(self.capacity.max(1) as u128);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Currently available tokens.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Bucket capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

//! Rate limiting for the Aptos API.
//!
//! Public fullnodes throttle by client, and the explorer fans out many small
//! requests per page. This module keeps every request inside a per-endpoint
//! token budget and retries requests the upstream rejected with
//! "Too Many Requests".
//!
//! ## Pieces
//!
//! - [`TokenBucket`]: per-endpoint token budget
//! - [`compute_delay`]: exponential backoff with ±20% jitter
//! - [`RateLimiterRegistry`]: one scheduler per endpoint, the entry point
//!   for [`RateLimiterRegistry::with_rate_limit`]
//! - [`retry_with_backoff`]: endpoint-agnostic retry without a bucket
//! - [`RateLimitedClient`]: wraps any [`AptosClient`](crate::rest::AptosClient)
//!
//! ## Example
//!
//! ```rust,no_run
//! use aptos_explorer_gateway::rate_limit::{RateLimitOverrides, RateLimiterRegistry};
//! use aptos_explorer_gateway::ClassifiedError;
//!
//! # async fn run() -> Result<(), ClassifiedError> {
//! let registry = RateLimiterRegistry::new();
//! let overrides = RateLimitOverrides::default().max_requests(10);
//!
//! let value = registry
//!     .with_rate_limit(
//!         || async { Ok::<_, ClassifiedError>(42) },
//!         "api.mainnet.aptoslabs.com",
//!         Some(&overrides),
//!     )
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod bucket;
mod client;
mod registry;
mod scheduler;

pub use backoff::{compute_delay, retry_with_backoff, retry_with_default_backoff};
pub use bucket::TokenBucket;
pub use client::RateLimitedClient;
pub use registry::{GatewayConfig, RateLimiterRegistry};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::error::GatewayError;

/// Default limits, matching what the explorer applies to the public API.
pub mod limits {
    use std::time::Duration;

    /// Bucket capacity.
    pub const DEFAULT_MAX_REQUESTS: u32 = 100;
    /// Time for a full bucket to regenerate.
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);
    /// Re-queue attempts per request.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// First backoff step.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
    /// Backoff ceiling before jitter.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
}

/// Per-endpoint rate limiter configuration.
///
/// Durations serialize as integer milliseconds.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity.
    pub max_requests: u32,
    /// Time over which `max_requests` tokens regenerate.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "window_ms")]
    pub window: Duration,
    /// Maximum number of rate-limited retries per request.
    pub max_retries: u32,
    /// Backoff delay for the first retry.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Upper bound on the backoff delay, before jitter.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: limits::DEFAULT_MAX_REQUESTS,
            window: limits::DEFAULT_WINDOW,
            max_retries: limits::DEFAULT_MAX_RETRIES,
            base_delay: limits::DEFAULT_BASE_DELAY,
            max_delay: limits::DEFAULT_MAX_DELAY,
        }
    }
}

impl RateLimitConfig {
    /// Check the configuration for values the limiter cannot work with.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.max_requests == 0 {
            return Err(GatewayError::Config("max_requests must be positive".into()));
        }
        if self.window.is_zero() {
            return Err(GatewayError::Config("window must be positive".into()));
        }
        if self.base_delay.is_zero() || self.max_delay.is_zero() {
            return Err(GatewayError::Config("backoff delays must be positive".into()));
        }
        if self.base_delay > self.max_delay {
            return Err(GatewayError::Config(format!(
                "base_delay ({:?}) exceeds max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

/// A partial [`RateLimitConfig`]; unset fields fall back to the defaults.
#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitOverrides {
    /// Bucket capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
    /// Regeneration window.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "window_ms", skip_serializing_if = "Option::is_none")]
    pub window: Option<Duration>,
    /// Retry cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// First backoff step.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "base_delay_ms", skip_serializing_if = "Option::is_none")]
    pub base_delay: Option<Duration>,
    /// Backoff ceiling.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "max_delay_ms", skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<Duration>,
}

impl RateLimitOverrides {
    /// Set the bucket capacity.
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    /// Set the regeneration window.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the retry cap.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the first backoff step.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = Some(base_delay);
        self
    }

    /// Set the backoff ceiling.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Merge these overrides over `defaults` and validate the result.
    pub fn apply(&self, defaults: &RateLimitConfig) -> Result<RateLimitConfig, GatewayError> {
        let config = RateLimitConfig {
            max_requests: self.max_requests.unwrap_or(defaults.max_requests),
            window: self.window.unwrap_or(defaults.window),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
        };
        config.validate()?;
        Ok(config)
    }
}

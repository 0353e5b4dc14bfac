//! # Aptos Explorer Gateway
//!
//! An async client library for the Aptos REST API that routes every request
//! through a per-endpoint rate limiter.
//!
//! ## Features
//!
//! - Token-bucket rate limiting, one bucket per endpoint
//! - Automatic retry of "Too Many Requests" failures with jittered
//!   exponential backoff
//! - A small error taxonomy ([`ClassifiedError`]) for every failure
//! - Stale-while-revalidate caching of query results
//! - Typed Aptos REST client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aptos_explorer_gateway::rate_limit::RateLimitedClient;
//! use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RateLimitedClient::new(AptosRestClient::new());
//!     let info = client.get_ledger_info().await?;
//!     println!("Block height: {}", info.block_height);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod rate_limit;
pub mod rest;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ApiError, ClassifiedError, GatewayError, RawError, classify};
pub use rate_limit::{RateLimiterRegistry, retry_with_backoff};

/// Result type alias using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;

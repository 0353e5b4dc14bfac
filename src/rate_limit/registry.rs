//! The gateway entry point: a registry of per-endpoint schedulers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ClassifiedError, GatewayError, RawError};
use crate::rate_limit::scheduler::{EndpointScheduler, QueuedRequest, SchedulerHandle};
use crate::rate_limit::{RateLimitConfig, RateLimitOverrides};

/// Serializable gateway configuration.
///
/// ```rust
/// use aptos_explorer_gateway::rate_limit::GatewayConfig;
///
/// let config = GatewayConfig::from_json_str(r#"{
///     "defaults": { "max_requests": 50, "window_ms": 30000 },
///     "endpoints": { "api.testnet.aptoslabs.com": { "max_requests": 10 } }
/// }"#).unwrap();
///
/// assert_eq!(config.defaults.max_requests, 50);
/// assert_eq!(config.endpoints.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Limits for endpoints without their own entry.
    pub defaults: RateLimitConfig,
    /// Per-endpoint overrides, keyed by endpoint (usually a hostname).
    pub endpoints: HashMap<String, RateLimitOverrides>,
}

impl GatewayConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, GatewayError> {
        let config: GatewayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the defaults and every endpoint entry.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.defaults.validate()?;
        for (endpoint, overrides) in &self.endpoints {
            overrides.apply(&self.defaults).map_err(|e| {
                GatewayError::Config(format!("endpoint {}: {}", endpoint, e))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RegistryInner {
    defaults: RateLimitConfig,
    configured: HashMap<String, RateLimitOverrides>,
    endpoints: Mutex<HashMap<String, SchedulerHandle>>,
}

/// Registry of per-endpoint rate limiters.
///
/// Construct one per application and share it; clones share the same
/// endpoints. Each endpoint key gets its own token bucket and scheduler task,
/// created on first use and kept while the registry is alive.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use aptos_explorer_gateway::rate_limit::{RateLimitOverrides, RateLimiterRegistry};
/// use aptos_explorer_gateway::{ClassifiedError, RawError};
///
/// # async fn run() -> Result<(), ClassifiedError> {
/// let registry = RateLimiterRegistry::new();
/// let slow = RateLimitOverrides::default()
///     .max_requests(1)
///     .window(Duration::from_secs(1));
///
/// // The second call waits for the next token.
/// for _ in 0..2 {
///     registry
///         .with_rate_limit(|| async { Ok::<_, RawError>(()) }, "api.example.com", Some(&slow))
///         .await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterRegistry {
    inner: Arc<RegistryInner>,
}

impl RateLimiterRegistry {
    /// Create a registry with the default limits.
    pub fn new() -> Self {
        Self::with_defaults(RateLimitConfig::default())
    }

    /// Create a registry with custom default limits.
    pub fn with_defaults(defaults: RateLimitConfig) -> Self {
        Self::build(defaults, HashMap::new())
    }

    /// Create a registry from a validated [`GatewayConfig`].
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self::build(config.defaults, config.endpoints))
    }

    fn build(defaults: RateLimitConfig, configured: HashMap<String, RateLimitOverrides>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                defaults,
                configured,
                endpoints: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Default limits for endpoints without their own configuration.
    pub fn defaults(&self) -> &RateLimitConfig {
        &self.inner.defaults
    }

    /// Run `operation` under `endpoint`'s rate limit.
    ///
    /// `overrides` are merged over the registry defaults when the endpoint is
    /// first used; once an endpoint exists its limits are fixed and later
    /// overrides are ignored. Failures classified as "Too Many Requests" are
    /// retried with backoff up to the endpoint's `max_retries`; every other
    /// failure is returned immediately.
    ///
    /// Dropping the returned future before the operation starts removes the
    /// request from the queue without spending a token.
    pub async fn with_rate_limit<F, Fut, T, E>(
        &self,
        operation: F,
        endpoint: &str,
        overrides: Option<&RateLimitOverrides>,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<RawError> + 'static,
    {
        let handle = self
            .scheduler_for(endpoint, overrides)
            .await
            .map_err(|e| ClassifiedError::InvalidInput(e.to_string()))?;

        let (request, rx) = QueuedRequest::new(operation);
        if let Err(request) = handle.enqueue(request) {
            let error = ClassifiedError::Unhandled(format!("rate limiter for {} stopped", endpoint));
            request.reject(error.clone());
            return Err(error);
        }

        rx.await.unwrap_or_else(|_| {
            Err(ClassifiedError::Unhandled(format!(
                "rate limiter for {} dropped the request",
                endpoint
            )))
        })
    }

    /// The limits in force for `endpoint`, if it has been used.
    pub async fn config_for(&self, endpoint: &str) -> Option<RateLimitConfig> {
        let endpoints = self.inner.endpoints.lock().await;
        endpoints.get(endpoint).map(|handle| *handle.config())
    }

    /// Number of endpoints with a live scheduler.
    pub async fn endpoint_count(&self) -> usize {
        let endpoints = self.inner.endpoints.lock().await;
        endpoints.values().filter(|handle| handle.is_running()).count()
    }

    /// Look up or lazily start the scheduler for `endpoint`.
    async fn scheduler_for(
        &self,
        endpoint: &str,
        overrides: Option<&RateLimitOverrides>,
    ) -> Result<SchedulerHandle, GatewayError> {
        let mut endpoints = self.inner.endpoints.lock().await;

        if let Some(handle) = endpoints.get(endpoint) {
            if handle.is_running() {
                if overrides.is_some() {
                    tracing::debug!(endpoint, "endpoint already configured, ignoring overrides");
                }
                return Ok(handle.clone());
            }
            tracing::warn!(endpoint, "endpoint scheduler stopped, restarting");
        }

        let config = self.resolve_config(endpoint, overrides)?;
        let handle = EndpointScheduler::spawn(endpoint, config);
        endpoints.insert(endpoint.to_string(), handle.clone());
        Ok(handle)
    }

    /// Configured entry first, then call-site overrides, over the defaults.
    fn resolve_config(
        &self,
        endpoint: &str,
        overrides: Option<&RateLimitOverrides>,
    ) -> Result<RateLimitConfig, GatewayError> {
        let base = match self.inner.configured.get(endpoint) {
            Some(configured) => configured.apply(&self.inner.defaults)?,
            None => self.inner.defaults,
        };
        match overrides {
            Some(overrides) => overrides.apply(&base),
            None => Ok(base),
        }
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

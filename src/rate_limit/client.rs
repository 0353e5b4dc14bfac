//! Rate-limited REST client wrapper.
//!
//! Wraps any [`AptosClient`] so that every call goes through a
//! [`RateLimiterRegistry`], keyed by the client's API host.
//!
//! # Example
//!
//! ```rust,ignore
//! use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient};
//! use aptos_explorer_gateway::rate_limit::{RateLimitedClient, RateLimiterRegistry};
//!
//! let registry = RateLimiterRegistry::new();
//! let mainnet = RateLimitedClient::with_registry(AptosRestClient::new(), registry.clone());
//!
//! // Requests share the host's token budget and 429s are retried
//! let info = mainnet.get_ledger_info().await?;
//! ```

use std::future::Future;

use crate::error::GatewayError;
use crate::rate_limit::{RateLimitOverrides, RateLimiterRegistry};
use crate::rest::AptosClient;
use crate::rest::types::{AccountData, Block, LedgerInfo, MoveResource, Transaction, ViewRequest};
use crate::types::{AccountAddress, Pagination};

/// A rate-limited wrapper around any [`AptosClient`] implementation.
///
/// Failures come back as [`GatewayError::Classified`].
#[derive(Clone)]
pub struct RateLimitedClient<C> {
    inner: C,
    registry: RateLimiterRegistry,
    endpoint: String,
    overrides: Option<RateLimitOverrides>,
}

impl<C: AptosClient + Clone + 'static> RateLimitedClient<C> {
    /// Wrap `inner` with a registry of its own.
    pub fn new(inner: C) -> Self {
        Self::with_registry(inner, RateLimiterRegistry::new())
    }

    /// Wrap `inner`, sharing `registry` with other clients.
    pub fn with_registry(inner: C, registry: RateLimiterRegistry) -> Self {
        let endpoint = inner.endpoint_key();
        Self {
            inner,
            registry,
            endpoint,
            overrides: None,
        }
    }

    /// Limits to use if this client is the first to touch its endpoint.
    pub fn with_overrides(mut self, overrides: RateLimitOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Rate limit under `endpoint` instead of the client's host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Get the registry requests are scheduled through.
    pub fn registry(&self) -> &RateLimiterRegistry {
        &self.registry
    }

    async fn call<F, Fut, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, GatewayError>> + Send + 'static,
        T: Send + 'static,
    {
        self.registry
            .with_rate_limit(operation, &self.endpoint, self.overrides.as_ref())
            .await
            .map_err(GatewayError::Classified)
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for RateLimitedClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedClient")
            .field("inner", &self.inner)
            .field("endpoint", &self.endpoint)
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl<C: AptosClient + Clone + 'static> AptosClient for RateLimitedClient<C> {
    fn endpoint_key(&self) -> String {
        self.endpoint.clone()
    }

    async fn get_ledger_info(&self) -> Result<LedgerInfo, GatewayError> {
        let inner = self.inner.clone();
        self.call(move || {
            let inner = inner.clone();
            async move { inner.get_ledger_info().await }
        })
        .await
    }

    async fn get_account(&self, address: AccountAddress) -> Result<AccountData, GatewayError> {
        let inner = self.inner.clone();
        self.call(move || {
            let inner = inner.clone();
            async move { inner.get_account(address).await }
        })
        .await
    }

    async fn get_account_resources(
        &self,
        address: AccountAddress,
    ) -> Result<Vec<MoveResource>, GatewayError> {
        let inner = self.inner.clone();
        self.call(move || {
            let inner = inner.clone();
            async move { inner.get_account_resources(address).await }
        })
        .await
    }

    async fn get_account_transactions(
        &self,
        address: AccountAddress,
        pagination: &Pagination,
    ) -> Result<Vec<Transaction>, GatewayError> {
        let inner = self.inner.clone();
        let pagination = pagination.clone();
        self.call(move || {
            let inner = inner.clone();
            let pagination = pagination.clone();
            async move { inner.get_account_transactions(address, &pagination).await }
        })
        .await
    }

    async fn get_transaction_by_hash(&self, hash: &str) -> Result<Transaction, GatewayError> {
        let inner = self.inner.clone();
        let hash = hash.to_string();
        self.call(move || {
            let inner = inner.clone();
            let hash = hash.clone();
            async move { inner.get_transaction_by_hash(&hash).await }
        })
        .await
    }

    async fn get_transaction_by_version(&self, version: u64) -> Result<Transaction, GatewayError> {
        let inner = self.inner.clone();
        self.call(move || {
            let inner = inner.clone();
            async move { inner.get_transaction_by_version(version).await }
        })
        .await
    }

    async fn get_block_by_height(
        &self,
        height: u64,
        with_transactions: bool,
    ) -> Result<Block, GatewayError> {
        let inner = self.inner.clone();
        self.call(move || {
            let inner = inner.clone();
            async move { inner.get_block_by_height(height, with_transactions).await }
        })
        .await
    }

    async fn view(&self, request: &ViewRequest) -> Result<Vec<serde_json::Value>, GatewayError> {
        let inner = self.inner.clone();
        let request = request.clone();
        self.call(move || {
            let inner = inner.clone();
            let request = request.clone();
            async move { inner.view(&request).await }
        })
        .await
    }
}

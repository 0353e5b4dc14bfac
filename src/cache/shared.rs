//! A query cache shared between tasks, with background revalidation.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::{CachePolicy, Freshness, QueryCache};
use crate::error::{ClassifiedError, RawError, classify};

#[derive(Debug)]
struct SharedState<K, V> {
    cache: QueryCache<K, V>,
    /// Keys with a background refresh in flight, tagged with the refresh
    /// that owns them
    refreshing: HashMap<K, u64>,
    next_refresh: u64,
}

/// A clone-able [`QueryCache`] that fetches misses and refreshes stale
/// entries in the background.
///
/// # Example
///
/// ```rust,no_run
/// use aptos_explorer_gateway::cache::{CachePolicy, SharedQueryCache};
/// use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient};
///
/// # async fn run() -> Result<(), aptos_explorer_gateway::ClassifiedError> {
/// let client = AptosRestClient::new();
/// let cache: SharedQueryCache<&'static str, u64> = SharedQueryCache::new(CachePolicy::default());
///
/// let version = cache
///     .get_or_fetch("ledger_version", move || async move {
///         client.get_ledger_info().await.map(|info| info.ledger_version)
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SharedQueryCache<K, V> {
    inner: Arc<Mutex<SharedState<K, V>>>,
}

impl<K, V> Clone for SharedQueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> SharedQueryCache<K, V>
where
    K: Hash + Eq + Clone + Send + std::fmt::Debug + 'static,
    V: Clone + Send + 'static,
{
    /// Create an empty cache.
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SharedState {
                cache: QueryCache::new(policy),
                refreshing: HashMap::new(),
                next_refresh: 0,
            })),
        }
    }

    /// Return the cached value for `key`, fetching it if needed.
    ///
    /// - fresh: returned as is, `fetch` is not called
    /// - stale: returned as is, and `fetch` runs in the background unless a
    ///   refresh for `key` is already running
    /// - missing: `fetch` is awaited; successes are cached, failures are
    ///   classified and returned without touching the cache
    ///
    /// A failed background refresh leaves the stale value in place. A refresh
    /// that finishes after [`invalidate`](Self::invalidate) is discarded.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, ClassifiedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<RawError> + Send + 'static,
    {
        let mut state = self.inner.lock().await;
        let cached = state.cache.lookup(&key).cloned();
        match cached {
            Freshness::Fresh(value) => return Ok(value),
            Freshness::Stale(value) => {
                if !state.refreshing.contains_key(&key) {
                    let refresh_id = state.next_refresh;
                    state.next_refresh = state.next_refresh.wrapping_add(1);
                    state.refreshing.insert(key.clone(), refresh_id);
                    drop(state);
                    self.spawn_refresh(key, refresh_id, fetch());
                }
                return Ok(value);
            }
            Freshness::Missing => {}
        }
        drop(state);

        match fetch().await {
            Ok(value) => {
                let mut state = self.inner.lock().await;
                state.cache.cleanup();
                state.cache.insert(key, value.clone());
                Ok(value)
            }
            Err(error) => Err(classify(&error.into())),
        }
    }

    fn spawn_refresh<Fut, E>(&self, key: K, refresh_id: u64, refresh: Fut)
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<RawError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = refresh.await;
            let mut state = inner.lock().await;
            if state.refreshing.get(&key) != Some(&refresh_id) {
                tracing::debug!(?key, "dropping refresh of invalidated entry");
                return;
            }
            state.refreshing.remove(&key);
            match result {
                Ok(value) => state.cache.insert(key, value),
                Err(error) => {
                    let error = classify(&error.into());
                    tracing::warn!(?key, %error, "background refresh failed, keeping stale value");
                }
            }
        });
    }

    /// Look up a value without fetching.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let state = self.inner.lock().await;
        state.cache.lookup(key).cloned().value()
    }

    /// Store a value directly.
    pub async fn insert(&self, key: K, value: V) {
        self.inner.lock().await.cache.insert(key, value);
    }

    /// Drop a value so the next `get_or_fetch` refetches it.
    ///
    /// A background refresh already running for `key` will not store its
    /// result.
    pub async fn invalidate(&self, key: &K) {
        let mut state = self.inner.lock().await;
        state.cache.invalidate(key);
        state.refreshing.remove(key);
    }

    /// Number of entries that have not expired.
    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.cache.active_count()
    }
}

//! Stale-while-revalidate query cache.
//!
//! Entries are fresh for [`CachePolicy::stale_time`], then served stale
//! (while a refresh runs) until [`CachePolicy::gc_time`], after which they
//! are gone.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use aptos_explorer_gateway::cache::{CachePolicy, Freshness, QueryCache};
//!
//! let mut cache: QueryCache<String, u64> = QueryCache::new(CachePolicy::default());
//!
//! cache.insert("ledger_version".to_string(), 42);
//! assert_eq!(cache.lookup(&"ledger_version".to_string()), Freshness::Fresh(&42));
//!
//! cache.invalidate(&"ledger_version".to_string());
//! assert_eq!(cache.lookup(&"ledger_version".to_string()), Freshness::Missing);
//! ```

mod shared;

pub use shared::SharedQueryCache;

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tokio::time::Instant;

use crate::error::GatewayError;

/// How long cached values stay fresh, and how long they are kept at all.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Age below which a value is served without refetching.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "stale_time_ms")]
    pub stale_time: Duration,
    /// Age at which a value is dropped.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "gc_time_ms")]
    pub gc_time: Duration,
}

impl CachePolicy {
    /// Default freshness window.
    pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);
    /// Default retention.
    pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(300);

    /// Create a policy.
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time,
        }
    }

    /// Reject a policy that would drop values before they go stale.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.stale_time > self.gc_time {
            return Err(GatewayError::Config(format!(
                "stale_time ({:?}) exceeds gc_time ({:?})",
                self.stale_time, self.gc_time
            )));
        }
        Ok(())
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STALE_TIME, Self::DEFAULT_GC_TIME)
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness<V> {
    /// Younger than the stale time.
    Fresh(V),
    /// Past the stale time but still retained.
    Stale(V),
    /// Never cached, invalidated, or past the gc time.
    Missing,
}

impl<V> Freshness<V> {
    /// The value, fresh or stale.
    pub fn value(self) -> Option<V> {
        match self {
            Freshness::Fresh(value) | Freshness::Stale(value) => Some(value),
            Freshness::Missing => None,
        }
    }
}

impl<V: Clone> Freshness<&V> {
    /// Clone the borrowed value.
    pub fn cloned(self) -> Freshness<V> {
        match self {
            Freshness::Fresh(value) => Freshness::Fresh(value.clone()),
            Freshness::Stale(value) => Freshness::Stale(value.clone()),
            Freshness::Missing => Freshness::Missing,
        }
    }
}

/// A cache that ages entries through fresh, stale and expired.
#[derive(Debug)]
pub struct QueryCache<K, V> {
    entries: HashMap<K, (V, Instant)>,
    policy: CachePolicy,
}

impl<K, V> QueryCache<K, V>
where
    K: Hash + Eq,
{
    /// Create an empty cache.
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    /// The policy entries are aged by.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Insert or replace a value, timestamped now.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, (value, Instant::now()));
    }

    /// Look up a value and how fresh it is.
    pub fn lookup(&self, key: &K) -> Freshness<&V> {
        match self.entries.get(key) {
            Some((value, inserted)) => {
                let age = Instant::now().saturating_duration_since(*inserted);
                if age < self.policy.stale_time {
                    Freshness::Fresh(value)
                } else if age < self.policy.gc_time {
                    Freshness::Stale(value)
                } else {
                    Freshness::Missing
                }
            }
            None => Freshness::Missing,
        }
    }

    /// Remove an entry so the next lookup misses.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(value, _)| value)
    }

    /// Drop every entry past the gc time.
    pub fn cleanup(&mut self) {
        let gc_time = self.policy.gc_time;
        let now = Instant::now();
        self.entries
            .retain(|_, (_, inserted)| now.saturating_duration_since(*inserted) < gc_time);
    }

    /// Number of entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that have not expired.
    pub fn active_count(&self) -> usize {
        let gc_time = self.policy.gc_time;
        let now = Instant::now();
        self.entries
            .values()
            .filter(|(_, inserted)| now.saturating_duration_since(*inserted) < gc_time)
            .count()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> Default for QueryCache<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(10), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ageing() {
        let mut cache: QueryCache<&str, u32> = QueryCache::new(policy());
        cache.insert("k", 1);
        assert_eq!(cache.lookup(&"k"), Freshness::Fresh(&1));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.lookup(&"k"), Freshness::Stale(&1));

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.lookup(&"k"), Freshness::Missing);
        assert_eq!(cache.lookup(&"other"), Freshness::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_resets_age() {
        let mut cache: QueryCache<&str, u32> = QueryCache::new(policy());
        cache.insert("k", 1);
        tokio::time::advance(Duration::from_secs(15)).await;
        cache.insert("k", 2);
        assert_eq!(cache.lookup(&"k"), Freshness::Fresh(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup() {
        let mut cache: QueryCache<&str, u32> = QueryCache::new(policy());
        cache.insert("old", 1);
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("new", 2);
        tokio::time::advance(Duration::from_secs(20)).await;

        // Expired entry still stored until cleanup
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.active_count(), 1);

        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&"new"), Freshness::Stale(&2));
    }

    #[test]
    fn test_invalidate() {
        let mut cache: QueryCache<String, u32> = QueryCache::default();
        cache.insert("k".to_string(), 7);
        assert_eq!(cache.invalidate(&"k".to_string()), Some(7));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_policy() {
        let policy = CachePolicy::default();
        assert_eq!(policy.stale_time, Duration::from_secs(30));
        assert_eq!(policy.gc_time, Duration::from_secs(300));
        assert!(policy.validate().is_ok());

        let inverted = CachePolicy::new(Duration::from_secs(60), Duration::from_secs(1));
        assert!(matches!(inverted.validate(), Err(GatewayError::Config(_))));

        let parsed: CachePolicy = serde_json::from_str(r#"{"stale_time_ms": 5000}"#).unwrap();
        assert_eq!(parsed.stale_time, Duration::from_secs(5));
        assert_eq!(parsed.gc_time, CachePolicy::DEFAULT_GC_TIME);
    }

    #[test]
    fn test_freshness_value() {
        assert_eq!(Freshness::Stale(3).value(), Some(3));
        assert_eq!(Freshness::<u32>::Missing.value(), None);
        assert_eq!(Freshness::Fresh(&4).cloned(), Freshness::Fresh(4));
    }
}

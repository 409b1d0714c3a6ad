//! Cache backend abstraction.

use std::time::Duration;

use async_trait::async_trait;
use fanout_core::{FanoutResult, FeedRow, UserId};

use super::key::FeedCacheKey;

/// Cache counters.
///
/// Backends fill `entries` and `evictions`; hit and miss accounting is
/// owned by the read-through layer, which sees each logical lookup
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Keyed storage for flattened feed snapshots.
///
/// Backends own expiry: `get` must never return an entry past its TTL.
#[async_trait]
pub trait FeedCacheBackend: Send + Sync {
    /// Look up a live snapshot.
    async fn get(&self, key: &FeedCacheKey) -> FanoutResult<Option<Vec<FeedRow>>>;

    /// Store a snapshot under the key, replacing any previous entry.
    async fn put(&self, key: FeedCacheKey, rows: Vec<FeedRow>, ttl: Duration) -> FanoutResult<()>;

    /// Drop one entry. Returns whether an entry was present.
    async fn remove(&self, key: &FeedCacheKey) -> FanoutResult<bool>;

    /// Drop every entry belonging to a user, across all filter and
    /// ordering dimensions. Returns the number of entries dropped.
    async fn remove_user(&self, user_id: UserId) -> FanoutResult<usize>;

    /// Storage-level counters. Hit and miss fields are left zero.
    fn stats(&self) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.hits = 3;
        stats.misses = 1;
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}

//! In-process cache backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fanout_core::{CacheError, FanoutResult, FeedRow, Timestamp, UserId};

use super::key::FeedCacheKey;
use super::traits::{CacheStats, FeedCacheBackend};

#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Vec<FeedRow>,
    expires_at: Timestamp,
}

impl CacheEntry {
    fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// HashMap-backed cache with lazy expiry.
///
/// Expired entries are dropped when touched by a lookup, not by a
/// background sweeper. Hit and miss accounting lives in the
/// read-through layer; this backend only counts what it stores and
/// evicts.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<FeedCacheKey, CacheEntry>>,
    evictions: AtomicU64,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn deadline(ttl: Duration) -> Timestamp {
        let now = Utc::now();
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now + ttl,
            // A TTL too large for the calendar never expires in practice.
            Err(_) => now + chrono::Duration::days(365 * 100),
        }
    }
}

#[async_trait]
impl FeedCacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &FeedCacheKey) -> FanoutResult<Option<Vec<FeedRow>>> {
        let now = Utc::now();
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| CacheError::LockPoisoned)?;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => {
                    return Ok(Some(entry.rows.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it under the write lock, re-checking liveness in
        // case a writer replaced the entry in between.
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?;
        if let Some(entry) = entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.rows.clone()));
            }
            entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None)
    }

    async fn put(&self, key: FeedCacheKey, rows: Vec<FeedRow>, ttl: Duration) -> FanoutResult<()> {
        let entry = CacheEntry {
            rows,
            expires_at: Self::deadline(ttl),
        };
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?;
        entries.insert(key, entry);
        Ok(())
    }

    async fn remove(&self, key: &FeedCacheKey) -> FanoutResult<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?;
        Ok(entries.remove(key).is_some())
    }

    async fn remove_user(&self, user_id: UserId) -> FanoutResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|key, _| key.user_id != user_id);
        Ok(before - entries.len())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.read().map(|e| e.len()).unwrap_or(0),
            ..CacheStats::default()
        }
    }
}

//! Read-through feed cache with single-flight misses.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fanout_core::{FanoutResult, FeedRow, UserId};
use tokio::sync::Mutex;
use tracing::debug;

use super::key::FeedCacheKey;
use super::traits::{CacheStats, FeedCacheBackend};

/// Default snapshot lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Cache policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCacheConfig {
    /// When false every read computes fresh and nothing is stored.
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
        }
    }
}

impl FeedCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with caching switched off entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Read-through cache over feed snapshots.
///
/// Misses go through a per-key flight lock so that N concurrent readers
/// of a cold key cost one store query, not N.
pub struct FeedCache<B: FeedCacheBackend> {
    backend: Arc<B>,
    config: FeedCacheConfig,
    flights: Mutex<HashMap<FeedCacheKey, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<B: FeedCacheBackend> FeedCache<B> {
    pub fn new(backend: Arc<B>, config: FeedCacheConfig) -> Self {
        Self {
            backend,
            config,
            flights: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &FeedCacheConfig {
        &self.config
    }

    /// Storage counters from the backend plus this layer's hit and
    /// miss accounting. One `get_or_compute` call records exactly one
    /// hit or one miss, however many backend lookups it takes.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..self.backend.stats()
        }
    }

    /// Fetch the snapshot for `key`, computing and storing it on a miss.
    ///
    /// Concurrent misses on the same key serialize on a flight lock and
    /// re-check the backend before computing, so the compute runs once.
    /// A compute error is returned to every waiter that ran it and
    /// nothing is stored.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: FeedCacheKey,
        compute: F,
    ) -> FanoutResult<Vec<FeedRow>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FanoutResult<Vec<FeedRow>>>,
    {
        if !self.config.enabled {
            return compute().await;
        }

        if let Some(rows) = self.backend.get(&key).await? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(rows);
        }

        let flight = {
            let mut flights = self.flights.lock().await;
            flights.entry(key.clone()).or_default().clone()
        };
        let _guard = flight.lock().await;

        // A peer may have landed the snapshot while this task waited.
        if let Some(rows) = self.backend.get(&key).await? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.release(&key).await;
            return Ok(rows);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "feed cache miss, computing");
        let result = compute().await;
        if let Ok(rows) = &result {
            if let Err(err) = self
                .backend
                .put(key.clone(), rows.clone(), self.config.ttl)
                .await
            {
                self.release(&key).await;
                return Err(err);
            }
        }
        self.release(&key).await;
        result
    }

    /// Drop one snapshot.
    pub async fn invalidate(&self, key: &FeedCacheKey) -> FanoutResult<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        self.backend.remove(key).await
    }

    /// Drop every snapshot a user owns, across all filter dimensions.
    pub async fn invalidate_user(&self, user_id: UserId) -> FanoutResult<usize> {
        if !self.config.enabled {
            return Ok(0);
        }
        let dropped = self.backend.remove_user(user_id).await?;
        if dropped > 0 {
            debug!(user = %user_id, dropped, "invalidated feed snapshots");
        }
        Ok(dropped)
    }

    async fn release(&self, key: &FeedCacheKey) {
        let mut flights = self.flights.lock().await;
        flights.remove(key);
    }
}

//! Feed caching layer.
//!
//! A read-through cache over flattened feed snapshots. Keys carry every
//! dimension that changes the stored row set, entries expire on a TTL,
//! writes invalidate rather than repopulate, and concurrent misses on
//! one key collapse into a single compute.

mod feed_cache;
mod key;
mod memory_backend;
mod traits;

pub use feed_cache::{FeedCache, FeedCacheConfig, DEFAULT_TTL};
pub use key::FeedCacheKey;
pub use memory_backend::MemoryCacheBackend;
pub use traits::{CacheStats, FeedCacheBackend};

//! fanout-core - Data Types and Metadata Codec
//!
//! Core vocabulary for the fanout notification feed: entities, enums,
//! typed errors, the metadata codec, and feed-query parsing. Storage
//! and caching live in `fanout-store`.

pub mod entities;
pub mod enums;
pub mod error;
pub mod meta;
pub mod query;

pub use entities::{
    Delivery, DeliveryId, FeedItem, FeedRow, NewNotification, Notification, NotificationId,
    UserId, DEFAULT_KIND,
};
pub use enums::{EntityKind, OrderField, ReadStatus, SortOrder};
pub use error::{
    ArgumentError, CacheError, FanoutError, FanoutResult, StorageError, ValidationError,
};
pub use meta::{is_serialized, maybe_serialize, maybe_unserialize, MetaValue};
pub use query::{merge_arguments, FeedQuery, UNBOUNDED};

/// Timestamp type used across all entities.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

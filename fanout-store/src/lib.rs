//! fanout-store - Storage Trait, Feed Cache, and Service Facade
//!
//! Defines the storage abstraction for notifications and deliveries,
//! an in-memory reference store, the read-through feed cache, and the
//! `NotificationService` facade that composes them.

pub mod cache;
pub mod pagination;
pub mod service;

pub use cache::{
    CacheStats, FeedCache, FeedCacheBackend, FeedCacheConfig, FeedCacheKey, MemoryCacheBackend,
};
pub use pagination::{paginate_slice, FeedPage, PageRequest};
pub use service::{FeedResult, NotificationService, NotifyReceipt};

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use fanout_core::{
    Delivery, DeliveryId, EntityKind, FanoutResult, FeedQuery, FeedRow, NewNotification,
    Notification, NotificationId, OrderField, SortOrder, StorageError, UserId, ValidationError,
};

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage trait for notifications and their per-recipient deliveries.
///
/// Implementations provide persistence; validation and metadata encoding
/// happen earlier, in [`NewNotification::compose`].
#[async_trait]
pub trait NotificationStore: Send + Sync {
    // === Notification Operations ===

    /// Insert a prepared notification, returning the assigned id.
    async fn notification_insert(&self, new: NewNotification) -> FanoutResult<NotificationId>;

    /// Get a notification by id.
    async fn notification_get(&self, id: NotificationId) -> FanoutResult<Option<Notification>>;

    /// Delete a notification.
    ///
    /// Restricted while any delivery still references the row, so a
    /// delivery never outlives its notification.
    async fn notification_delete(&self, id: NotificationId) -> FanoutResult<()>;

    // === Delivery Operations ===

    /// Create the delivery record for one recipient, unread.
    async fn delivery_insert(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> FanoutResult<DeliveryId>;

    /// Mark deliveries read for a user, optionally narrowed to one
    /// notification. Returns the number of rows flipped; zero matches
    /// is a no-op, not an error.
    async fn delivery_mark_read(
        &self,
        user_id: UserId,
        notification_id: Option<NotificationId>,
    ) -> FanoutResult<u64>;

    // === Feed Queries ===

    /// Join deliveries to notifications for one user, filtered by read
    /// status, ordered, and limited per the query.
    ///
    /// When `query.paginate` is set the result is intentionally left
    /// unsliced: that flattened set is what the feed cache stores, and
    /// page slicing happens downstream.
    async fn feed_query(&self, user_id: UserId, query: &FeedQuery) -> FanoutResult<Vec<FeedRow>>;

    /// Native pagination for the cache-bypassing path.
    async fn feed_query_page(
        &self,
        user_id: UserId,
        query: &FeedQuery,
        request: &PageRequest,
    ) -> FanoutResult<FeedPage<FeedRow>> {
        let mut unsliced = query.clone();
        unsliced.paginate = true;
        let rows = self.feed_query(user_id, &unsliced).await?;
        let per_page = query.effective_per_page().unwrap_or_else(|| rows.len().max(1));
        Ok(paginate_slice(rows, per_page, request))
    }
}

/// Order rows by the requested column, id as tiebreak, then direction.
pub(crate) fn sort_rows(rows: &mut [FeedRow], order_by: OrderField, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ordering = match order_by {
            OrderField::CreatedAt => a
                .notification
                .created_at
                .cmp(&b.notification.created_at),
            OrderField::Id => Ordering::Equal,
            OrderField::Message => a.notification.message.cmp(&b.notification.message),
            OrderField::Kind => a.notification.kind.cmp(&b.notification.kind),
        };
        ordering.then(a.notification.id.cmp(&b.notification.id))
    });
    if order == SortOrder::Desc {
        rows.reverse();
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory reference store.
///
/// Serves as the test double and as the executable definition of the
/// table-level invariants a relational backend must enforce.
#[derive(Debug)]
pub struct MemoryStore {
    notifications: Arc<RwLock<BTreeMap<i64, Notification>>>,
    deliveries: Arc<RwLock<BTreeMap<i64, Delivery>>>,
    next_notification_id: AtomicI64,
    next_delivery_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store. Ids start at one; zero means "missing".
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(RwLock::new(BTreeMap::new())),
            deliveries: Arc::new(RwLock::new(BTreeMap::new())),
            next_notification_id: AtomicI64::new(1),
            next_delivery_id: AtomicI64::new(1),
        }
    }

    /// Clear all stored data.
    pub fn clear(&self) -> FanoutResult<()> {
        self.notifications
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        self.deliveries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Count of stored notifications.
    pub fn notification_count(&self) -> usize {
        self.notifications.read().map(|n| n.len()).unwrap_or(0)
    }

    /// Count of stored deliveries.
    pub fn delivery_count(&self) -> usize {
        self.deliveries.read().map(|d| d.len()).unwrap_or(0)
    }

    /// All deliveries for a user, unfiltered. Test support.
    pub fn deliveries_for(&self, user_id: UserId) -> Vec<Delivery> {
        self.deliveries
            .read()
            .map(|deliveries| {
                deliveries
                    .values()
                    .filter(|d| d.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn notification_insert(&self, new: NewNotification) -> FanoutResult<NotificationId> {
        let id = NotificationId(self.next_notification_id.fetch_add(1, AtomicOrdering::SeqCst));
        let mut notifications = self
            .notifications
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        notifications.insert(id.0, new.into_notification(id));
        Ok(id)
    }

    async fn notification_get(&self, id: NotificationId) -> FanoutResult<Option<Notification>> {
        let notifications = self
            .notifications
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(notifications.get(&id.0).cloned())
    }

    async fn notification_delete(&self, id: NotificationId) -> FanoutResult<()> {
        let deliveries = self
            .deliveries
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let referencing = deliveries
            .values()
            .filter(|d| d.notification_id == id)
            .count();
        drop(deliveries);

        if referencing > 0 {
            return Err(StorageError::DeleteRestricted {
                id: id.0,
                deliveries: referencing,
            }
            .into());
        }

        let mut notifications = self
            .notifications
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if notifications.remove(&id.0).is_none() {
            return Err(StorageError::NotFound {
                entity: EntityKind::Notification,
                id: id.0,
            }
            .into());
        }
        Ok(())
    }

    async fn delivery_insert(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> FanoutResult<DeliveryId> {
        if !user_id.is_present() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "user_id".to_string(),
            }
            .into());
        }
        if !notification_id.is_present() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "notification_id".to_string(),
            }
            .into());
        }

        let notifications = self
            .notifications
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        if !notifications.contains_key(&notification_id.0) {
            return Err(StorageError::NotFound {
                entity: EntityKind::Notification,
                id: notification_id.0,
            }
            .into());
        }
        drop(notifications);

        let mut deliveries = self
            .deliveries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let duplicate = deliveries
            .values()
            .any(|d| d.user_id == user_id && d.notification_id == notification_id);
        if duplicate {
            return Err(StorageError::DuplicateDelivery {
                user_id: user_id.0,
                notification_id: notification_id.0,
            }
            .into());
        }

        let id = DeliveryId(self.next_delivery_id.fetch_add(1, AtomicOrdering::SeqCst));
        let now = Utc::now();
        deliveries.insert(
            id.0,
            Delivery {
                id,
                user_id,
                notification_id,
                is_read: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn delivery_mark_read(
        &self,
        user_id: UserId,
        notification_id: Option<NotificationId>,
    ) -> FanoutResult<u64> {
        let mut deliveries = self
            .deliveries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let now = Utc::now();
        let mut updated = 0u64;
        for delivery in deliveries.values_mut() {
            if delivery.user_id != user_id {
                continue;
            }
            if let Some(target) = notification_id {
                if delivery.notification_id != target {
                    continue;
                }
            }
            if !delivery.is_read {
                delivery.is_read = true;
                delivery.updated_at = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn feed_query(&self, user_id: UserId, query: &FeedQuery) -> FanoutResult<Vec<FeedRow>> {
        let notifications = self
            .notifications
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let deliveries = self
            .deliveries
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;

        let mut rows: Vec<FeedRow> = deliveries
            .values()
            .filter(|d| d.user_id == user_id)
            .filter(|d| {
                query
                    .read_status
                    .read_flag()
                    .map_or(true, |flag| d.is_read == flag)
            })
            .filter_map(|d| {
                notifications.get(&d.notification_id.0).map(|n| FeedRow {
                    notification: n.clone(),
                    is_read: d.is_read,
                })
            })
            .collect();

        sort_rows(&mut rows, query.order_by, query.order);

        // Pagination keeps the set whole; a plain limit slices it here.
        if !query.paginate {
            if let Some(limit) = query.effective_per_page() {
                rows.truncate(limit);
            }
        }
        Ok(rows)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::{MetaValue, ReadStatus};
    use serde_json::json;

    fn compose(message: &str) -> NewNotification {
        NewNotification::compose(message, "", &MetaValue::Null, None).unwrap()
    }

    async fn seed(store: &MemoryStore, message: &str, recipients: &[i64]) -> NotificationId {
        let id = store.notification_insert(compose(message)).await.unwrap();
        for &user in recipients {
            store.delivery_insert(UserId(user), id).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn test_notification_insert_get() {
        let store = MemoryStore::new();
        let new = NewNotification::compose("hello", "alert", &json!({"k": 1}), Some(7)).unwrap();

        let id = store.notification_insert(new).await.unwrap();
        let stored = store.notification_get(id).await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.message, "hello");
        assert_eq!(stored.kind, "alert");
        assert_eq!(stored.created_by, Some(UserId(7)));
    }

    #[tokio::test]
    async fn test_notification_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store
            .notification_get(NotificationId(99))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryStore::new();
        let first = store.notification_insert(compose("one")).await.unwrap();
        let second = store.notification_insert(compose("two")).await.unwrap();
        assert!(second > first);
        assert!(first.is_present());
    }

    #[tokio::test]
    async fn test_delivery_requires_identities() {
        let store = MemoryStore::new();
        let id = seed(&store, "hi", &[]).await;

        let err = store.delivery_insert(UserId(0), id).await.unwrap_err();
        assert!(matches!(
            err,
            fanout_core::FanoutError::Validation(ValidationError::RequiredFieldMissing { .. })
        ));

        let err = store
            .delivery_insert(UserId(1), NotificationId(0))
            .await
            .unwrap_err();
        assert!(matches!(err, fanout_core::FanoutError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delivery_requires_existing_notification() {
        let store = MemoryStore::new();
        let err = store
            .delivery_insert(UserId(1), NotificationId(42))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            fanout_core::FanoutError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delivery_duplicate_pair_rejected() {
        let store = MemoryStore::new();
        let id = seed(&store, "hi", &[1]).await;

        let err = store.delivery_insert(UserId(1), id).await.unwrap_err();
        assert!(matches!(
            err,
            fanout_core::FanoutError::Storage(StorageError::DuplicateDelivery { .. })
        ));
    }

    #[tokio::test]
    async fn test_delivery_starts_unread() {
        let store = MemoryStore::new();
        seed(&store, "hi", &[1, 2]).await;

        for delivery in store.deliveries_for(UserId(1)) {
            assert!(!delivery.is_read);
        }
        assert_eq!(store.delivery_count(), 2);
    }

    #[tokio::test]
    async fn test_notification_delete_restricted_by_delivery() {
        let store = MemoryStore::new();
        let id = seed(&store, "hi", &[1]).await;

        let err = store.notification_delete(id).await.unwrap_err();
        assert!(matches!(
            err,
            fanout_core::FanoutError::Storage(StorageError::DeleteRestricted { .. })
        ));

        // Still there.
        assert!(store.notification_get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_notification_delete_unreferenced() {
        let store = MemoryStore::new();
        let id = seed(&store, "hi", &[]).await;
        store.notification_delete(id).await.unwrap();
        assert!(store.notification_get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_read_counts_flipped_rows() {
        let store = MemoryStore::new();
        seed(&store, "one", &[1]).await;
        seed(&store, "two", &[1]).await;

        assert_eq!(store.delivery_mark_read(UserId(1), None).await.unwrap(), 2);
        // Already read: nothing left to flip.
        assert_eq!(store.delivery_mark_read(UserId(1), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_narrowed_to_notification() {
        let store = MemoryStore::new();
        let first = seed(&store, "one", &[1]).await;
        seed(&store, "two", &[1]).await;

        assert_eq!(
            store
                .delivery_mark_read(UserId(1), Some(first))
                .await
                .unwrap(),
            1
        );
        let unread = store
            .feed_query(UserId(1), &FeedQuery::with_read_status(ReadStatus::Unread))
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].notification.message, "two");
    }

    #[tokio::test]
    async fn test_mark_read_no_match_returns_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.delivery_mark_read(UserId(9), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_feed_query_filters_by_user_and_status() {
        let store = MemoryStore::new();
        let id = seed(&store, "shared", &[1, 2]).await;
        seed(&store, "only for two", &[2]).await;

        store.delivery_mark_read(UserId(2), Some(id)).await.unwrap();

        let all = store
            .feed_query(UserId(2), &FeedQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let read = store
            .feed_query(UserId(2), &FeedQuery::with_read_status(ReadStatus::Read))
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].notification.message, "shared");

        let other = store
            .feed_query(UserId(1), &FeedQuery::default())
            .await
            .unwrap();
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_query_default_order_is_newest_first() {
        let store = MemoryStore::new();
        seed(&store, "first", &[1]).await;
        seed(&store, "second", &[1]).await;
        seed(&store, "third", &[1]).await;

        let rows = store
            .feed_query(UserId(1), &FeedQuery::default())
            .await
            .unwrap();
        let messages: Vec<_> = rows
            .iter()
            .map(|r| r.notification.message.as_str())
            .collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_feed_query_ascending_by_message() {
        let store = MemoryStore::new();
        seed(&store, "banana", &[1]).await;
        seed(&store, "apple", &[1]).await;

        let mut query = FeedQuery::default();
        query.order_by = OrderField::Message;
        query.order = SortOrder::Asc;

        let rows = store.feed_query(UserId(1), &query).await.unwrap();
        assert_eq!(rows[0].notification.message, "apple");
    }

    #[tokio::test]
    async fn test_feed_query_limit_and_unbounded() {
        let store = MemoryStore::new();
        for i in 0..5 {
            seed(&store, &format!("n{i}"), &[1]).await;
        }

        let mut limited = FeedQuery::default();
        limited.per_page = 2;
        assert_eq!(
            store.feed_query(UserId(1), &limited).await.unwrap().len(),
            2
        );

        // The sentinel fetches everything.
        assert_eq!(
            store
                .feed_query(UserId(1), &FeedQuery::default())
                .await
                .unwrap()
                .len(),
            5
        );
    }

    #[tokio::test]
    async fn test_feed_query_paginate_leaves_set_whole() {
        let store = MemoryStore::new();
        for i in 0..5 {
            seed(&store, &format!("n{i}"), &[1]).await;
        }

        let mut query = FeedQuery::default();
        query.per_page = 2;
        query.paginate = true;

        // Flattened set for the cache: no page slicing at the store.
        assert_eq!(store.feed_query(UserId(1), &query).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_feed_query_page_native() {
        let store = MemoryStore::new();
        for i in 0..5 {
            seed(&store, &format!("n{i}"), &[1]).await;
        }

        let mut query = FeedQuery::default();
        query.per_page = 2;
        query.paginate = true;

        let page = store
            .feed_query_page(UserId(1), &query, &PageRequest::new(3))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 5);
        assert_eq!(page.last_page(), 3);
    }
}

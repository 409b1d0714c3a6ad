//! Notification service facade.
//!
//! Composes the store and the feed cache behind the four caller-facing
//! operations: notify, feed, mark_read, count. All cache bookkeeping
//! lives here; callers never touch keys or TTLs.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use fanout_core::{
    FanoutError, FanoutResult, FeedItem, FeedQuery, FeedRow, MetaValue, NewNotification,
    NotificationId, ReadStatus, UserId,
};

use crate::cache::{FeedCache, FeedCacheBackend, FeedCacheKey};
use crate::pagination::{paginate_slice, FeedPage, PageRequest};
use crate::NotificationStore;

/// Outcome of a fan-out write.
///
/// The notification row either exists or the whole call failed; the
/// per-recipient deliveries can partially fail, and the receipt says
/// exactly which did.
#[derive(Debug)]
pub struct NotifyReceipt {
    pub notification_id: NotificationId,
    /// Recipients whose delivery row was created.
    pub delivered: Vec<UserId>,
    /// Recipients whose delivery failed, with the failure.
    pub failed: Vec<(UserId, FanoutError)>,
}

impl NotifyReceipt {
    /// Whether every recipient got a delivery.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A feed read: flat when unpaginated, a page otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedResult {
    Flat(Vec<FeedItem>),
    Paged(FeedPage<FeedItem>),
}

impl FeedResult {
    /// The items of this read, whichever shape it took.
    pub fn items(&self) -> &[FeedItem] {
        match self {
            FeedResult::Flat(items) => items,
            FeedResult::Paged(page) => &page.items,
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// The caller-facing entry point for the notification feed.
pub struct NotificationService<S, B>
where
    S: NotificationStore,
    B: FeedCacheBackend,
{
    store: Arc<S>,
    cache: FeedCache<B>,
}

impl<S, B> NotificationService<S, B>
where
    S: NotificationStore,
    B: FeedCacheBackend,
{
    pub fn new(store: Arc<S>, cache: FeedCache<B>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &FeedCache<B> {
        &self.cache
    }

    /// Create one notification and fan it out to `recipients`.
    ///
    /// Recipient caches are invalidated before the write, so a reader
    /// racing the fan-out recomputes rather than extending a stale
    /// snapshot's life, and again after it so the new row is visible.
    /// Delivery failures do not abort the fan-out; they are collected
    /// in the receipt.
    pub async fn notify(
        &self,
        recipients: &[i64],
        message: &str,
        kind: &str,
        meta: &MetaValue,
        created_by: Option<i64>,
    ) -> FanoutResult<NotifyReceipt> {
        let new = NewNotification::compose(message, kind, meta, created_by)?;

        for &user in recipients {
            self.cache.invalidate_user(UserId(user)).await?;
        }

        let notification_id = self.store.notification_insert(new).await?;
        info!(
            notification = %notification_id,
            recipients = recipients.len(),
            "notification created"
        );

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for &user in recipients {
            let user = UserId(user);
            match self.store.delivery_insert(user, notification_id).await {
                Ok(_) => delivered.push(user),
                Err(err) => {
                    warn!(user = %user, notification = %notification_id, error = %err, "delivery failed");
                    failed.push((user, err));
                }
            }
        }

        for user in &delivered {
            self.cache.invalidate_user(*user).await?;
        }

        Ok(NotifyReceipt {
            notification_id,
            delivered,
            failed,
        })
    }

    /// Read a user's feed.
    ///
    /// `args` is a loose key-value mapping merged over the query
    /// defaults. A query with `paginate` and a bounded `per_page` yields
    /// a page; anything else yields the flat list. The unbounded
    /// sentinel always flattens, paginate flag or not.
    pub async fn feed(
        &self,
        user_id: i64,
        args: &Value,
        page: &PageRequest,
    ) -> FanoutResult<FeedResult> {
        let user_id = UserId(user_id);
        let query = FeedQuery::parse(args)?;
        let paginated = query.paginate && query.effective_per_page().is_some();

        if !self.cache.config().enabled {
            if paginated {
                let rows = self.store.feed_query_page(user_id, &query, page).await?;
                return Ok(FeedResult::Paged(rows.map(FeedItem::from)));
            }
            let rows = self.store.feed_query(user_id, &query).await?;
            return Ok(FeedResult::Flat(decode(rows)));
        }

        let rows = self.snapshot(user_id, &query).await?;
        debug!(user = %user_id, rows = rows.len(), "feed snapshot resolved");

        if paginated {
            let per_page = query.effective_per_page().unwrap_or(rows.len().max(1));
            let page = paginate_slice(rows, per_page, page);
            return Ok(FeedResult::Paged(page.map(FeedItem::from)));
        }

        let mut items = decode(rows);
        if let Some(limit) = query.effective_per_page() {
            items.truncate(limit);
        }
        Ok(FeedResult::Flat(items))
    }

    /// Mark deliveries read, optionally narrowed to one notification.
    ///
    /// Returns whether any row was flipped. A no-op leaves the cache
    /// untouched, since the cached snapshots are still accurate.
    pub async fn mark_read(
        &self,
        user_id: i64,
        notification_id: Option<i64>,
    ) -> FanoutResult<bool> {
        let user_id = UserId(user_id);
        let updated = self
            .store
            .delivery_mark_read(user_id, notification_id.map(NotificationId))
            .await?;
        if updated == 0 {
            return Ok(false);
        }
        debug!(user = %user_id, updated, "deliveries marked read");
        self.cache.invalidate_user(user_id).await?;
        Ok(true)
    }

    /// Count a user's feed entries under a read-status filter.
    ///
    /// Served from the same cached snapshot the feed reads use, so a
    /// count right after a feed read costs no store query.
    pub async fn count(&self, user_id: i64, read_status: ReadStatus) -> FanoutResult<usize> {
        let user_id = UserId(user_id);
        let query = FeedQuery::with_read_status(read_status);

        if !self.cache.config().enabled {
            return Ok(self.store.feed_query(user_id, &query).await?.len());
        }
        Ok(self.snapshot(user_id, &query).await?.len())
    }

    /// Resolve the cached flattened snapshot for this query's key,
    /// computing it from the store on a miss. The snapshot is always
    /// the whole filtered set; slicing happens after.
    async fn snapshot(&self, user_id: UserId, query: &FeedQuery) -> FanoutResult<Vec<FeedRow>> {
        let key = FeedCacheKey::for_query(user_id, query);
        let store = Arc::clone(&self.store);
        let mut unsliced = query.clone();
        unsliced.paginate = true;
        self.cache
            .get_or_compute(key, || async move {
                store.feed_query(user_id, &unsliced).await
            })
            .await
    }
}

fn decode(rows: Vec<FeedRow>) -> Vec<FeedItem> {
    rows.into_iter().map(FeedItem::from).collect()
}

//! Cache key construction.

use std::fmt;

use fanout_core::{FeedQuery, OrderField, ReadStatus, SortOrder, UserId};

/// Key for one cached feed snapshot.
///
/// Carries every query dimension that changes the flattened row set.
/// Two queries that differ only in page number or page size share a key;
/// queries that differ in read status or ordering must not, or one
/// filter's rows would be served for another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedCacheKey {
    pub user_id: UserId,
    pub read_status: ReadStatus,
    pub order_by: OrderField,
    pub order: SortOrder,
}

impl FeedCacheKey {
    /// Derive the key for a user's query.
    pub fn for_query(user_id: UserId, query: &FeedQuery) -> Self {
        Self {
            user_id,
            read_status: query.read_status,
            order_by: query.order_by,
            order: query.order,
        }
    }

    /// Render the stable string form used by keyed backends.
    pub fn render(&self) -> String {
        format!(
            "feed:{}:{}:{}:{}",
            self.user_id,
            self.read_status.as_str(),
            self.order_by.as_str(),
            self.order.as_str()
        )
    }
}

impl fmt::Display for FeedCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_default_query() {
        let key = FeedCacheKey::for_query(UserId(7), &FeedQuery::default());
        assert_eq!(key.render(), "feed:7:all:created_at:desc");
    }

    #[test]
    fn test_filter_dimensions_split_keys() {
        let all = FeedCacheKey::for_query(UserId(7), &FeedQuery::default());
        let unread = FeedCacheKey::for_query(
            UserId(7),
            &FeedQuery::parse(&json!({"read_status": "unread"})).unwrap(),
        );
        let ascending = FeedCacheKey::for_query(
            UserId(7),
            &FeedQuery::parse(&json!({"order": "asc"})).unwrap(),
        );
        assert_ne!(all, unread);
        assert_ne!(all, ascending);
        assert_ne!(unread, ascending);
    }

    #[test]
    fn test_page_size_shares_key() {
        let unbounded = FeedCacheKey::for_query(UserId(7), &FeedQuery::default());
        let paged = FeedCacheKey::for_query(
            UserId(7),
            &FeedQuery::parse(&json!({"paginate": true, "per_page": 10})).unwrap(),
        );
        assert_eq!(unbounded, paged);
    }
}

//! Core entity structures

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::meta::{self, MetaValue};
use crate::Timestamp;

/// Store-assigned notification identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(pub i64);

/// Store-assigned delivery identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeliveryId(pub i64);

/// External user identity. Zero is reserved as "missing".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UserId {
    /// Whether this identity refers to an actual user.
    pub fn is_present(&self) -> bool {
        self.0 != 0
    }
}

impl NotificationId {
    pub fn is_present(&self) -> bool {
        self.0 != 0
    }
}

/// Notification - immutable record shared by every recipient.
///
/// `meta` holds the encoded storable form; decode it with
/// [`crate::meta::maybe_unserialize`] at the read boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    /// Short type label, defaults to `"notification"`.
    pub kind: String,
    pub meta: String,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
}

/// A notification prepared for insertion, before the store assigns an id.
///
/// Constructed only through [`NewNotification::compose`], which owns the
/// trim/default/encode normalization for the write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub message: String,
    pub kind: String,
    pub meta: String,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
}

/// Default notification type label.
pub const DEFAULT_KIND: &str = "notification";

impl NewNotification {
    /// Normalize raw caller input into an insertable record.
    ///
    /// - rejects an empty (post-trim) message,
    /// - trims the message and type label, defaulting the label,
    /// - encodes metadata into its storable form,
    /// - treats an absent or zero author as anonymous.
    pub fn compose(
        message: &str,
        kind: &str,
        meta_data: &MetaValue,
        created_by: Option<i64>,
    ) -> Result<Self, ValidationError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "message".to_string(),
            });
        }

        let kind = kind.trim();
        let kind = if kind.is_empty() { DEFAULT_KIND } else { kind };

        let created_by = created_by.filter(|id| *id != 0).map(UserId);

        Ok(Self {
            message: message.to_string(),
            kind: kind.to_string(),
            meta: meta::maybe_serialize(meta_data),
            created_by,
            created_at: Utc::now(),
        })
    }

    /// Attach a store-assigned id, producing the persisted record.
    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            message: self.message,
            kind: self.kind,
            meta: self.meta,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Delivery - the per-user, per-notification join record tracking read state.
///
/// `is_read` and `updated_at` are the only mutable fields; everything else
/// is fixed at notify time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub user_id: UserId,
    pub notification_id: NotificationId,
    pub is_read: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One joined feed row as the store and cache see it: the notification
/// with this recipient's read flag, metadata still in storable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRow {
    pub notification: Notification,
    pub is_read: bool,
}

/// One feed entry as callers see it, metadata decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: NotificationId,
    pub message: String,
    pub kind: String,
    pub meta: MetaValue,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl From<FeedRow> for FeedItem {
    fn from(row: FeedRow) -> Self {
        let FeedRow {
            notification,
            is_read,
        } = row;
        FeedItem {
            id: notification.id,
            message: notification.message,
            kind: notification.kind,
            meta: meta::maybe_unserialize(&notification.meta),
            created_by: notification.created_by,
            created_at: notification.created_at,
            is_read,
        }
    }
}

//! Error types for fanout operations

use crate::EntityKind;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity:?} with id {id}")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("Insert failed for {entity:?}: {reason}")]
    InsertFailed { entity: EntityKind, reason: String },

    #[error("Update failed for {entity:?} with id {id}: {reason}")]
    UpdateFailed {
        entity: EntityKind,
        id: i64,
        reason: String,
    },

    #[error("Delete restricted: notification {id} still has {deliveries} delivery record(s)")]
    DeleteRestricted { id: i64, deliveries: usize },

    #[error("Delivery already exists for user {user_id} and notification {notification_id}")]
    DuplicateDelivery { user_id: i64, notification_id: i64 },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors raised while composing records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Query-argument parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("{which} arguments must be a key-value mapping")]
    NotAMapping { which: String },

    #[error("Invalid argument {key}: {reason}")]
    InvalidArgument { key: String, reason: String },
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Master error type for all fanout errors.
#[derive(Debug, Clone, Error)]
pub enum FanoutError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for fanout operations.
pub type FanoutResult<T> = Result<T, FanoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: EntityKind::Notification,
            id: 42,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("Notification"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_storage_error_display_delete_restricted() {
        let err = StorageError::DeleteRestricted {
            id: 7,
            deliveries: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Delete restricted"));
        assert!(msg.contains("3 delivery"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::RequiredFieldMissing {
            field: "message".to_string(),
        };
        assert!(format!("{}", err).contains("message"));
    }

    #[test]
    fn test_argument_error_display() {
        let err = ArgumentError::NotAMapping {
            which: "caller".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("caller"));
        assert!(msg.contains("key-value mapping"));
    }

    #[test]
    fn test_fanout_error_from_variants() {
        let storage = FanoutError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, FanoutError::Storage(_)));

        let validation = FanoutError::from(ValidationError::RequiredFieldMissing {
            field: "user_id".to_string(),
        });
        assert!(matches!(validation, FanoutError::Validation(_)));

        let argument = FanoutError::from(ArgumentError::NotAMapping {
            which: "defaults".to_string(),
        });
        assert!(matches!(argument, FanoutError::Argument(_)));

        let cache = FanoutError::from(CacheError::LockPoisoned);
        assert!(matches!(cache, FanoutError::Cache(_)));
    }
}

//! Enumerations shared across the feed layer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ArgumentError;

/// Entity discriminator used in error reporting and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Notification,
    Delivery,
}

/// Read-status filter for feed queries.
///
/// `All` disables the read filter entirely; the other two narrow the
/// feed to one side of the `is_read` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    #[default]
    All,
    Read,
    Unread,
}

impl ReadStatus {
    /// The `is_read` value this filter selects, or `None` for `All`.
    pub fn read_flag(&self) -> Option<bool> {
        match self {
            ReadStatus::All => None,
            ReadStatus::Read => Some(true),
            ReadStatus::Unread => Some(false),
        }
    }

    /// Stable lowercase label, used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadStatus::All => "all",
            ReadStatus::Read => "read",
            ReadStatus::Unread => "unread",
        }
    }
}

impl fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadStatus {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ReadStatus::All),
            "read" => Ok(ReadStatus::Read),
            "unread" => Ok(ReadStatus::Unread),
            other => Err(ArgumentError::InvalidArgument {
                key: "read_status".to_string(),
                reason: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// Sort direction for feed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ArgumentError::InvalidArgument {
                key: "order".to_string(),
                reason: format!("unknown order '{other}'"),
            }),
        }
    }
}

/// Column a feed query sorts by.
///
/// The backing store assigns ids monotonically, so `Id` and `CreatedAt`
/// produce the same ordering for freshly written data; `CreatedAt` is
/// the default to keep the feed chronological even under clock skew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    #[default]
    CreatedAt,
    Id,
    Message,
    Kind,
}

impl OrderField {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderField::CreatedAt => "created_at",
            OrderField::Id => "id",
            OrderField::Message => "message",
            OrderField::Kind => "kind",
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderField {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at" => Ok(OrderField::CreatedAt),
            "id" => Ok(OrderField::Id),
            "message" => Ok(OrderField::Message),
            "kind" => Ok(OrderField::Kind),
            other => Err(ArgumentError::InvalidArgument {
                key: "order_by".to_string(),
                reason: format!("unknown column '{other}'"),
            }),
        }
    }
}

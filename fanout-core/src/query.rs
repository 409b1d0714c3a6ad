//! Feed query arguments and their merge semantics.
//!
//! Callers describe a feed query as a loose key-value mapping; it is
//! merged over a fixed default set (caller keys win, unknown keys are
//! retained) and then bound to a typed [`FeedQuery`].

use serde_json::{json, Map, Value};

use crate::{ArgumentError, OrderField, ReadStatus, SortOrder};

/// Sentinel `per_page` meaning "fetch everything".
pub const UNBOUNDED: i64 = -1;

/// A fully resolved feed query.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub read_status: ReadStatus,
    pub order: SortOrder,
    pub order_by: OrderField,
    pub paginate: bool,
    /// Items per page, or [`UNBOUNDED`].
    pub per_page: i64,
    /// Caller-supplied keys the engine does not interpret.
    pub extra: Map<String, Value>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            read_status: ReadStatus::default(),
            order: SortOrder::default(),
            order_by: OrderField::default(),
            paginate: false,
            per_page: UNBOUNDED,
            extra: Map::new(),
        }
    }
}

impl FeedQuery {
    /// The default argument set callers merge over.
    pub fn defaults() -> Value {
        json!({
            "read_status": "all",
            "order": "desc",
            "order_by": "created_at",
            "paginate": false,
            "per_page": UNBOUNDED,
        })
    }

    /// Merge caller arguments over the defaults and bind the result.
    pub fn parse(args: &Value) -> Result<Self, ArgumentError> {
        let merged = merge_arguments(args, &Self::defaults())?;
        Self::from_merged(merged)
    }

    /// Shorthand for a query that only filters by read status.
    pub fn with_read_status(read_status: ReadStatus) -> Self {
        Self {
            read_status,
            ..Self::default()
        }
    }

    fn from_merged(mut merged: Map<String, Value>) -> Result<Self, ArgumentError> {
        let read_status: ReadStatus = take_str(&mut merged, "read_status")?.parse()?;
        let order: SortOrder = take_str(&mut merged, "order")?.parse()?;
        let order_by: OrderField = take_str(&mut merged, "order_by")?.parse()?;
        let paginate = take_bool(&mut merged, "paginate")?;
        let per_page = take_int(&mut merged, "per_page")?;

        Ok(Self {
            read_status,
            order,
            order_by,
            paginate,
            per_page,
            extra: merged,
        })
    }

    /// Whether this query fetches the whole result set.
    pub fn is_unbounded(&self) -> bool {
        self.per_page == UNBOUNDED
    }

    /// The page size in effect, `None` when unbounded.
    pub fn effective_per_page(&self) -> Option<usize> {
        if self.per_page == UNBOUNDED {
            None
        } else {
            Some(self.per_page.unsigned_abs() as usize)
        }
    }
}

/// Pass-through merge of caller arguments over defaults.
///
/// Caller keys win; keys the engine does not know are kept. Both sides
/// must be key-value mappings.
pub fn merge_arguments(args: &Value, defaults: &Value) -> Result<Map<String, Value>, ArgumentError> {
    let defaults = defaults.as_object().ok_or_else(|| ArgumentError::NotAMapping {
        which: "default".to_string(),
    })?;
    let args = args.as_object().ok_or_else(|| ArgumentError::NotAMapping {
        which: "caller".to_string(),
    })?;

    let mut merged = defaults.clone();
    for (key, value) in args {
        merged.insert(key.clone(), value.clone());
    }
    Ok(merged)
}

fn take_str(merged: &mut Map<String, Value>, key: &str) -> Result<String, ArgumentError> {
    match merged.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
        None => Err(ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: "missing".to_string(),
        }),
    }
}

fn take_bool(merged: &mut Map<String, Value>, key: &str) -> Result<bool, ArgumentError> {
    match merged.remove(key) {
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: format!("expected a boolean, got {other}"),
        }),
        None => Err(ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: "missing".to_string(),
        }),
    }
}

fn take_int(merged: &mut Map<String, Value>, key: &str) -> Result<i64, ArgumentError> {
    match merged.remove(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: format!("expected an integer, got {n}"),
        }),
        Some(other) => Err(ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: format!("expected an integer, got {other}"),
        }),
        None => Err(ArgumentError::InvalidArgument {
            key: key.to_string(),
            reason: "missing".to_string(),
        }),
    }
}

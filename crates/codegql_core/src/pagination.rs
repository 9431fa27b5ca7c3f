//! Store-facing pagination arguments and keyset cursor values.

use crate::error::{GqlError, GqlResult};
use crate::relay::{marshal_id, unmarshal_id};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A column a connection can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderByColumn {
    Id,
    Name,
    Username,
    CreatedAt,
    UpdatedAt,
    QueuedAt,
}

impl OrderByColumn {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Username => "username",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::QueuedAt => "queued_at",
        }
    }
}

impl fmt::Display for OrderByColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value of a keyset cursor.
///
/// Timestamps travel as microseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorValue {
    Int(i64),
    Text(String),
}

impl From<i32> for CursorValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for CursorValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for CursorValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for CursorValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// An entity that can be placed in a keyset-paginated connection.
pub trait Paginated {
    /// Returns the values of `order_by` columns for this entity.
    ///
    /// Columns the entity does not have fall back to its id.
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue>;
}

/// Pagination request handed from a connection to a store.
///
/// `first`/`last` already include the extra row that detects a next page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationArgs {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub after: Option<Vec<CursorValue>>,
    pub before: Option<Vec<CursorValue>>,
    pub order_by: Vec<OrderByColumn>,
    pub ascending: bool,
}

impl PaginationArgs {
    /// Forward pagination over the first `n` rows ordered by id.
    pub fn first(n: usize) -> Self {
        Self {
            first: Some(n),
            order_by: vec![OrderByColumn::Id],
            ascending: true,
            ..Self::default()
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.first.or(self.last)
    }

    /// Returns true if the store must return rows in reversed order.
    pub fn is_backward(&self) -> bool {
        self.last.is_some()
    }
}

/// Encodes keyset values as a cursor for entities of `kind`.
pub fn marshal_keyset_cursor(kind: &str, values: &[CursorValue]) -> String {
    marshal_id(&format!("{}Cursor", kind), values)
}

/// Decodes a keyset cursor, checking its kind and arity.
pub fn unmarshal_keyset_cursor(
    kind: &str,
    cursor: &str,
    order_by: &[OrderByColumn],
) -> GqlResult<Vec<CursorValue>> {
    let values: Vec<CursorValue> = unmarshal_id(cursor, &format!("{}Cursor", kind))
        .map_err(|e| GqlError::invalid_cursor(e.message))?;
    if values.len() != order_by.len() {
        return Err(GqlError::invalid_cursor(format!(
            "cursor has {} values, connection orders by {} columns",
            values.len(),
            order_by.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_keyset_cursor_round_trip() {
        let order_by = [OrderByColumn::Name, OrderByColumn::Id];
        let values = vec![CursorValue::from("github.com/a/b"), CursorValue::from(9)];
        let cursor = marshal_keyset_cursor("Repository", &values);
        assert_eq!(
            unmarshal_keyset_cursor("Repository", &cursor, &order_by).unwrap(),
            values
        );
    }

    #[test]
    fn test_keyset_cursor_wrong_kind_or_arity() {
        let cursor = marshal_keyset_cursor("User", &[CursorValue::Int(1)]);
        let err = unmarshal_keyset_cursor("Org", &cursor, &[OrderByColumn::Id]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCursor);
        let err = unmarshal_keyset_cursor(
            "User",
            &cursor,
            &[OrderByColumn::Name, OrderByColumn::Id],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCursor);
    }

    #[test]
    fn test_cursor_value_serialization() {
        let json = serde_json::to_string(&vec![CursorValue::Int(3), "x".into()]).unwrap();
        assert_eq!(json, r#"[3,"x"]"#);
    }

    #[test]
    fn test_first_defaults() {
        let args = PaginationArgs::first(11);
        assert_eq!(args.limit(), Some(11));
        assert!(!args.is_backward());
        assert_eq!(args.order_by, vec![OrderByColumn::Id]);
    }
}

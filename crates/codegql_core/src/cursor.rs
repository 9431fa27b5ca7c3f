//! Opaque string and integer cursors.
//!
//! Used by connections that page by offset or by a single id rather than by
//! keyset columns (teams, file diffs, webhook logs).

use crate::error::{GqlError, GqlResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encodes raw cursor text.
pub fn encode_cursor(raw: &str) -> String {
    STANDARD.encode(raw)
}

/// Decodes a cursor produced by [`encode_cursor`].
pub fn decode_cursor(cursor: &str) -> GqlResult<String> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|e| GqlError::invalid_cursor(format!("invalid cursor {:?}: {}", cursor, e)))?;
    String::from_utf8(bytes)
        .map_err(|_| GqlError::invalid_cursor(format!("invalid cursor {:?}: not utf-8", cursor)))
}

/// Encodes an integer cursor.
pub fn encode_int_cursor(n: i64) -> String {
    encode_cursor(&n.to_string())
}

/// Decodes an integer cursor.
pub fn decode_int_cursor(cursor: &str) -> GqlResult<i64> {
    let raw = decode_cursor(cursor)?;
    raw.parse::<i64>()
        .map_err(|_| GqlError::invalid_cursor(format!("invalid cursor {:?}: not an integer", cursor)))
}

/// Decodes an optional `after` argument into an offset, defaulting to zero.
pub fn decode_offset(after: Option<&str>) -> GqlResult<usize> {
    match after {
        None => Ok(0),
        Some(cursor) => {
            let n = decode_int_cursor(cursor)?;
            usize::try_from(n).map_err(|_| {
                GqlError::invalid_cursor(format!("invalid cursor {:?}: negative offset", cursor))
            })
        }
    }
}

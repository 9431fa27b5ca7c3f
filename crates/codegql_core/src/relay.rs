//! Opaque node IDs.
//!
//! A node ID is the URL-safe base64 encoding of `"{kind}:{json}"`, where the
//! JSON part is the serialized spec of the entity (usually its numeric ID).

use crate::error::{GqlError, GqlResult};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes an ID of the given kind.
pub fn marshal_id<T: Serialize>(kind: &str, spec: T) -> String {
    // Serializing plain ids and cursor tuples cannot fail.
    let json = serde_json::to_string(&spec).unwrap_or_default();
    URL_SAFE.encode(format!("{}:{}", kind, json))
}

fn decode(id: &str) -> GqlResult<(String, String)> {
    let bytes = URL_SAFE
        .decode(id)
        .map_err(|e| GqlError::invalid_id(format!("invalid graphql.ID {:?}: {}", id, e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| GqlError::invalid_id(format!("invalid graphql.ID {:?}: not utf-8", id)))?;
    match text.split_once(':') {
        Some((kind, spec)) => Ok((kind.to_string(), spec.to_string())),
        None => Err(GqlError::invalid_id(format!(
            "invalid graphql.ID {:?}: missing kind",
            id
        ))),
    }
}

/// Returns the kind encoded in an ID.
pub fn unmarshal_kind(id: &str) -> GqlResult<String> {
    decode(id).map(|(kind, _)| kind)
}

/// Decodes an ID, checking that it has the expected kind.
pub fn unmarshal_id<T: DeserializeOwned>(id: &str, expected_kind: &str) -> GqlResult<T> {
    let (kind, spec) = decode(id)?;
    if kind != expected_kind {
        return Err(GqlError::invalid_id(format!(
            "expected graphql.ID of kind {:?}, got {:?}",
            expected_kind, kind
        )));
    }
    serde_json::from_str(&spec)
        .map_err(|e| GqlError::invalid_id(format!("invalid graphql.ID {:?}: {}", id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_round_trip_int_id() {
        let id = marshal_id("User", 42);
        assert_eq!(id, URL_SAFE.encode("User:42"));
        assert_eq!(unmarshal_kind(&id).unwrap(), "User");
        assert_eq!(unmarshal_id::<i32>(&id, "User").unwrap(), 42);
    }

    #[test]
    fn test_kind_mismatch() {
        let id = marshal_id("Team", 7);
        let err = unmarshal_id::<i32>(&id, "User").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidId);
    }

    #[test]
    fn test_malformed_ids() {
        assert_eq!(
            unmarshal_kind("%%%").unwrap_err().code,
            ErrorCode::InvalidId
        );
        let no_kind = URL_SAFE.encode("justtext");
        assert!(unmarshal_kind(&no_kind).is_err());
        let bad_json = URL_SAFE.encode("User:{nope");
        assert_eq!(
            unmarshal_id::<i32>(&bad_json, "User").unwrap_err().code,
            ErrorCode::InvalidId
        );
    }
}

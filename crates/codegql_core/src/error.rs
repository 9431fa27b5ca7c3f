//! Typed error system for codegql resolvers.
//!
//! Every resolver returns [`GqlResult`]. Errors carry a typed [`ErrorCode`] so
//! transports can classify them without string matching, and serialize into
//! the GraphQL `errors[]` entry shape.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Request errors
    BadRequest,
    InvalidArgument,
    InvalidId,
    InvalidCursor,

    // Resource errors
    NotFound,
    Conflict,

    // Auth errors
    Unauthenticated,
    Forbidden,
    FeatureDisabled,

    // Schema errors
    FieldNotFound,
    ResolverNotFound,

    // Backend errors
    Backend,
    Internal,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidId => "INVALID_ID",
            Self::InvalidCursor => "INVALID_CURSOR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::FeatureDisabled => "FEATURE_DISABLED",
            Self::FieldNotFound => "FIELD_NOT_FOUND",
            Self::ResolverNotFound => "RESOLVER_NOT_FOUND",
            Self::Backend => "BACKEND",
            Self::Internal => "INTERNAL",
        }
    }

    /// Returns true if the caller sent something the server could not accept.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::InvalidArgument
                | Self::InvalidId
                | Self::InvalidCursor
                | Self::NotFound
                | Self::Conflict
                | Self::Unauthenticated
                | Self::Forbidden
                | Self::FeatureDisabled
                | Self::FieldNotFound
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolver error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct GqlError {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable message, returned to the client verbatim.
    pub message: String,
    /// Extension data attached to the GraphQL error entry.
    pub extensions: Option<IndexMap<String, serde_json::Value>>,
}

impl GqlError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extensions: None,
        }
    }

    /// Adds extension data.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let extensions = self.extensions.get_or_insert_with(IndexMap::new);
        if let Ok(v) = serde_json::to_value(value) {
            extensions.insert(key.into(), v);
        }
        self
    }

    /// Prefixes the message, keeping the code.
    #[must_use]
    pub fn wrap(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Combines two errors into one, joining messages line by line.
    ///
    /// The first error's code wins.
    pub fn append(existing: Option<GqlError>, next: GqlError) -> GqlError {
        match existing {
            None => next,
            Some(mut err) => {
                err.message.push('\n');
                err.message.push_str(&next.message);
                err
            }
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidId, message)
    }

    pub fn invalid_cursor(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCursor, message)
    }

    /// Creates a not found error.
    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Creates the canonical unauthenticated error.
    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "not authenticated")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn feature_disabled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FeatureDisabled, message)
    }

    /// Creates an error for a field the type does not declare.
    pub fn field_not_found(type_name: &str, field: &str) -> Self {
        Self::new(
            ErrorCode::FieldNotFound,
            format!("Cannot query field \"{}\" on type \"{}\"", field, type_name),
        )
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Backend, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Returns true if this error means the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

/// Type alias for resolver results.
pub type GqlResult<T> = std::result::Result<T, GqlError>;

/// Result extension for adding context to errors.
pub trait ResultExt<T> {
    /// Prefixes the error message with `context`.
    fn context(self, context: impl fmt::Display) -> GqlResult<T>;
}

impl<T, E: Into<GqlError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl fmt::Display) -> GqlResult<T> {
        self.map_err(|e| e.into().wrap(context))
    }
}

impl From<serde_json::Error> for GqlError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A field error as it appears in the response `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    pub extensions: IndexMap<String, serde_json::Value>,
}

impl FieldError {
    /// Builds a response error from a resolver error at `path`.
    pub fn from_error(err: GqlError, path: Vec<PathSegment>) -> Self {
        let mut extensions = err.extensions.unwrap_or_default();
        extensions.insert("code".to_string(), serde_json::json!(err.code));
        Self {
            message: err.message,
            path,
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::NotFound.is_client_error());
        assert!(ErrorCode::InvalidCursor.is_client_error());
        assert!(!ErrorCode::Backend.is_client_error());
        assert_eq!(ErrorCode::FeatureDisabled.as_str(), "FEATURE_DISABLED");
    }

    #[test]
    fn test_wrap_keeps_code() {
        let err = GqlError::not_found("team id=3").wrap("parent team");
        assert!(err.is_not_found());
        assert_eq!(err.message, "parent team: team id=3 not found");
    }

    #[test]
    fn test_append_joins_messages() {
        let first = GqlError::not_found("member one");
        let second = GqlError::not_found("member two");
        let combined = GqlError::append(Some(GqlError::append(None, first)), second);
        assert_eq!(combined.message, "member one not found\nmember two not found");
    }

    #[test]
    fn test_result_ext_context() {
        let result: GqlResult<()> = Err(GqlError::backend("connection reset"));
        let err = result.context("listing repositories").unwrap_err();
        assert_eq!(err.code, ErrorCode::Backend);
        assert_eq!(err.message, "listing repositories: connection reset");
    }

    #[test]
    fn test_field_error_serialization() {
        let err = GqlError::forbidden("must be site admin").with_extension("field", "users");
        let field_error = FieldError::from_error(
            err,
            vec![PathSegment::Field("users".into()), PathSegment::Index(0)],
        );
        let json = serde_json::to_value(&field_error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "must be site admin",
                "path": ["users", 0],
                "extensions": {"field": "users", "code": "FORBIDDEN"}
            })
        );
    }
}

//! Backend error types.

use codegql_core::{ErrorCode, GqlError};
use thiserror::Error;

/// Errors returned by database stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for GqlError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::Conflict(_) => ErrorCode::Conflict,
            StoreError::Invalid(_) => ErrorCode::InvalidArgument,
            StoreError::Backend(_) => ErrorCode::Backend,
        };
        GqlError::new(code, err.to_string())
    }
}

/// Errors returned by the gitserver client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitserverError {
    #[error("repository not found: {0}")]
    RepoNotFound(String),

    #[error("revision not found: {repo}@{spec}")]
    RevisionNotFound { repo: String, spec: String },

    #[error("file not found: {path} at {commit}")]
    FileNotFound { path: String, commit: String },

    #[error("gitserver: {0}")]
    Backend(String),
}

impl GitserverError {
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

pub type GitResult<T> = Result<T, GitserverError>;

impl From<GitserverError> for GqlError {
    fn from(err: GitserverError) -> Self {
        let code = if err.is_not_found() {
            ErrorCode::NotFound
        } else {
            ErrorCode::Backend
        };
        GqlError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_to_code() {
        let err: GqlError = StoreError::not_found("team", "name=\"x\"").into();
        assert!(err.is_not_found());
        assert_eq!(err.message, "team not found: name=\"x\"");

        let err: GqlError = StoreError::Conflict("team name taken".into()).into();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[test]
    fn test_gitserver_error_maps_to_code() {
        let err: GqlError = GitserverError::RevisionNotFound {
            repo: "r".into(),
            spec: "main".into(),
        }
        .into();
        assert!(err.is_not_found());
        let err: GqlError = GitserverError::Backend("timeout".into()).into();
        assert_eq!(err.code, ErrorCode::Backend);
    }
}

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffError {
    /// A header or body line that does not fit the unified diff format.
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// A hunk body line with a prefix other than ' ', '+', '-' or '\'.
    #[error("unexpected diff line prefix in {line:?}")]
    UnknownLinePrefix { line: String },

    /// A hunk line points past the end of the highlighted file.
    #[error("{side} line {index} out of range (file has {len} lines)")]
    HighlightOutOfRange {
        side: &'static str,
        index: usize,
        len: usize,
    },
}

impl DiffError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }
}

pub type DiffResult<T> = Result<T, DiffError>;

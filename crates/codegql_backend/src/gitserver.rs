//! Gitserver client interface.

use crate::error::GitResult;
use crate::types::Commit;
use async_trait::async_trait;

/// Options for listing commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitsOptions {
    /// A `base..head` range, or a single revision. `None` means the default branch head.
    pub range: Option<String>,
    /// Maximum number of commits, newest first.
    pub n: Option<usize>,
}

impl CommitsOptions {
    pub fn latest(n: usize) -> Self {
        Self {
            range: None,
            n: Some(n),
        }
    }

    pub fn range(base: &str, head: &str) -> Self {
        Self {
            range: Some(format!("{}..{}", base, head)),
            n: None,
        }
    }
}

#[async_trait]
pub trait GitserverClient: Send + Sync {
    /// Resolves a revision spec (ref name or commit id) to a commit id.
    async fn resolve_revision(&self, repo: &str, spec: &str) -> GitResult<String>;

    /// Reads a file at a commit.
    async fn read_file(&self, repo: &str, commit: &str, path: &str) -> GitResult<String>;

    /// Returns the unified diff between two commits, optionally restricted to `paths`.
    async fn raw_diff(
        &self,
        repo: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> GitResult<String>;

    async fn commits(&self, repo: &str, opts: &CommitsOptions) -> GitResult<Vec<Commit>>;
}

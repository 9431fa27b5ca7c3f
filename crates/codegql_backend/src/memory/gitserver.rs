use super::{GitRepoSeed, Seed};
use crate::error::{GitResult, GitserverError};
use crate::gitserver::{CommitsOptions, GitserverClient};
use crate::types::Commit;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct GitRepo {
    seed: GitRepoSeed,
}

impl GitRepo {
    fn position(&self, commit: &str) -> Option<usize> {
        self.seed.commits.iter().position(|c| c.id == commit)
    }

    fn resolve(&self, spec: &str) -> Option<String> {
        if let Some(id) = self.seed.refs.get(spec) {
            return Some(id.clone());
        }
        if spec == "HEAD" {
            return self.seed.commits.last().map(|c| c.id.clone());
        }
        self.position(spec).map(|_| spec.to_string())
    }
}

/// A gitserver over seeded linear histories and precomputed per-file diffs.
#[derive(Debug, Default)]
pub struct MemoryGitserver {
    repos: RwLock<FxHashMap<String, GitRepo>>,
}

impl MemoryGitserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: &Seed) -> Self {
        let repos = seed
            .git
            .iter()
            .map(|r| (r.repo.clone(), GitRepo { seed: r.clone() }))
            .collect();
        Self {
            repos: RwLock::new(repos),
        }
    }
}

fn revision_not_found(repo: &str, spec: &str) -> GitserverError {
    GitserverError::RevisionNotFound {
        repo: repo.to_string(),
        spec: spec.to_string(),
    }
}

#[async_trait]
impl GitserverClient for MemoryGitserver {
    async fn resolve_revision(&self, repo: &str, spec: &str) -> GitResult<String> {
        let repos = self.repos.read().await;
        let git = repos
            .get(repo)
            .ok_or_else(|| GitserverError::RepoNotFound(repo.to_string()))?;
        git.resolve(spec)
            .ok_or_else(|| revision_not_found(repo, spec))
    }

    async fn read_file(&self, repo: &str, commit: &str, path: &str) -> GitResult<String> {
        let repos = self.repos.read().await;
        let git = repos
            .get(repo)
            .ok_or_else(|| GitserverError::RepoNotFound(repo.to_string()))?;
        git.seed
            .files
            .iter()
            .find(|f| f.commit == commit && f.path == path)
            .map(|f| f.content.clone())
            .ok_or_else(|| GitserverError::FileNotFound {
                path: path.to_string(),
                commit: commit.to_string(),
            })
    }

    async fn raw_diff(
        &self,
        repo: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> GitResult<String> {
        let repos = self.repos.read().await;
        let git = repos
            .get(repo)
            .ok_or_else(|| GitserverError::RepoNotFound(repo.to_string()))?;
        let mut out = String::new();
        for diff in git
            .seed
            .diffs
            .iter()
            .filter(|d| d.base == base && d.head == head)
            .filter(|d| paths.is_empty() || paths.contains(&d.path))
        {
            out.push_str(&diff.diff);
            if !diff.diff.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }

    async fn commits(&self, repo: &str, opts: &CommitsOptions) -> GitResult<Vec<Commit>> {
        let repos = self.repos.read().await;
        let git = repos
            .get(repo)
            .ok_or_else(|| GitserverError::RepoNotFound(repo.to_string()))?;

        let index_of = |spec: &str| {
            git.resolve(spec)
                .and_then(|id| git.position(&id))
                .ok_or_else(|| revision_not_found(repo, spec))
        };
        let (start, end) = match opts.range.as_deref() {
            None => (0, git.seed.commits.len()),
            Some(range) => match range.split_once("..") {
                Some((base, head)) => {
                    let base = base.trim_end_matches('.');
                    let head = head.trim_start_matches('.');
                    (index_of(base)? + 1, index_of(head)? + 1)
                }
                None => (0, index_of(range)? + 1),
            },
        };

        let mut commits: Vec<Commit> = git
            .seed
            .commits
            .get(start.min(end)..end)
            .unwrap_or_default()
            .iter()
            .rev()
            .cloned()
            .collect();
        if let Some(n) = opts.n {
            commits.truncate(n);
        }
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DiffSeed, FileSeed};
    use crate::types::Signature;
    use chrono::Utc;

    fn commit(id: &str) -> Commit {
        Commit {
            id: id.to_string(),
            author: Signature {
                name: "a".into(),
                email: "a@example.com".into(),
                date: Utc::now(),
            },
            committer: None,
            message: format!("commit {}", id),
            parents: vec![],
        }
    }

    fn gitserver() -> MemoryGitserver {
        MemoryGitserver::from_seed(&Seed {
            git: vec![GitRepoSeed {
                repo: "r".into(),
                commits: vec![commit("c1"), commit("c2"), commit("c3")],
                refs: [("main".to_string(), "c3".to_string())].into_iter().collect(),
                files: vec![FileSeed {
                    commit: "c1".into(),
                    path: "a.txt".into(),
                    content: "hello\n".into(),
                }],
                diffs: vec![
                    DiffSeed {
                        base: "c1".into(),
                        head: "c3".into(),
                        path: "a.txt".into(),
                        diff: "diff a".into(),
                    },
                    DiffSeed {
                        base: "c1".into(),
                        head: "c3".into(),
                        path: "b.txt".into(),
                        diff: "diff b\n".into(),
                    },
                ],
            }],
            ..Seed::default()
        })
    }

    #[tokio::test]
    async fn test_resolve_revision() {
        let git = gitserver();
        assert_eq!(git.resolve_revision("r", "main").await.unwrap(), "c3");
        assert_eq!(git.resolve_revision("r", "HEAD").await.unwrap(), "c3");
        assert_eq!(git.resolve_revision("r", "c2").await.unwrap(), "c2");
        assert!(git.resolve_revision("r", "nope").await.unwrap_err().is_not_found());
        assert!(matches!(
            git.resolve_revision("missing", "main").await,
            Err(GitserverError::RepoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_ranges() {
        let git = gitserver();
        let ids = |commits: Vec<Commit>| commits.into_iter().map(|c| c.id).collect::<Vec<_>>();
        let range = git.commits("r", &CommitsOptions::range("c1", "main")).await.unwrap();
        assert_eq!(ids(range), vec!["c3", "c2"]);
        let latest = git.commits("r", &CommitsOptions::latest(2)).await.unwrap();
        assert_eq!(ids(latest), vec!["c3", "c2"]);
    }

    #[tokio::test]
    async fn test_raw_diff_filters_paths() {
        let git = gitserver();
        let all = git.raw_diff("r", "c1", "c3", &[]).await.unwrap();
        assert_eq!(all, "diff a\ndiff b\n");
        let only_b = git
            .raw_diff("r", "c1", "c3", &["b.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(only_b, "diff b\n");
        assert_eq!(git.read_file("r", "c1", "a.txt").await.unwrap(), "hello\n");
    }
}

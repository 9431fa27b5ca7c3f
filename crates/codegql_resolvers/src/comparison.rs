//! Repository comparisons: commits and file diffs between two revisions.
//!
//! A preview comparison has no head commit. Its diff is a client-supplied
//! patch, and the new side of each file is that patch applied to the base.

use crate::repository::RepositoryResolver;
use crate::services::Services;
use async_trait::async_trait;
use codegql_backend::types::{Commit, Repo, Signature};
use codegql_backend::{CommitsOptions, HighlightOptions, HighlightedFile};
use codegql_core::{
    decode_offset, encode_cursor, encode_int_cursor, marshal_id, resolve_list, resolve_object,
    resolve_optional, Arguments, GqlError, GqlResult, Object, PageInfo, RequestContext,
    Selection, ValueObject,
};
use codegql_diff::{
    apply_patch, highlight_hunk, parse_multi_file_diff, DiffError, DiffStat, FileDiff, Hunk,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

fn invalid_patch(err: DiffError) -> GqlError {
    GqlError::bad_request(format!("invalid patch: {}", err))
}

enum Head {
    Commit { spec: String, oid: String },
    Preview { patch: String, files: Vec<FileDiff> },
}

struct ComparisonState {
    services: Arc<Services>,
    repo: Repo,
    base_spec: String,
    base_oid: String,
    head: Head,
}

impl ComparisonState {
    /// The raw diff and its parsed files, restricted to `paths` if any are given.
    async fn file_diffs(&self, paths: &[String]) -> GqlResult<(String, Vec<FileDiff>)> {
        match &self.head {
            Head::Commit { oid, .. } => {
                let raw = self
                    .services
                    .gitserver
                    .raw_diff(&self.repo.name, &self.base_oid, oid, paths)
                    .await?;
                let files = parse_multi_file_diff(&raw)
                    .map_err(|e| GqlError::backend(format!("parsing diff: {}", e)))?;
                Ok((raw, files))
            }
            Head::Preview { patch, files } => {
                let files = files
                    .iter()
                    .filter(|f| {
                        paths.is_empty()
                            || f.new_path().is_some_and(|p| paths.contains(&p))
                            || f.orig_path().is_some_and(|p| paths.contains(&p))
                    })
                    .cloned()
                    .collect();
                Ok((patch.clone(), files))
            }
        }
    }
}

pub struct ComparisonResolver {
    state: Arc<ComparisonState>,
}

impl ComparisonResolver {
    pub(crate) async fn between(
        services: Arc<Services>,
        repo: Repo,
        base: &str,
        head: &str,
    ) -> GqlResult<Self> {
        let git = &services.gitserver;
        let base_oid = git.resolve_revision(&repo.name, base).await?;
        let head_oid = git.resolve_revision(&repo.name, head).await?;
        debug!(repo = %repo.name, base = %base_oid, head = %head_oid, "comparison resolved");
        Ok(Self {
            state: Arc::new(ComparisonState {
                base_spec: base.to_string(),
                base_oid,
                head: Head::Commit {
                    spec: head.to_string(),
                    oid: head_oid,
                },
                services,
                repo,
            }),
        })
    }

    pub(crate) async fn preview(
        services: Arc<Services>,
        repo: Repo,
        base: &str,
        patch: String,
    ) -> GqlResult<Self> {
        let files = parse_multi_file_diff(&patch).map_err(invalid_patch)?;
        let base_oid = services.gitserver.resolve_revision(&repo.name, base).await?;
        Ok(Self {
            state: Arc::new(ComparisonState {
                base_spec: base.to_string(),
                base_oid,
                head: Head::Preview { patch, files },
                services,
                repo,
            }),
        })
    }

    fn range(&self) -> Value {
        let state = &self.state;
        let base = json!({ "expr": state.base_spec, "oid": state.base_oid });
        match &state.head {
            Head::Commit { spec, oid } => json!({
                "expr": format!("{}...{}", state.base_spec, spec),
                "baseRevSpec": base,
                "headRevSpec": { "expr": spec, "oid": oid },
            }),
            Head::Preview { .. } => json!({
                "expr": format!("{}...", state.base_spec),
                "baseRevSpec": base,
                "headRevSpec": null,
            }),
        }
    }

    async fn commits(&self, first: Option<usize>) -> GqlResult<Vec<Commit>> {
        let state = &self.state;
        let Head::Commit { oid, .. } = &state.head else {
            return Ok(Vec::new());
        };
        let mut opts = CommitsOptions::range(&state.base_oid, oid);
        opts.n = first;
        let mut commits = state.services.gitserver.commits(&state.repo.name, &opts).await?;
        if let Some(first) = first {
            commits.truncate(first);
        }
        Ok(commits)
    }
}

fn non_negative(args: &Arguments, name: &str) -> GqlResult<Option<usize>> {
    match args.optional::<i32>(name)? {
        None => Ok(None),
        Some(n) => usize::try_from(n)
            .map(Some)
            .map_err(|_| GqlError::invalid_argument(format!("`{}` should be non-negative", name))),
    }
}

#[async_trait]
impl Object for ComparisonResolver {
    fn type_name(&self) -> &'static str {
        match self.state.head {
            Head::Commit { .. } => "RepositoryComparison",
            Head::Preview { .. } => "PreviewRepositoryComparison",
        }
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["range"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let state = &self.state;
        match field {
            "baseRepository" | "headRepository" => {
                let repo = RepositoryResolver::new(state.services.clone(), state.repo.clone());
                Ok(resolve_object(&repo, selection, ctx).await)
            }
            "range" => {
                let range = ValueObject::new("GitRevisionRange", &self.range())?;
                Ok(resolve_object(&range, selection, ctx).await)
            }
            "commits" => {
                let commits = self.commits(non_negative(args, "first")?).await?;
                let nodes: Vec<CommitResolver> = commits
                    .into_iter()
                    .map(|commit| CommitResolver {
                        repo: state.repo.clone(),
                        commit,
                    })
                    .collect();
                let connection =
                    crate::connection::ListConnection::new("GitCommitConnection", nodes);
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            "fileDiffs" => {
                let paths: Vec<String> = args.optional("paths")?.unwrap_or_default();
                let after: Option<String> = args.optional("after")?;
                let offset = decode_offset(after.as_deref())?;
                let first = non_negative(args, "first")?;
                let (raw, files) = state.file_diffs(&paths).await?;
                let connection = FileDiffConnection {
                    comparison: state.clone(),
                    raw,
                    files,
                    offset,
                    first,
                };
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

struct CommitResolver {
    repo: Repo,
    commit: Commit,
}

fn signature(sig: &Signature) -> Value {
    json!({
        "person": {
            "name": sig.name,
            "email": sig.email,
            "displayName": sig.name,
        },
        "date": sig.date,
    })
}

fn abbreviate(oid: &str) -> &str {
    oid.get(..7).unwrap_or(oid)
}

impl CommitResolver {
    fn subject(&self) -> &str {
        self.commit.message.lines().next().unwrap_or_default()
    }

    /// Everything after the subject line, or `None` if that is blank.
    fn body(&self) -> Option<&str> {
        let (_, rest) = self.commit.message.split_once('\n')?;
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    }
}

#[async_trait]
impl Object for CommitResolver {
    fn type_name(&self) -> &'static str {
        "GitCommit"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["oid", "subject"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let commit = &self.commit;
        match field {
            "id" => Ok(json!(marshal_id("GitCommit", (self.repo.id, &commit.id)))),
            "oid" => Ok(json!(commit.id)),
            "abbreviatedOID" => Ok(json!(abbreviate(&commit.id))),
            "message" => Ok(json!(commit.message)),
            "subject" => Ok(json!(self.subject())),
            "body" => Ok(json!(self.body())),
            "url" => Ok(json!(format!("/{}/-/commit/{}", self.repo.name, commit.id))),
            "author" | "committer" => {
                let sig = if field == "author" {
                    Some(&commit.author)
                } else {
                    commit.committer.as_ref()
                };
                let sig = sig.map(|s| ValueObject::new("Signature", &signature(s))).transpose()?;
                Ok(resolve_optional(sig.as_ref(), selection, ctx).await)
            }
            "parents" => {
                let parents = commit
                    .parents
                    .iter()
                    .map(|p| {
                        ValueObject::new(
                            "GitCommit",
                            &json!({ "oid": p, "abbreviatedOID": abbreviate(p) }),
                        )
                    })
                    .collect::<GqlResult<Vec<_>>>()?;
                Ok(resolve_list(&parents, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

/// File diffs paged by an int offset cursor.
struct FileDiffConnection {
    comparison: Arc<ComparisonState>,
    raw: String,
    files: Vec<FileDiff>,
    offset: usize,
    first: Option<usize>,
}

impl FileDiffConnection {
    fn end(&self) -> usize {
        let start = self.offset.min(self.files.len());
        match self.first {
            Some(first) => start.saturating_add(first).min(self.files.len()),
            None => self.files.len(),
        }
    }

    fn page(&self) -> &[FileDiff] {
        let start = self.offset.min(self.files.len());
        &self.files[start..self.end()]
    }

    fn page_info(&self) -> GqlResult<PageInfo> {
        let end = self.end();
        if end < self.files.len() {
            let next = i64::try_from(end).map_err(|e| GqlError::internal(e.to_string()))?;
            Ok(PageInfo::next(Some(encode_int_cursor(next))))
        } else {
            Ok(PageInfo::no_next())
        }
    }
}

fn stat_value(stat: DiffStat) -> GqlResult<ValueObject> {
    ValueObject::new("DiffStat", &stat)
}

#[async_trait]
impl Object for FileDiffConnection {
    fn type_name(&self) -> &'static str {
        "FileDiffConnection"
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        match field {
            "nodes" => {
                let nodes: Vec<FileDiffResolver> = self
                    .page()
                    .iter()
                    .map(|file| FileDiffResolver::new(self.comparison.clone(), file.clone()))
                    .collect();
                Ok(resolve_list(&nodes, selection, ctx).await)
            }
            "totalCount" => Ok(json!(self.files.len())),
            "pageInfo" => Ok(resolve_object(&self.page_info()?, selection, ctx).await),
            "rawDiff" => Ok(json!(self.raw)),
            "diffStat" => {
                let stat: DiffStat = self.files.iter().map(FileDiff::stat).sum();
                Ok(resolve_object(&stat_value(stat)?, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

/// Highlighted lines of both sides of one file diff.
struct HighlightedPair {
    base: Vec<String>,
    head: Vec<String>,
    aborted: bool,
}

struct FileDiffState {
    comparison: Arc<ComparisonState>,
    file: FileDiff,
    /// Highlighting per option set, computed at most once each.
    highlights: Mutex<Vec<(HighlightOptions, Arc<HighlightedPair>)>>,
    base: OnceCell<GqlResult<String>>,
    head: OnceCell<GqlResult<String>>,
}

impl FileDiffState {
    async fn base_content(&self) -> GqlResult<&str> {
        let result = self
            .base
            .get_or_init(|| async {
                let Some(path) = self.file.orig_path() else {
                    return Ok(String::new());
                };
                let c = &self.comparison;
                Ok(c.services
                    .gitserver
                    .read_file(&c.repo.name, &c.base_oid, &path)
                    .await?)
            })
            .await;
        result.as_deref().map_err(Clone::clone)
    }

    async fn head_content(&self) -> GqlResult<&str> {
        let result = self
            .head
            .get_or_init(|| async {
                let Some(path) = self.file.new_path() else {
                    return Ok(String::new());
                };
                let c = &self.comparison;
                match &c.head {
                    Head::Commit { oid, .. } => {
                        Ok(c.services.gitserver.read_file(&c.repo.name, oid, &path).await?)
                    }
                    // The new side of a preview is the patch applied to the base.
                    Head::Preview { .. } => {
                        Ok(apply_patch(self.base_content().await?, &self.file))
                    }
                }
            })
            .await;
        result.as_deref().map_err(Clone::clone)
    }

    async fn highlight_side(
        &self,
        path: Option<String>,
        content: &str,
        opts: &HighlightOptions,
    ) -> GqlResult<HighlightedFile> {
        match path {
            Some(path) => Ok(self
                .comparison
                .services
                .highlighter
                .highlight(&path, content, opts)
                .await?),
            None => Ok(HighlightedFile::default()),
        }
    }

    async fn highlighted(&self, opts: HighlightOptions) -> GqlResult<Arc<HighlightedPair>> {
        let mut cache = self.highlights.lock().await;
        if let Some((_, pair)) = cache.iter().find(|(o, _)| *o == opts) {
            return Ok(pair.clone());
        }
        let base_content = self.base_content().await?;
        let head_content = self.head_content().await?;
        let base = self
            .highlight_side(self.file.orig_path(), base_content, &opts)
            .await?;
        let head = self
            .highlight_side(self.file.new_path(), head_content, &opts)
            .await?;
        let pair = Arc::new(HighlightedPair {
            aborted: base.aborted || head.aborted,
            base: base.lines,
            head: head.lines,
        });
        cache.push((opts, pair.clone()));
        Ok(pair)
    }
}

#[derive(Clone)]
struct FileDiffResolver {
    state: Arc<FileDiffState>,
}

impl FileDiffResolver {
    fn new(comparison: Arc<ComparisonState>, file: FileDiff) -> Self {
        Self {
            state: Arc::new(FileDiffState {
                comparison,
                file,
                highlights: Mutex::new(Vec::new()),
                base: OnceCell::new(),
                head: OnceCell::new(),
            }),
        }
    }

    fn old_file(&self) -> Option<FileResolver> {
        self.state.file.orig_path().map(|path| FileResolver {
            state: self.state.clone(),
            path,
            side: Side::Base,
        })
    }

    fn new_file(&self) -> Option<FileResolver> {
        self.state.file.new_path().map(|path| FileResolver {
            state: self.state.clone(),
            path,
            side: Side::Head,
        })
    }

    fn internal_id(&self) -> String {
        let file = &self.state.file;
        encode_cursor(&format!(
            "{}:{}",
            file.orig_path().unwrap_or_default(),
            file.new_path().unwrap_or_default()
        ))
    }
}

#[async_trait]
impl Object for FileDiffResolver {
    fn type_name(&self) -> &'static str {
        "FileDiff"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["oldPath", "newPath"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let file = &self.state.file;
        match field {
            "oldPath" => Ok(json!(file.orig_path())),
            "newPath" => Ok(json!(file.new_path())),
            "oldFile" => Ok(resolve_optional(self.old_file().as_ref(), selection, ctx).await),
            "newFile" => Ok(resolve_optional(self.new_file().as_ref(), selection, ctx).await),
            "mostRelevantFile" => {
                let relevant = self.new_file().or_else(|| self.old_file());
                Ok(resolve_optional(relevant.as_ref(), selection, ctx).await)
            }
            "hunks" => {
                let hunks: Vec<HunkResolver> = (0..file.hunks.len())
                    .map(|index| HunkResolver {
                        state: self.state.clone(),
                        index,
                    })
                    .collect();
                Ok(resolve_list(&hunks, selection, ctx).await)
            }
            "stat" => Ok(resolve_object(&stat_value(file.stat())?, selection, ctx).await),
            "internalID" => Ok(json!(self.internal_id())),
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Base,
    Head,
}

/// One side of a file diff. The head side of a preview is virtual.
struct FileResolver {
    state: Arc<FileDiffState>,
    path: String,
    side: Side,
}

impl FileResolver {
    fn is_virtual(&self) -> bool {
        self.side == Side::Head && matches!(self.state.comparison.head, Head::Preview { .. })
    }
}

#[async_trait]
impl Object for FileResolver {
    fn type_name(&self) -> &'static str {
        if self.is_virtual() {
            "VirtualFile"
        } else {
            "GitBlob"
        }
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["path"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        _selection: &Selection,
        _ctx: &RequestContext,
    ) -> GqlResult<Value> {
        match field {
            "path" => Ok(json!(self.path)),
            "name" => Ok(json!(self.path.rsplit('/').next().unwrap_or(&self.path))),
            "content" => {
                let content = match self.side {
                    Side::Base => self.state.base_content().await?,
                    Side::Head => self.state.head_content().await?,
                };
                Ok(json!(content))
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

struct HunkResolver {
    state: Arc<FileDiffState>,
    index: usize,
}

impl HunkResolver {
    fn hunk(&self) -> GqlResult<&Hunk> {
        self.state
            .file
            .hunks
            .get(self.index)
            .ok_or_else(|| GqlError::internal(format!("hunk {} out of range", self.index)))
    }
}

#[async_trait]
impl Object for HunkResolver {
    fn type_name(&self) -> &'static str {
        "FileDiffHunk"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["body"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let hunk = self.hunk()?;
        match field {
            "oldRange" | "newRange" => {
                let (start, lines) = if field == "oldRange" {
                    (hunk.orig_start_line, hunk.orig_lines)
                } else {
                    (hunk.new_start_line, hunk.new_lines)
                };
                let range = ValueObject::new(
                    "FileDiffHunkRange",
                    &json!({ "startLine": start, "lines": lines }),
                )?;
                Ok(resolve_object(&range, selection, ctx).await)
            }
            "section" => Ok(if hunk.section.is_empty() {
                Value::Null
            } else {
                json!(hunk.section)
            }),
            "body" => Ok(json!(hunk.body)),
            "oldNoNewlineAt" => Ok(json!(hunk.orig_no_newline_at.is_some())),
            "highlight" => {
                let opts = HighlightOptions {
                    disable_timeout: args.optional("disableTimeout")?.unwrap_or(false),
                    highlight_long_lines: args.optional("highlightLongLines")?.unwrap_or(false),
                };
                let pair = self.state.highlighted(opts).await?;
                let lines = highlight_hunk(hunk, &pair.base, &pair.head)
                    .map_err(|e| GqlError::internal(format!("highlighting hunk: {}", e)))?;
                let body = ValueObject::new(
                    "HighlightedDiffHunkBody",
                    &json!({ "aborted": pair.aborted, "lines": lines }),
                )?;
                Ok(resolve_object(&body, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codegql_backend::{
        GitResult, GitserverClient, MemoryDb, MemoryGitserver, PlainHighlighter, Seed,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts file reads on top of the in-memory gitserver.
    struct CountingGitserver {
        inner: MemoryGitserver,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl GitserverClient for CountingGitserver {
        async fn resolve_revision(&self, repo: &str, spec: &str) -> GitResult<String> {
            self.inner.resolve_revision(repo, spec).await
        }

        async fn read_file(&self, repo: &str, commit: &str, path: &str) -> GitResult<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_file(repo, commit, path).await
        }

        async fn raw_diff(
            &self,
            repo: &str,
            base: &str,
            head: &str,
            paths: &[String],
        ) -> GitResult<String> {
            self.inner.raw_diff(repo, base, head, paths).await
        }

        async fn commits(&self, repo: &str, opts: &CommitsOptions) -> GitResult<Vec<Commit>> {
            self.inner.commits(repo, opts).await
        }
    }

    fn commit(message: &str) -> CommitResolver {
        let sig = Signature {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            date: Utc::now(),
        };
        CommitResolver {
            repo: serde_json::from_value(json!({"id": 1, "name": "github.com/a/b"})).unwrap(),
            commit: Commit {
                id: "0123456789abcdef".into(),
                author: sig,
                committer: None,
                message: message.into(),
                parents: vec![],
            },
        }
    }

    #[test]
    fn test_commit_subject_and_body() {
        let c = commit("Fix parser\n\nHandles empty hunks.\n");
        assert_eq!(c.subject(), "Fix parser");
        assert_eq!(c.body(), Some("Handles empty hunks."));

        let c = commit("One line\n");
        assert_eq!(c.body(), None);
        assert_eq!(abbreviate("0123456789abcdef"), "0123456");
        assert_eq!(abbreviate("abc"), "abc");
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(&Arguments::new(), "first").unwrap(), None);
        assert_eq!(
            non_negative(&Arguments::new().with("first", 2), "first").unwrap(),
            Some(2)
        );
        assert!(non_negative(&Arguments::new().with("first", -2), "first").is_err());
    }

    #[tokio::test]
    async fn test_preview_reads_base_once() {
        let seed: Seed = serde_json::from_value(json!({
            "repos": [{"id": 1, "name": "r"}],
            "git": [{
                "repo": "r",
                "commits": [{
                    "id": "c1",
                    "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-03-01T09:00:00Z"}
                }],
                "refs": {"main": "c1"},
                "files": [{"commit": "c1", "path": "README.md", "content": "a\n"}]
            }]
        }))
        .unwrap();
        let git = Arc::new(CountingGitserver {
            inner: MemoryGitserver::from_seed(&seed),
            reads: AtomicUsize::new(0),
        });
        let services = Arc::new(Services::new(
            Arc::new(MemoryDb::from_seed(&seed)),
            git.clone(),
            Arc::new(PlainHighlighter::new()),
        ));
        let repo: Repo = serde_json::from_value(json!({"id": 1, "name": "r"})).unwrap();
        let patch = "diff --git a/README.md b/README.md\n--- a/README.md\n+++ b/README.md\n@@ -1 +1,2 @@\n a\n+b\n";
        let comparison = ComparisonResolver::preview(services, repo, "main", patch.to_string())
            .await
            .unwrap();

        let (_, files) = comparison.state.file_diffs(&[]).await.unwrap();
        let diff = FileDiffResolver::new(comparison.state.clone(), files[0].clone());
        assert_eq!(diff.state.head_content().await.unwrap(), "a\nb\n");
        assert_eq!(diff.state.head_content().await.unwrap(), "a\nb\n");
        assert_eq!(diff.state.base_content().await.unwrap(), "a\n");
        assert_eq!(git.reads.load(Ordering::SeqCst), 1);
    }
}

//! In-memory backends used by tests and the demo server.
//!
//! Every table sits behind a `tokio::sync::RwLock`. `MemoryDb` implements all
//! store traits itself and hands out `&self` from each [`Db`] accessor.

mod admin;
mod content;
mod gitserver;
mod repos;
mod teams;
mod users;

pub use gitserver::MemoryGitserver;

use crate::db::*;
use crate::types::*;
use codegql_core::{CursorValue, Paginated, PaginationArgs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tokio::sync::RwLock;

/// Applies keyset pagination to an in-memory list.
///
/// Rows are sorted by their `order_by` cursor values, filtered to lie strictly
/// between `after` and `before`, and cut to `first`/`last`. Backward pages are
/// returned in reversed order, the way a SQL store would return them.
pub fn paginate_in_memory<T, I>(items: I, args: &PaginationArgs) -> Vec<T>
where
    T: Paginated,
    I: IntoIterator<Item = T>,
{
    let mut keyed: Vec<(Vec<CursorValue>, T)> = items
        .into_iter()
        .map(|item| (item.cursor_values(&args.order_by), item))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    if !args.ascending {
        keyed.reverse();
    }

    let follows = |key: &Vec<CursorValue>, cursor: &Vec<CursorValue>| {
        if args.ascending {
            key > cursor
        } else {
            key < cursor
        }
    };
    keyed.retain(|(key, _)| {
        args.after.as_ref().map_or(true, |after| follows(key, after))
            && args.before.as_ref().map_or(true, |before| follows(before, key))
    });

    if args.is_backward() {
        keyed.reverse();
    }
    if let Some(limit) = args.limit() {
        keyed.truncate(limit);
    }
    keyed.into_iter().map(|(_, item)| item).collect()
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub(crate) fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Files, diffs and history of one repository for [`MemoryGitserver`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitRepoSeed {
    pub repo: String,
    /// Linear history, oldest first.
    #[serde(default)]
    pub commits: Vec<Commit>,
    /// Ref name to commit id.
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<FileSeed>,
    #[serde(default)]
    pub diffs: Vec<DiffSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSeed {
    pub commit: String,
    pub path: String,
    pub content: String,
}

/// The diff of one file between two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSeed {
    pub base: String,
    pub head: String,
    pub path: String,
    pub diff: String,
}

/// Initial contents of the in-memory backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub users: Vec<User>,
    pub user_emails: Vec<UserEmail>,
    pub external_accounts: Vec<ExternalAccount>,
    pub orgs: Vec<Org>,
    pub org_members: Vec<OrgMember>,
    pub teams: Vec<Team>,
    pub team_members: Vec<TeamMember>,
    pub repos: Vec<Repo>,
    pub external_services: Vec<ExternalService>,
    pub webhooks: Vec<Webhook>,
    pub webhook_logs: Vec<WebhookLog>,
    pub executor_secrets: Vec<ExecutorSecret>,
    pub permission_sync_jobs: Vec<PermissionSyncJob>,
    pub notebooks: Vec<Notebook>,
    pub search_contexts: Vec<SearchContext>,
    pub github_apps: Vec<GitHubApp>,
    pub git: Vec<GitRepoSeed>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid seed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid seed: {0}")]
    Invalid(String),
}

impl Seed {
    pub fn from_json(text: &str) -> Result<Self, SeedError> {
        let seed: Seed = serde_json::from_str(text)?;
        seed.validate()?;
        Ok(seed)
    }

    /// Checks ids are unique and references point at seeded rows.
    pub fn validate(&self) -> Result<(), SeedError> {
        fn unique<K: Ord + std::fmt::Display>(
            what: &str,
            keys: impl IntoIterator<Item = K>,
        ) -> Result<BTreeSet<K>, SeedError> {
            let mut seen = BTreeSet::new();
            for key in keys {
                if seen.contains(&key) {
                    return Err(SeedError::Invalid(format!("duplicate {} id {}", what, key)));
                }
                seen.insert(key);
            }
            Ok(seen)
        }

        let users = unique("user", self.users.iter().map(|u| u.id))?;
        let teams = unique("team", self.teams.iter().map(|t| t.id))?;
        let orgs = unique("org", self.orgs.iter().map(|o| o.id))?;
        unique("repo", self.repos.iter().map(|r| r.id))?;
        unique("username", self.users.iter().map(|u| u.username.clone()))?;
        unique("team name", self.teams.iter().map(|t| t.name.clone()))?;

        if teams.contains(&0) {
            return Err(SeedError::Invalid("team id 0 is reserved".into()));
        }
        for team in &self.teams {
            if let Some(parent) = team.parent_team_id {
                if !teams.contains(&parent) {
                    return Err(SeedError::Invalid(format!(
                        "team {} has unknown parent {}",
                        team.name, parent
                    )));
                }
            }
        }
        for member in &self.team_members {
            if !teams.contains(&member.team_id) || !users.contains(&member.user_id) {
                return Err(SeedError::Invalid(format!(
                    "team member {:?} references unknown team or user",
                    member
                )));
            }
        }
        for member in &self.org_members {
            if !orgs.contains(&member.org_id) || !users.contains(&member.user_id) {
                return Err(SeedError::Invalid(format!(
                    "org member {}/{} references unknown org or user",
                    member.org_id, member.user_id
                )));
            }
        }
        for email in &self.user_emails {
            if !users.contains(&email.user_id) {
                return Err(SeedError::Invalid(format!(
                    "email {} belongs to unknown user {}",
                    email.email, email.user_id
                )));
            }
        }
        Ok(())
    }
}

/// An in-memory [`Db`].
#[derive(Default)]
pub struct MemoryDb {
    users: RwLock<BTreeMap<i32, User>>,
    user_emails: RwLock<Vec<UserEmail>>,
    external_accounts: RwLock<Vec<ExternalAccount>>,
    orgs: RwLock<BTreeMap<i32, Org>>,
    org_members: RwLock<Vec<OrgMember>>,
    teams: RwLock<BTreeMap<i32, Team>>,
    team_members: RwLock<BTreeSet<TeamMember>>,
    repos: RwLock<BTreeMap<i32, Repo>>,
    external_services: RwLock<BTreeMap<i64, ExternalService>>,
    webhooks: RwLock<BTreeMap<i32, Webhook>>,
    webhook_logs: RwLock<Vec<WebhookLog>>,
    executor_secrets: RwLock<Vec<ExecutorSecret>>,
    permission_sync_jobs: RwLock<BTreeMap<i32, PermissionSyncJob>>,
    notebooks: RwLock<BTreeMap<i64, Notebook>>,
    search_contexts: RwLock<BTreeMap<i64, SearchContext>>,
    github_apps: RwLock<BTreeMap<i32, GitHubApp>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: &Seed) -> Self {
        fn by_id<K: Ord, T: Clone>(rows: &[T], key: impl Fn(&T) -> K) -> RwLock<BTreeMap<K, T>> {
            RwLock::new(rows.iter().map(|r| (key(r), r.clone())).collect())
        }

        Self {
            users: by_id(&seed.users, |u| u.id),
            user_emails: RwLock::new(seed.user_emails.clone()),
            external_accounts: RwLock::new(seed.external_accounts.clone()),
            orgs: by_id(&seed.orgs, |o| o.id),
            org_members: RwLock::new(seed.org_members.clone()),
            teams: by_id(&seed.teams, |t| t.id),
            team_members: RwLock::new(seed.team_members.iter().copied().collect()),
            repos: by_id(&seed.repos, |r| r.id),
            external_services: by_id(&seed.external_services, |s| s.id),
            webhooks: by_id(&seed.webhooks, |w| w.id),
            webhook_logs: RwLock::new(seed.webhook_logs.clone()),
            executor_secrets: RwLock::new(seed.executor_secrets.clone()),
            permission_sync_jobs: by_id(&seed.permission_sync_jobs, |j| j.id),
            notebooks: by_id(&seed.notebooks, |n| n.id),
            search_contexts: by_id(&seed.search_contexts, |c| c.id),
            github_apps: by_id(&seed.github_apps, |a| a.id),
        }
    }
}

impl Db for MemoryDb {
    fn users(&self) -> &dyn UserStore {
        self
    }

    fn user_external_accounts(&self) -> &dyn UserExternalAccountStore {
        self
    }

    fn orgs(&self) -> &dyn OrgStore {
        self
    }

    fn teams(&self) -> &dyn TeamStore {
        self
    }

    fn repos(&self) -> &dyn RepoStore {
        self
    }

    fn external_services(&self) -> &dyn ExternalServiceStore {
        self
    }

    fn webhooks(&self) -> &dyn WebhookStore {
        self
    }

    fn webhook_logs(&self) -> &dyn WebhookLogStore {
        self
    }

    fn executor_secrets(&self) -> &dyn ExecutorSecretStore {
        self
    }

    fn permission_sync_jobs(&self) -> &dyn PermissionSyncJobStore {
        self
    }

    fn notebooks(&self) -> &dyn NotebookStore {
        self
    }

    fn search_contexts(&self) -> &dyn SearchContextStore {
        self
    }

    fn github_apps(&self) -> &dyn GitHubAppStore {
        self
    }
}

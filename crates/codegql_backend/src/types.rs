//! Entity types returned by the stores.

use chrono::{DateTime, Utc};
use codegql_core::{CursorValue, OrderByColumn, Paginated};
use serde::{Deserialize, Serialize};
use std::fmt;

fn micros(t: &DateTime<Utc>) -> CursorValue {
    CursorValue::Int(t.timestamp_micros())
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

// Users

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub site_admin: bool,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Paginated for User {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Username | OrderByColumn::Name => self.username.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                OrderByColumn::UpdatedAt => micros(&self.updated_at),
                _ => self.id.into(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmail {
    pub user_id: i32,
    pub email: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub id: i32,
    pub user_id: i32,
    pub service_type: String,
    pub service_id: String,
    pub account_id: String,
    #[serde(default)]
    pub login: Option<String>,
}

// Organizations

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

impl Paginated for Org {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.name.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                _ => self.id.into(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMember {
    pub org_id: i32,
    pub user_id: i32,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

// Teams

/// A team. A team with id 0 is external: it is known from a code host
/// ownership file but not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub parent_team_id: Option<i32>,
    #[serde(default)]
    pub creator_id: Option<i32>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Builds an unsaved team.
    pub fn new(name: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            display_name: String::new(),
            read_only: false,
            parent_team_id: None,
            creator_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_external(&self) -> bool {
        self.id == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: i32,
    pub user_id: i32,
}

// Repositories

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub external_service_ids: Vec<i64>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Paginated for Repo {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.name.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                OrderByColumn::UpdatedAt => micros(&self.updated_at),
                _ => self.id.into(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalService {
    pub id: i64,
    pub kind: String,
    pub display_name: String,
    #[serde(default)]
    pub config: String,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Paginated for ExternalService {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.display_name.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                _ => CursorValue::Int(self.id),
            })
            .collect()
    }
}

// Webhooks

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i32,
    pub uuid: String,
    pub name: String,
    pub code_host_kind: String,
    pub code_host_urn: String,
    #[serde(default)]
    pub created_by_user_id: Option<i32>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Paginated for Webhook {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.name.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                _ => self.id.into(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: i64,
    #[serde(default)]
    pub webhook_id: Option<i32>,
    #[serde(default)]
    pub external_service_id: Option<i64>,
    pub status_code: i32,
    #[serde(default = "now")]
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub response: String,
}

impl WebhookLog {
    pub fn is_error(&self) -> bool {
        self.status_code < 100 || self.status_code > 399
    }
}

// Executor secrets

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutorSecretScope {
    Batches,
    Codeintel,
}

impl ExecutorSecretScope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Batches => "BATCHES",
            Self::Codeintel => "CODEINTEL",
        }
    }
}

impl fmt::Display for ExecutorSecretScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSecret {
    pub id: i64,
    pub key: String,
    pub scope: ExecutorSecretScope,
    #[serde(default)]
    pub namespace_user_id: Option<i32>,
    #[serde(default)]
    pub namespace_org_id: Option<i32>,
    #[serde(default)]
    pub creator_id: Option<i32>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl ExecutorSecret {
    pub fn is_global(&self) -> bool {
        self.namespace_user_id.is_none() && self.namespace_org_id.is_none()
    }
}

impl Paginated for ExecutorSecret {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.key.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                _ => CursorValue::Int(self.id),
            })
            .collect()
    }
}

// Permission sync jobs

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionSyncJobState {
    Queued,
    Processing,
    Errored,
    Failed,
    Completed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionSyncJobReason {
    ManualUserSync,
    ManualRepoSync,
    UserOutdatedPermissions,
    RepoOutdatedPermissions,
    UserNoPermissions,
    RepoNoPermissions,
    UserEmailAdded,
    UserAdded,
    ExternalAccountAdded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSyncJob {
    pub id: i32,
    pub state: PermissionSyncJobState,
    pub reason: PermissionSyncJobReason,
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub repository_id: Option<i32>,
    #[serde(default)]
    pub triggered_by_user_id: Option<i32>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "now")]
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl Paginated for PermissionSyncJob {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::QueuedAt | OrderByColumn::CreatedAt => micros(&self.queued_at),
                _ => self.id.into(),
            })
            .collect()
    }
}

// Notebooks

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotebookBlockKind {
    Markdown,
    Query,
    File,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookBlock {
    pub id: String,
    pub kind: NotebookBlockKind,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<NotebookBlock>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub creator_user_id: Option<i32>,
    #[serde(default)]
    pub namespace_user_id: Option<i32>,
    #[serde(default)]
    pub namespace_org_id: Option<i32>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Paginated for Notebook {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.title.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                OrderByColumn::UpdatedAt => micros(&self.updated_at),
                _ => CursorValue::Int(self.id),
            })
            .collect()
    }
}

// Search contexts

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub namespace_user_id: Option<i32>,
    #[serde(default)]
    pub namespace_org_id: Option<i32>,
    #[serde(default)]
    pub query: String,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Paginated for SearchContext {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.name.as_str().into(),
                OrderByColumn::UpdatedAt => micros(&self.updated_at),
                _ => CursorValue::Int(self.id),
            })
            .collect()
    }
}

// GitHub apps

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GitHubAppDomain {
    Repos,
    Batches,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubApp {
    pub id: i32,
    pub app_id: i32,
    pub name: String,
    pub slug: String,
    pub base_url: String,
    pub domain: GitHubAppDomain,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

impl Paginated for GitHubApp {
    fn cursor_values(&self, order_by: &[OrderByColumn]) -> Vec<CursorValue> {
        order_by
            .iter()
            .map(|col| match col {
                OrderByColumn::Name => self.name.as_str().into(),
                OrderByColumn::CreatedAt => micros(&self.created_at),
                _ => self.id.into(),
            })
            .collect()
    }
}

// Git

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub author: Signature,
    #[serde(default)]
    pub committer: Option<Signature>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

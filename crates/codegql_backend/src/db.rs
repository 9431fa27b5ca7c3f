//! Database store interfaces.
//!
//! Resolvers only ever talk to the database through these traits. The `Db`
//! trait aggregates them so a single `Arc<dyn Db>` can be threaded through.

use crate::error::StoreResult;
use crate::types::*;
use async_trait::async_trait;
use codegql_core::PaginationArgs;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersListOptions {
    pub user_ids: Vec<i32>,
    pub usernames: Vec<String>,
    /// Case-insensitive substring match on username or display name.
    pub query: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<User>;
    async fn get_by_username(&self, username: &str) -> StoreResult<User>;
    async fn get_by_verified_email(&self, email: &str) -> StoreResult<User>;
    async fn list(&self, opts: &UsersListOptions) -> StoreResult<Vec<User>>;
    async fn list_paginated(
        &self,
        opts: &UsersListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<User>>;
    async fn count(&self, opts: &UsersListOptions) -> StoreResult<i64>;
    async fn emails_for_user(&self, user_id: i32) -> StoreResult<Vec<UserEmail>>;
    /// Returns the verified email records among `emails`.
    async fn verified_emails(&self, emails: &[String]) -> StoreResult<Vec<UserEmail>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalAccountsListOptions {
    pub user_id: Option<i32>,
    pub service_type: Option<String>,
    pub service_id: Option<String>,
}

#[async_trait]
pub trait UserExternalAccountStore: Send + Sync {
    async fn list(&self, opts: &ExternalAccountsListOptions) -> StoreResult<Vec<ExternalAccount>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgsListOptions {
    pub query: Option<String>,
}

#[async_trait]
pub trait OrgStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<Org>;
    async fn get_by_name(&self, name: &str) -> StoreResult<Org>;
    async fn list_paginated(
        &self,
        opts: &OrgsListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Org>>;
    async fn count(&self, opts: &OrgsListOptions) -> StoreResult<i64>;
    async fn orgs_for_user(&self, user_id: i32) -> StoreResult<Vec<Org>>;
    /// Lists member users of an org, paginated by user id.
    async fn list_members(&self, org_id: i32, args: &PaginationArgs) -> StoreResult<Vec<User>>;
    async fn count_members(&self, org_id: i32) -> StoreResult<i64>;
    async fn add_member(&self, org_id: i32, user_id: i32) -> StoreResult<OrgMember>;
}

/// Filters for listing teams.
///
/// `cursor` is inclusive: teams with `id >= cursor` are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTeamsOpts {
    pub cursor: i32,
    pub limit: Option<usize>,
    pub with_parent_id: Option<i32>,
    pub search: String,
    pub root_only: bool,
    /// Excludes this team and all of its descendants.
    pub except_ancestor_id: Option<i32>,
    /// Only teams the user is a member of.
    pub for_user_id: Option<i32>,
}

/// Position in a team member listing. Inclusive, like the team cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TeamMemberListCursor {
    #[serde(rename = "team", default)]
    pub team_id: i32,
    #[serde(rename = "user", default)]
    pub user_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTeamMembersOpts {
    pub cursor: TeamMemberListCursor,
    pub team_id: i32,
    /// Case-insensitive substring match on the member's username or display name.
    pub search: String,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn get_team_by_id(&self, id: i32) -> StoreResult<Team>;
    async fn get_team_by_name(&self, name: &str) -> StoreResult<Team>;
    /// Returns a page of teams and the cursor of the next page, if any.
    async fn list_teams(&self, opts: &ListTeamsOpts) -> StoreResult<(Vec<Team>, Option<i32>)>;
    /// Counts teams, ignoring cursor and limit.
    async fn count_teams(&self, opts: &ListTeamsOpts) -> StoreResult<i64>;
    /// Returns true if the team with `id` is among the teams `opts` selects.
    async fn contains_team(&self, id: i32, opts: &ListTeamsOpts) -> StoreResult<bool>;
    async fn list_team_members(
        &self,
        opts: &ListTeamMembersOpts,
    ) -> StoreResult<(Vec<TeamMember>, Option<TeamMemberListCursor>)>;
    async fn count_team_members(&self, opts: &ListTeamMembersOpts) -> StoreResult<i64>;
    async fn create_team(&self, team: Team) -> StoreResult<Team>;
    async fn update_team(&self, team: &Team) -> StoreResult<()>;
    async fn delete_team(&self, id: i32) -> StoreResult<()>;
    /// Adds members. Existing memberships are left alone.
    async fn create_team_member(&self, members: &[TeamMember]) -> StoreResult<()>;
    async fn delete_team_member(&self, members: &[TeamMember]) -> StoreResult<()>;
    async fn is_team_member(&self, team_id: i32, user_id: i32) -> StoreResult<bool>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReposListOptions {
    /// Case-insensitive substring match on the repository name.
    pub query: Option<String>,
    pub external_service_id: Option<i64>,
}

#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<Repo>;
    async fn get_by_name(&self, name: &str) -> StoreResult<Repo>;
    async fn list_paginated(
        &self,
        opts: &ReposListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Repo>>;
    async fn count(&self, opts: &ReposListOptions) -> StoreResult<i64>;
    /// Lists the most recently updated repositories, newest first.
    async fn list_recently_updated(&self, limit: usize) -> StoreResult<Vec<Repo>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalServicesListOptions {
    pub kinds: Vec<String>,
}

#[async_trait]
pub trait ExternalServiceStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> StoreResult<ExternalService>;
    async fn list_paginated(
        &self,
        opts: &ExternalServicesListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<ExternalService>>;
    async fn count(&self, opts: &ExternalServicesListOptions) -> StoreResult<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhooksListOptions {
    pub kind: Option<String>,
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<Webhook>;
    async fn list_paginated(
        &self,
        opts: &WebhooksListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Webhook>>;
    async fn count(&self, opts: &WebhooksListOptions) -> StoreResult<i64>;
}

/// Filters for listing webhook logs, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookLogListOptions {
    pub webhook_id: Option<i32>,
    pub only_errors: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait WebhookLogStore: Send + Sync {
    /// Returns a page of logs and the offset of the next page, if any.
    async fn list(&self, opts: &WebhookLogListOptions)
        -> StoreResult<(Vec<WebhookLog>, Option<usize>)>;
    async fn count(&self, opts: &WebhookLogListOptions) -> StoreResult<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorSecretsListOptions {
    pub namespace_user_id: Option<i32>,
    pub namespace_org_id: Option<i32>,
}

#[async_trait]
pub trait ExecutorSecretStore: Send + Sync {
    async fn get_by_id(&self, scope: ExecutorSecretScope, id: i64) -> StoreResult<ExecutorSecret>;
    async fn list_paginated(
        &self,
        scope: ExecutorSecretScope,
        opts: &ExecutorSecretsListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<ExecutorSecret>>;
    async fn count(
        &self,
        scope: ExecutorSecretScope,
        opts: &ExecutorSecretsListOptions,
    ) -> StoreResult<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPermissionSyncJobOpts {
    pub state: Option<PermissionSyncJobState>,
    pub user_id: Option<i32>,
    pub repo_id: Option<i32>,
}

#[async_trait]
pub trait PermissionSyncJobStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<PermissionSyncJob>;
    async fn list_paginated(
        &self,
        opts: &ListPermissionSyncJobOpts,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<PermissionSyncJob>>;
    async fn count(&self, opts: &ListPermissionSyncJobOpts) -> StoreResult<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListNotebooksOptions {
    /// Case-insensitive substring match on the title.
    pub query: Option<String>,
    pub creator_user_id: Option<i32>,
    /// Viewer whose private notebooks are visible. `None` sees only public ones.
    pub viewer_id: Option<i32>,
}

#[async_trait]
pub trait NotebookStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> StoreResult<Notebook>;
    async fn list_paginated(
        &self,
        opts: &ListNotebooksOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Notebook>>;
    async fn count(&self, opts: &ListNotebooksOptions) -> StoreResult<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSearchContextsOptions {
    pub query: Option<String>,
    /// Viewer whose private contexts are visible.
    pub viewer_id: Option<i32>,
}

#[async_trait]
pub trait SearchContextStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> StoreResult<SearchContext>;
    async fn list_paginated(
        &self,
        opts: &ListSearchContextsOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<SearchContext>>;
    async fn count(&self, opts: &ListSearchContextsOptions) -> StoreResult<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitHubAppsListOptions {
    pub domain: Option<GitHubAppDomain>,
}

#[async_trait]
pub trait GitHubAppStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<GitHubApp>;
    async fn list_paginated(
        &self,
        opts: &GitHubAppsListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<GitHubApp>>;
    async fn count(&self, opts: &GitHubAppsListOptions) -> StoreResult<i64>;
}

/// The database as the resolvers see it.
pub trait Db: Send + Sync {
    fn users(&self) -> &dyn UserStore;
    fn user_external_accounts(&self) -> &dyn UserExternalAccountStore;
    fn orgs(&self) -> &dyn OrgStore;
    fn teams(&self) -> &dyn TeamStore;
    fn repos(&self) -> &dyn RepoStore;
    fn external_services(&self) -> &dyn ExternalServiceStore;
    fn webhooks(&self) -> &dyn WebhookStore;
    fn webhook_logs(&self) -> &dyn WebhookLogStore;
    fn executor_secrets(&self) -> &dyn ExecutorSecretStore;
    fn permission_sync_jobs(&self) -> &dyn PermissionSyncJobStore;
    fn notebooks(&self) -> &dyn NotebookStore;
    fn search_contexts(&self) -> &dyn SearchContextStore;
    fn github_apps(&self) -> &dyn GitHubAppStore;
}

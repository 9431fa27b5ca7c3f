//! Site administration objects: code host connections, webhooks, executor
//! secrets, permission sync jobs and GitHub apps.

use crate::connection::{options, paginated_by, resolve_keyset, KeysetSource};
use crate::loader::load_user;
use crate::org::OrgResolver;
use crate::repository::RepositoryResolver;
use crate::services::Services;
use crate::user::UserResolver;
use async_trait::async_trait;
use codegql_backend::db::{
    ExecutorSecretsListOptions, ExternalServicesListOptions, GitHubAppsListOptions,
    ListPermissionSyncJobOpts, WebhookLogListOptions, WebhooksListOptions,
};
use codegql_backend::types::{
    ExecutorSecret, ExecutorSecretScope, ExternalService, GitHubApp, PermissionSyncJob, Webhook,
    WebhookLog,
};
use codegql_core::{
    decode_offset, encode_int_cursor, marshal_id, resolve_list, resolve_object, resolve_optional,
    unmarshal_id, Arguments, GqlError, GqlResult, Object, OrderByColumn, PageInfo,
    PaginationArgs, RequestContext, Selection,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const EXTERNAL_SERVICE_KIND: &str = "ExternalService";
pub const WEBHOOK_KIND: &str = "Webhook";
pub const WEBHOOK_LOG_KIND: &str = "WebhookLog";
pub const EXECUTOR_SECRET_KIND: &str = "ExecutorSecret";
pub const PERMISSION_SYNC_JOB_KIND: &str = "PermissionSyncJob";
pub const GITHUB_APP_KIND: &str = "GitHubApp";

async fn resolve_user(
    services: &Arc<Services>,
    ctx: &RequestContext,
    id: Option<i32>,
    selection: &Selection,
) -> GqlResult<Value> {
    let Some(id) = id else {
        return Ok(Value::Null);
    };
    let user = load_user(services, ctx, id)
        .await?
        .map(|u| UserResolver::new(services.clone(), u));
    Ok(resolve_optional(user.as_ref(), selection, ctx).await)
}

// External services

#[derive(Clone)]
pub struct ExternalServiceResolver {
    services: Arc<Services>,
    service: ExternalService,
}

paginated_by!(ExternalServiceResolver, service);

impl ExternalServiceResolver {
    pub fn new(services: Arc<Services>, service: ExternalService) -> Self {
        Self { services, service }
    }
}

#[async_trait]
impl Object for ExternalServiceResolver {
    fn type_name(&self) -> &'static str {
        "ExternalService"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "kind", "displayName"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        _selection: &Selection,
        _ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let s = &self.service;
        match field {
            "id" => Ok(json!(marshal_id(EXTERNAL_SERVICE_KIND, s.id))),
            "kind" => Ok(json!(s.kind)),
            "displayName" => Ok(json!(s.display_name)),
            "config" => Ok(json!(s.config)),
            "createdAt" => Ok(json!(s.created_at)),
            "updatedAt" => Ok(json!(s.updated_at)),
            "repoCount" => {
                let opts = codegql_backend::db::ReposListOptions {
                    external_service_id: Some(s.id),
                    ..Default::default()
                };
                Ok(json!(self.services.db.repos().count(&opts).await?))
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct ExternalServiceSource {
    pub services: Arc<Services>,
    pub opts: ExternalServicesListOptions,
}

#[async_trait]
impl KeysetSource for ExternalServiceSource {
    type Node = ExternalServiceResolver;

    fn cursor_kind(&self) -> &'static str {
        EXTERNAL_SERVICE_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.external_services().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<ExternalServiceResolver>> {
        let services = self
            .services
            .db
            .external_services()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(services
            .into_iter()
            .map(|s| ExternalServiceResolver::new(self.services.clone(), s))
            .collect())
    }
}

// Webhooks

#[derive(Clone)]
pub struct WebhookResolver {
    services: Arc<Services>,
    webhook: Webhook,
}

paginated_by!(WebhookResolver, webhook);

impl WebhookResolver {
    pub fn new(services: Arc<Services>, webhook: Webhook) -> Self {
        Self { services, webhook }
    }

    fn url(&self) -> String {
        format!(
            "{}/.api/webhooks/{}",
            self.services.settings.external_url, self.webhook.uuid
        )
    }
}

#[async_trait]
impl Object for WebhookResolver {
    fn type_name(&self) -> &'static str {
        "Webhook"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "name", "url"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let w = &self.webhook;
        match field {
            "id" => Ok(json!(marshal_id(WEBHOOK_KIND, w.id))),
            "uuid" => Ok(json!(w.uuid)),
            "url" => Ok(json!(self.url())),
            "name" => Ok(json!(w.name)),
            "codeHostKind" => Ok(json!(w.code_host_kind)),
            "codeHostURN" => Ok(json!(w.code_host_urn)),
            "createdAt" => Ok(json!(w.created_at)),
            "updatedAt" => Ok(json!(w.updated_at)),
            "createdBy" => resolve_user(&self.services, ctx, w.created_by_user_id, selection).await,
            "webhookLogs" => {
                let connection = WebhookLogConnection::from_args(
                    self.services.clone(),
                    args,
                    WebhookLogListOptions {
                        webhook_id: Some(w.id),
                        ..WebhookLogListOptions::default()
                    },
                )?;
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct WebhookSource {
    pub services: Arc<Services>,
    pub opts: WebhooksListOptions,
}

#[async_trait]
impl KeysetSource for WebhookSource {
    type Node = WebhookResolver;

    fn cursor_kind(&self) -> &'static str {
        WEBHOOK_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.webhooks().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<WebhookResolver>> {
        let webhooks = self
            .services
            .db
            .webhooks()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(webhooks
            .into_iter()
            .map(|w| WebhookResolver::new(self.services.clone(), w))
            .collect())
    }
}

struct WebhookLogResolver {
    services: Arc<Services>,
    log: WebhookLog,
}

#[async_trait]
impl Object for WebhookLogResolver {
    fn type_name(&self) -> &'static str {
        "WebhookLog"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "statusCode"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let log = &self.log;
        match field {
            "id" => Ok(json!(marshal_id(WEBHOOK_LOG_KIND, log.id))),
            "receivedAt" => Ok(json!(log.received_at)),
            "statusCode" => Ok(json!(log.status_code)),
            "request" => Ok(json!(log.request)),
            "response" => Ok(json!(log.response)),
            "webhookID" => Ok(json!(log.webhook_id.map(|id| marshal_id(WEBHOOK_KIND, id)))),
            "externalService" => {
                let Some(id) = log.external_service_id else {
                    return Ok(Value::Null);
                };
                match self.services.db.external_services().get_by_id(id).await {
                    Ok(service) => {
                        let service = ExternalServiceResolver::new(self.services.clone(), service);
                        Ok(resolve_object(&service, selection, ctx).await)
                    }
                    Err(err) if err.is_not_found() => Ok(Value::Null),
                    Err(err) => Err(err.into()),
                }
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

/// Webhook logs, newest first, paged by an int offset cursor.
pub(crate) struct WebhookLogConnection {
    services: Arc<Services>,
    opts: WebhookLogListOptions,
    page: OnceCell<GqlResult<(Vec<WebhookLog>, PageInfo)>>,
}

impl WebhookLogConnection {
    pub(crate) fn from_args(
        services: Arc<Services>,
        args: &Arguments,
        mut opts: WebhookLogListOptions,
    ) -> GqlResult<Self> {
        let after: Option<String> = args.optional("after")?;
        opts.offset = decode_offset(after.as_deref())?;
        opts.only_errors = args.optional::<bool>("onlyErrors")?.unwrap_or(false);
        let first = match args.optional::<i32>("first")? {
            Some(n) => usize::try_from(n)
                .map_err(|_| GqlError::invalid_argument("`first` should be non-negative"))?,
            None => services.settings.max_page_size,
        };
        opts.limit = Some(first.min(services.settings.max_page_size));
        Ok(Self {
            services,
            opts,
            page: OnceCell::new(),
        })
    }

    async fn page(&self) -> GqlResult<&(Vec<WebhookLog>, PageInfo)> {
        let result = self
            .page
            .get_or_init(|| async {
                let (logs, next) = self.services.db.webhook_logs().list(&self.opts).await?;
                let page_info = match next {
                    Some(next) => {
                        let next = i64::try_from(next)
                            .map_err(|e| GqlError::internal(e.to_string()))?;
                        PageInfo::next(Some(encode_int_cursor(next)))
                    }
                    None => PageInfo::no_next(),
                };
                Ok((logs, page_info))
            })
            .await;
        result.as_ref().map_err(Clone::clone)
    }
}

#[async_trait]
impl Object for WebhookLogConnection {
    fn type_name(&self) -> &'static str {
        "WebhookLogConnection"
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
                let (logs, _) = self.page().await?;
                let nodes: Vec<WebhookLogResolver> = logs
                    .iter()
                    .map(|log| WebhookLogResolver {
                        services: self.services.clone(),
                        log: log.clone(),
                    })
                    .collect();
                Ok(resolve_list(&nodes, selection, ctx).await)
            }
            "totalCount" => {
                let opts = WebhookLogListOptions {
                    offset: 0,
                    limit: None,
                    ..self.opts.clone()
                };
                Ok(json!(self.services.db.webhook_logs().count(&opts).await?))
            }
            "pageInfo" => {
                let (_, page_info) = self.page().await?;
                Ok(resolve_object(page_info, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

// Executor secrets

/// An executor secret id names its scope, since ids are only unique per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSecretId {
    pub scope: ExecutorSecretScope,
    pub id: i64,
}

pub fn marshal_executor_secret_id(scope: ExecutorSecretScope, id: i64) -> String {
    marshal_id(EXECUTOR_SECRET_KIND, ExecutorSecretId { scope, id })
}

pub fn unmarshal_executor_secret_id(id: &str) -> GqlResult<ExecutorSecretId> {
    unmarshal_id(id, EXECUTOR_SECRET_KIND)
}

/// An executor secret. The secret value itself is never exposed.
#[derive(Clone)]
pub struct ExecutorSecretResolver {
    services: Arc<Services>,
    secret: ExecutorSecret,
}

paginated_by!(ExecutorSecretResolver, secret);

impl ExecutorSecretResolver {
    pub fn new(services: Arc<Services>, secret: ExecutorSecret) -> Self {
        Self { services, secret }
    }

    async fn namespace(&self) -> GqlResult<Option<Box<dyn Object>>> {
        let db = &self.services.db;
        if let Some(uid) = self.secret.namespace_user_id {
            let user = db.users().get_by_id(uid).await?;
            return Ok(Some(Box::new(UserResolver::new(self.services.clone(), user))));
        }
        if let Some(org_id) = self.secret.namespace_org_id {
            let org = db.orgs().get_by_id(org_id).await?;
            return Ok(Some(Box::new(OrgResolver::new(self.services.clone(), org))));
        }
        Ok(None)
    }
}

#[async_trait]
impl Object for ExecutorSecretResolver {
    fn type_name(&self) -> &'static str {
        "ExecutorSecret"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "key", "scope"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let s = &self.secret;
        match field {
            "id" => Ok(json!(marshal_executor_secret_id(s.scope, s.id))),
            "key" => Ok(json!(s.key)),
            "scope" => Ok(json!(s.scope)),
            "namespace" => {
                let namespace = self.namespace().await?;
                Ok(resolve_optional(namespace.as_ref(), selection, ctx).await)
            }
            "creator" => resolve_user(&self.services, ctx, s.creator_id, selection).await,
            "createdAt" => Ok(json!(s.created_at)),
            "updatedAt" => Ok(json!(s.updated_at)),
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

struct ExecutorSecretSource {
    services: Arc<Services>,
    scope: ExecutorSecretScope,
    opts: ExecutorSecretsListOptions,
}

#[async_trait]
impl KeysetSource for ExecutorSecretSource {
    type Node = ExecutorSecretResolver;

    fn cursor_kind(&self) -> &'static str {
        EXECUTOR_SECRET_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self
            .services
            .db
            .executor_secrets()
            .count(self.scope, &self.opts)
            .await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<ExecutorSecretResolver>> {
        let secrets = self
            .services
            .db
            .executor_secrets()
            .list_paginated(self.scope, &self.opts, args)
            .await?;
        Ok(secrets
            .into_iter()
            .map(|s| ExecutorSecretResolver::new(self.services.clone(), s))
            .collect())
    }
}

/// Resolves an executor secret connection. Callers check access to the namespace.
pub(crate) async fn resolve_executor_secrets(
    services: &Arc<Services>,
    scope: ExecutorSecretScope,
    opts: ExecutorSecretsListOptions,
    args: &Arguments,
    selection: &Selection,
    ctx: &RequestContext,
) -> GqlResult<Value> {
    let source = ExecutorSecretSource {
        services: services.clone(),
        scope,
        opts,
    };
    let options = options(services, "ExecutorSecretConnection")
        .order_by(vec![OrderByColumn::Name, OrderByColumn::Id], true);
    resolve_keyset(source, options, args, selection, ctx).await
}

// Permission sync jobs

#[derive(Clone)]
pub struct PermissionSyncJobResolver {
    services: Arc<Services>,
    job: PermissionSyncJob,
}

paginated_by!(PermissionSyncJobResolver, job);

impl PermissionSyncJobResolver {
    pub fn new(services: Arc<Services>, job: PermissionSyncJob) -> Self {
        Self { services, job }
    }

    /// The user or repository whose permissions are synced.
    async fn subject(&self) -> GqlResult<Option<Box<dyn Object>>> {
        let db = &self.services.db;
        if let Some(uid) = self.job.user_id {
            return match db.users().get_by_id(uid).await {
                Ok(user) => Ok(Some(Box::new(UserResolver::new(self.services.clone(), user)))),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err.into()),
            };
        }
        if let Some(repo_id) = self.job.repository_id {
            return match db.repos().get_by_id(repo_id).await {
                Ok(repo) => Ok(Some(Box::new(RepositoryResolver::new(
                    self.services.clone(),
                    repo,
                )))),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err.into()),
            };
        }
        Ok(None)
    }
}

#[async_trait]
impl Object for PermissionSyncJobResolver {
    fn type_name(&self) -> &'static str {
        "PermissionsSyncJob"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "state"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let job = &self.job;
        match field {
            "id" => Ok(json!(marshal_id(PERMISSION_SYNC_JOB_KIND, job.id))),
            "state" => Ok(json!(job.state)),
            "reason" => Ok(json!(job.reason)),
            "priority" => Ok(json!(job.priority)),
            "queuedAt" => Ok(json!(job.queued_at)),
            "startedAt" => Ok(json!(job.started_at)),
            "finishedAt" => Ok(json!(job.finished_at)),
            "failureMessage" => Ok(json!(job.failure_message)),
            "subject" => {
                let subject = self.subject().await?;
                Ok(resolve_optional(subject.as_ref(), selection, ctx).await)
            }
            "triggeredByUser" => {
                resolve_user(&self.services, ctx, job.triggered_by_user_id, selection).await
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct PermissionSyncJobSource {
    pub services: Arc<Services>,
    pub opts: ListPermissionSyncJobOpts,
}

#[async_trait]
impl KeysetSource for PermissionSyncJobSource {
    type Node = PermissionSyncJobResolver;

    fn cursor_kind(&self) -> &'static str {
        PERMISSION_SYNC_JOB_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self
            .services
            .db
            .permission_sync_jobs()
            .count(&self.opts)
            .await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<PermissionSyncJobResolver>> {
        let jobs = self
            .services
            .db
            .permission_sync_jobs()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(jobs
            .into_iter()
            .map(|j| PermissionSyncJobResolver::new(self.services.clone(), j))
            .collect())
    }
}

// GitHub apps

#[derive(Clone)]
pub struct GitHubAppResolver {
    app: GitHubApp,
}

paginated_by!(GitHubAppResolver, app);

impl GitHubAppResolver {
    pub fn new(app: GitHubApp) -> Self {
        Self { app }
    }

    fn app_url(&self) -> String {
        format!(
            "{}/apps/{}",
            self.app.base_url.trim_end_matches('/'),
            self.app.slug
        )
    }
}

#[async_trait]
impl Object for GitHubAppResolver {
    fn type_name(&self) -> &'static str {
        "GitHubApp"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "name", "slug"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        _selection: &Selection,
        _ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let app = &self.app;
        match field {
            "id" => Ok(json!(marshal_id(GITHUB_APP_KIND, app.id))),
            "appID" => Ok(json!(app.app_id)),
            "name" => Ok(json!(app.name)),
            "slug" => Ok(json!(app.slug)),
            "baseURL" => Ok(json!(app.base_url)),
            "appURL" => Ok(json!(self.app_url())),
            "domain" => Ok(json!(app.domain)),
            "clientID" => Ok(json!(app.client_id)),
            "logo" => Ok(json!(app.logo)),
            "createdAt" => Ok(json!(app.created_at)),
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct GitHubAppSource {
    pub services: Arc<Services>,
    pub opts: GitHubAppsListOptions,
}

#[async_trait]
impl KeysetSource for GitHubAppSource {
    type Node = GitHubAppResolver;

    fn cursor_kind(&self) -> &'static str {
        GITHUB_APP_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.github_apps().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<GitHubAppResolver>> {
        let apps = self
            .services
            .db
            .github_apps()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(apps.into_iter().map(GitHubAppResolver::new).collect())
    }
}

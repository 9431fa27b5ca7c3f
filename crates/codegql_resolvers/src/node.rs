//! `Query.node`: looks any object up by its opaque id.

use crate::admin::{
    unmarshal_executor_secret_id, ExecutorSecretResolver, ExternalServiceResolver,
    GitHubAppResolver, PermissionSyncJobResolver, WebhookResolver, EXECUTOR_SECRET_KIND,
    EXTERNAL_SERVICE_KIND, GITHUB_APP_KIND, PERMISSION_SYNC_JOB_KIND, WEBHOOK_KIND,
};
use crate::auth::{check_same_user_or_site_admin, check_site_admin, is_site_admin};
use crate::content::{NotebookResolver, SearchContextResolver, NOTEBOOK_KIND, SEARCH_CONTEXT_KIND};
use crate::org::{unmarshal_org_id, OrgResolver, ORG_KIND};
use crate::repository::{unmarshal_repository_id, RepositoryResolver, REPOSITORY_KIND};
use crate::services::Services;
use crate::team::{team_by_id, TeamResolver, TEAM_KIND};
use crate::user::{unmarshal_user_id, UserResolver, USER_KIND};
use codegql_backend::types::ExecutorSecret;
use codegql_backend::StoreResult;
use codegql_core::{unmarshal_id, unmarshal_kind, GqlError, GqlResult, Object, RequestContext};
use std::sync::Arc;
use tracing::debug;

fn found<T>(result: StoreResult<T>) -> GqlResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn boxed<O: Object + 'static>(value: Option<O>) -> Option<Box<dyn Object>> {
    value.map(|o| Box::new(o) as Box<dyn Object>)
}

async fn check_secret_access(
    services: &Services,
    ctx: &RequestContext,
    secret: &ExecutorSecret,
) -> GqlResult<()> {
    if let Some(uid) = secret.namespace_user_id {
        return check_same_user_or_site_admin(services, ctx, uid).await;
    }
    if let Some(org_id) = secret.namespace_org_id {
        if is_site_admin(services, ctx).await {
            return Ok(());
        }
        let Some(uid) = ctx.actor().uid else {
            return Err(GqlError::unauthenticated());
        };
        let orgs = services.db.orgs().orgs_for_user(uid).await?;
        if orgs.iter().any(|o| o.id == org_id) {
            return Ok(());
        }
        return Err(GqlError::forbidden("must be a member of the organization"));
    }
    check_site_admin(services, ctx).await
}

/// Resolves a node id. Missing or invisible entities are `None`.
pub(crate) async fn node_by_id(
    services: &Arc<Services>,
    ctx: &RequestContext,
    id: &str,
) -> GqlResult<Option<Box<dyn Object>>> {
    let kind = unmarshal_kind(id)?;
    debug!(kind = %kind, "resolving node");
    let db = &services.db;
    let node = match kind.as_str() {
        USER_KIND => {
            let user = found(db.users().get_by_id(unmarshal_user_id(id)?).await)?;
            boxed(user.map(|u| UserResolver::new(services.clone(), u)))
        }
        ORG_KIND => {
            let org = found(db.orgs().get_by_id(unmarshal_org_id(id)?).await)?;
            boxed(org.map(|o| OrgResolver::new(services.clone(), o)))
        }
        TEAM_KIND => {
            let team = team_by_id(services, id).await?;
            boxed(team.map(|t| TeamResolver::new(services.clone(), t)))
        }
        REPOSITORY_KIND => {
            let repo = found(db.repos().get_by_id(unmarshal_repository_id(id)?).await)?;
            boxed(repo.map(|r| RepositoryResolver::new(services.clone(), r)))
        }
        EXTERNAL_SERVICE_KIND => {
            check_site_admin(services, ctx).await?;
            let service = found(
                db.external_services()
                    .get_by_id(unmarshal_id(id, EXTERNAL_SERVICE_KIND)?)
                    .await,
            )?;
            boxed(service.map(|s| ExternalServiceResolver::new(services.clone(), s)))
        }
        WEBHOOK_KIND => {
            check_site_admin(services, ctx).await?;
            let webhook = found(db.webhooks().get_by_id(unmarshal_id(id, WEBHOOK_KIND)?).await)?;
            boxed(webhook.map(|w| WebhookResolver::new(services.clone(), w)))
        }
        EXECUTOR_SECRET_KIND => {
            let key = unmarshal_executor_secret_id(id)?;
            let secret = found(db.executor_secrets().get_by_id(key.scope, key.id).await)?;
            match secret {
                Some(secret) => {
                    check_secret_access(services, ctx, &secret).await?;
                    boxed(Some(ExecutorSecretResolver::new(services.clone(), secret)))
                }
                None => None,
            }
        }
        PERMISSION_SYNC_JOB_KIND => {
            check_site_admin(services, ctx).await?;
            let job = found(
                db.permission_sync_jobs()
                    .get_by_id(unmarshal_id(id, PERMISSION_SYNC_JOB_KIND)?)
                    .await,
            )?;
            boxed(job.map(|j| PermissionSyncJobResolver::new(services.clone(), j)))
        }
        NOTEBOOK_KIND => {
            let notebook = found(db.notebooks().get_by_id(unmarshal_id(id, NOTEBOOK_KIND)?).await)?;
            boxed(
                notebook
                    .filter(|n| NotebookResolver::visible_to(n, ctx))
                    .map(|n| NotebookResolver::new(services.clone(), n)),
            )
        }
        SEARCH_CONTEXT_KIND => {
            let context = found(
                db.search_contexts()
                    .get_by_id(unmarshal_id(id, SEARCH_CONTEXT_KIND)?)
                    .await,
            )?;
            boxed(
                context
                    .filter(|c| SearchContextResolver::visible_to(c, ctx))
                    .map(|c| SearchContextResolver::new(services.clone(), c)),
            )
        }
        GITHUB_APP_KIND => {
            check_site_admin(services, ctx).await?;
            let app = found(db.github_apps().get_by_id(unmarshal_id(id, GITHUB_APP_KIND)?).await)?;
            boxed(app.map(GitHubAppResolver::new))
        }
        other => {
            return Err(GqlError::invalid_id(format!(
                "invalid id kind {:?}",
                other
            )))
        }
    };
    Ok(node)
}

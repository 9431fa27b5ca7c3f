use crate::admin::{
    resolve_executor_secrets, ExternalServiceSource, GitHubAppSource, PermissionSyncJobSource,
    WebhookLogConnection, WebhookSource,
};
use crate::auth::{check_site_admin, current_user};
use crate::connection::{options, resolve_keyset};
use crate::loader::prime_user;
use crate::content::{NotebookSource, SearchContextSource};
use crate::node::node_by_id;
use crate::org::{OrgResolver, OrgSource};
use crate::repository::{repository_by_name, RepoSource, RepositoryResolver};
use crate::services::Services;
use crate::team::{team_by_name, teams_query, TeamResolver};
use crate::user::{unmarshal_user_id, UserResolver, UserSource};
use async_trait::async_trait;
use codegql_backend::db::{
    ExecutorSecretsListOptions, ExternalServicesListOptions, GitHubAppsListOptions,
    ListNotebooksOptions, ListPermissionSyncJobOpts, ListSearchContextsOptions, OrgsListOptions,
    ReposListOptions, UsersListOptions, WebhookLogListOptions, WebhooksListOptions,
};
use codegql_backend::types::ExecutorSecretScope;
use codegql_core::{
    resolve_object, resolve_optional, unmarshal_id, Arguments, GqlError, GqlResult, Object,
    OrderByColumn, RequestContext, Selection,
};
use serde_json::Value;
use std::sync::Arc;

/// The `Query` root.
pub struct QueryRoot {
    services: Arc<Services>,
}

impl QueryRoot {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    #[tracing::instrument(skip_all, fields(field = %field))]
    async fn dispatch(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let services = &self.services;
        match field {
            "node" => {
                let id: String = args.require("id")?;
                let node = node_by_id(services, ctx, &id).await?;
                Ok(resolve_optional(node.as_ref(), selection, ctx).await)
            }
            "currentUser" => {
                let user = current_user(services, ctx)
                    .await?
                    .map(|u| UserResolver::new(services.clone(), u));
                Ok(resolve_optional(user.as_ref(), selection, ctx).await)
            }
            "user" => {
                let username: String = args.require("username")?;
                let user = match services.db.users().get_by_username(&username).await {
                    Ok(user) => {
                        prime_user(ctx, &user).await;
                        Some(UserResolver::new(services.clone(), user))
                    }
                    Err(err) if err.is_not_found() => None,
                    Err(err) => return Err(err.into()),
                };
                Ok(resolve_optional(user.as_ref(), selection, ctx).await)
            }
            "organization" => {
                let name: String = args.require("name")?;
                let org = match services.db.orgs().get_by_name(&name).await {
                    Ok(org) => Some(OrgResolver::new(services.clone(), org)),
                    Err(err) if err.is_not_found() => None,
                    Err(err) => return Err(err.into()),
                };
                Ok(resolve_optional(org.as_ref(), selection, ctx).await)
            }
            "team" => {
                let name: String = args.require("name")?;
                let team = team_by_name(services, &name)
                    .await?
                    .map(|t| TeamResolver::new(services.clone(), t));
                Ok(resolve_optional(team.as_ref(), selection, ctx).await)
            }
            "repository" => {
                let name: String = args.require("name")?;
                let repo = repository_by_name(services, &name)
                    .await?
                    .map(|r| RepositoryResolver::new(services.clone(), r));
                Ok(resolve_optional(repo.as_ref(), selection, ctx).await)
            }
            "users" => {
                check_site_admin(services, ctx).await?;
                let source = UserSource {
                    services: services.clone(),
                    opts: UsersListOptions {
                        query: args.optional("query")?,
                        ..UsersListOptions::default()
                    },
                };
                let options = options(services, "UserConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "organizations" => {
                check_site_admin(services, ctx).await?;
                let source = OrgSource {
                    services: services.clone(),
                    opts: OrgsListOptions {
                        query: args.optional("query")?,
                    },
                };
                let options = options(services, "OrgConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "teams" => {
                let connection = teams_query(services.clone(), args)?;
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            "repositories" => {
                let source = RepoSource {
                    services: services.clone(),
                    opts: ReposListOptions {
                        query: args.optional("query")?,
                        ..ReposListOptions::default()
                    },
                };
                let options = options(services, "RepositoryConnection")
                    .order_by(vec![OrderByColumn::Name, OrderByColumn::Id], true);
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "externalServices" => {
                check_site_admin(services, ctx).await?;
                let source = ExternalServiceSource {
                    services: services.clone(),
                    opts: ExternalServicesListOptions::default(),
                };
                let options = options(services, "ExternalServiceConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "webhooks" => {
                check_site_admin(services, ctx).await?;
                let source = WebhookSource {
                    services: services.clone(),
                    opts: WebhooksListOptions {
                        kind: args.optional("kind")?,
                    },
                };
                let options = options(services, "WebhookConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "webhookLogs" => {
                check_site_admin(services, ctx).await?;
                let webhook_id = match args.optional::<String>("webhookID")? {
                    Some(id) => Some(unmarshal_id::<i32>(&id, crate::admin::WEBHOOK_KIND)?),
                    None => None,
                };
                let opts = WebhookLogListOptions {
                    webhook_id,
                    ..WebhookLogListOptions::default()
                };
                let connection = WebhookLogConnection::from_args(services.clone(), args, opts)?;
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            "executorSecrets" => {
                check_site_admin(services, ctx).await?;
                let scope: ExecutorSecretScope = args.require("scope")?;
                let opts = ExecutorSecretsListOptions::default();
                resolve_executor_secrets(services, scope, opts, args, selection, ctx).await
            }
            "permissionsSyncJobs" => {
                check_site_admin(services, ctx).await?;
                let user_id = match args.optional::<String>("userID")? {
                    Some(id) => Some(unmarshal_user_id(&id)?),
                    None => None,
                };
                let repo_id = match args.optional::<String>("repoID")? {
                    Some(id) => Some(crate::repository::unmarshal_repository_id(&id)?),
                    None => None,
                };
                let source = PermissionSyncJobSource {
                    services: services.clone(),
                    opts: ListPermissionSyncJobOpts {
                        state: args.optional("state")?,
                        user_id,
                        repo_id,
                    },
                };
                // Newest jobs first.
                let options = options(services, "PermissionsSyncJobsConnection")
                    .order_by(vec![OrderByColumn::Id], false);
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "notebooks" => {
                let creator_user_id = match args.optional::<String>("creatorUserID")? {
                    Some(id) => Some(unmarshal_user_id(&id)?),
                    None => None,
                };
                let source = NotebookSource {
                    services: services.clone(),
                    opts: ListNotebooksOptions {
                        query: args.optional("query")?,
                        creator_user_id,
                        viewer_id: ctx.actor().uid,
                    },
                };
                let options = options(services, "NotebookConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "searchContexts" => {
                let source = SearchContextSource {
                    services: services.clone(),
                    opts: ListSearchContextsOptions {
                        query: args.optional("query")?,
                        viewer_id: ctx.actor().uid,
                    },
                };
                let options = options(services, "SearchContextConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            "gitHubApps" => {
                check_site_admin(services, ctx).await?;
                let source = GitHubAppSource {
                    services: services.clone(),
                    opts: GitHubAppsListOptions {
                        domain: args.optional("domain")?,
                    },
                };
                let options = options(services, "GitHubAppConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            _ => Err(GqlError::field_not_found("Query", field)),
        }
    }
}

#[async_trait]
impl Object for QueryRoot {
    fn type_name(&self) -> &'static str {
        "Query"
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        self.dispatch(field, args, selection, ctx).await
    }
}

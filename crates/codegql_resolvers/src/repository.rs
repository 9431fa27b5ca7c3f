use crate::comparison::ComparisonResolver;
use crate::connection::{paginated_by, KeysetSource};
use crate::services::Services;
use async_trait::async_trait;
use codegql_backend::db::ReposListOptions;
use codegql_backend::types::Repo;
use codegql_core::{
    marshal_id, resolve_object, unmarshal_id, Arguments, GqlError, GqlResult, Object,
    PaginationArgs, RequestContext, Selection,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const REPOSITORY_KIND: &str = "Repository";

/// Revision used when a comparison leaves `base` or `head` out.
const DEFAULT_REV: &str = "HEAD";

pub fn marshal_repository_id(id: i32) -> String {
    marshal_id(REPOSITORY_KIND, id)
}

pub fn unmarshal_repository_id(id: &str) -> GqlResult<i32> {
    unmarshal_id(id, REPOSITORY_KIND)
}

#[derive(Clone)]
pub struct RepositoryResolver {
    services: Arc<Services>,
    repo: Repo,
}

paginated_by!(RepositoryResolver, repo);

impl RepositoryResolver {
    pub fn new(services: Arc<Services>, repo: Repo) -> Self {
        Self { services, repo }
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    fn rev_arg(args: &Arguments, name: &str) -> GqlResult<String> {
        Ok(args
            .optional::<String>(name)?
            .filter(|rev| !rev.is_empty())
            .unwrap_or_else(|| DEFAULT_REV.to_string()))
    }
}

#[async_trait]
impl Object for RepositoryResolver {
    fn type_name(&self) -> &'static str {
        "Repository"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "name"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let repo = &self.repo;
        match field {
            "id" => Ok(json!(marshal_repository_id(repo.id))),
            "databaseID" => Ok(json!(repo.id)),
            "name" => Ok(json!(repo.name)),
            "description" => Ok(json!(repo.description)),
            "isFork" | "fork" => Ok(json!(repo.fork)),
            "isArchived" | "archived" => Ok(json!(repo.archived)),
            "isPrivate" | "private" => Ok(json!(repo.private)),
            "url" => Ok(json!(format!("/{}", repo.name))),
            "createdAt" => Ok(json!(repo.created_at)),
            "updatedAt" => Ok(json!(repo.updated_at)),
            "comparison" => {
                let base = Self::rev_arg(args, "base")?;
                let head = Self::rev_arg(args, "head")?;
                let comparison =
                    ComparisonResolver::between(self.services.clone(), repo.clone(), &base, &head)
                        .await?;
                Ok(resolve_object(&comparison, selection, ctx).await)
            }
            "previewComparison" => {
                let base = Self::rev_arg(args, "base")?;
                let patch: String = args.require("patch")?;
                let comparison =
                    ComparisonResolver::preview(self.services.clone(), repo.clone(), &base, patch)
                        .await?;
                Ok(resolve_object(&comparison, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct RepoSource {
    pub services: Arc<Services>,
    pub opts: ReposListOptions,
}

#[async_trait]
impl KeysetSource for RepoSource {
    type Node = RepositoryResolver;

    fn cursor_kind(&self) -> &'static str {
        REPOSITORY_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.repos().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<RepositoryResolver>> {
        let repos = self
            .services
            .db
            .repos()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(repos
            .into_iter()
            .map(|r| RepositoryResolver::new(self.services.clone(), r))
            .collect())
    }
}

/// Looks a repository up by name. A missing repository is `None`.
pub(crate) async fn repository_by_name(
    services: &Services,
    name: &str,
) -> GqlResult<Option<Repo>> {
    match services.db.repos().get_by_name(name).await {
        Ok(repo) => Ok(Some(repo)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

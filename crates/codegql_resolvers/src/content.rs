//! User content: notebooks and search contexts.

use crate::auth::is_site_admin;
use crate::connection::{paginated_by, KeysetSource};
use crate::loader::load_user;
use crate::org::OrgResolver;
use crate::services::Services;
use crate::user::UserResolver;
use async_trait::async_trait;
use codegql_backend::db::{ListNotebooksOptions, ListSearchContextsOptions};
use codegql_backend::types::{Notebook, SearchContext};
use codegql_core::{
    marshal_id, resolve_list, resolve_optional, Arguments, GqlError, GqlResult, Object,
    PaginationArgs, RequestContext, Selection, ValueObject,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NOTEBOOK_KIND: &str = "Notebook";
pub const SEARCH_CONTEXT_KIND: &str = "SearchContext";

/// The user or org owning a piece of content, if any.
async fn namespace(
    services: &Arc<Services>,
    user_id: Option<i32>,
    org_id: Option<i32>,
) -> GqlResult<Option<Box<dyn Object>>> {
    if let Some(uid) = user_id {
        let user = services.db.users().get_by_id(uid).await?;
        return Ok(Some(Box::new(UserResolver::new(services.clone(), user))));
    }
    if let Some(org_id) = org_id {
        let org = services.db.orgs().get_by_id(org_id).await?;
        return Ok(Some(Box::new(OrgResolver::new(services.clone(), org))));
    }
    Ok(None)
}

#[derive(Clone)]
pub struct NotebookResolver {
    services: Arc<Services>,
    notebook: Notebook,
}

paginated_by!(NotebookResolver, notebook);

impl NotebookResolver {
    pub fn new(services: Arc<Services>, notebook: Notebook) -> Self {
        Self { services, notebook }
    }

    /// Whether the actor can see the notebook at all.
    pub(crate) fn visible_to(notebook: &Notebook, ctx: &RequestContext) -> bool {
        notebook.public
            || ctx.actor().is_internal()
            || (ctx.actor().uid.is_some() && ctx.actor().uid == notebook.creator_user_id)
    }

    async fn viewer_can_manage(&self, ctx: &RequestContext) -> bool {
        let uid = ctx.actor().uid;
        if uid.is_some()
            && (uid == self.notebook.creator_user_id || uid == self.notebook.namespace_user_id)
        {
            return true;
        }
        is_site_admin(&self.services, ctx).await
    }
}

#[async_trait]
impl Object for NotebookResolver {
    fn type_name(&self) -> &'static str {
        "Notebook"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "title"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let nb = &self.notebook;
        match field {
            "id" => Ok(json!(marshal_id(NOTEBOOK_KIND, nb.id))),
            "title" => Ok(json!(nb.title)),
            "public" => Ok(json!(nb.public)),
            "blocks" => {
                let blocks = nb
                    .blocks
                    .iter()
                    .map(|b| ValueObject::new("NotebookBlock", b))
                    .collect::<GqlResult<Vec<_>>>()?;
                Ok(resolve_list(&blocks, selection, ctx).await)
            }
            "creator" => {
                let Some(uid) = nb.creator_user_id else {
                    return Ok(Value::Null);
                };
                let creator = load_user(&self.services, ctx, uid)
                    .await?
                    .map(|u| UserResolver::new(self.services.clone(), u));
                Ok(resolve_optional(creator.as_ref(), selection, ctx).await)
            }
            "namespace" => {
                let owner =
                    namespace(&self.services, nb.namespace_user_id, nb.namespace_org_id).await?;
                Ok(resolve_optional(owner.as_ref(), selection, ctx).await)
            }
            "createdAt" => Ok(json!(nb.created_at)),
            "updatedAt" => Ok(json!(nb.updated_at)),
            "viewerCanManage" => Ok(json!(self.viewer_can_manage(ctx).await)),
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct NotebookSource {
    pub services: Arc<Services>,
    pub opts: ListNotebooksOptions,
}

#[async_trait]
impl KeysetSource for NotebookSource {
    type Node = NotebookResolver;

    fn cursor_kind(&self) -> &'static str {
        NOTEBOOK_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.notebooks().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<NotebookResolver>> {
        let notebooks = self
            .services
            .db
            .notebooks()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(notebooks
            .into_iter()
            .map(|n| NotebookResolver::new(self.services.clone(), n))
            .collect())
    }
}

#[derive(Clone)]
pub struct SearchContextResolver {
    services: Arc<Services>,
    context: SearchContext,
}

paginated_by!(SearchContextResolver, context);

impl SearchContextResolver {
    pub fn new(services: Arc<Services>, context: SearchContext) -> Self {
        Self { services, context }
    }

    pub(crate) fn visible_to(context: &SearchContext, ctx: &RequestContext) -> bool {
        context.public
            || ctx.actor().is_internal()
            || (ctx.actor().uid.is_some() && ctx.actor().uid == context.namespace_user_id)
    }

    /// `@owner/name` for owned contexts, the bare name otherwise.
    async fn spec(&self) -> GqlResult<String> {
        let c = &self.context;
        let db = &self.services.db;
        if let Some(uid) = c.namespace_user_id {
            let user = db.users().get_by_id(uid).await?;
            return Ok(format!("@{}/{}", user.username, c.name));
        }
        if let Some(org_id) = c.namespace_org_id {
            let org = db.orgs().get_by_id(org_id).await?;
            return Ok(format!("@{}/{}", org.name, c.name));
        }
        Ok(c.name.clone())
    }
}

#[async_trait]
impl Object for SearchContextResolver {
    fn type_name(&self) -> &'static str {
        "SearchContext"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "spec"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let c = &self.context;
        match field {
            "id" => Ok(json!(marshal_id(SEARCH_CONTEXT_KIND, c.id))),
            "name" => Ok(json!(c.name)),
            "spec" => Ok(json!(self.spec().await?)),
            "description" => Ok(json!(c.description)),
            "public" => Ok(json!(c.public)),
            "query" => Ok(json!(c.query)),
            "autoDefined" => Ok(json!(false)),
            "namespace" => {
                let owner =
                    namespace(&self.services, c.namespace_user_id, c.namespace_org_id).await?;
                Ok(resolve_optional(owner.as_ref(), selection, ctx).await)
            }
            "updatedAt" => Ok(json!(c.updated_at)),
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

pub(crate) struct SearchContextSource {
    pub services: Arc<Services>,
    pub opts: ListSearchContextsOptions,
}

#[async_trait]
impl KeysetSource for SearchContextSource {
    type Node = SearchContextResolver;

    fn cursor_kind(&self) -> &'static str {
        SEARCH_CONTEXT_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.search_contexts().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<SearchContextResolver>> {
        let contexts = self
            .services
            .db
            .search_contexts()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(contexts
            .into_iter()
            .map(|c| SearchContextResolver::new(self.services.clone(), c))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegql_core::Actor;

    fn notebook(public: bool, creator: Option<i32>) -> Notebook {
        serde_json::from_value(json!({
            "id": 1,
            "title": "Onboarding",
            "public": public,
            "creator_user_id": creator,
        }))
        .unwrap()
    }

    #[test]
    fn test_notebook_visibility() {
        let anonymous = RequestContext::new(Actor::anonymous());
        let owner = RequestContext::new(Actor::user(3));
        let other = RequestContext::new(Actor::user(4));

        assert!(NotebookResolver::visible_to(&notebook(true, Some(3)), &anonymous));
        assert!(!NotebookResolver::visible_to(&notebook(false, Some(3)), &anonymous));
        assert!(NotebookResolver::visible_to(&notebook(false, Some(3)), &owner));
        assert!(!NotebookResolver::visible_to(&notebook(false, Some(3)), &other));
        assert!(!NotebookResolver::visible_to(&notebook(false, None), &anonymous));
        assert!(NotebookResolver::visible_to(
            &notebook(false, None),
            &RequestContext::new(Actor::internal())
        ));
    }
}

use crate::connection::{options, paginated_by, resolve_keyset, KeysetSource};
use crate::services::Services;
use crate::user::{UserResolver, USER_KIND};
use async_trait::async_trait;
use codegql_backend::db::OrgsListOptions;
use codegql_backend::types::Org;
use codegql_core::{
    marshal_id, unmarshal_id, Arguments, GqlError, GqlResult, Object, PaginationArgs,
    RequestContext, Selection,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const ORG_KIND: &str = "Org";

pub fn marshal_org_id(id: i32) -> String {
    marshal_id(ORG_KIND, id)
}

pub fn unmarshal_org_id(id: &str) -> GqlResult<i32> {
    unmarshal_id(id, ORG_KIND)
}

#[derive(Clone)]
pub struct OrgResolver {
    services: Arc<Services>,
    org: Org,
}

paginated_by!(OrgResolver, org);

impl OrgResolver {
    pub fn new(services: Arc<Services>, org: Org) -> Self {
        Self { services, org }
    }
}

#[async_trait]
impl Object for OrgResolver {
    fn type_name(&self) -> &'static str {
        "Org"
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
        match field {
            "id" => Ok(json!(marshal_org_id(self.org.id))),
            "name" => Ok(json!(self.org.name)),
            "displayName" => Ok(json!(self.org.display_name)),
            "url" => Ok(json!(format!("/organizations/{}", self.org.name))),
            "createdAt" => Ok(json!(self.org.created_at)),
            "members" => {
                let source = OrgMemberSource {
                    services: self.services.clone(),
                    org_id: self.org.id,
                };
                let options = options(&self.services, "UserConnection");
                resolve_keyset(source, options, args, selection, ctx).await
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

struct OrgMemberSource {
    services: Arc<Services>,
    org_id: i32,
}

#[async_trait]
impl KeysetSource for OrgMemberSource {
    type Node = UserResolver;

    fn cursor_kind(&self) -> &'static str {
        USER_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.orgs().count_members(self.org_id).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<UserResolver>> {
        let users = self
            .services
            .db
            .orgs()
            .list_members(self.org_id, args)
            .await?;
        Ok(users
            .into_iter()
            .map(|u| UserResolver::new(self.services.clone(), u))
            .collect())
    }
}

pub(crate) struct OrgSource {
    pub services: Arc<Services>,
    pub opts: OrgsListOptions,
}

#[async_trait]
impl KeysetSource for OrgSource {
    type Node = OrgResolver;

    fn cursor_kind(&self) -> &'static str {
        ORG_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.orgs().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<OrgResolver>> {
        let orgs = self
            .services
            .db
            .orgs()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(orgs
            .into_iter()
            .map(|o| OrgResolver::new(self.services.clone(), o))
            .collect())
    }
}

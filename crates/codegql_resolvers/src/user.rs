use crate::admin::resolve_executor_secrets;
use crate::auth::check_same_user_or_site_admin;
use crate::collaborators::invitable_collaborators;
use crate::connection::{paginated_by, KeysetSource, ListConnection};
use crate::org::OrgResolver;
use crate::services::Services;
use crate::team::{teams_available, TeamConnection};
use async_trait::async_trait;
use codegql_backend::db::{ExecutorSecretsListOptions, ListTeamsOpts, UsersListOptions};
use codegql_backend::types::{ExecutorSecretScope, User};
use codegql_core::{
    marshal_id, resolve_list, resolve_object, unmarshal_id, Arguments, GqlError, GqlResult,
    Object, PaginationArgs, RequestContext, Selection, ValueObject,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const USER_KIND: &str = "User";

pub fn marshal_user_id(id: i32) -> String {
    marshal_id(USER_KIND, id)
}

pub fn unmarshal_user_id(id: &str) -> GqlResult<i32> {
    unmarshal_id(id, USER_KIND)
}

#[derive(Clone)]
pub struct UserResolver {
    services: Arc<Services>,
    user: User,
}

paginated_by!(UserResolver, user);

impl UserResolver {
    pub fn new(services: Arc<Services>, user: User) -> Self {
        Self { services, user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}

#[async_trait]
impl Object for UserResolver {
    fn type_name(&self) -> &'static str {
        "User"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["id", "username"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        let user = &self.user;
        match field {
            "id" => Ok(json!(marshal_user_id(user.id))),
            "databaseID" => Ok(json!(user.id)),
            "username" => Ok(json!(user.username)),
            "displayName" => Ok(json!(user.display_name)),
            "avatarURL" => Ok(json!(user.avatar_url)),
            "siteAdmin" => Ok(json!(user.site_admin)),
            "url" => Ok(json!(format!("/users/{}", user.username))),
            "createdAt" => Ok(json!(user.created_at)),
            "updatedAt" => Ok(json!(user.updated_at)),
            "emails" => {
                check_same_user_or_site_admin(&self.services, ctx, user.id).await?;
                let emails = self.services.db.users().emails_for_user(user.id).await?;
                let objects = emails
                    .iter()
                    .map(|e| {
                        ValueObject::new(
                            "UserEmail",
                            &json!({
                                "email": e.email,
                                "verified": e.verified,
                                "isPrimary": e.is_primary,
                            }),
                        )
                    })
                    .collect::<GqlResult<Vec<_>>>()?;
                Ok(resolve_list(&objects, selection, ctx).await)
            }
            "organizations" => {
                let orgs = self.services.db.orgs().orgs_for_user(user.id).await?;
                let nodes = orgs
                    .into_iter()
                    .map(|org| OrgResolver::new(self.services.clone(), org))
                    .collect();
                let connection = ListConnection::new("OrgConnection", nodes);
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            "teams" => {
                teams_available(&self.services.settings)?;
                let base = ListTeamsOpts {
                    for_user_id: Some(user.id),
                    ..ListTeamsOpts::default()
                };
                let connection = TeamConnection::from_args(self.services.clone(), args, base)?;
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            "invitableCollaborators" => {
                let people = invitable_collaborators(&self.services, ctx, user).await?;
                let objects = people
                    .iter()
                    .map(|p| ValueObject::new("Person", p))
                    .collect::<GqlResult<Vec<_>>>()?;
                Ok(resolve_list(&objects, selection, ctx).await)
            }
            "executorSecrets" => {
                check_same_user_or_site_admin(&self.services, ctx, user.id).await?;
                let scope: ExecutorSecretScope = args.require("scope")?;
                let opts = ExecutorSecretsListOptions {
                    namespace_user_id: Some(user.id),
                    ..ExecutorSecretsListOptions::default()
                };
                resolve_executor_secrets(&self.services, scope, opts, args, selection, ctx).await
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

/// Users matching a list filter.
pub(crate) struct UserSource {
    pub services: Arc<Services>,
    pub opts: UsersListOptions,
}

#[async_trait]
impl KeysetSource for UserSource {
    type Node = UserResolver;

    fn cursor_kind(&self) -> &'static str {
        USER_KIND
    }

    async fn count(&self) -> GqlResult<i64> {
        Ok(self.services.db.users().count(&self.opts).await?)
    }

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<UserResolver>> {
        let users = self
            .services
            .db
            .users()
            .list_paginated(&self.opts, args)
            .await?;
        Ok(users
            .into_iter()
            .map(|u| UserResolver::new(self.services.clone(), u))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_roundtrip_and_kind_check() {
        let id = marshal_user_id(42);
        assert_eq!(unmarshal_user_id(&id).unwrap(), 42);
        let team_id = marshal_id("Team", 42);
        assert!(unmarshal_user_id(&team_id).is_err());
    }
}

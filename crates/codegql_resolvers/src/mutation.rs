use crate::services::Services;
use crate::team_mutations::{
    add_team_members, create_team, delete_team, remove_team_members, set_team_members,
    update_team,
};
use async_trait::async_trait;
use codegql_core::{
    resolve_object, Arguments, GqlError, GqlResult, Object, RequestContext, Selection,
};
use serde_json::Value;
use std::sync::Arc;

/// The `Mutation` root.
pub struct MutationRoot {
    services: Arc<Services>,
}

impl MutationRoot {
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
        let team = match field {
            "createTeam" => create_team(services, ctx, args).await?,
            "updateTeam" => update_team(services, ctx, args).await?,
            "deleteTeam" => {
                let empty = delete_team(services, ctx, args).await?;
                return Ok(resolve_object(&empty, selection, ctx).await);
            }
            "addTeamMembers" => add_team_members(services, ctx, args).await?,
            "setTeamMembers" => set_team_members(services, ctx, args).await?,
            "removeTeamMembers" => remove_team_members(services, ctx, args).await?,
            _ => return Err(GqlError::field_not_found("Mutation", field)),
        };
        Ok(resolve_object(&team, selection, ctx).await)
    }
}

#[async_trait]
impl Object for MutationRoot {
    fn type_name(&self) -> &'static str {
        "Mutation"
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

//! Teams: the team object, its int-cursor connections, and access checks.
//!
//! Team listings page by team id and team member listings by a
//! `(team, user)` pair. Both cursors are inclusive and come back from the
//! store as the first row of the next page, so these connections only page
//! forward and never use keyset cursors.

use crate::auth::is_site_admin;
use crate::loader::{load_user, load_users};
use crate::services::{SchemaSettings, Services};
use crate::user::UserResolver;
use async_trait::async_trait;
use codegql_backend::db::{ListTeamMembersOpts, ListTeamsOpts, TeamMemberListCursor, TeamStore};
use codegql_backend::types::{Team, TeamMember};
use codegql_core::{
    decode_cursor, decode_int_cursor, encode_cursor, encode_int_cursor, marshal_id,
    resolve_object, resolve_optional, unmarshal_id, Arguments, GqlError, GqlResult, Object,
    PageInfo, PathSegment, RequestContext, Selection,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const TEAM_KIND: &str = "Team";

pub fn marshal_team_id(id: i32) -> String {
    marshal_id(TEAM_KIND, id)
}

pub fn unmarshal_team_id(id: &str) -> GqlResult<i32> {
    unmarshal_id(id, TEAM_KIND)
}

/// Fails unless the teams endpoints are enabled on this site.
pub(crate) fn teams_available(settings: &SchemaSettings) -> GqlResult<()> {
    if settings.dotcom_mode {
        return Err(GqlError::feature_disabled(
            "teams are not available on sourcegraph.com",
        ));
    }
    if !settings.teams_enabled {
        return Err(GqlError::feature_disabled("teams are disabled"));
    }
    Ok(())
}

pub(crate) fn no_access_to_team() -> GqlError {
    GqlError::forbidden("user cannot modify team")
}

/// Decides whether the current actor may change `team` and its members.
pub(crate) async fn can_modify_team(
    services: &Services,
    ctx: &RequestContext,
    team: &Team,
) -> GqlResult<bool> {
    if team.is_external() {
        return Ok(false);
    }
    if is_site_admin(services, ctx).await {
        return Ok(true);
    }
    if team.read_only {
        return Ok(false);
    }
    let Some(uid) = ctx.actor().uid else {
        return Err(GqlError::unauthenticated());
    };
    // The creator can always modify a team.
    if team.creator_id == Some(uid) {
        return Ok(true);
    }
    Ok(services.db.teams().is_team_member(team.id, uid).await?)
}

/// Looks a team up by GraphQL id or by name. Returns `None` if neither is given.
pub(crate) async fn find_team(
    teams: &dyn TeamStore,
    id: Option<&str>,
    name: Option<&str>,
) -> GqlResult<Option<Team>> {
    if let Some(graphql_id) = id {
        let id = unmarshal_team_id(graphql_id)
            .map_err(|e| e.wrap(format!("cannot interpret team id: {:?}", graphql_id)))?;
        return match teams.get_team_by_id(id).await {
            Ok(team) => Ok(Some(team)),
            Err(err) if err.is_not_found() => {
                Err(GqlError::from(err).wrap(format!("team id={} not found", id)))
            }
            Err(err) => Err(GqlError::from(err).wrap(format!("error fetching team id={}", id))),
        };
    }
    if let Some(name) = name {
        return match teams.get_team_by_name(name).await {
            Ok(team) => Ok(Some(team)),
            Err(err) if err.is_not_found() => {
                Err(GqlError::from(err).wrap(format!("team name={:?} not found", name)))
            }
            Err(err) => {
                Err(GqlError::from(err).wrap(format!("could not fetch team name={:?}", name)))
            }
        };
    }
    Ok(None)
}

#[derive(Clone)]
pub struct TeamResolver {
    services: Arc<Services>,
    team: Team,
}

impl TeamResolver {
    pub fn new(services: Arc<Services>, team: Team) -> Self {
        Self { services, team }
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    fn external(&self) -> bool {
        self.team.is_external()
    }

    fn url(&self) -> String {
        if self.external() {
            String::new()
        } else {
            format!("/teams/{}", self.team.name)
        }
    }
}

#[async_trait]
impl Object for TeamResolver {
    fn type_name(&self) -> &'static str {
        "Team"
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
        let team = &self.team;
        match field {
            "id" => Ok(json!(marshal_team_id(team.id))),
            "name" => Ok(json!(team.name)),
            "url" => Ok(json!(self.url())),
            "avatarURL" => Ok(Value::Null),
            "displayName" => Ok(if team.display_name.is_empty() {
                Value::Null
            } else {
                json!(team.display_name)
            }),
            "readonly" => Ok(json!(team.read_only || self.external())),
            "external" => Ok(json!(self.external())),
            "creator" => {
                // A deleted creator leaves no id behind.
                let Some(creator_id) = team.creator_id else {
                    return Ok(Value::Null);
                };
                let creator = load_user(&self.services, ctx, creator_id)
                    .await?
                    .map(|u| UserResolver::new(self.services.clone(), u));
                Ok(resolve_optional(creator.as_ref(), selection, ctx).await)
            }
            "parentTeam" => {
                let Some(parent_id) = team.parent_team_id else {
                    return Ok(Value::Null);
                };
                let parent = self.services.db.teams().get_team_by_id(parent_id).await?;
                let parent = TeamResolver::new(self.services.clone(), parent);
                Ok(resolve_object(&parent, selection, ctx).await)
            }
            "viewerCanAdminister" => {
                Ok(json!(can_modify_team(&self.services, ctx, team).await?))
            }
            "members" => {
                if self.external() {
                    return Err(GqlError::bad_request("cannot get members of external team"));
                }
                let connection =
                    TeamMemberConnection::from_args(self.services.clone(), args, team.id)?;
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            "childTeams" => {
                if self.external() {
                    return Err(GqlError::bad_request(
                        "cannot get child teams of external team",
                    ));
                }
                let base = ListTeamsOpts {
                    with_parent_id: Some(team.id),
                    ..ListTeamsOpts::default()
                };
                let connection = TeamConnection::from_args(self.services.clone(), args, base)?;
                Ok(resolve_object(&connection, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

fn page_limit(args: &Arguments) -> GqlResult<Option<usize>> {
    match args.optional::<i32>("first")? {
        None | Some(0) => Ok(None),
        Some(first) => usize::try_from(first)
            .map(Some)
            .map_err(|_| GqlError::invalid_argument("`first` should be non-negative")),
    }
}

/// Teams paged by an int cursor holding the first team id of the page.
pub struct TeamConnection {
    services: Arc<Services>,
    opts: ListTeamsOpts,
    page: OnceCell<GqlResult<(Vec<Team>, PageInfo)>>,
}

impl TeamConnection {
    /// Applies `first`, `after` and `search` on top of `base`.
    pub(crate) fn from_args(
        services: Arc<Services>,
        args: &Arguments,
        mut base: ListTeamsOpts,
    ) -> GqlResult<Self> {
        if let Some(after) = args.optional::<String>("after")? {
            let cursor = decode_int_cursor(&after)?;
            base.cursor = i32::try_from(cursor).map_err(|_| {
                GqlError::invalid_cursor(format!("cursor int32 overflow: {}", cursor))
            })?;
        }
        if let Some(search) = args.optional::<String>("search")? {
            base.search = search;
        }
        base.limit = page_limit(args)?;
        Ok(Self {
            services,
            opts: base,
            page: OnceCell::new(),
        })
    }

    async fn page(&self) -> GqlResult<&(Vec<Team>, PageInfo)> {
        let result = self
            .page
            .get_or_init(|| async {
                let (teams, next) = self.services.db.teams().list_teams(&self.opts).await?;
                let page_info = match next {
                    Some(next) if next > 0 => {
                        PageInfo::next(Some(encode_int_cursor(i64::from(next))))
                    }
                    _ => PageInfo::no_next(),
                };
                Ok((teams, page_info))
            })
            .await;
        result.as_ref().map_err(Clone::clone)
    }

    /// Counts every matching team, ignoring cursor and limit.
    async fn total_count(&self) -> GqlResult<i64> {
        let opts = ListTeamsOpts {
            cursor: 0,
            limit: None,
            ..self.opts.clone()
        };
        Ok(self.services.db.teams().count_teams(&opts).await?)
    }
}

#[async_trait]
impl Object for TeamConnection {
    fn type_name(&self) -> &'static str {
        "TeamConnection"
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
                let (teams, _) = self.page().await?;
                let nodes: Vec<TeamResolver> = teams
                    .iter()
                    .map(|t| TeamResolver::new(self.services.clone(), t.clone()))
                    .collect();
                Ok(codegql_core::resolve_list(&nodes, selection, ctx).await)
            }
            "totalCount" => Ok(json!(self.total_count().await?)),
            "pageInfo" => {
                let (_, page_info) = self.page().await?;
                Ok(resolve_object(page_info, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

/// Members of one team, paged by a JSON `(team, user)` cursor.
pub struct TeamMemberConnection {
    services: Arc<Services>,
    opts: ListTeamMembersOpts,
    page: OnceCell<GqlResult<(Vec<TeamMember>, PageInfo)>>,
}

impl TeamMemberConnection {
    pub(crate) fn from_args(
        services: Arc<Services>,
        args: &Arguments,
        team_id: i32,
    ) -> GqlResult<Self> {
        let mut opts = ListTeamMembersOpts {
            team_id,
            ..ListTeamMembersOpts::default()
        };
        if let Some(after) = args.optional::<String>("after")? {
            if !after.is_empty() {
                let text = decode_cursor(&after)?;
                opts.cursor = serde_json::from_str::<TeamMemberListCursor>(&text).map_err(|e| {
                    GqlError::invalid_cursor(format!("invalid team member cursor: {}", e))
                })?;
            }
        }
        if let Some(search) = args.optional::<String>("search")? {
            opts.search = search;
        }
        opts.limit = page_limit(args)?;
        Ok(Self {
            services,
            opts,
            page: OnceCell::new(),
        })
    }

    async fn page(&self) -> GqlResult<&(Vec<TeamMember>, PageInfo)> {
        let result = self
            .page
            .get_or_init(|| async {
                let (members, next) = self
                    .services
                    .db
                    .teams()
                    .list_team_members(&self.opts)
                    .await?;
                let page_info = match next {
                    Some(cursor) => {
                        let text = serde_json::to_string(&cursor)?;
                        PageInfo::next(Some(encode_cursor(&text)))
                    }
                    None => PageInfo::no_next(),
                };
                Ok((members, page_info))
            })
            .await;
        result.as_ref().map_err(Clone::clone)
    }

    async fn total_count(&self) -> GqlResult<i64> {
        let opts = ListTeamMembersOpts {
            team_id: self.opts.team_id,
            search: self.opts.search.clone(),
            ..ListTeamMembersOpts::default()
        };
        Ok(self.services.db.teams().count_team_members(&opts).await?)
    }
}

#[async_trait]
impl Object for TeamMemberConnection {
    fn type_name(&self) -> &'static str {
        "TeamMemberConnection"
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
                let (members, _) = self.page().await?;
                let ids: Vec<i32> = members.iter().map(|m| m.user_id).collect();
                let users = load_users(&self.services, ctx, &ids).await?;
                let mut nodes = Vec::with_capacity(members.len());
                for (i, member) in members.iter().enumerate() {
                    ctx.push_path(PathSegment::Index(i));
                    let user = users
                        .get(&member.user_id)
                        .map(|u| UserResolver::new(self.services.clone(), u.clone()));
                    nodes.push(resolve_optional(user.as_ref(), selection, ctx).await);
                    ctx.pop_path();
                }
                Ok(Value::Array(nodes))
            }
            "totalCount" => Ok(json!(self.total_count().await?)),
            "pageInfo" => {
                let (_, page_info) = self.page().await?;
                Ok(resolve_object(page_info, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

/// `Query.teams`: root teams unless child teams are asked for.
pub(crate) fn teams_query(services: Arc<Services>, args: &Arguments) -> GqlResult<TeamConnection> {
    teams_available(&services.settings)?;
    let mut base = ListTeamsOpts {
        root_only: !args.optional::<bool>("includeChildTeams")?.unwrap_or(false),
        ..ListTeamsOpts::default()
    };
    if let Some(except) = args.optional::<String>("exceptAncestor")? {
        let id = unmarshal_team_id(&except)
            .map_err(|e| e.wrap(format!("cannot interpret exceptAncestor id: {:?}", except)))?;
        base.except_ancestor_id = Some(id);
    }
    TeamConnection::from_args(services, args, base)
}

/// `Query.team(name)`: `None` if no team has that name.
pub(crate) async fn team_by_name(services: &Arc<Services>, name: &str) -> GqlResult<Option<Team>> {
    teams_available(&services.settings)?;
    match services.db.teams().get_team_by_name(name).await {
        Ok(team) => Ok(Some(team)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Resolves a team node id. A missing team is `None`.
pub(crate) async fn team_by_id(services: &Arc<Services>, id: &str) -> GqlResult<Option<Team>> {
    teams_available(&services.settings)?;
    match find_team(services.db.teams(), Some(id), None).await {
        Ok(team) => Ok(team),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegql_core::ErrorCode;

    #[test]
    fn test_availability_checks_dotcom_first() {
        let settings = SchemaSettings::default().dotcom_mode(true).teams_enabled(false);
        let err = teams_available(&settings).unwrap_err();
        assert_eq!(err.message, "teams are not available on sourcegraph.com");

        let settings = SchemaSettings::default().teams_enabled(false);
        let err = teams_available(&settings).unwrap_err();
        assert_eq!(err.message, "teams are disabled");
        assert_eq!(err.code, ErrorCode::FeatureDisabled);

        assert!(teams_available(&SchemaSettings::default()).is_ok());
    }

    #[test]
    fn test_page_limit() {
        assert_eq!(page_limit(&Arguments::new()).unwrap(), None);
        assert_eq!(page_limit(&Arguments::new().with("first", 0)).unwrap(), None);
        assert_eq!(page_limit(&Arguments::new().with("first", 3)).unwrap(), Some(3));
        assert!(page_limit(&Arguments::new().with("first", -1)).is_err());
    }
}

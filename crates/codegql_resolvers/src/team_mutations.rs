//! Team mutations.

use crate::auth::is_site_admin;
use crate::services::Services;
use crate::team::{can_modify_team, find_team, no_access_to_team, teams_available, TeamResolver};
use crate::user::unmarshal_user_id;
use codegql_backend::db::{
    ExternalAccountsListOptions, ListTeamMembersOpts, ListTeamsOpts, UsersListOptions,
};
use codegql_backend::types::{Team, TeamMember, User};
use codegql_core::{Arguments, ErrorCode, GqlError, GqlResult, RequestContext, ValueObject};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Page size used when walking existing memberships.
const MEMBER_PAGE_SIZE: usize = 100;

/// One way of naming a user in a team member mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TeamMemberInput {
    #[serde(rename = "userID", default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "externalAccountServiceID", default)]
    pub external_account_service_id: Option<String>,
    #[serde(rename = "externalAccountServiceType", default)]
    pub external_account_service_type: Option<String>,
    #[serde(rename = "externalAccountAccountID", default)]
    pub external_account_account_id: Option<String>,
    #[serde(rename = "externalAccountLogin", default)]
    pub external_account_login: Option<String>,
}

impl TeamMemberInput {
    fn has_external_account(&self) -> bool {
        self.external_account_service_id.is_some()
            || self.external_account_service_type.is_some()
            || self.external_account_account_id.is_some()
            || self.external_account_login.is_some()
    }
}

impl fmt::Display for TeamMemberInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conds = Vec::new();
        if let Some(id) = &self.user_id {
            conds.push(format!("ID={}", id));
        }
        if let Some(username) = &self.username {
            conds.push(format!("Username={}", username));
        }
        if let Some(email) = &self.email {
            conds.push(format!("Email={}", email));
        }
        if self.has_external_account() {
            let part = |v: &Option<String>| v.clone().unwrap_or_default();
            conds.push(format!(
                "ExternalAccount(ServiceID={}, ServiceType={}, AccountID={}, Login={})",
                part(&self.external_account_service_id),
                part(&self.external_account_service_type),
                part(&self.external_account_account_id),
                part(&self.external_account_login),
            ));
        }
        write!(f, "team member ({})", conds.join(","))
    }
}

/// Matched users, in input order without duplicates, and inputs nobody matched.
#[derive(Debug, Default)]
struct MemberMatches {
    users: Vec<User>,
    unmatched: Vec<TeamMemberInput>,
}

impl MemberMatches {
    fn add(&mut self, seen: &mut FxHashSet<i32>, user: User) {
        if seen.insert(user.id) {
            self.users.push(user);
        }
    }
}

/// Resolves member inputs to users.
///
/// Each input tries its user id, then username, then verified email, then
/// external account. An input that names something nobody matches falls
/// through to its next way of naming a user.
async fn users_for_team_members(
    services: &Services,
    members: Vec<TeamMemberInput>,
) -> GqlResult<MemberMatches> {
    let users = services.db.users();
    let mut out = MemberMatches::default();
    let mut seen = FxHashSet::default();

    // ID
    let mut ids = Vec::new();
    for member in &members {
        if let Some(id) = &member.user_id {
            ids.push(unmarshal_user_id(id)?);
        }
    }
    let mut remaining = Vec::new();
    if ids.is_empty() {
        remaining = members;
    } else {
        let opts = UsersListOptions {
            user_ids: ids,
            ..UsersListOptions::default()
        };
        let by_id = users.list(&opts).await?;
        for member in members {
            let found = match &member.user_id {
                Some(id) => {
                    let id = unmarshal_user_id(id)?;
                    by_id.iter().find(|u| u.id == id).cloned()
                }
                None => None,
            };
            match found {
                Some(user) => out.add(&mut seen, user),
                None => remaining.push(member),
            }
        }
    }

    // Username
    let usernames: Vec<String> = remaining.iter().filter_map(|m| m.username.clone()).collect();
    if !usernames.is_empty() {
        let opts = UsersListOptions {
            usernames,
            ..UsersListOptions::default()
        };
        let by_name = users.list(&opts).await?;
        let mut still = Vec::new();
        for member in remaining {
            let found = member
                .username
                .as_ref()
                .and_then(|name| by_name.iter().find(|u| &u.username == name).cloned());
            match found {
                Some(user) => out.add(&mut seen, user),
                None => still.push(member),
            }
        }
        remaining = still;
    }

    // Verified email
    let mut still = Vec::new();
    for member in remaining {
        let Some(email) = &member.email else {
            still.push(member);
            continue;
        };
        match users.get_by_verified_email(email).await {
            Ok(user) => out.add(&mut seen, user),
            Err(err) if err.is_not_found() => still.push(member),
            Err(err) => return Err(err.into()),
        }
    }
    remaining = still;

    // External account
    for member in remaining {
        let (Some(service_id), Some(service_type)) = (
            &member.external_account_service_id,
            &member.external_account_service_type,
        ) else {
            out.unmatched.push(member);
            continue;
        };
        let opts = ExternalAccountsListOptions {
            service_id: Some(service_id.clone()),
            service_type: Some(service_type.clone()),
            ..ExternalAccountsListOptions::default()
        };
        let accounts = services.db.user_external_accounts().list(&opts).await?;
        let account = accounts.iter().find(|ea| {
            if let Some(account_id) = &member.external_account_account_id {
                return &ea.account_id == account_id;
            }
            match (&member.external_account_login, &ea.login) {
                (Some(wanted), Some(login)) => login == wanted,
                _ => false,
            }
        });
        match account {
            Some(account) => match users.get_by_id(account.user_id).await {
                Ok(user) => out.add(&mut seen, user),
                Err(err) if err.is_not_found() => out.unmatched.push(member),
                Err(err) => return Err(err.into()),
            },
            None => out.unmatched.push(member),
        }
    }

    Ok(out)
}

/// The `team`/`teamName` pair of a membership mutation.
struct TeamSelector {
    id: Option<String>,
    name: Option<String>,
}

/// Checks that exactly one of `team` and `teamName` is given.
fn team_selector(services: &Services, args: &Arguments) -> GqlResult<TeamSelector> {
    teams_available(&services.settings)?;
    let id: Option<String> = args.optional("team")?;
    let name: Option<String> = args.optional("teamName")?;
    match (&id, &name) {
        (None, None) => Err(GqlError::invalid_argument(
            "team must be identified by either id (team parameter) or name (teamName parameter), none specified",
        )),
        (Some(_), Some(_)) => Err(GqlError::invalid_argument(
            "team must be identified by either id (team parameter) or name (teamName parameter), both specified",
        )),
        _ => Ok(TeamSelector { id, name }),
    }
}

/// Finds the selected team and checks the actor may modify it.
async fn team_for_membership(
    services: &Services,
    ctx: &RequestContext,
    selector: &TeamSelector,
) -> GqlResult<Team> {
    let team = find_team(
        services.db.teams(),
        selector.id.as_deref(),
        selector.name.as_deref(),
    )
    .await?
    .ok_or_else(|| GqlError::not_found("team"))?;
    if !can_modify_team(services, ctx, &team).await? {
        return Err(no_access_to_team());
    }
    Ok(team)
}

/// Resolves the `members` argument, failing on unmatched members unless skipped.
async fn resolve_members(services: &Services, args: &Arguments) -> GqlResult<Vec<User>> {
    let members: Vec<TeamMemberInput> = args.optional("members")?.unwrap_or_default();
    let skip_unmatched = args
        .optional::<bool>("skipUnmatchedMembers")?
        .unwrap_or(false);
    let matches = users_for_team_members(services, members).await?;
    if !skip_unmatched && !matches.unmatched.is_empty() {
        let mut err = None;
        for member in &matches.unmatched {
            err = Some(GqlError::append(
                err,
                GqlError::new(ErrorCode::NotFound, format!("member not found: {}", member)),
            ));
        }
        if let Some(err) = err {
            return Err(err);
        }
    }
    Ok(matches.users)
}

fn memberships(team_id: i32, users: &[User]) -> Vec<TeamMember> {
    users
        .iter()
        .map(|u| TeamMember {
            team_id,
            user_id: u.id,
        })
        .collect()
}

pub(crate) async fn create_team(
    services: &Arc<Services>,
    ctx: &RequestContext,
    args: &Arguments,
) -> GqlResult<TeamResolver> {
    teams_available(&services.settings)?;
    let mut team = Team::new(args.require::<String>("name")?);
    if let Some(display_name) = args.optional::<String>("displayName")? {
        team.display_name = display_name;
    }
    team.read_only = args.optional::<bool>("readonly")?.unwrap_or(false);
    if team.read_only && !is_site_admin(services, ctx).await {
        return Err(GqlError::forbidden(
            "only site admins can create read-only teams",
        ));
    }

    let parent_id: Option<String> = args.optional("parentTeam")?;
    let parent_name: Option<String> = args.optional("parentTeamName")?;
    if parent_id.is_some() && parent_name.is_some() {
        return Err(GqlError::invalid_argument(
            "must specify at most one: ParentTeam or ParentTeamName",
        ));
    }
    let parent = find_team(services.db.teams(), parent_id.as_deref(), parent_name.as_deref())
        .await
        .map_err(|e| e.wrap("parent team"))?;
    if let Some(parent) = parent {
        if !can_modify_team(services, ctx, &parent).await? {
            return Err(no_access_to_team());
        }
        team.parent_team_id = Some(parent.id);
    }
    team.creator_id = ctx.actor().uid;

    let created = services.db.teams().create_team(team).await?;
    info!(team_id = created.id, name = %created.name, "team created");
    Ok(TeamResolver::new(services.clone(), created))
}

pub(crate) async fn update_team(
    services: &Arc<Services>,
    ctx: &RequestContext,
    args: &Arguments,
) -> GqlResult<TeamResolver> {
    teams_available(&services.settings)?;
    let id: Option<String> = args.optional("id")?;
    let name: Option<String> = args.optional("name")?;
    let parent_id: Option<String> = args.optional("parentTeam")?;
    let parent_name: Option<String> = args.optional("parentTeamName")?;
    let make_root: Option<bool> = args.optional("makeRoot")?;

    match (&id, &name) {
        (None, None) => {
            return Err(GqlError::invalid_argument(
                "team to update is identified by either id or name, but neither was specified",
            ))
        }
        (Some(_), Some(_)) => {
            return Err(GqlError::invalid_argument(
                "team to update is identified by either id or name, but both were specified",
            ))
        }
        _ => {}
    }
    if make_root.is_some() && (parent_id.is_some() || parent_name.is_some()) {
        return Err(GqlError::invalid_argument(
            "specifying a parent team contradicts making a team root (no parent team)",
        ));
    }
    if parent_id.is_some() && parent_name.is_some() {
        return Err(GqlError::invalid_argument(
            "parent team is identified by either id or name, but both were specified",
        ));
    }
    if make_root == Some(false) {
        return Err(GqlError::invalid_argument(
            "the only possible value for makeRoot is true (if set); to assign a parent team please use parentTeam or parentTeamName parameters",
        ));
    }

    let teams = services.db.teams();
    let mut team = find_team(teams, id.as_deref(), name.as_deref())
        .await?
        .ok_or_else(|| GqlError::not_found("team"))?;
    if !can_modify_team(services, ctx, &team).await? {
        return Err(no_access_to_team());
    }

    let mut needs_update = false;
    if let Some(display_name) = args.optional::<String>("displayName")? {
        if display_name != team.display_name {
            team.display_name = display_name;
            needs_update = true;
        }
    }
    if parent_id.is_some() || parent_name.is_some() {
        let parent = find_team(teams, parent_id.as_deref(), parent_name.as_deref())
            .await
            .map_err(|e| e.wrap("cannot find parent team"))?
            .ok_or_else(|| GqlError::not_found("parent team"))?;
        if team.parent_team_id != Some(parent.id) {
            let outside = ListTeamsOpts {
                except_ancestor_id: Some(team.id),
                ..ListTeamsOpts::default()
            };
            let allowed = teams.contains_team(parent.id, &outside).await.map_err(|e| {
                GqlError::backend(format!(
                    "could not determine ancestorship on team update: {}",
                    e
                ))
            })?;
            if !allowed {
                return Err(GqlError::invalid_argument(format!(
                    "circular dependency: new parent {:?} is descendant of updated team {:?}",
                    parent.name, team.name
                )));
            }
            team.parent_team_id = Some(parent.id);
            needs_update = true;
        }
    } else if make_root == Some(true) && team.parent_team_id.is_some() {
        team.parent_team_id = None;
        needs_update = true;
    }

    if needs_update {
        teams.update_team(&team).await?;
        info!(team_id = team.id, "team updated");
    }
    Ok(TeamResolver::new(services.clone(), team))
}

/// Deletes a team. Returns the `EmptyResponse` object.
pub(crate) async fn delete_team(
    services: &Arc<Services>,
    ctx: &RequestContext,
    args: &Arguments,
) -> GqlResult<ValueObject> {
    teams_available(&services.settings)?;
    let id: Option<String> = args.optional("id")?;
    let name: Option<String> = args.optional("name")?;
    match (&id, &name) {
        (None, None) => {
            return Err(GqlError::invalid_argument(
                "team to delete is identified by either id or name, but neither was specified",
            ))
        }
        (Some(_), Some(_)) => {
            return Err(GqlError::invalid_argument(
                "team to delete is identified by either id or name, but both were specified",
            ))
        }
        _ => {}
    }
    let team = find_team(services.db.teams(), id.as_deref(), name.as_deref())
        .await?
        .ok_or_else(|| GqlError::not_found("team"))?;
    if !can_modify_team(services, ctx, &team).await? {
        return Err(no_access_to_team());
    }
    services.db.teams().delete_team(team.id).await?;
    info!(team_id = team.id, name = %team.name, "team deleted");
    ValueObject::new("EmptyResponse", &json!({ "alwaysNil": null }))
}

pub(crate) async fn add_team_members(
    services: &Arc<Services>,
    ctx: &RequestContext,
    args: &Arguments,
) -> GqlResult<TeamResolver> {
    let selector = team_selector(services, args)?;
    let users = resolve_members(services, args).await?;
    let team = team_for_membership(services, ctx, &selector).await?;
    services
        .db
        .teams()
        .create_team_member(&memberships(team.id, &users))
        .await?;
    info!(team_id = team.id, added = users.len(), "team members added");
    Ok(TeamResolver::new(services.clone(), team))
}

/// Makes the team's members exactly the given users.
pub(crate) async fn set_team_members(
    services: &Arc<Services>,
    ctx: &RequestContext,
    args: &Arguments,
) -> GqlResult<TeamResolver> {
    let selector = team_selector(services, args)?;
    let users = resolve_members(services, args).await?;
    let team = team_for_membership(services, ctx, &selector).await?;
    let wanted: FxHashSet<i32> = users.iter().map(|u| u.id).collect();
    let teams = services.db.teams();

    let mut existing = FxHashSet::default();
    let mut extra = Vec::new();
    let mut opts = ListTeamMembersOpts {
        team_id: team.id,
        limit: Some(MEMBER_PAGE_SIZE),
        ..ListTeamMembersOpts::default()
    };
    loop {
        let (page, next) = teams.list_team_members(&opts).await?;
        for member in page {
            existing.insert(member.user_id);
            if !wanted.contains(&member.user_id) {
                extra.push(member);
            }
        }
        match next {
            Some(cursor) => opts.cursor = cursor,
            None => break,
        }
    }

    let missing: Vec<TeamMember> = memberships(team.id, &users)
        .into_iter()
        .filter(|m| !existing.contains(&m.user_id))
        .collect();
    if !extra.is_empty() {
        teams.delete_team_member(&extra).await?;
    }
    if !missing.is_empty() {
        teams.create_team_member(&missing).await?;
    }
    info!(
        team_id = team.id,
        added = missing.len(),
        removed = extra.len(),
        "team members set"
    );
    Ok(TeamResolver::new(services.clone(), team))
}

pub(crate) async fn remove_team_members(
    services: &Arc<Services>,
    ctx: &RequestContext,
    args: &Arguments,
) -> GqlResult<TeamResolver> {
    let selector = team_selector(services, args)?;
    let users = resolve_members(services, args).await?;
    let team = team_for_membership(services, ctx, &selector).await?;
    services
        .db
        .teams()
        .delete_team_member(&memberships(team.id, &users))
        .await?;
    info!(team_id = team.id, removed = users.len(), "team members removed");
    Ok(TeamResolver::new(services.clone(), team))
}

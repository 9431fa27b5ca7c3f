use super::{contains_ci, count, MemoryDb};
use crate::db::*;
use crate::error::{StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

/// Returns `root` and every team below it.
fn subtree(teams: &BTreeMap<i32, Team>, root: i32) -> BTreeSet<i32> {
    let mut found = BTreeSet::from([root]);
    loop {
        let before = found.len();
        for team in teams.values() {
            if let Some(parent) = team.parent_team_id {
                if found.contains(&parent) {
                    found.insert(team.id);
                }
            }
        }
        if found.len() == before {
            return found;
        }
    }
}

impl MemoryDb {
    /// Teams matching every filter except cursor and limit, ordered by id.
    async fn filter_teams(&self, opts: &ListTeamsOpts) -> Vec<Team> {
        let teams = self.teams.read().await;
        let excluded = opts
            .except_ancestor_id
            .map(|id| subtree(&teams, id))
            .unwrap_or_default();
        let member_of: Option<BTreeSet<i32>> = match opts.for_user_id {
            Some(uid) => Some(
                self.team_members
                    .read()
                    .await
                    .iter()
                    .filter(|m| m.user_id == uid)
                    .map(|m| m.team_id)
                    .collect(),
            ),
            None => None,
        };
        teams
            .values()
            .filter(|t| opts.with_parent_id.map_or(true, |p| t.parent_team_id == Some(p)))
            .filter(|t| !opts.root_only || t.parent_team_id.is_none())
            .filter(|t| !excluded.contains(&t.id))
            .filter(|t| member_of.as_ref().map_or(true, |ids| ids.contains(&t.id)))
            .filter(|t| {
                opts.search.is_empty()
                    || contains_ci(&t.name, &opts.search)
                    || contains_ci(&t.display_name, &opts.search)
            })
            .cloned()
            .collect()
    }

    async fn filter_team_members(&self, opts: &ListTeamMembersOpts) -> Vec<TeamMember> {
        let members = self.team_members.read().await;
        let users = self.users.read().await;
        members
            .iter()
            .filter(|m| m.team_id == opts.team_id)
            .filter(|m| {
                opts.search.is_empty()
                    || users.get(&m.user_id).is_some_and(|u| {
                        contains_ci(&u.username, &opts.search)
                            || u.display_name
                                .as_deref()
                                .is_some_and(|d| contains_ci(d, &opts.search))
                    })
            })
            .copied()
            .collect()
    }
}

#[async_trait]
impl TeamStore for MemoryDb {
    async fn get_team_by_id(&self, id: i32) -> StoreResult<Team> {
        self.teams
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("team", format!("id={}", id)))
    }

    async fn get_team_by_name(&self, name: &str) -> StoreResult<Team> {
        self.teams
            .read()
            .await
            .values()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("team", format!("name={:?}", name)))
    }

    async fn list_teams(&self, opts: &ListTeamsOpts) -> StoreResult<(Vec<Team>, Option<i32>)> {
        let mut teams: Vec<Team> = self
            .filter_teams(opts)
            .await
            .into_iter()
            .filter(|t| t.id >= opts.cursor)
            .collect();
        let mut next = None;
        if let Some(limit) = opts.limit {
            if teams.len() > limit {
                next = Some(teams[limit].id);
                teams.truncate(limit);
            }
        }
        Ok((teams, next))
    }

    async fn count_teams(&self, opts: &ListTeamsOpts) -> StoreResult<i64> {
        Ok(count(self.filter_teams(opts).await.len()))
    }

    async fn contains_team(&self, id: i32, opts: &ListTeamsOpts) -> StoreResult<bool> {
        Ok(self.filter_teams(opts).await.iter().any(|t| t.id == id))
    }

    async fn list_team_members(
        &self,
        opts: &ListTeamMembersOpts,
    ) -> StoreResult<(Vec<TeamMember>, Option<TeamMemberListCursor>)> {
        let cursor = (opts.cursor.team_id, opts.cursor.user_id);
        let mut members: Vec<TeamMember> = self
            .filter_team_members(opts)
            .await
            .into_iter()
            .filter(|m| (m.team_id, m.user_id) >= cursor)
            .collect();
        let mut next = None;
        if let Some(limit) = opts.limit {
            if members.len() > limit {
                let m = members[limit];
                next = Some(TeamMemberListCursor {
                    team_id: m.team_id,
                    user_id: m.user_id,
                });
                members.truncate(limit);
            }
        }
        Ok((members, next))
    }

    async fn count_team_members(&self, opts: &ListTeamMembersOpts) -> StoreResult<i64> {
        Ok(count(self.filter_team_members(opts).await.len()))
    }

    async fn create_team(&self, mut team: Team) -> StoreResult<Team> {
        let mut teams = self.teams.write().await;
        if teams.values().any(|t| t.name == team.name) {
            return Err(StoreError::Conflict(format!(
                "team name {:?} is already taken",
                team.name
            )));
        }
        if let Some(parent) = team.parent_team_id {
            if !teams.contains_key(&parent) {
                return Err(StoreError::not_found("team", format!("id={}", parent)));
            }
        }
        team.id = teams.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        team.created_at = now;
        team.updated_at = now;
        teams.insert(team.id, team.clone());
        tracing::debug!(team_id = team.id, name = %team.name, "team created");
        Ok(team)
    }

    async fn update_team(&self, team: &Team) -> StoreResult<()> {
        let mut teams = self.teams.write().await;
        match teams.get_mut(&team.id) {
            Some(stored) => {
                stored.display_name = team.display_name.clone();
                stored.parent_team_id = team.parent_team_id;
                stored.read_only = team.read_only;
                stored.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::not_found("team", format!("id={}", team.id))),
        }
    }

    async fn delete_team(&self, id: i32) -> StoreResult<()> {
        let mut teams = self.teams.write().await;
        if !teams.contains_key(&id) {
            return Err(StoreError::not_found("team", format!("id={}", id)));
        }
        // Child teams go with their ancestor.
        let removed = subtree(&teams, id);
        teams.retain(|team_id, _| !removed.contains(team_id));
        self.team_members
            .write()
            .await
            .retain(|m| !removed.contains(&m.team_id));
        Ok(())
    }

    async fn create_team_member(&self, members: &[TeamMember]) -> StoreResult<()> {
        {
            let teams = self.teams.read().await;
            if let Some(m) = members.iter().find(|m| !teams.contains_key(&m.team_id)) {
                return Err(StoreError::not_found("team", format!("id={}", m.team_id)));
            }
        }
        self.team_members
            .write()
            .await
            .extend(members.iter().copied());
        Ok(())
    }

    async fn delete_team_member(&self, members: &[TeamMember]) -> StoreResult<()> {
        let mut stored = self.team_members.write().await;
        for member in members {
            stored.remove(member);
        }
        Ok(())
    }

    async fn is_team_member(&self, team_id: i32, user_id: i32) -> StoreResult<bool> {
        Ok(self
            .team_members
            .read()
            .await
            .contains(&TeamMember { team_id, user_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Seed;

    fn team(id: i32, name: &str, parent: Option<i32>) -> Team {
        Team {
            id,
            parent_team_id: parent,
            ..Team::new(name)
        }
    }

    fn db() -> MemoryDb {
        MemoryDb::from_seed(&Seed {
            teams: vec![
                team(1, "eng", None),
                team(2, "eng-search", Some(1)),
                team(3, "eng-search-infra", Some(2)),
                team(4, "sales", None),
                team(5, "support", None),
            ],
            ..Seed::default()
        })
    }

    #[tokio::test]
    async fn test_list_teams_inclusive_cursor() {
        let db = db();
        let opts = ListTeamsOpts {
            limit: Some(2),
            root_only: true,
            ..ListTeamsOpts::default()
        };
        let (page, next) = db.list_teams(&opts).await.unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(next, Some(5));

        let opts = ListTeamsOpts {
            cursor: 5,
            ..opts
        };
        let (page, next) = db.list_teams(&opts).await.unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5]);
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_except_ancestor_excludes_subtree() {
        let db = db();
        let opts = ListTeamsOpts {
            except_ancestor_id: Some(2),
            ..ListTeamsOpts::default()
        };
        assert!(db.contains_team(1, &opts).await.unwrap());
        assert!(!db.contains_team(3, &opts).await.unwrap());
        assert_eq!(db.count_teams(&opts).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_team_removes_children() {
        let db = db();
        db.delete_team(1).await.unwrap();
        assert!(db.get_team_by_id(3).await.unwrap_err().is_not_found());
        assert_eq!(
            db.count_teams(&ListTeamsOpts::default()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_create_team_assigns_id_and_rejects_duplicates() {
        let db = db();
        let created = db.create_team(Team::new("design")).await.unwrap();
        assert_eq!(created.id, 6);
        let err = db.create_team(Team::new("design")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}

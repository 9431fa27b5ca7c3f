//! Store behavior through the `Db` trait object.

use codegql_backend::db::{ListTeamMembersOpts, TeamMemberListCursor, UsersListOptions};
use codegql_backend::types::{Org, OrgMember, Team, TeamMember, User, UserEmail};
use codegql_backend::{Db, MemoryDb, Seed};
use codegql_core::{CursorValue, PaginationArgs};
use std::sync::Arc;

fn user(id: i32, username: &str) -> User {
    serde_json::from_value(serde_json::json!({"id": id, "username": username})).unwrap()
}

fn db() -> Arc<dyn Db> {
    let seed = Seed {
        users: vec![user(1, "alice"), user(2, "bob"), user(3, "carol")],
        user_emails: vec![
            UserEmail {
                user_id: 1,
                email: "alice@acme.dev".into(),
                verified: true,
                is_primary: true,
            },
            UserEmail {
                user_id: 2,
                email: "bob@acme.dev".into(),
                verified: false,
                is_primary: true,
            },
        ],
        orgs: vec![serde_json::from_value(serde_json::json!({"id": 1, "name": "acme"})).unwrap()],
        org_members: vec![
            serde_json::from_value::<OrgMember>(serde_json::json!({"org_id": 1, "user_id": 3}))
                .unwrap(),
        ],
        teams: vec![Team {
            id: 1,
            ..Team::new("eng")
        }],
        team_members: vec![
            TeamMember {
                team_id: 1,
                user_id: 1,
            },
            TeamMember {
                team_id: 1,
                user_id: 2,
            },
            TeamMember {
                team_id: 1,
                user_id: 3,
            },
        ],
        ..Seed::default()
    };
    seed.validate().unwrap();
    Arc::new(MemoryDb::from_seed(&seed))
}

#[tokio::test]
async fn test_verified_email_lookup() {
    let db = db();
    let alice = db.users().get_by_verified_email("ALICE@acme.dev").await.unwrap();
    assert_eq!(alice.username, "alice");
    let err = db.users().get_by_verified_email("bob@acme.dev").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_user_listing() {
    let db = db();
    let opts = UsersListOptions {
        usernames: vec!["bob".into(), "carol".into()],
        ..UsersListOptions::default()
    };
    let users = db.users().list(&opts).await.unwrap();
    assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![2, 3]);

    let mut args = PaginationArgs::first(1);
    args.after = Some(vec![CursorValue::Int(1)]);
    let page = db
        .users()
        .list_paginated(&UsersListOptions::default(), &args)
        .await
        .unwrap();
    assert_eq!(page[0].username, "bob");
    assert_eq!(db.users().count(&UsersListOptions::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_team_member_cursor_paging() {
    let db = db();
    let mut opts = ListTeamMembersOpts {
        team_id: 1,
        limit: Some(2),
        ..ListTeamMembersOpts::default()
    };
    let (first, next) = db.teams().list_team_members(&opts).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(
        next,
        Some(TeamMemberListCursor {
            team_id: 1,
            user_id: 3
        })
    );
    opts.cursor = next.unwrap();
    let (rest, next) = db.teams().list_team_members(&opts).await.unwrap();
    assert_eq!(rest.iter().map(|m| m.user_id).collect::<Vec<_>>(), vec![3]);
    assert!(next.is_none());
}

#[tokio::test]
async fn test_org_membership() {
    let db = db();
    let orgs: Vec<Org> = db.orgs().orgs_for_user(3).await.unwrap();
    assert_eq!(orgs[0].name, "acme");
    db.orgs().add_member(1, 1).await.unwrap();
    assert_eq!(db.orgs().count_members(1).await.unwrap(), 2);
    assert!(db.orgs().add_member(1, 1).await.is_err());
}

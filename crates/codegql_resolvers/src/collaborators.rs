//! People from recent commit history who could be invited to the site.

use crate::services::Services;
use chrono::{DateTime, Utc};
use codegql_backend::db::UsersListOptions;
use codegql_backend::types::{Commit, User};
use codegql_backend::CommitsOptions;
use codegql_core::{GqlError, GqlResult, RequestContext};
use rustc_hash::FxHashSet;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const MAX_REPOS: usize = 25;
const MAX_COMMITS_PER_REPO: usize = 200;
const MAX_COLLABORATORS: usize = 200;

/// Mail providers whose domain says nothing about the employer.
const PUBLIC_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "gmx.de",
    "mail.com",
    "yandex.ru",
    "qq.com",
    "163.com",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collaborator {
    pub name: String,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarURL")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

fn domain(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_lowercase())
        .filter(|d| !d.is_empty())
}

fn is_noreply(email: &str) -> bool {
    let email = email.to_lowercase();
    email.contains("noreply") || email.contains("no-reply")
}

fn is_bot(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("[bot]") || name.ends_with("bot")
}

/// Authors and committers of `commits`, without `[bot]` accounts.
fn candidates(commits: &[Commit]) -> Vec<Candidate> {
    let mut out = Vec::new();
    for commit in commits {
        for sig in std::iter::once(&commit.author).chain(commit.committer.as_ref()) {
            if sig.name.contains("[bot]") {
                continue;
            }
            out.push(Candidate {
                name: sig.name.clone(),
                email: sig.email.clone(),
                date: sig.date,
            });
        }
    }
    out
}

/// Orders by recency, drops duplicates, the actor, no-reply addresses and bots.
fn filter_candidates(mut people: Vec<Candidate>, own_emails: &[String]) -> Vec<Candidate> {
    people.sort_by(|a, b| b.date.cmp(&a.date));
    let own: FxHashSet<String> = own_emails.iter().map(|e| e.to_lowercase()).collect();
    let mut seen = FxHashSet::default();
    people.retain(|p| seen.insert(p.email.to_lowercase()));
    people.retain(|p| !own.contains(&p.email.to_lowercase()));
    people.retain(|p| !is_noreply(&p.email) && !is_bot(&p.name));
    people
}

/// Moves people sharing one of `domains` to the front, keeping relative order.
fn group_by_domain(people: Vec<Candidate>, domains: &FxHashSet<String>) -> Vec<Candidate> {
    if domains.is_empty() {
        return people;
    }
    let (mut same, other): (Vec<_>, Vec<_>) = people
        .into_iter()
        .partition(|p| domain(&p.email).is_some_and(|d| domains.contains(&d)));
    same.extend(other);
    same
}

fn private_domains(emails: &[String]) -> FxHashSet<String> {
    emails
        .iter()
        .filter_map(|e| domain(e))
        .filter(|d| !PUBLIC_EMAIL_DOMAINS.contains(&d.as_str()))
        .collect()
}

/// Recent commits of the most recently updated repositories, in repository order.
async fn recent_commits(services: &Services) -> GqlResult<Vec<Commit>> {
    let repos = services.db.repos().list_recently_updated(MAX_REPOS).await?;
    let mut tasks = JoinSet::new();
    for (index, repo) in repos.into_iter().enumerate() {
        let gitserver = services.gitserver.clone();
        tasks.spawn(async move {
            let result = gitserver
                .commits(&repo.name, &CommitsOptions::latest(MAX_COMMITS_PER_REPO))
                .await;
            (index, repo.name, result)
        });
    }

    let mut per_repo = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(commits))) => per_repo.push((index, commits)),
            Ok((_, repo, Err(err))) => {
                warn!(repo = %repo, error = %err, "skipping repository for collaborators");
            }
            Err(err) => warn!(error = %err, "collaborator task failed"),
        }
    }
    per_repo.sort_by_key(|(index, _)| *index);
    Ok(per_repo.into_iter().flat_map(|(_, commits)| commits).collect())
}

/// Lists people from recent history who have no account yet.
pub(crate) async fn invitable_collaborators(
    services: &Services,
    ctx: &RequestContext,
    user: &User,
) -> GqlResult<Vec<Collaborator>> {
    if services.settings.dotcom_mode {
        return Err(GqlError::feature_disabled(
            "invitable collaborators are not available on sourcegraph.com",
        ));
    }
    match ctx.actor().uid {
        None => return Err(GqlError::unauthenticated()),
        Some(uid) if uid != user.id => {
            return Err(GqlError::forbidden(
                "can only list invitable collaborators of the current user",
            ))
        }
        Some(_) => {}
    }

    let own_emails: Vec<String> = services
        .db
        .users()
        .emails_for_user(user.id)
        .await?
        .into_iter()
        .map(|e| e.email)
        .collect();

    let commits = recent_commits(services).await?;
    let mut people = filter_candidates(candidates(&commits), &own_emails);
    if people.is_empty() {
        return Ok(Vec::new());
    }

    // People who already have an account.
    let emails: Vec<String> = people.iter().map(|p| p.email.clone()).collect();
    let registered: FxHashSet<String> = services
        .db
        .users()
        .verified_emails(&emails)
        .await?
        .into_iter()
        .map(|e| e.email.to_lowercase())
        .collect();
    let opts = UsersListOptions {
        usernames: people.iter().map(|p| p.name.clone()).collect(),
        ..UsersListOptions::default()
    };
    let usernames: FxHashSet<String> = services
        .db
        .users()
        .list(&opts)
        .await?
        .into_iter()
        .map(|u| u.username)
        .collect();
    people.retain(|p| !registered.contains(&p.email.to_lowercase()) && !usernames.contains(&p.name));

    let mut people = group_by_domain(people, &private_domains(&own_emails));
    people.truncate(MAX_COLLABORATORS);
    debug!(user_id = user.id, count = people.len(), "invitable collaborators");

    Ok(people
        .into_iter()
        .map(|p| Collaborator {
            display_name: p.name.clone(),
            name: p.name,
            email: p.email,
            avatar_url: None,
        })
        .collect())
}

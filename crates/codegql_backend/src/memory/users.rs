use super::{contains_ci, count, paginate_in_memory, MemoryDb};
use crate::db::*;
use crate::error::{StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use chrono::Utc;
use codegql_core::PaginationArgs;

fn user_matches(user: &User, opts: &UsersListOptions) -> bool {
    if !opts.user_ids.is_empty() && !opts.user_ids.contains(&user.id) {
        return false;
    }
    if !opts.usernames.is_empty() && !opts.usernames.iter().any(|n| *n == user.username) {
        return false;
    }
    match &opts.query {
        Some(q) => {
            contains_ci(&user.username, q)
                || user
                    .display_name
                    .as_deref()
                    .is_some_and(|d| contains_ci(d, q))
        }
        None => true,
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn get_by_id(&self, id: i32) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", format!("id={}", id)))
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", format!("username={:?}", username)))
    }

    async fn get_by_verified_email(&self, email: &str) -> StoreResult<User> {
        let owner = self
            .user_emails
            .read()
            .await
            .iter()
            .find(|e| e.verified && e.email.eq_ignore_ascii_case(email))
            .map(|e| e.user_id);
        match owner {
            Some(id) => UserStore::get_by_id(self, id).await,
            None => Err(StoreError::not_found("user", format!("email={:?}", email))),
        }
    }

    async fn list(&self, opts: &UsersListOptions) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| user_matches(u, opts))
            .cloned()
            .collect())
    }

    async fn list_paginated(
        &self,
        opts: &UsersListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        let matching = users.values().filter(|u| user_matches(u, opts)).cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &UsersListOptions) -> StoreResult<i64> {
        let users = self.users.read().await;
        Ok(count(users.values().filter(|u| user_matches(u, opts)).count()))
    }

    async fn emails_for_user(&self, user_id: i32) -> StoreResult<Vec<UserEmail>> {
        Ok(self
            .user_emails
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn verified_emails(&self, emails: &[String]) -> StoreResult<Vec<UserEmail>> {
        Ok(self
            .user_emails
            .read()
            .await
            .iter()
            .filter(|e| e.verified && emails.iter().any(|m| m.eq_ignore_ascii_case(&e.email)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserExternalAccountStore for MemoryDb {
    async fn list(&self, opts: &ExternalAccountsListOptions) -> StoreResult<Vec<ExternalAccount>> {
        Ok(self
            .external_accounts
            .read()
            .await
            .iter()
            .filter(|a| opts.user_id.map_or(true, |id| a.user_id == id))
            .filter(|a| {
                opts.service_type
                    .as_ref()
                    .map_or(true, |t| a.service_type == *t)
            })
            .filter(|a| opts.service_id.as_ref().map_or(true, |s| a.service_id == *s))
            .cloned()
            .collect())
    }
}

fn org_matches(org: &Org, opts: &OrgsListOptions) -> bool {
    match &opts.query {
        Some(q) => {
            contains_ci(&org.name, q)
                || org.display_name.as_deref().is_some_and(|d| contains_ci(d, q))
        }
        None => true,
    }
}

#[async_trait]
impl OrgStore for MemoryDb {
    async fn get_by_id(&self, id: i32) -> StoreResult<Org> {
        self.orgs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("organization", format!("id={}", id)))
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Org> {
        self.orgs
            .read()
            .await
            .values()
            .find(|o| o.name == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("organization", format!("name={:?}", name)))
    }

    async fn list_paginated(
        &self,
        opts: &OrgsListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Org>> {
        let orgs = self.orgs.read().await;
        let matching = orgs.values().filter(|o| org_matches(o, opts)).cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &OrgsListOptions) -> StoreResult<i64> {
        let orgs = self.orgs.read().await;
        Ok(count(orgs.values().filter(|o| org_matches(o, opts)).count()))
    }

    async fn orgs_for_user(&self, user_id: i32) -> StoreResult<Vec<Org>> {
        let org_ids: Vec<i32> = self
            .org_members
            .read()
            .await
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.org_id)
            .collect();
        let orgs = self.orgs.read().await;
        Ok(org_ids
            .iter()
            .filter_map(|id| orgs.get(id).cloned())
            .collect())
    }

    async fn list_members(&self, org_id: i32, args: &PaginationArgs) -> StoreResult<Vec<User>> {
        let member_ids: Vec<i32> = self
            .org_members
            .read()
            .await
            .iter()
            .filter(|m| m.org_id == org_id)
            .map(|m| m.user_id)
            .collect();
        let users = self.users.read().await;
        let members = member_ids.iter().filter_map(|id| users.get(id).cloned());
        Ok(paginate_in_memory(members, args))
    }

    async fn count_members(&self, org_id: i32) -> StoreResult<i64> {
        let members = self.org_members.read().await;
        Ok(count(members.iter().filter(|m| m.org_id == org_id).count()))
    }

    async fn add_member(&self, org_id: i32, user_id: i32) -> StoreResult<OrgMember> {
        OrgStore::get_by_id(self, org_id).await?;
        UserStore::get_by_id(self, user_id).await?;
        let mut members = self.org_members.write().await;
        if members
            .iter()
            .any(|m| m.org_id == org_id && m.user_id == user_id)
        {
            return Err(StoreError::Conflict(format!(
                "user {} is already a member of organization {}",
                user_id, org_id
            )));
        }
        let member = OrgMember {
            org_id,
            user_id,
            created_at: Utc::now(),
        };
        members.push(member.clone());
        Ok(member)
    }
}

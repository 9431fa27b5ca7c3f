//! Request-scoped user loading.
//!
//! Resolvers that reference users (team creators, members, secret and
//! notebook owners) go through a [`UserLoader`] installed in the request
//! context, so one response fetches each user at most once.

use crate::services::Services;
use codegql_backend::db::UsersListOptions;
use codegql_backend::types::User;
use codegql_backend::Db;
use codegql_core::{GqlResult, RequestContext};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Batches and caches user lookups by id.
pub struct UserLoader {
    db: Arc<dyn Db>,
    /// `None` records ids known not to exist.
    cache: RwLock<FxHashMap<i32, Option<User>>>,
}

impl UserLoader {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self {
            db,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub async fn load(&self, id: i32) -> GqlResult<Option<User>> {
        Ok(self.load_many(&[id]).await?.remove(&id))
    }

    /// Loads users by id with one store call for all uncached ids.
    /// Missing users are absent from the result.
    pub async fn load_many(&self, ids: &[i32]) -> GqlResult<FxHashMap<i32, User>> {
        let mut found = FxHashMap::default();
        let mut missing = Vec::new();
        {
            let cache = self.cache.read().await;
            for &id in ids {
                match cache.get(&id) {
                    Some(Some(user)) => {
                        found.insert(id, user.clone());
                    }
                    Some(None) => {}
                    None => {
                        if !missing.contains(&id) {
                            missing.push(id);
                        }
                    }
                }
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        let opts = UsersListOptions {
            user_ids: missing.clone(),
            ..UsersListOptions::default()
        };
        let users = self.db.users().list(&opts).await?;
        tracing::trace!(requested = missing.len(), loaded = users.len(), "users batch loaded");

        let mut cache = self.cache.write().await;
        for id in missing {
            cache.entry(id).or_insert(None);
        }
        for user in users {
            cache.insert(user.id, Some(user.clone()));
            found.insert(user.id, user);
        }
        Ok(found)
    }

    /// Primes the cache with a user fetched elsewhere.
    pub async fn prime(&self, user: User) {
        self.cache.write().await.insert(user.id, Some(user));
    }
}

/// Primes the request's loader, if any, with a user fetched outside it.
pub(crate) async fn prime_user(ctx: &RequestContext, user: &User) {
    if let Some(loader) = ctx.data().get::<UserLoader>() {
        loader.prime(user.clone()).await;
    }
}

/// Loads one user through the request's loader, or the store if none is installed.
pub(crate) async fn load_user(
    services: &Services,
    ctx: &RequestContext,
    id: i32,
) -> GqlResult<Option<User>> {
    match ctx.data().get::<UserLoader>() {
        Some(loader) => loader.load(id).await,
        None => match services.db.users().get_by_id(id).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        },
    }
}

pub(crate) async fn load_users(
    services: &Services,
    ctx: &RequestContext,
    ids: &[i32],
) -> GqlResult<FxHashMap<i32, User>> {
    match ctx.data().get::<UserLoader>() {
        Some(loader) => loader.load_many(ids).await,
        None => {
            let opts = UsersListOptions {
                user_ids: ids.to_vec(),
                ..UsersListOptions::default()
            };
            let users = services.db.users().list(&opts).await?;
            Ok(users.into_iter().map(|u| (u.id, u)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codegql_backend::db::*;
    use codegql_backend::types::UserEmail;
    use codegql_backend::{MemoryDb, Seed, StoreResult};
    use codegql_core::PaginationArgs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingUsers {
        inner: MemoryDb,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for CountingUsers {
        async fn get_by_id(&self, id: i32) -> StoreResult<User> {
            self.inner.users().get_by_id(id).await
        }

        async fn get_by_username(&self, username: &str) -> StoreResult<User> {
            self.inner.users().get_by_username(username).await
        }

        async fn get_by_verified_email(&self, email: &str) -> StoreResult<User> {
            self.inner.users().get_by_verified_email(email).await
        }

        async fn list(&self, opts: &UsersListOptions) -> StoreResult<Vec<User>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.users().list(opts).await
        }

        async fn list_paginated(
            &self,
            opts: &UsersListOptions,
            args: &PaginationArgs,
        ) -> StoreResult<Vec<User>> {
            self.inner.users().list_paginated(opts, args).await
        }

        async fn count(&self, opts: &UsersListOptions) -> StoreResult<i64> {
            self.inner.users().count(opts).await
        }

        async fn emails_for_user(&self, user_id: i32) -> StoreResult<Vec<UserEmail>> {
            self.inner.users().emails_for_user(user_id).await
        }

        async fn verified_emails(&self, emails: &[String]) -> StoreResult<Vec<UserEmail>> {
            self.inner.users().verified_emails(emails).await
        }
    }

    impl Db for CountingUsers {
        fn users(&self) -> &dyn UserStore {
            self
        }
        fn user_external_accounts(&self) -> &dyn UserExternalAccountStore {
            self.inner.user_external_accounts()
        }
        fn orgs(&self) -> &dyn OrgStore {
            self.inner.orgs()
        }
        fn teams(&self) -> &dyn TeamStore {
            self.inner.teams()
        }
        fn repos(&self) -> &dyn RepoStore {
            self.inner.repos()
        }
        fn external_services(&self) -> &dyn ExternalServiceStore {
            self.inner.external_services()
        }
        fn webhooks(&self) -> &dyn WebhookStore {
            self.inner.webhooks()
        }
        fn webhook_logs(&self) -> &dyn WebhookLogStore {
            self.inner.webhook_logs()
        }
        fn executor_secrets(&self) -> &dyn ExecutorSecretStore {
            self.inner.executor_secrets()
        }
        fn permission_sync_jobs(&self) -> &dyn PermissionSyncJobStore {
            self.inner.permission_sync_jobs()
        }
        fn notebooks(&self) -> &dyn NotebookStore {
            self.inner.notebooks()
        }
        fn search_contexts(&self) -> &dyn SearchContextStore {
            self.inner.search_contexts()
        }
        fn github_apps(&self) -> &dyn GitHubAppStore {
            self.inner.github_apps()
        }
    }

    fn counting_db() -> Arc<CountingUsers> {
        let seed: Seed = serde_json::from_value(serde_json::json!({
            "users": [
                {"id": 1, "username": "alice"},
                {"id": 2, "username": "bob"}
            ]
        }))
        .unwrap();
        Arc::new(CountingUsers {
            inner: MemoryDb::from_seed(&seed),
            lists: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_load_many_batches_and_caches() {
        let db = counting_db();
        let loader = UserLoader::new(db.clone());

        let users = loader.load_many(&[1, 2, 9]).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(db.lists.load(Ordering::SeqCst), 1);

        assert_eq!(loader.load(1).await.unwrap().unwrap().username, "alice");
        assert!(loader.load(9).await.unwrap().is_none());
        assert_eq!(db.lists.load(Ordering::SeqCst), 1);

        loader.load_many(&[2, 3]).await.unwrap();
        assert_eq!(db.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_prime_skips_the_store() {
        let db = counting_db();
        let loader = UserLoader::new(db.clone());
        let user: User =
            serde_json::from_value(serde_json::json!({"id": 7, "username": "primed"})).unwrap();
        loader.prime(user).await;
        assert_eq!(loader.load(7).await.unwrap().unwrap().username, "primed");
        assert_eq!(db.lists.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prime_user_through_context() {
        let db = counting_db();
        let mut ctx = RequestContext::new(codegql_core::Actor::user(1));
        ctx.data_mut().insert(UserLoader::new(db.clone()));
        let user = db.inner.users().get_by_username("bob").await.unwrap();

        prime_user(&ctx, &user).await;
        let loader = ctx.data().get::<UserLoader>().unwrap();
        assert_eq!(loader.load(2).await.unwrap().unwrap().username, "bob");
        assert_eq!(db.lists.load(Ordering::SeqCst), 0);
    }
}

use super::{contains_ci, count, paginate_in_memory, MemoryDb};
use crate::db::*;
use crate::error::{StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use codegql_core::PaginationArgs;

fn repo_matches(repo: &Repo, opts: &ReposListOptions) -> bool {
    opts.query.as_deref().map_or(true, |q| contains_ci(&repo.name, q))
        && opts
            .external_service_id
            .map_or(true, |id| repo.external_service_ids.contains(&id))
}

#[async_trait]
impl RepoStore for MemoryDb {
    async fn get_by_id(&self, id: i32) -> StoreResult<Repo> {
        self.repos
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("repo", format!("id={}", id)))
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Repo> {
        self.repos
            .read()
            .await
            .values()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| StoreError::not_found("repo", format!("name={:?}", name)))
    }

    async fn list_paginated(
        &self,
        opts: &ReposListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Repo>> {
        let repos = self.repos.read().await;
        let matching = repos.values().filter(|r| repo_matches(r, opts)).cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &ReposListOptions) -> StoreResult<i64> {
        let repos = self.repos.read().await;
        Ok(count(repos.values().filter(|r| repo_matches(r, opts)).count()))
    }

    async fn list_recently_updated(&self, limit: usize) -> StoreResult<Vec<Repo>> {
        let mut repos: Vec<Repo> = self.repos.read().await.values().cloned().collect();
        repos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        repos.truncate(limit);
        Ok(repos)
    }
}

fn service_matches(service: &ExternalService, opts: &ExternalServicesListOptions) -> bool {
    opts.kinds.is_empty()
        || opts
            .kinds
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&service.kind))
}

#[async_trait]
impl ExternalServiceStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> StoreResult<ExternalService> {
        self.external_services
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("external service", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        opts: &ExternalServicesListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<ExternalService>> {
        let services = self.external_services.read().await;
        let matching = services
            .values()
            .filter(|s| service_matches(s, opts))
            .cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &ExternalServicesListOptions) -> StoreResult<i64> {
        let services = self.external_services.read().await;
        Ok(count(
            services.values().filter(|s| service_matches(s, opts)).count(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Seed;
    use chrono::{Duration, Utc};

    fn repo(id: i32, name: &str, age_days: i64) -> Repo {
        let updated_at = Utc::now() - Duration::days(age_days);
        Repo {
            id,
            name: name.to_string(),
            description: String::new(),
            fork: false,
            archived: false,
            private: false,
            external_service_ids: vec![1],
            created_at: updated_at,
            updated_at,
        }
    }

    #[tokio::test]
    async fn test_recently_updated_newest_first() {
        let db = MemoryDb::from_seed(&Seed {
            repos: vec![repo(1, "old", 30), repo(2, "new", 1), repo(3, "mid", 10)],
            ..Seed::default()
        });
        let repos = db.list_recently_updated(2).await.unwrap();
        assert_eq!(
            repos.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["new", "mid"]
        );
    }

    #[tokio::test]
    async fn test_get_by_name_is_case_insensitive() {
        let db = MemoryDb::from_seed(&Seed {
            repos: vec![repo(1, "github.com/Org/Repo", 0)],
            ..Seed::default()
        });
        assert_eq!(
            RepoStore::get_by_name(&db, "github.com/org/repo")
                .await
                .unwrap()
                .id,
            1
        );
        assert!(RepoStore::get_by_id(&db, 9).await.unwrap_err().is_not_found());
    }
}

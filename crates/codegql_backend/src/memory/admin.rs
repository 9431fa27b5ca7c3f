use super::{count, paginate_in_memory, MemoryDb};
use crate::db::*;
use crate::error::{StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use codegql_core::PaginationArgs;

#[async_trait]
impl WebhookStore for MemoryDb {
    async fn get_by_id(&self, id: i32) -> StoreResult<Webhook> {
        self.webhooks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("webhook", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        opts: &WebhooksListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Webhook>> {
        let webhooks = self.webhooks.read().await;
        let matching = webhooks
            .values()
            .filter(|w| opts.kind.as_ref().map_or(true, |k| w.code_host_kind == *k))
            .cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &WebhooksListOptions) -> StoreResult<i64> {
        let webhooks = self.webhooks.read().await;
        Ok(count(
            webhooks
                .values()
                .filter(|w| opts.kind.as_ref().map_or(true, |k| w.code_host_kind == *k))
                .count(),
        ))
    }
}

fn log_matches(log: &WebhookLog, opts: &WebhookLogListOptions) -> bool {
    opts.webhook_id.map_or(true, |id| log.webhook_id == Some(id))
        && (!opts.only_errors || log.is_error())
}

#[async_trait]
impl WebhookLogStore for MemoryDb {
    async fn list(
        &self,
        opts: &WebhookLogListOptions,
    ) -> StoreResult<(Vec<WebhookLog>, Option<usize>)> {
        let mut logs: Vec<WebhookLog> = self
            .webhook_logs
            .read()
            .await
            .iter()
            .filter(|l| log_matches(l, opts))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(b.id.cmp(&a.id)));

        let total = logs.len();
        let mut page: Vec<WebhookLog> = logs.into_iter().skip(opts.offset).collect();
        let mut next = None;
        if let Some(limit) = opts.limit {
            if page.len() > limit {
                page.truncate(limit);
                next = Some(opts.offset + limit).filter(|n| *n < total);
            }
        }
        Ok((page, next))
    }

    async fn count(&self, opts: &WebhookLogListOptions) -> StoreResult<i64> {
        let logs = self.webhook_logs.read().await;
        Ok(count(logs.iter().filter(|l| log_matches(l, opts)).count()))
    }
}

fn secret_matches(
    secret: &ExecutorSecret,
    scope: ExecutorSecretScope,
    opts: &ExecutorSecretsListOptions,
) -> bool {
    secret.scope == scope
        && secret.namespace_user_id == opts.namespace_user_id
        && secret.namespace_org_id == opts.namespace_org_id
}

#[async_trait]
impl ExecutorSecretStore for MemoryDb {
    async fn get_by_id(&self, scope: ExecutorSecretScope, id: i64) -> StoreResult<ExecutorSecret> {
        self.executor_secrets
            .read()
            .await
            .iter()
            .find(|s| s.scope == scope && s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("executor secret", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        scope: ExecutorSecretScope,
        opts: &ExecutorSecretsListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<ExecutorSecret>> {
        let secrets = self.executor_secrets.read().await;
        let matching = secrets
            .iter()
            .filter(|s| secret_matches(s, scope, opts))
            .cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(
        &self,
        scope: ExecutorSecretScope,
        opts: &ExecutorSecretsListOptions,
    ) -> StoreResult<i64> {
        let secrets = self.executor_secrets.read().await;
        Ok(count(
            secrets
                .iter()
                .filter(|s| secret_matches(s, scope, opts))
                .count(),
        ))
    }
}

fn job_matches(job: &PermissionSyncJob, opts: &ListPermissionSyncJobOpts) -> bool {
    opts.state.map_or(true, |s| job.state == s)
        && opts.user_id.map_or(true, |id| job.user_id == Some(id))
        && opts.repo_id.map_or(true, |id| job.repository_id == Some(id))
}

#[async_trait]
impl PermissionSyncJobStore for MemoryDb {
    async fn get_by_id(&self, id: i32) -> StoreResult<PermissionSyncJob> {
        self.permission_sync_jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("permission sync job", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        opts: &ListPermissionSyncJobOpts,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<PermissionSyncJob>> {
        let jobs = self.permission_sync_jobs.read().await;
        let matching = jobs.values().filter(|j| job_matches(j, opts)).cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &ListPermissionSyncJobOpts) -> StoreResult<i64> {
        let jobs = self.permission_sync_jobs.read().await;
        Ok(count(jobs.values().filter(|j| job_matches(j, opts)).count()))
    }
}

#[async_trait]
impl GitHubAppStore for MemoryDb {
    async fn get_by_id(&self, id: i32) -> StoreResult<GitHubApp> {
        self.github_apps
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("github app", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        opts: &GitHubAppsListOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<GitHubApp>> {
        let apps = self.github_apps.read().await;
        let matching = apps
            .values()
            .filter(|a| opts.domain.map_or(true, |d| a.domain == d))
            .cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &GitHubAppsListOptions) -> StoreResult<i64> {
        let apps = self.github_apps.read().await;
        Ok(count(
            apps.values()
                .filter(|a| opts.domain.map_or(true, |d| a.domain == d))
                .count(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Seed;
    use chrono::{Duration, Utc};

    fn log(id: i64, status_code: i32, minutes_ago: i64) -> WebhookLog {
        WebhookLog {
            id,
            webhook_id: Some(1),
            external_service_id: None,
            status_code,
            received_at: Utc::now() - Duration::minutes(minutes_ago),
            request: String::new(),
            response: String::new(),
        }
    }

    fn db() -> MemoryDb {
        MemoryDb::from_seed(&Seed {
            webhook_logs: vec![log(1, 200, 30), log(2, 500, 20), log(3, 200, 10)],
            ..Seed::default()
        })
    }

    #[tokio::test]
    async fn test_webhook_logs_offset_paging() {
        let db = db();
        let opts = WebhookLogListOptions {
            limit: Some(2),
            ..WebhookLogListOptions::default()
        };
        let (page, next) = WebhookLogStore::list(&db, &opts).await.unwrap();
        assert_eq!(page.iter().map(|l| l.id).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(next, Some(2));

        let opts = WebhookLogListOptions { offset: 2, ..opts };
        let (page, next) = WebhookLogStore::list(&db, &opts).await.unwrap();
        assert_eq!(page.iter().map(|l| l.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_webhook_logs_only_errors() {
        let db = db();
        let opts = WebhookLogListOptions {
            only_errors: true,
            ..WebhookLogListOptions::default()
        };
        assert_eq!(WebhookLogStore::count(&db, &opts).await.unwrap(), 1);
    }
}

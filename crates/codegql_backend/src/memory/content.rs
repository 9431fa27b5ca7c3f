use super::{contains_ci, count, paginate_in_memory, MemoryDb};
use crate::db::*;
use crate::error::{StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use codegql_core::PaginationArgs;

fn notebook_matches(notebook: &Notebook, opts: &ListNotebooksOptions) -> bool {
    let visible = notebook.public
        || (opts.viewer_id.is_some() && notebook.creator_user_id == opts.viewer_id);
    visible
        && opts
            .creator_user_id
            .map_or(true, |id| notebook.creator_user_id == Some(id))
        && opts
            .query
            .as_deref()
            .map_or(true, |q| contains_ci(&notebook.title, q))
}

#[async_trait]
impl NotebookStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> StoreResult<Notebook> {
        self.notebooks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("notebook", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        opts: &ListNotebooksOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<Notebook>> {
        let notebooks = self.notebooks.read().await;
        let matching = notebooks
            .values()
            .filter(|n| notebook_matches(n, opts))
            .cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &ListNotebooksOptions) -> StoreResult<i64> {
        let notebooks = self.notebooks.read().await;
        Ok(count(
            notebooks
                .values()
                .filter(|n| notebook_matches(n, opts))
                .count(),
        ))
    }
}

fn context_matches(context: &SearchContext, opts: &ListSearchContextsOptions) -> bool {
    let visible = context.public
        || (opts.viewer_id.is_some() && context.namespace_user_id == opts.viewer_id);
    visible
        && opts.query.as_deref().map_or(true, |q| {
            contains_ci(&context.name, q) || contains_ci(&context.description, q)
        })
}

#[async_trait]
impl SearchContextStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> StoreResult<SearchContext> {
        self.search_contexts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("search context", format!("id={}", id)))
    }

    async fn list_paginated(
        &self,
        opts: &ListSearchContextsOptions,
        args: &PaginationArgs,
    ) -> StoreResult<Vec<SearchContext>> {
        let contexts = self.search_contexts.read().await;
        let matching = contexts
            .values()
            .filter(|c| context_matches(c, opts))
            .cloned();
        Ok(paginate_in_memory(matching, args))
    }

    async fn count(&self, opts: &ListSearchContextsOptions) -> StoreResult<i64> {
        let contexts = self.search_contexts.read().await;
        Ok(count(
            contexts
                .values()
                .filter(|c| context_matches(c, opts))
                .count(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Seed;
    use chrono::Utc;

    fn notebook(id: i64, public: bool, creator: i32) -> Notebook {
        Notebook {
            id,
            title: format!("notebook {}", id),
            blocks: vec![],
            public,
            creator_user_id: Some(creator),
            namespace_user_id: Some(creator),
            namespace_org_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_private_notebooks_visible_to_creator_only() {
        let db = MemoryDb::from_seed(&Seed {
            notebooks: vec![notebook(1, true, 1), notebook(2, false, 1), notebook(3, false, 2)],
            ..Seed::default()
        });
        let anonymous = ListNotebooksOptions::default();
        assert_eq!(NotebookStore::count(&db, &anonymous).await.unwrap(), 1);

        let creator = ListNotebooksOptions {
            viewer_id: Some(1),
            ..ListNotebooksOptions::default()
        };
        let ids: Vec<i64> =
            NotebookStore::list_paginated(&db, &creator, &PaginationArgs::first(10))
                .await
                .unwrap()
                .iter()
                .map(|n| n.id)
                .collect();
        assert_eq!(ids, vec![1, 2]);
    }
}

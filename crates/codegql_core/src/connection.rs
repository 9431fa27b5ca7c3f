//! The generic cursor-paginated connection resolver.
//!
//! A [`ConnectionResolver`] validates `first`/`last`/`after`/`before`, asks its
//! [`ConnectionStore`] for one row more than the page size and derives the
//! page info from that extra row. The node fetch and the total count are each
//! memoized, so selecting `nodes` and `pageInfo` costs one store call.

use crate::context::RequestContext;
use crate::error::{GqlError, GqlResult};
use crate::object::{resolve_list, resolve_object, Arguments, Object, Selection};
use crate::pagination::{CursorValue, OrderByColumn, PaginationArgs};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

/// Default upper bound for `first`/`last`.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// GraphQL pagination arguments as the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub first: Option<i32>,
    pub last: Option<i32>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl ConnectionArgs {
    pub fn from_arguments(args: &Arguments) -> GqlResult<Self> {
        Ok(Self {
            first: args.optional("first")?,
            last: args.optional("last")?,
            after: args.optional("after")?,
            before: args.optional("before")?,
        })
    }

    pub fn first(n: i32) -> Self {
        Self {
            first: Some(n),
            ..Self::default()
        }
    }
}

/// Per-connection ordering and limits.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// GraphQL type name of the connection, e.g. `UserConnection`.
    pub type_name: &'static str,
    pub order_by: Vec<OrderByColumn>,
    pub ascending: bool,
    pub max_page_size: usize,
    pub allow_no_limit: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            type_name: "Connection",
            order_by: vec![OrderByColumn::Id],
            ascending: true,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            allow_no_limit: false,
        }
    }
}

impl ConnectionOptions {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn order_by(mut self, columns: Vec<OrderByColumn>, ascending: bool) -> Self {
        self.order_by = columns;
        self.ascending = ascending;
        self
    }

    #[must_use]
    pub fn max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max;
        self
    }

    #[must_use]
    pub fn allow_no_limit(mut self) -> Self {
        self.allow_no_limit = true;
        self
    }
}

/// The backing query of a connection.
#[async_trait]
pub trait ConnectionStore<N>: Send + Sync {
    /// Counts all nodes matching the connection's filters.
    async fn compute_total(&self) -> GqlResult<i64>;

    /// Fetches one page. Backward pages come back in reversed order.
    async fn compute_nodes(&self, args: &PaginationArgs) -> GqlResult<Vec<N>>;

    fn marshal_cursor(&self, node: &N, order_by: &[OrderByColumn]) -> GqlResult<String>;

    fn unmarshal_cursor(
        &self,
        cursor: &str,
        order_by: &[OrderByColumn],
    ) -> GqlResult<Vec<CursorValue>>;
}

/// Page info of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// A forward-only page that continues at `end_cursor`, if any.
    pub fn next(end_cursor: Option<String>) -> Self {
        Self {
            has_next_page: end_cursor.is_some(),
            end_cursor,
            ..Self::default()
        }
    }

    /// The terminal page.
    pub fn no_next() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Object for PageInfo {
    fn type_name(&self) -> &'static str {
        "PageInfo"
    }

    fn default_fields(&self) -> &'static [&'static str] {
        &["hasNextPage", "hasPreviousPage", "startCursor", "endCursor"]
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        _selection: &Selection,
        _ctx: &RequestContext,
    ) -> GqlResult<Value> {
        match field {
            "hasNextPage" => Ok(json!(self.has_next_page)),
            "hasPreviousPage" => Ok(json!(self.has_previous_page)),
            "startCursor" => Ok(json!(self.start_cursor)),
            "endCursor" => Ok(json!(self.end_cursor)),
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

struct Fetched<N> {
    nodes: Vec<N>,
    fetched: usize,
}

/// A cursor-paginated connection over a [`ConnectionStore`].
pub struct ConnectionResolver<N, S> {
    store: S,
    args: ConnectionArgs,
    options: ConnectionOptions,
    limit: Option<usize>,
    pagination: PaginationArgs,
    data: OnceCell<GqlResult<Fetched<N>>>,
    total: OnceCell<GqlResult<i64>>,
}

fn non_negative(name: &str, value: Option<i32>) -> GqlResult<Option<usize>> {
    match value {
        None => Ok(None),
        Some(v) => usize::try_from(v)
            .map(Some)
            .map_err(|_| GqlError::invalid_argument(format!("`{}` should be non-negative", name))),
    }
}

impl<N, S> ConnectionResolver<N, S>
where
    N: Send + Sync,
    S: ConnectionStore<N>,
{
    pub fn new(store: S, args: ConnectionArgs, options: ConnectionOptions) -> GqlResult<Self> {
        if args.first.is_some() && args.last.is_some() {
            return Err(GqlError::invalid_argument(
                "cannot provide both `first` and `last`",
            ));
        }
        let first = non_negative("first", args.first)?.map(|n| n.min(options.max_page_size));
        let last = non_negative("last", args.last)?.map(|n| n.min(options.max_page_size));
        if first.is_none() && last.is_none() && !options.allow_no_limit {
            return Err(GqlError::invalid_argument(
                "you must provide a `first` or `last` value to properly paginate this connection",
            ));
        }

        let after = args
            .after
            .as_deref()
            .map(|c| store.unmarshal_cursor(c, &options.order_by))
            .transpose()?;
        let before = args
            .before
            .as_deref()
            .map(|c| store.unmarshal_cursor(c, &options.order_by))
            .transpose()?;

        let pagination = PaginationArgs {
            first: first.map(|n| n + 1),
            last: last.map(|n| n + 1),
            after,
            before,
            order_by: options.order_by.clone(),
            ascending: options.ascending,
        };

        Ok(Self {
            store,
            args,
            options,
            limit: first.or(last),
            pagination,
            data: OnceCell::new(),
            total: OnceCell::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn args(&self) -> &ConnectionArgs {
        &self.args
    }

    async fn fetch(&self) -> GqlResult<&Fetched<N>> {
        let result = self
            .data
            .get_or_init(|| async {
                let mut nodes = self.store.compute_nodes(&self.pagination).await?;
                let fetched = nodes.len();
                if let Some(limit) = self.limit {
                    nodes.truncate(limit);
                }
                if self.pagination.is_backward() {
                    nodes.reverse();
                }
                Ok(Fetched { nodes, fetched })
            })
            .await;
        result.as_ref().map_err(Clone::clone)
    }

    /// Returns the nodes of the current page.
    pub async fn nodes(&self) -> GqlResult<&[N]> {
        Ok(&self.fetch().await?.nodes)
    }

    /// Returns the total number of nodes across all pages.
    pub async fn total_count(&self) -> GqlResult<i64> {
        self.total
            .get_or_init(|| self.store.compute_total())
            .await
            .clone()
    }

    pub async fn page_info(&self) -> GqlResult<PageInfo> {
        let data = self.fetch().await?;
        let has_next_page = match self.pagination.first {
            Some(requested) => data.fetched >= requested,
            None => data.fetched > 0 && self.pagination.before.is_some(),
        };
        let has_previous_page = match self.pagination.last {
            Some(requested) => data.fetched >= requested,
            None => data.fetched > 0 && self.pagination.after.is_some(),
        };
        let order_by = &self.options.order_by;
        let start_cursor = data
            .nodes
            .first()
            .map(|n| self.store.marshal_cursor(n, order_by))
            .transpose()?;
        let end_cursor = data
            .nodes
            .last()
            .map(|n| self.store.marshal_cursor(n, order_by))
            .transpose()?;
        Ok(PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor,
            end_cursor,
        })
    }
}

#[async_trait]
impl<N, S> Object for ConnectionResolver<N, S>
where
    N: Object,
    S: ConnectionStore<N>,
{
    fn type_name(&self) -> &'static str {
        self.options.type_name
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
                let nodes = self.nodes().await?;
                Ok(resolve_list(nodes, selection, ctx).await)
            }
            "totalCount" => Ok(json!(self.total_count().await?)),
            "pageInfo" => {
                let info = self.page_info().await?;
                Ok(resolve_object(&info, selection, ctx).await)
            }
            _ => Err(GqlError::field_not_found(self.type_name(), field)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Actor;
    use crate::error::ErrorCode;
    use crate::pagination::{marshal_keyset_cursor, unmarshal_keyset_cursor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64);

    #[async_trait]
    impl Object for Item {
        fn type_name(&self) -> &'static str {
            "Item"
        }

        async fn resolve_field(
            &self,
            field: &str,
            _args: &Arguments,
            _selection: &Selection,
            _ctx: &RequestContext,
        ) -> GqlResult<Value> {
            match field {
                "id" => Ok(json!(self.0)),
                _ => Err(GqlError::field_not_found("Item", field)),
            }
        }
    }

    #[derive(Clone, Default)]
    struct Counting {
        node_calls: Arc<AtomicUsize>,
        total_calls: Arc<AtomicUsize>,
    }

    struct ItemStore {
        items: Vec<i64>,
        calls: Counting,
    }

    impl ItemStore {
        fn new(n: i64) -> Self {
            Self {
                items: (1..=n).collect(),
                calls: Counting::default(),
            }
        }
    }

    #[async_trait]
    impl ConnectionStore<Item> for ItemStore {
        async fn compute_total(&self) -> GqlResult<i64> {
            self.calls.total_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.len() as i64)
        }

        async fn compute_nodes(&self, args: &PaginationArgs) -> GqlResult<Vec<Item>> {
            self.calls.node_calls.fetch_add(1, Ordering::SeqCst);
            let key = |v: &Option<Vec<CursorValue>>| match v.as_deref() {
                Some([CursorValue::Int(n)]) => Some(*n),
                _ => None,
            };
            let after = key(&args.after);
            let before = key(&args.before);
            let mut items: Vec<i64> = self
                .items
                .iter()
                .copied()
                .filter(|n| after.map_or(true, |a| *n > a))
                .filter(|n| before.map_or(true, |b| *n < b))
                .collect();
            if args.is_backward() {
                items.reverse();
            }
            if let Some(limit) = args.limit() {
                items.truncate(limit);
            }
            Ok(items.into_iter().map(Item).collect())
        }

        fn marshal_cursor(&self, node: &Item, _order_by: &[OrderByColumn]) -> GqlResult<String> {
            Ok(marshal_keyset_cursor("Item", &[CursorValue::Int(node.0)]))
        }

        fn unmarshal_cursor(
            &self,
            cursor: &str,
            order_by: &[OrderByColumn],
        ) -> GqlResult<Vec<CursorValue>> {
            unmarshal_keyset_cursor("Item", cursor, order_by)
        }
    }

    fn connection(
        store: ItemStore,
        args: ConnectionArgs,
        options: ConnectionOptions,
    ) -> GqlResult<ConnectionResolver<Item, ItemStore>> {
        ConnectionResolver::new(store, args, options)
    }

    fn ids(nodes: &[Item]) -> Vec<i64> {
        nodes.iter().map(|n| n.0).collect()
    }

    #[test]
    fn test_argument_validation() {
        let opts = ConnectionOptions::default;
        let both = ConnectionArgs {
            first: Some(1),
            last: Some(1),
            ..ConnectionArgs::default()
        };
        assert!(connection(ItemStore::new(3), both, opts()).is_err());

        let negative = ConnectionArgs::first(-1);
        let err = connection(ItemStore::new(3), negative, opts())
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::InvalidArgument);

        let err = connection(ItemStore::new(3), ConnectionArgs::default(), opts())
            .err()
            .unwrap();
        assert_eq!(
            err.message,
            "you must provide a `first` or `last` value to properly paginate this connection"
        );

        assert!(connection(
            ItemStore::new(3),
            ConnectionArgs::default(),
            opts().allow_no_limit()
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_forward_paging_never_repeats() {
        let mut seen = Vec::new();
        let mut after = None;
        loop {
            let args = ConnectionArgs {
                first: Some(2),
                after: after.clone(),
                ..ConnectionArgs::default()
            };
            let conn =
                connection(ItemStore::new(5), args, ConnectionOptions::default())
                    .unwrap();
            let page = ids(conn.nodes().await.unwrap());
            assert!(page.iter().all(|id| !seen.contains(id)));
            seen.extend(page);
            let info = conn.page_info().await.unwrap();
            if !info.has_next_page {
                break;
            }
            after = info.end_cursor;
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_backward_page_keeps_canonical_order() {
        let store = ItemStore::new(5);
        let before = store.marshal_cursor(&Item(5), &[]).unwrap();
        let args = ConnectionArgs {
            last: Some(2),
            before: Some(before),
            ..ConnectionArgs::default()
        };
        let conn = connection(store, args, ConnectionOptions::default()).unwrap();
        assert_eq!(ids(conn.nodes().await.unwrap()), vec![3, 4]);
        let info = conn.page_info().await.unwrap();
        assert!(info.has_previous_page);
        assert!(info.has_next_page);
    }

    #[tokio::test]
    async fn test_clamped_and_memoized() {
        let store = ItemStore::new(150);
        let calls = store.calls.clone();
        let conn =
            connection(store, ConnectionArgs::first(500), ConnectionOptions::default())
                .unwrap();
        assert_eq!(conn.nodes().await.unwrap().len(), 100);
        assert!(conn.page_info().await.unwrap().has_next_page);
        assert_eq!(calls.node_calls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.total_calls.load(Ordering::SeqCst), 0);
        assert_eq!(conn.total_count().await.unwrap(), 150);
        assert_eq!(conn.total_count().await.unwrap(), 150);
        assert_eq!(calls.total_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolves_as_object() {
        let ctx = RequestContext::new(Actor::anonymous());
        let conn = connection(
            ItemStore::new(3),
            ConnectionArgs::first(2),
            ConnectionOptions::new("ItemConnection"),
        )
        .unwrap();
        let selection = Selection::parse(&json!({
            "__typename": true,
            "nodes": {"id": true},
            "totalCount": true,
            "pageInfo": {"hasNextPage": true}
        }))
        .unwrap();
        let value = resolve_object(&conn, &selection, &ctx).await;
        assert_eq!(
            value,
            json!({
                "__typename": "ItemConnection",
                "nodes": [{"id": 1}, {"id": 2}],
                "totalCount": 3,
                "pageInfo": {"hasNextPage": true}
            })
        );
    }

    #[test]
    fn test_page_info_next() {
        assert!(PageInfo::next(Some("abc".into())).has_next_page);
        assert!(!PageInfo::next(None).has_next_page);
        assert_eq!(PageInfo::no_next(), PageInfo::default());
    }
}

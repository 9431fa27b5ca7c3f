//! Keyset-paginated connections over the stores.

use async_trait::async_trait;
use codegql_core::{
    marshal_keyset_cursor, resolve_object, unmarshal_keyset_cursor, Arguments, ConnectionArgs,
    ConnectionOptions, ConnectionResolver, ConnectionStore, CursorValue, GqlResult, Object,
    OrderByColumn, Paginated, PaginationArgs, RequestContext, Selection,
};
use serde_json::Value;

use crate::services::Services;

/// A filtered store listing that a connection pages through.
#[async_trait]
pub(crate) trait KeysetSource: Send + Sync {
    type Node: Object + Paginated;

    /// Entity name used in cursors, e.g. `User` for `UserCursor`.
    fn cursor_kind(&self) -> &'static str;

    async fn count(&self) -> GqlResult<i64>;

    async fn list(&self, args: &PaginationArgs) -> GqlResult<Vec<Self::Node>>;
}

pub(crate) struct Keyset<S>(pub S);

#[async_trait]
impl<S: KeysetSource> ConnectionStore<S::Node> for Keyset<S> {
    async fn compute_total(&self) -> GqlResult<i64> {
        self.0.count().await
    }

    async fn compute_nodes(&self, args: &PaginationArgs) -> GqlResult<Vec<S::Node>> {
        self.0.list(args).await
    }

    fn marshal_cursor(&self, node: &S::Node, order_by: &[OrderByColumn]) -> GqlResult<String> {
        Ok(marshal_keyset_cursor(
            self.0.cursor_kind(),
            &node.cursor_values(order_by),
        ))
    }

    fn unmarshal_cursor(
        &self,
        cursor: &str,
        order_by: &[OrderByColumn],
    ) -> GqlResult<Vec<CursorValue>> {
        unmarshal_keyset_cursor(self.0.cursor_kind(), cursor, order_by)
    }
}

/// Connection options with the site's page size limit applied.
pub(crate) fn options(services: &Services, type_name: &'static str) -> ConnectionOptions {
    ConnectionOptions::new(type_name).max_page_size(services.settings.max_page_size)
}

/// Builds the connection from GraphQL arguments and resolves it.
pub(crate) async fn resolve_keyset<S: KeysetSource>(
    source: S,
    options: ConnectionOptions,
    args: &Arguments,
    selection: &Selection,
    ctx: &RequestContext,
) -> GqlResult<Value> {
    let connection =
        ConnectionResolver::new(Keyset(source), ConnectionArgs::from_arguments(args)?, options)?;
    Ok(resolve_object(&connection, selection, ctx).await)
}

/// Implements [`Paginated`] for a resolver wrapping an entity field.
macro_rules! paginated_by {
    ($resolver:ty, $field:ident) => {
        impl codegql_core::Paginated for $resolver {
            fn cursor_values(
                &self,
                order_by: &[codegql_core::OrderByColumn],
            ) -> Vec<codegql_core::CursorValue> {
                codegql_core::Paginated::cursor_values(&self.$field, order_by)
            }
        }
    };
}

pub(crate) use paginated_by;

/// A connection over a fully fetched list. Every node is on the one page.
pub(crate) struct ListConnection<N> {
    type_name: &'static str,
    nodes: Vec<N>,
}

impl<N> ListConnection<N> {
    pub(crate) fn new(type_name: &'static str, nodes: Vec<N>) -> Self {
        Self { type_name, nodes }
    }
}

#[async_trait]
impl<N: Object> Object for ListConnection<N> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        match field {
            "nodes" => Ok(codegql_core::resolve_list(&self.nodes, selection, ctx).await),
            "totalCount" => Ok(Value::from(self.nodes.len())),
            "pageInfo" => {
                Ok(resolve_object(&codegql_core::PageInfo::no_next(), selection, ctx).await)
            }
            _ => Err(codegql_core::GqlError::field_not_found(self.type_name, field)),
        }
    }
}

//! Core GraphQL plumbing for codegql.
//!
//! This crate provides the shared building blocks every resolver uses:
//! - `error`: Typed errors and the GraphQL error shape
//! - `relay`: Opaque node IDs
//! - `cursor`: Opaque pagination cursors
//! - `pagination`: Store-facing pagination arguments and keyset values
//! - `connection`: The generic cursor-paginated connection resolver
//! - `context`: Request-scoped data and the acting user
//! - `object`: Selection trees and field dispatch

pub mod connection;
pub mod context;
pub mod cursor;
pub mod error;
pub mod object;
pub mod pagination;
pub mod relay;

pub use connection::{
    ConnectionArgs, ConnectionOptions, ConnectionResolver, ConnectionStore, PageInfo,
    DEFAULT_MAX_PAGE_SIZE,
};
pub use cursor::{decode_cursor, decode_int_cursor, decode_offset, encode_cursor, encode_int_cursor};
pub use context::{Actor, RequestContext, TypedContext};
pub use error::{ErrorCode, FieldError, GqlError, GqlResult, PathSegment, ResultExt};
pub use object::{
    resolve_list, resolve_object, resolve_optional, to_value, Arguments, Object, SelectedField, Selection,
    ValueObject,
};
pub use pagination::{
    marshal_keyset_cursor, unmarshal_keyset_cursor, CursorValue, OrderByColumn, Paginated,
    PaginationArgs,
};
pub use relay::{marshal_id, unmarshal_id, unmarshal_kind};

//! GraphQL resolvers for codegql.
//!
//! - `schema`: Request execution against the roots
//! - `query` / `mutation`: The root objects
//! - `node`: Opaque-id lookup for every node type
//! - `user`, `org`, `team`, `repository`: Entity resolvers
//! - `team_mutations`: Team creation and membership changes
//! - `comparison`: Repository comparisons, previews and file diffs
//! - `collaborators`: Invitable collaborator suggestions
//! - `admin`: Site-admin entities (external services, webhooks, secrets, ...)
//! - `content`: Notebooks and search contexts
//! - `connection`: Keyset-paginated connections over the stores
//! - `loader`: Request-scoped user loading
//! - `services`: The backends and site settings

pub mod admin;
pub(crate) mod auth;
pub mod collaborators;
pub mod comparison;
pub mod connection;
pub mod content;
pub mod loader;
pub mod mutation;
pub mod node;
pub mod org;
pub mod query;
pub mod repository;
pub mod schema;
pub mod services;
pub mod team;
pub mod team_mutations;
pub mod user;

pub use loader::UserLoader;
pub use mutation::MutationRoot;
pub use query::QueryRoot;
pub use schema::{OperationType, Request, Response, Schema};
pub use services::{SchemaSettings, Services};

//! Backend interfaces consumed by the codegql resolvers.
//!
//! - `types`: Entities returned by the stores
//! - `db`: Store traits aggregated by [`Db`]
//! - `gitserver`: The git client interface
//! - `highlight`: The syntax highlighter interface
//! - `memory`: In-memory implementations of all of the above

pub mod db;
pub mod error;
pub mod gitserver;
pub mod highlight;
pub mod memory;
pub mod types;

pub use db::Db;
pub use error::{GitResult, GitserverError, StoreError, StoreResult};
pub use gitserver::{CommitsOptions, GitserverClient};
pub use highlight::{HighlightOptions, HighlightedFile, Highlighter, PlainHighlighter};
pub use memory::{paginate_in_memory, MemoryDb, MemoryGitserver, Seed, SeedError};

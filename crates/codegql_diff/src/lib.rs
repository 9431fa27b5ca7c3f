//! Unified diff handling for codegql.
//!
//! - `parse`: `git diff` / `diff -u` parsing into [`FileDiff`]s
//! - `patch`: Applying a parsed diff to the original file content
//! - `highlight`: Pairing hunk lines with highlighted file lines
//! - `stat`: Added/deleted line counts

pub mod error;
pub mod highlight;
pub mod parse;
pub mod patch;
pub mod stat;
pub mod types;

pub use error::{DiffError, DiffResult};
pub use highlight::{highlight_hunk, DiffLineKind, HighlightedDiffLine};
pub use parse::{parse_file_diff, parse_multi_file_diff};
pub use patch::apply_patch;
pub use stat::DiffStat;
pub use types::{FileDiff, Hunk};

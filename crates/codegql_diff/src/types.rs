//! Parsed diff structures.

use crate::stat::DiffStat;

/// One file of a unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// Name on the `---` line, `None` for `/dev/null`.
    pub orig_name: Option<String>,
    /// Name on the `+++` line, `None` for `/dev/null`.
    pub new_name: Option<String>,
    /// `diff --git` and extended header lines, without trailing newlines.
    pub extended: Vec<String>,
    pub binary: bool,
    pub hunks: Vec<Hunk>,
}

fn strip_prefix(name: &str, prefix: &str) -> String {
    name.strip_prefix(prefix).unwrap_or(name).to_string()
}

impl FileDiff {
    /// Path of the original file, without the `a/` prefix.
    pub fn orig_path(&self) -> Option<String> {
        self.orig_name.as_deref().map(|n| strip_prefix(n, "a/"))
    }

    /// Path of the new file, without the `b/` prefix.
    pub fn new_path(&self) -> Option<String> {
        self.new_name.as_deref().map(|n| strip_prefix(n, "b/"))
    }

    pub fn is_added(&self) -> bool {
        self.orig_name.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.new_name.is_none()
    }

    pub fn is_renamed(&self) -> bool {
        match (self.orig_path(), self.new_path()) {
            (Some(orig), Some(new)) => orig != new,
            _ => false,
        }
    }

    pub fn stat(&self) -> DiffStat {
        self.hunks.iter().map(Hunk::stat).sum()
    }
}

/// One `@@` hunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    pub orig_start_line: u32,
    pub orig_lines: u32,
    pub new_start_line: u32,
    pub new_lines: u32,
    /// Text after the closing `@@`, usually the enclosing function.
    pub section: String,
    /// Body lines including their prefixes and marker lines, each ending in `\n`.
    pub body: String,
    /// Byte offset in `body` of the marker saying the original file lacks a
    /// final newline.
    pub orig_no_newline_at: Option<usize>,
}

impl Hunk {
    pub fn body_lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }

    pub fn stat(&self) -> DiffStat {
        let mut stat = DiffStat::default();
        for line in self.body_lines() {
            match line.as_bytes().first() {
                Some(b'+') => stat.added += 1,
                Some(b'-') => stat.deleted += 1,
                _ => {}
            }
        }
        stat
    }
}

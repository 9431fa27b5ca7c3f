//! Aligns hunk lines with highlighted file lines.

use crate::error::{DiffError, DiffResult};
use crate::types::Hunk;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffLineKind {
    Added,
    Deleted,
    Unchanged,
}

impl DiffLineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Deleted => "DELETED",
            Self::Unchanged => "UNCHANGED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightedDiffLine {
    pub kind: DiffLineKind,
    pub html: String,
}

fn line_at(lines: &[String], index: usize, side: &'static str) -> DiffResult<String> {
    lines
        .get(index)
        .cloned()
        .ok_or(DiffError::HighlightOutOfRange {
            side,
            index,
            len: lines.len(),
        })
}

/// Pairs each body line of `hunk` with its highlighted counterpart.
///
/// `base_lines` and `head_lines` are the highlighted lines of the whole
/// original and new file. Context and added lines come from the head,
/// deleted lines from the base.
pub fn highlight_hunk(
    hunk: &Hunk,
    base_lines: &[String],
    head_lines: &[String],
) -> DiffResult<Vec<HighlightedDiffLine>> {
    let mut orig = (hunk.orig_start_line as usize).saturating_sub(1);
    let mut new = (hunk.new_start_line as usize).saturating_sub(1);

    let mut body: Vec<&str> = hunk.body.split('\n').collect();
    if body.last() == Some(&"") {
        body.pop();
    }

    let mut lines = Vec::with_capacity(body.len());
    for line in body {
        let (kind, html) = match line.as_bytes().first() {
            Some(b' ') => {
                let html = line_at(head_lines, new, "head")?;
                orig += 1;
                new += 1;
                (DiffLineKind::Unchanged, html)
            }
            Some(b'+') => {
                let html = line_at(head_lines, new, "head")?;
                new += 1;
                (DiffLineKind::Added, html)
            }
            Some(b'-') => {
                let html = line_at(base_lines, orig, "base")?;
                orig += 1;
                (DiffLineKind::Deleted, html)
            }
            Some(b'\\') => continue,
            _ => {
                return Err(DiffError::UnknownLinePrefix {
                    line: line.to_string(),
                })
            }
        };
        lines.push(HighlightedDiffLine { kind, html });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_alignment() {
        let hunk = Hunk {
            orig_start_line: 2,
            orig_lines: 2,
            new_start_line: 2,
            new_lines: 3,
            body: " b\n-c\n+C\n+D\n\\ No newline at end of file\n".into(),
            ..Hunk::default()
        };
        let base = strings(&["<a>", "<b>", "<c>"]);
        let head = strings(&["<a>", "<b>", "<C>", "<D>"]);
        let lines = highlight_hunk(&hunk, &base, &head).unwrap();
        let got: Vec<_> = lines.iter().map(|l| (l.kind, l.html.as_str())).collect();
        assert_eq!(
            got,
            vec![
                (DiffLineKind::Unchanged, "<b>"),
                (DiffLineKind::Deleted, "<c>"),
                (DiffLineKind::Added, "<C>"),
                (DiffLineKind::Added, "<D>"),
            ]
        );
    }

    #[test]
    fn test_unknown_prefix() {
        let hunk = Hunk {
            orig_start_line: 1,
            new_start_line: 1,
            body: "?x\n".into(),
            ..Hunk::default()
        };
        let err = highlight_hunk(&hunk, &[], &[]).unwrap_err();
        assert_eq!(err, DiffError::UnknownLinePrefix { line: "?x".into() });
    }

    #[test]
    fn test_out_of_range() {
        let hunk = Hunk {
            orig_start_line: 3,
            orig_lines: 1,
            new_start_line: 3,
            body: "-gone\n".into(),
            ..Hunk::default()
        };
        let err = highlight_hunk(&hunk, &strings(&["a"]), &[]).unwrap_err();
        assert_eq!(
            err,
            DiffError::HighlightOutOfRange {
                side: "base",
                index: 2,
                len: 1
            }
        );
    }

    #[test]
    fn test_kind_serializes_uppercase() {
        let json = serde_json::to_value(DiffLineKind::Unchanged).unwrap();
        assert_eq!(json, serde_json::json!("UNCHANGED"));
    }
}

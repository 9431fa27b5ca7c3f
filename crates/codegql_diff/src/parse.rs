//! Unified diff parser.
//!
//! Understands `git diff` output (with `diff --git` and extended headers) as
//! well as plain `diff -u` output. Line numbers in errors are 1-based.

use crate::error::{DiffError, DiffResult};
use crate::types::{FileDiff, Hunk};
use regex::Regex;
use std::sync::OnceLock;

static HUNK_HEADER: OnceLock<Option<Regex>> = OnceLock::new();

fn hunk_header() -> Option<&'static Regex> {
    HUNK_HEADER
        .get_or_init(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@ ?(.*)$").ok())
        .as_ref()
}

const EXTENDED_HEADERS: [&str; 13] = [
    "old mode ",
    "new mode ",
    "deleted file mode ",
    "new file mode ",
    "copy from ",
    "copy to ",
    "rename from ",
    "rename to ",
    "similarity index ",
    "dissimilarity index ",
    "index ",
    "Binary files ",
    "GIT binary patch",
];

fn is_extended_header(line: &str) -> bool {
    EXTENDED_HEADERS.iter().any(|h| line.starts_with(h))
}

/// Parses a `---`/`+++` name. Timestamps after a tab are dropped.
fn parse_name(raw: &str) -> Option<String> {
    let name = raw.split('\t').next().unwrap_or(raw).trim_end();
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name);
    if name == "/dev/null" {
        None
    } else {
        Some(name.to_string())
    }
}

/// Splits `diff --git a/x b/y` into its two names.
fn parse_git_names(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("diff --git ")?;
    let splits: Vec<usize> = rest.match_indices(" b/").map(|(i, _)| i).collect();
    let split = splits
        .iter()
        .copied()
        .find(|&i| rest.get(2..i) == rest.get(i + 3..))
        .or_else(|| splits.first().copied())?;
    Some((rest[..split].to_string(), rest[split + 1..].to_string()))
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.strip_suffix('\n').unwrap_or(text);
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').collect()
        };
        Self { lines, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn line_no(&self) -> usize {
        self.pos + 1
    }

    fn parse_file(&mut self) -> DiffResult<FileDiff> {
        let mut diff = FileDiff::default();
        let mut git_names = None;
        let mut rename_from = None;
        let mut rename_to = None;
        let mut new_file = false;
        let mut deleted_file = false;
        let mut saw_header = false;

        while let Some(line) = self.peek() {
            if line.starts_with("diff ") {
                if saw_header {
                    break;
                }
                git_names = parse_git_names(line);
            } else if is_extended_header(line) {
                if let Some(name) = line.strip_prefix("rename from ") {
                    rename_from = Some(format!("a/{}", name));
                } else if let Some(name) = line.strip_prefix("rename to ") {
                    rename_to = Some(format!("b/{}", name));
                } else if line.starts_with("new file mode ") {
                    new_file = true;
                } else if line.starts_with("deleted file mode ") {
                    deleted_file = true;
                } else if line.starts_with("Binary files ") || line.starts_with("GIT binary patch")
                {
                    diff.binary = true;
                }
            } else {
                break;
            }
            saw_header = true;
            diff.extended.push(line.to_string());
            self.pos += 1;
        }

        match self.peek() {
            Some(line) if line.starts_with("--- ") => {
                diff.orig_name = parse_name(&line[4..]);
                self.pos += 1;
                match self.peek() {
                    Some(next) if next.starts_with("+++ ") => {
                        diff.new_name = parse_name(&next[4..]);
                        self.pos += 1;
                    }
                    _ => {
                        return Err(DiffError::malformed(
                            self.line_no(),
                            "expected +++ line after --- line",
                        ))
                    }
                }
            }
            found => {
                if !saw_header {
                    return Err(DiffError::malformed(
                        self.line_no(),
                        format!("expected file header, found {:?}", found.unwrap_or("")),
                    ));
                }
                let (orig, new) = git_names.unwrap_or_default();
                diff.orig_name = (!new_file).then(|| rename_from.unwrap_or(orig));
                diff.new_name = (!deleted_file).then(|| rename_to.unwrap_or(new));
            }
        }

        while let Some(line) = self.peek() {
            if !line.starts_with("@@") {
                break;
            }
            diff.hunks.push(self.parse_hunk()?);
        }
        Ok(diff)
    }

    fn parse_hunk(&mut self) -> DiffResult<Hunk> {
        let header_line = self.line_no();
        let header = self.peek().unwrap_or("");
        let invalid = || DiffError::malformed(header_line, format!("invalid hunk header {:?}", header));
        let caps = hunk_header()
            .and_then(|re| re.captures(header))
            .ok_or_else(invalid)?;
        let number = |i: usize| -> DiffResult<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(1),
            }
        };
        let mut hunk = Hunk {
            orig_start_line: number(1)?,
            orig_lines: number(2)?,
            new_start_line: number(3)?,
            new_lines: number(4)?,
            section: caps.get(5).map_or("", |m| m.as_str()).to_string(),
            ..Hunk::default()
        };
        self.pos += 1;

        let mut orig_left = hunk.orig_lines;
        let mut new_left = hunk.new_lines;
        let mut prev = None;
        while let Some(line) = self.peek() {
            let prefix = line.as_bytes().first().copied();
            if prefix == Some(b'\\') {
                if matches!(prev, Some(b'-' | b' ')) {
                    hunk.orig_no_newline_at = Some(hunk.body.len());
                }
                hunk.body.push_str(line);
                hunk.body.push('\n');
                self.pos += 1;
                continue;
            }
            if orig_left == 0 && new_left == 0 {
                break;
            }
            // Some tools strip the space from empty context lines.
            let (kind, text) = match prefix {
                None => (b' ', " "),
                Some(p @ (b' ' | b'-' | b'+')) => (p, line),
                Some(_) => {
                    return Err(DiffError::malformed(
                        self.line_no(),
                        format!(
                            "hunk is missing {} original and {} new lines declared in its header",
                            orig_left, new_left
                        ),
                    ))
                }
            };
            let fits = match kind {
                b' ' => orig_left > 0 && new_left > 0,
                b'-' => orig_left > 0,
                _ => new_left > 0,
            };
            if !fits {
                return Err(DiffError::malformed(
                    self.line_no(),
                    "hunk has more lines than declared in its header",
                ));
            }
            if kind != b'+' {
                orig_left -= 1;
            }
            if kind != b'-' {
                new_left -= 1;
            }
            hunk.body.push_str(text);
            hunk.body.push('\n');
            prev = Some(kind);
            self.pos += 1;
        }

        if orig_left > 0 || new_left > 0 {
            return Err(DiffError::malformed(
                self.line_no(),
                format!(
                    "unexpected end of hunk: missing {} original and {} new lines",
                    orig_left, new_left
                ),
            ));
        }
        Ok(hunk)
    }
}

/// Parses a diff that may touch many files.
pub fn parse_multi_file_diff(text: &str) -> DiffResult<Vec<FileDiff>> {
    let mut parser = Parser::new(text);
    let mut files = Vec::new();
    while let Some(line) = parser.peek() {
        if line.is_empty() {
            parser.pos += 1;
            continue;
        }
        files.push(parser.parse_file()?);
    }
    Ok(files)
}

/// Parses a diff of exactly one file.
pub fn parse_file_diff(text: &str) -> DiffResult<FileDiff> {
    let mut files = parse_multi_file_diff(text)?;
    match files.len() {
        1 => Ok(files.remove(0)),
        n => Err(DiffError::malformed(
            1,
            format!("expected a diff of one file, found {}", n),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_git_names() {
        assert_eq!(
            parse_git_names("diff --git a/src/x.rs b/src/x.rs"),
            Some(("a/src/x.rs".into(), "b/src/x.rs".into()))
        );
        assert_eq!(
            parse_git_names("diff --git a/dir b/f b/dir b/f"),
            Some(("a/dir b/f".into(), "b/dir b/f".into()))
        );
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(parse_name("a/x.txt\t2024-01-01 00:00:00"), Some("a/x.txt".into()));
        assert_eq!(parse_name("/dev/null"), None);
        assert_eq!(parse_name("\"a/with space\""), Some("a/with space".into()));
    }

    #[test]
    fn test_omitted_counts_default_to_one() {
        let diff = parse_file_diff("--- a/f\n+++ b/f\n@@ -3 +3 @@ fn main\n-x\n+y\n").unwrap();
        let hunk = &diff.hunks[0];
        assert_eq!((hunk.orig_start_line, hunk.orig_lines), (3, 1));
        assert_eq!((hunk.new_start_line, hunk.new_lines), (3, 1));
        assert_eq!(hunk.section, "fn main");
        assert_eq!(hunk.body, "-x\n+y\n");
    }

    #[test]
    fn test_empty_context_line_is_normalized() {
        let diff = parse_file_diff("--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n\n-b\n+c\n").unwrap();
        assert_eq!(diff.hunks[0].body, " a\n \n-b\n+c\n");
    }

    #[test]
    fn test_orig_no_newline_offset() {
        let text = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n";
        let hunk = &parse_file_diff(text).unwrap().hunks[0];
        assert_eq!(hunk.orig_no_newline_at, Some(3));

        let text = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+b\n\\ No newline at end of file\n";
        let hunk = &parse_file_diff(text).unwrap().hunks[0];
        assert_eq!(hunk.orig_no_newline_at, None);
        assert!(hunk.body.ends_with("\\ No newline at end of file\n"));
    }

    #[test]
    fn test_line_numbers_in_errors() {
        let err = parse_file_diff("--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n").unwrap_err();
        assert_eq!(
            err,
            DiffError::malformed(5, "unexpected end of hunk: missing 1 original and 1 new lines")
        );

        let err = parse_file_diff("--- a/f\n+++ b/f\n@@ bogus @@\n").unwrap_err();
        assert!(matches!(err, DiffError::Malformed { line: 3, .. }));

        let err = parse_file_diff("--- a/f\nnope\n").unwrap_err();
        assert!(matches!(err, DiffError::Malformed { line: 2, .. }));

        let err = parse_file_diff("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n-b\n").unwrap_err();
        assert!(matches!(err, DiffError::Malformed { line: 5, .. }));
    }
}

use crate::types::FileDiff;

/// Applies the hunks of `diff` to `content` and returns the new file.
///
/// Hunks must be sorted and must not overlap, as `git diff` emits them.
/// Lines outside any hunk are copied from `content`.
pub fn apply_patch(content: &str, diff: &FileDiff) -> String {
    let orig_missing_newline = !content.is_empty() && !content.ends_with('\n');
    let orig: Vec<&str> = if content.is_empty() {
        Vec::new()
    } else {
        content
            .strip_suffix('\n')
            .unwrap_or(content)
            .split('\n')
            .collect()
    };

    let mut out: Vec<&str> = Vec::with_capacity(orig.len());
    let mut cursor = 0usize;
    let mut last_hunk_missing_newline = false;

    for hunk in &diff.hunks {
        // A hunk that removes nothing starts after its start line.
        let start = if hunk.orig_lines == 0 {
            hunk.orig_start_line as usize
        } else {
            (hunk.orig_start_line as usize).saturating_sub(1)
        };
        let start = start.min(orig.len());
        if cursor < start {
            out.extend_from_slice(&orig[cursor..start]);
            cursor = start;
        }

        last_hunk_missing_newline = false;
        let mut prev = None;
        for line in hunk.body.split('\n').filter(|l| !l.is_empty()) {
            let prefix = line.as_bytes()[0];
            let text = line.get(1..).unwrap_or("");
            match prefix {
                b'-' => cursor += 1,
                b'+' => out.push(text),
                b' ' => {
                    out.push(orig.get(cursor).copied().unwrap_or(text));
                    cursor += 1;
                }
                b'\\' => {
                    if matches!(prev, Some(b'+' | b' ')) {
                        last_hunk_missing_newline = true;
                    }
                    continue;
                }
                _ => {}
            }
            prev = Some(prefix);
        }
    }

    let missing_newline = if cursor < orig.len() {
        out.extend_from_slice(&orig[cursor..]);
        orig_missing_newline
    } else {
        last_hunk_missing_newline
    };

    let mut patched = out.join("\n");
    if !out.is_empty() && !missing_newline {
        patched.push('\n');
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_file_diff;

    fn patch(content: &str, diff: &str) -> String {
        apply_patch(content, &parse_file_diff(diff).unwrap())
    }

    #[test]
    fn test_single_hunk_in_the_middle() {
        let diff = "--- a/f\n+++ b/f\n@@ -2,3 +2,3 @@\n b\n-c\n+C\n d\n";
        assert_eq!(patch("a\nb\nc\nd\ne\n", diff), "a\nb\nC\nd\ne\n");
    }

    #[test]
    fn test_multiple_hunks() {
        let diff = "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n-1\n+one\n 2\n@@ -5,2 +5,3 @@\n 5\n+5.5\n 6\n";
        assert_eq!(
            patch("1\n2\n3\n4\n5\n6\n7\n", diff),
            "one\n2\n3\n4\n5\n5.5\n6\n7\n"
        );
    }

    #[test]
    fn test_pure_insertion_after_line() {
        let diff = "--- a/f\n+++ b/f\n@@ -1,0 +2,1 @@\n+new\n";
        assert_eq!(patch("a\nb\n", diff), "a\nnew\nb\n");
    }

    #[test]
    fn test_creation_from_empty() {
        let diff = "--- /dev/null\n+++ b/f\n@@ -0,0 +1,2 @@\n+x\n+y\n";
        assert_eq!(patch("", diff), "x\ny\n");
    }

    #[test]
    fn test_deleting_everything() {
        let diff = "--- a/f\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-x\n-y\n";
        assert_eq!(patch("x\ny\n", diff), "");
    }

    #[test]
    fn test_adds_missing_final_newline() {
        let diff = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+a\n";
        assert_eq!(patch("a", diff), "a\n");
    }

    #[test]
    fn test_removes_final_newline() {
        let diff = "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+b\n\\ No newline at end of file\n";
        assert_eq!(patch("a\nb\n", diff), "a\nb");
    }

    #[test]
    fn test_untouched_tail_keeps_missing_newline() {
        let diff = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+A\n";
        assert_eq!(patch("a\nb\nc", diff), "A\nb\nc");
    }
}

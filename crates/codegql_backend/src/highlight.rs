//! Syntax highlighter interface and a plain HTML fallback.

use crate::error::GitResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lines longer than this are left unhighlighted unless asked otherwise.
pub const LONG_LINE_THRESHOLD: usize = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightOptions {
    pub disable_timeout: bool,
    pub highlight_long_lines: bool,
}

/// A highlighted file, one HTML fragment per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightedFile {
    pub lines: Vec<String>,
    /// True if highlighting gave up and `lines` hold plain escaped text.
    pub aborted: bool,
}

#[async_trait]
pub trait Highlighter: Send + Sync {
    async fn highlight(
        &self,
        path: &str,
        content: &str,
        opts: &HighlightOptions,
    ) -> GitResult<HighlightedFile>;
}

/// Splits file content into lines. A trailing newline does not start a new line.
pub fn split_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    let trimmed = content.strip_suffix('\n').unwrap_or(content);
    trimmed.split('\n').collect()
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders each line as escaped text in a `<span>`.
///
/// Content larger than `max_bytes` counts as a timeout and is returned
/// aborted, unless the caller disabled the timeout.
#[derive(Debug, Clone)]
pub struct PlainHighlighter {
    max_bytes: usize,
}

impl Default for PlainHighlighter {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
        }
    }
}

impl PlainHighlighter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl Highlighter for PlainHighlighter {
    async fn highlight(
        &self,
        path: &str,
        content: &str,
        opts: &HighlightOptions,
    ) -> GitResult<HighlightedFile> {
        let aborted = content.len() > self.max_bytes && !opts.disable_timeout;
        if aborted {
            tracing::debug!(path, bytes = content.len(), "highlighting aborted");
        }
        let lines = split_lines(content)
            .into_iter()
            .map(|line| {
                if aborted || (line.len() > LONG_LINE_THRESHOLD && !opts.highlight_long_lines) {
                    escape_html(line)
                } else {
                    format!("<span>{}</span>", escape_html(line))
                }
            })
            .collect();
        Ok(HighlightedFile { lines, aborted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
        assert!(split_lines("").is_empty());
    }

    #[tokio::test]
    async fn test_plain_highlighter_escapes() {
        let file = PlainHighlighter::new()
            .highlight("x.rs", "if a < b {\n}\n", &HighlightOptions::default())
            .await
            .unwrap();
        assert!(!file.aborted);
        assert_eq!(file.lines, vec!["<span>if a &lt; b {</span>", "<span>}</span>"]);
    }

    #[tokio::test]
    async fn test_plain_highlighter_aborts_on_large_content() {
        let content = "x\n".repeat(10);
        let highlighter = PlainHighlighter::with_max_bytes(4);
        let file = highlighter
            .highlight("big.txt", &content, &HighlightOptions::default())
            .await
            .unwrap();
        assert!(file.aborted);
        assert_eq!(file.lines[0], "x");

        let opts = HighlightOptions {
            disable_timeout: true,
            ..HighlightOptions::default()
        };
        let file = highlighter.highlight("big.txt", &content, &opts).await.unwrap();
        assert!(!file.aborted);
    }

    #[tokio::test]
    async fn test_long_lines_left_plain() {
        let long = "y".repeat(LONG_LINE_THRESHOLD + 1);
        let highlighter = PlainHighlighter::new();
        let file = highlighter
            .highlight("long.txt", &long, &HighlightOptions::default())
            .await
            .unwrap();
        assert_eq!(file.lines[0], long);

        let opts = HighlightOptions {
            highlight_long_lines: true,
            ..HighlightOptions::default()
        };
        let file = highlighter.highlight("long.txt", &long, &opts).await.unwrap();
        assert!(file.lines[0].starts_with("<span>"));
    }
}

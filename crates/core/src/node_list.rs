//! Node list parsing.
//!
//! The node list is a flat text file with one repository URL per line.
//! Everything after a `#` is a comment; blank lines are skipped. Entries
//! keep their file order and duplicates are retained.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::SyncError;

/// One non-empty line of the node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLine {
    /// 1-based line number in the source file (position for inline lists).
    pub line_no: usize,
    /// The trimmed URL text.
    pub url: String,
}

/// An ordered list of node URLs.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    entries: Vec<NodeLine>,
}

impl NodeList {
    /// Read the node list at `path`. A missing file is fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SyncError::ConfigMissing(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let list = Self::parse(&contents);
        info!(path = %path.display(), count = list.len(), "loaded node list");
        Ok(list)
    }

    /// Parse node list text.
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let url = strip_comment(raw).trim();
                (!url.is_empty()).then(|| NodeLine {
                    line_no: idx + 1,
                    url: url.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Build a list from URLs embedded in the settings file.
    pub fn from_inline<S: AsRef<str>>(urls: &[S]) -> Self {
        let entries: Vec<NodeLine> = urls
            .iter()
            .map(|u| u.as_ref().trim())
            .filter(|u| !u.is_empty())
            .enumerate()
            .map(|(idx, url)| NodeLine {
                line_no: idx + 1,
                url: url.to_string(),
            })
            .collect();
        debug!(count = entries.len(), "built inline node list");
        Self { entries }
    }

    pub fn entries(&self) -> &[NodeLine] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeLine> {
        self.entries.iter()
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "\
# Core
https://github.com/ltdrdata/ComfyUI-Manager.git

   https://github.com/cubiq/ComfyUI_essentials.git   # utilities
#https://github.com/disabled/node.git
\t
https://github.com/Kosinkadink/ComfyUI-VideoHelperSuite
";
        let list = NodeList::parse(text);
        let urls: Vec<&str> = list.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://github.com/ltdrdata/ComfyUI-Manager.git",
                "https://github.com/cubiq/ComfyUI_essentials.git",
                "https://github.com/Kosinkadink/ComfyUI-VideoHelperSuite",
            ]
        );
        let lines: Vec<usize> = list.iter().map(|l| l.line_no).collect();
        assert_eq!(lines, vec![2, 4, 7]);
    }

    #[test]
    fn test_parse_keeps_duplicates_and_order() {
        let list = NodeList::parse("b.git\na.git\nb.git\n");
        assert_eq!(list.len(), 3);
        assert_eq!(list.entries()[0].url, "b.git");
        assert_eq!(list.entries()[2].url, "b.git");
    }

    #[test]
    fn test_parse_handles_crlf() {
        let list = NodeList::parse("https://github.com/a/b.git\r\n\r\nhttps://github.com/c/d.git\r\n");
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[1].url, "https://github.com/c/d.git");
    }

    #[test]
    fn test_load_missing_file() {
        let result = NodeList::load("/nonexistent/nodes.txt");
        assert!(matches!(result, Err(SyncError::ConfigMissing(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        std::fs::write(&path, "https://github.com/a/b.git\n").unwrap();
        let list = NodeList::load(&path).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_inline_list() {
        let list = NodeList::from_inline(&["  https://github.com/a/b.git ", "", "https://github.com/c/d"]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].url, "https://github.com/a/b.git");
        assert_eq!(list.entries()[1].line_no, 2);
    }
}

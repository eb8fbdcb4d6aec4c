//! Repository URL handling.
//!
//! Derives the working-copy directory name from a node's remote URL and
//! normalizes / validates the GitHub URLs accepted by `add-node`.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::errors::EntryError;

/// `<anything>/name.git` or `<host>:name.git`, optional trailing slash.
static GIT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*[/:]([^/:]+)\.git/?$").expect("valid .git url regex"));

/// `http(s)://host/.../name`, optional trailing slash.
static HTTP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/\s]+/(?:\S*/)?([^/\s]+?)/?$").expect("valid http url regex")
});

/// Strict shape accepted when adding a node.
static GITHUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://github\.com/[A-Za-z0-9._-]+/[A-Za-z0-9._-]+\.git$")
        .expect("valid github url regex")
});

/// Expected shape shown in validation errors.
pub const GITHUB_URL_FORMAT: &str = "https://github.com/<owner>/<repo>.git";

/// Directory name of a node's working copy under the nodes directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for RepositoryName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

/// Derive the repository name from a remote URL.
///
/// The name is the text after the last `/` or `:`, without a trailing
/// `.git`. URLs ending in `.git` may use any scheme (including scp-style
/// `git@host:owner/name.git`); URLs without it must be `http(s)://`.
pub fn repository_name(url: &str) -> Result<RepositoryName, EntryError> {
    let url = url.trim();
    let captured = GIT_SUFFIX_RE
        .captures(url)
        .or_else(|| HTTP_RE.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| EntryError::UnrecognizedShape(url.to_string()))?;

    if captured.is_empty() || captured == "." || captured == ".." {
        return Err(EntryError::EmptyName(url.to_string()));
    }

    Ok(RepositoryName(captured.to_string()))
}

/// Append `.git` unless the URL already ends with it.
pub fn normalize_node_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with(".git") {
        url.to_string()
    } else {
        format!("{}.git", url)
    }
}

/// Whether `url` is exactly `https://github.com/<owner>/<repo>.git`.
pub fn is_github_repo_url(url: &str) -> bool {
    GITHUB_RE.is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(url: &str) -> String {
        repository_name(url).unwrap().to_string()
    }

    // -------------------------------------------------------------------
    // repository_name tests
    // -------------------------------------------------------------------

    #[test]
    fn test_https_with_git_suffix() {
        assert_eq!(name("https://github.com/ltdrdata/ComfyUI-Manager.git"), "ComfyUI-Manager");
    }

    #[test]
    fn test_https_without_git_suffix() {
        assert_eq!(name("https://github.com/cubiq/ComfyUI_essentials"), "ComfyUI_essentials");
    }

    #[test]
    fn test_trailing_slash() {
        assert_eq!(name("https://github.com/cubiq/ComfyUI_essentials/"), "ComfyUI_essentials");
        assert_eq!(name("https://github.com/owner/repo.git/"), "repo");
    }

    #[test]
    fn test_scp_style_url() {
        assert_eq!(name("git@github.com:Kosinkadink/ComfyUI-VideoHelperSuite.git"), "ComfyUI-VideoHelperSuite");
        assert_eq!(name("git@github.com:solo.git"), "solo");
    }

    #[test]
    fn test_local_file_url() {
        assert_eq!(name("file:///tmp/origins/alpha.git"), "alpha");
        assert_eq!(name("/srv/mirrors/beta.git"), "beta");
    }

    #[test]
    fn test_name_keeps_inner_dots() {
        assert_eq!(name("https://github.com/owner/was-node-suite.v2.git"), "was-node-suite.v2");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(name("  https://github.com/owner/repo.git \t"), "repo");
    }

    #[test]
    fn test_unrecognized_shapes() {
        for bad in ["not a url", "ComfyUI-Manager", "ftp://host/repo", "https://github.com/", ""] {
            assert!(
                matches!(repository_name(bad), Err(EntryError::UnrecognizedShape(_))),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_reserved_names_rejected() {
        assert!(matches!(
            repository_name("https://example.com/.."),
            Err(EntryError::EmptyName(_))
        ));
    }

    // -------------------------------------------------------------------
    // GitHub normalization tests
    // -------------------------------------------------------------------

    #[test]
    fn test_normalize_appends_git() {
        assert_eq!(
            normalize_node_url("https://github.com/ltdrdata/ComfyUI-Manager"),
            "https://github.com/ltdrdata/ComfyUI-Manager.git"
        );
    }

    #[test]
    fn test_normalize_keeps_existing_suffix() {
        assert_eq!(
            normalize_node_url("https://github.com/cubiq/ComfyUI_essentials.git"),
            "https://github.com/cubiq/ComfyUI_essentials.git"
        );
    }

    #[test]
    fn test_github_shape() {
        assert!(is_github_repo_url("https://github.com/owner/repo.git"));
        assert!(is_github_repo_url("https://github.com/Some_Org/Comfy.UI-x.git"));

        assert!(!is_github_repo_url("http://github.com/owner/repo.git"));
        assert!(!is_github_repo_url("https://gitlab.com/owner/repo.git"));
        assert!(!is_github_repo_url("https://github.com/owner.git"));
        assert!(!is_github_repo_url("https://github.com/owner/repo/tree/main.git"));
        assert!(!is_github_repo_url("https://github.com/owner/repo"));
    }
}

//! Asynchronous git CLI client.
//!
//! Clones and pulls go through the `git` binary so that shallow clones,
//! submodule recursion and the user's credential helpers behave exactly as
//! on the command line. Working copies are inspected with `git2`.

use std::path::Path;
use std::process::Stdio;

use git2::Repository;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::GitConfig;
use crate::errors::GitError;

/// Stderr fragments git prints when `pull --ff-only` meets diverged history.
const DIVERGENCE_MARKERS: &[&str] = &[
    "not possible to fast-forward",
    "diverg",
    "non-fast-forward",
    "refusing to merge unrelated histories",
];

/// Client for the git operations the synchronizer needs.
#[derive(Debug, Clone)]
pub struct GitClient {
    binary: String,
    depth: u32,
}

impl GitClient {
    pub fn new(config: &GitConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            depth: config.depth,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Shallow, tag-less, submodule-inclusive clone of `url` into `dest`.
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub async fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let depth = format!("--depth={}", self.depth);
        let dest_str = dest.to_string_lossy().to_string();
        self.run_git(&[
            "clone",
            &depth,
            "--no-tags",
            "--recurse-submodules",
            "--shallow-submodules",
            url,
            &dest_str,
        ])
        .await?;
        info!("clone completed");
        Ok(())
    }

    /// Fast-forward-only pull inside `dir`.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn pull_ff_only(&self, dir: &Path) -> Result<(), GitError> {
        let dir_str = dir.to_string_lossy().to_string();
        self.run_git(&["-C", &dir_str, "pull", "--ff-only"]).await?;
        debug!("pull completed");
        Ok(())
    }

    /// SHA of HEAD in the working copy at `dir`, if it has one.
    pub fn head_sha(&self, dir: &Path) -> Result<Option<String>, GitError> {
        let repo = Repository::open(dir)?;
        let sha = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?.id().to_string()),
            Err(_) => None,
        };
        Ok(sha)
    }

    /// `git --version` output, used by preflight checks.
    pub async fn version(&self) -> Result<String, GitError> {
        let out = self.run_git(&["--version"]).await?;
        Ok(out.trim().to_string())
    }

    async fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("{} {}", self.binary, args.join(" ")), "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound(self.binary.clone())
            } else {
                GitError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "git command failed");
            return Err(GitError::CommandFailed { exit_code, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Whether a failed pull's stderr describes diverged history rather than
/// a transport or repository problem.
pub fn is_divergence(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    DIVERGENCE_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_detection() {
        assert!(is_divergence(
            "hint: Diverging branches can't be fast-forwarded, you need to either:\nfatal: Not possible to fast-forward, aborting."
        ));
        assert!(is_divergence("fatal: Not possible to fast-forward, aborting."));
        assert!(is_divergence("fatal: refusing to merge unrelated histories"));

        assert!(!is_divergence("fatal: unable to access 'https://github.com/x/y.git/': Could not resolve host"));
        assert!(!is_divergence("fatal: not a git repository (or any of the parent directories): .git"));
    }

    #[test]
    fn test_head_sha_of_fresh_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let client = GitClient::new(&GitConfig::default());
        assert_eq!(client.head_sha(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_head_sha_of_non_repo_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::new(&GitConfig::default());
        assert!(matches!(client.head_sha(dir.path()), Err(GitError::Git2Error(_))));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let client = GitClient::new(&GitConfig {
            binary: "definitely-not-a-git-binary".into(),
            depth: 1,
        });
        assert!(matches!(client.version().await, Err(GitError::BinaryNotFound(_))));
    }
}

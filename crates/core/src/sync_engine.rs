//! Repository synchronizer for custom nodes.
//!
//! The [`RepoSynchronizer`] walks a [`NodeList`] in order and, for each
//! entry, either shallow-clones the repository into the nodes directory or
//! fast-forward-pulls the existing working copy.
//!
//! Individual entries never abort the batch: malformed lines, clone
//! failures and diverged working copies are recorded in the [`SyncReport`]
//! and the loop moves on. Only a missing node list or an unusable nodes
//! directory is fatal.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ProvisionConfig;
use crate::errors::{GitError, SyncError};
use crate::git::client::{is_divergence, GitClient};
use crate::git::remote_url::{repository_name, RepositoryName};
use crate::node_list::{NodeLine, NodeList};
use crate::signals::{is_shutdown_requested, ShutdownFlag};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What the synchronizer did for one node entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Fresh shallow clone.
    Cloned,
    /// Existing working copy fast-forwarded.
    Updated { from: Option<String>, to: Option<String> },
    /// Existing working copy already at the remote head.
    UpToDate,
    /// Local history diverged; the working copy was left untouched.
    Diverged { detail: String },
    /// Clone or pull failed.
    Failed { reason: String },
    /// The line is not a recognizable repository URL.
    Invalid { reason: String },
}

impl SyncOutcome {
    /// Whether the entry counts towards the success tally.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Cloned | Self::Updated { .. } | Self::UpToDate | Self::Diverged { .. }
        )
    }

    /// Whether a pull was attempted.
    pub fn is_pull(&self) -> bool {
        matches!(self, Self::Updated { .. } | Self::UpToDate | Self::Diverged { .. })
    }
}

/// The action chosen for an entry before git runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Clone,
    Pull,
}

/// Result for a single node entry.
#[derive(Debug, Clone, Serialize)]
pub struct RepoResult {
    pub line_no: usize,
    pub url: String,
    pub name: Option<RepositoryName>,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Summary of one synchronizer run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub nodes_dir: PathBuf,
    pub results: Vec<RepoResult>,
    /// Set when an interrupt stopped the batch early.
    pub interrupted: bool,
    /// Entries not processed because of the interrupt.
    pub skipped: usize,
}

impl SyncReport {
    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.successful()
    }

    pub fn cloned(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Cloned))
    }

    pub fn pulled(&self) -> usize {
        self.count(SyncOutcome::is_pull)
    }

    pub fn diverged(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Diverged { .. }))
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Progress hooks for callers that render per-entry status.
pub trait SyncObserver {
    fn on_start(&mut self, _name: &RepositoryName, _action: SyncAction) {}
    fn on_result(&mut self, _result: &RepoResult) {}
}

impl SyncObserver for () {}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

pub struct RepoSynchronizer {
    nodes_dir: PathBuf,
    git: GitClient,
}

impl RepoSynchronizer {
    pub fn new(config: &ProvisionConfig) -> Self {
        Self::with_nodes_dir(&config.paths.nodes_dir, GitClient::new(&config.git))
    }

    pub fn with_nodes_dir(nodes_dir: &Path, git: GitClient) -> Self {
        Self {
            nodes_dir: nodes_dir.to_path_buf(),
            git,
        }
    }

    pub fn nodes_dir(&self) -> &Path {
        &self.nodes_dir
    }

    /// Sync every entry without progress reporting.
    pub async fn run(
        &self,
        list: &NodeList,
        shutdown: Option<&ShutdownFlag>,
    ) -> Result<SyncReport, SyncError> {
        self.run_with(list, shutdown, &mut ()).await
    }

    /// Sync every entry in order, reporting progress to `observer`.
    pub async fn run_with(
        &self,
        list: &NodeList,
        shutdown: Option<&ShutdownFlag>,
        observer: &mut dyn SyncObserver,
    ) -> Result<SyncReport, SyncError> {
        std::fs::create_dir_all(&self.nodes_dir)?;
        info!(
            nodes_dir = %self.nodes_dir.display(),
            count = list.len(),
            "download_nodes_start"
        );

        let mut report = SyncReport {
            nodes_dir: self.nodes_dir.clone(),
            results: Vec::with_capacity(list.len()),
            interrupted: false,
            skipped: 0,
        };

        for (idx, line) in list.iter().enumerate() {
            if shutdown.is_some_and(is_shutdown_requested) {
                report.interrupted = true;
                report.skipped = list.len() - idx;
                warn!(skipped = report.skipped, "interrupted, remaining entries skipped");
                break;
            }
            let result = self.sync_line(line, observer).await;
            observer.on_result(&result);
            report.results.push(result);
        }

        info!(
            successful = report.successful(),
            failed = report.failed(),
            nodes_dir = %self.nodes_dir.display(),
            "download_nodes_complete"
        );
        Ok(report)
    }

    async fn sync_line(&self, line: &NodeLine, observer: &mut dyn SyncObserver) -> RepoResult {
        let name = match repository_name(&line.url) {
            Ok(name) => name,
            Err(e) => {
                error!(line = line.line_no, url = %line.url, "invalid_url");
                return RepoResult {
                    line_no: line.line_no,
                    url: line.url.clone(),
                    name: None,
                    outcome: SyncOutcome::Invalid { reason: e.to_string() },
                };
            }
        };

        let outcome = self.sync_repo(&line.url, &name, observer).await;
        RepoResult {
            line_no: line.line_no,
            url: line.url.clone(),
            name: Some(name),
            outcome,
        }
    }

    /// Clone or pull one repository into `<nodes_dir>/<name>`.
    pub async fn sync_repo(
        &self,
        url: &str,
        name: &RepositoryName,
        observer: &mut dyn SyncObserver,
    ) -> SyncOutcome {
        let target = self.nodes_dir.join(name);

        if target.exists() {
            observer.on_start(name, SyncAction::Pull);
            info!(repo = %name, "updating_node");
            self.pull(&target, name).await
        } else {
            observer.on_start(name, SyncAction::Clone);
            info!(repo = %name, "cloning_node");
            match self.git.clone_shallow(url, &target).await {
                Ok(()) => SyncOutcome::Cloned,
                Err(e) => {
                    error!(repo = %name, error = %e, "clone_failed");
                    SyncOutcome::Failed { reason: failure_reason(&e) }
                }
            }
        }
    }

    async fn pull(&self, target: &Path, name: &RepositoryName) -> SyncOutcome {
        let before = self.git.head_sha(target).ok().flatten();

        match self.git.pull_ff_only(target).await {
            Ok(()) => {
                let after = self.git.head_sha(target).ok().flatten();
                if before == after {
                    SyncOutcome::UpToDate
                } else {
                    info!(repo = %name, from = ?before, to = ?after, "node_updated");
                    SyncOutcome::Updated { from: before, to: after }
                }
            }
            Err(GitError::CommandFailed { stderr, .. }) if is_divergence(&stderr) => {
                warn!(repo = %name, "update_skipped: history diverged, left untouched");
                SyncOutcome::Diverged { detail: first_line(&stderr) }
            }
            Err(e) => {
                error!(repo = %name, error = %e, "update_failed");
                SyncOutcome::Failed { reason: failure_reason(&e) }
            }
        }
    }
}

fn failure_reason(err: &GitError) -> String {
    match err {
        GitError::CommandFailed { stderr, exit_code } if !stderr.is_empty() => {
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or(stderr.as_str());
            format!("{} (exit {})", last.trim(), exit_code)
        }
        other => other.to_string(),
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| l.starts_with("fatal:"))
        .or_else(|| text.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_default()
        .to_string()
}

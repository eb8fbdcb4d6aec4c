//! Integration tests for the repository synchronizer.
//!
//! These tests exercise `RepoSynchronizer` with:
//! - Local origin repositories built via `git2::Repository`
//! - The real `git` CLI cloning over `file://` URLs
//!
//! No network I/O. If `git` is not installed, tests skip gracefully.

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{Repository, Signature};
use tempfile::TempDir;

use comfyprov_core::config::GitConfig;
use comfyprov_core::git::GitClient;
use comfyprov_core::node_list::NodeList;
use comfyprov_core::sync_engine::{RepoSynchronizer, SyncOutcome};

// ===========================================================================
// Helpers
// ===========================================================================

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Write `name` with `content` and commit it on HEAD.
fn commit_file(repo_path: &Path, name: &str, content: &str, message: &str) -> String {
    let repo = Repository::open(repo_path).unwrap();
    std::fs::write(repo_path.join(name), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
        .to_string()
}

/// Create an origin repository `<dir>/origins/<name>.git` with one commit.
/// Returns `(path, file:// url)`.
fn create_origin(dir: &Path, name: &str) -> (PathBuf, String) {
    let path = dir.join("origins").join(format!("{}.git", name));
    std::fs::create_dir_all(&path).unwrap();
    Repository::init(&path).unwrap();
    commit_file(&path, "__init__.py", "NODE_CLASS_MAPPINGS = {}\n", "initial");
    let url = format!("file://{}", path.display());
    (path, url)
}

fn head_sha(path: &Path) -> String {
    let repo = Repository::open(path).unwrap();
    let commit = repo.head().unwrap().peel_to_commit().unwrap();
    commit.id().to_string()
}

fn synchronizer(nodes_dir: &Path) -> RepoSynchronizer {
    RepoSynchronizer::with_nodes_dir(nodes_dir, GitClient::new(&GitConfig::default()))
}

fn write_list(dir: &TempDir, urls: &[&str]) -> PathBuf {
    let path = dir.path().join("nodes.txt");
    let mut text = String::from("# custom nodes\n");
    for url in urls {
        text.push_str(url);
        text.push('\n');
    }
    std::fs::write(&path, text).unwrap();
    path
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_second_run_pulls_instead_of_cloning() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (_, a) = create_origin(tmp.path(), "alpha");
    let (_, b) = create_origin(tmp.path(), "beta");
    let (_, c) = create_origin(tmp.path(), "gamma");
    let list_path = write_list(&tmp, &[&a, &b, &c]);
    let nodes_dir = tmp.path().join("custom_nodes");
    let sync = synchronizer(&nodes_dir);
    let list = NodeList::load(&list_path).unwrap();

    let first = sync.run(&list, None).await.unwrap();
    assert_eq!(first.cloned(), 3);
    assert_eq!(first.failed(), 0);
    for name in ["alpha", "beta", "gamma"] {
        assert!(nodes_dir.join(name).join("__init__.py").is_file(), "{name} missing");
    }

    let second = sync.run(&list, None).await.unwrap();
    assert_eq!(second.cloned(), 0);
    assert_eq!(second.pulled(), 3);
    assert!(second
        .results
        .iter()
        .all(|r| r.outcome == SyncOutcome::UpToDate));
    assert_eq!(std::fs::read_dir(&nodes_dir).unwrap().count(), 3);
}

#[tokio::test]
async fn test_pull_fast_forwards_to_new_commit() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (origin, url) = create_origin(tmp.path(), "delta");
    let nodes_dir = tmp.path().join("custom_nodes");
    let sync = synchronizer(&nodes_dir);
    let list = NodeList::parse(&url);

    sync.run(&list, None).await.unwrap();
    let old = head_sha(&nodes_dir.join("delta"));
    let new = commit_file(&origin, "nodes.py", "class Node: pass\n", "add node");

    let report = sync.run(&list, None).await.unwrap();

    assert_eq!(
        report.results[0].outcome,
        SyncOutcome::Updated { from: Some(old), to: Some(new.clone()) }
    );
    assert_eq!(head_sha(&nodes_dir.join("delta")), new);
    assert!(nodes_dir.join("delta").join("nodes.py").is_file());
}

#[tokio::test]
async fn test_diverged_working_copy_is_reported_not_failed() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (origin, url) = create_origin(tmp.path(), "epsilon");
    let nodes_dir = tmp.path().join("custom_nodes");
    let sync = synchronizer(&nodes_dir);
    let list = NodeList::parse(&url);

    sync.run(&list, None).await.unwrap();
    let local = commit_file(&nodes_dir.join("epsilon"), "local.txt", "local edit\n", "local");
    commit_file(&origin, "remote.txt", "remote edit\n", "remote");

    let report = sync.run(&list, None).await.unwrap();

    assert!(
        matches!(report.results[0].outcome, SyncOutcome::Diverged { .. }),
        "got {:?}",
        report.results[0].outcome
    );
    assert_eq!(report.failed(), 0);
    assert_eq!(head_sha(&nodes_dir.join("epsilon")), local);
}

#[tokio::test]
async fn test_bad_entries_do_not_stop_later_clones() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (_, good) = create_origin(tmp.path(), "zeta");
    let missing = format!("file://{}/origins/missing.git", tmp.path().display());
    let list = NodeList::parse(&format!("just-some-words\n{}\n{}\n", missing, good));
    let nodes_dir = tmp.path().join("custom_nodes");

    let report = synchronizer(&nodes_dir).run(&list, None).await.unwrap();

    assert!(matches!(report.results[0].outcome, SyncOutcome::Invalid { .. }));
    assert!(matches!(report.results[1].outcome, SyncOutcome::Failed { .. }));
    assert_eq!(report.results[2].outcome, SyncOutcome::Cloned);
    assert_eq!(report.successful(), 1);
    assert_eq!(report.failed(), 2);
    assert!(!nodes_dir.join("missing").exists());
}

#[tokio::test]
async fn test_duplicate_entries_become_pulls() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (_, url) = create_origin(tmp.path(), "eta");
    let list = NodeList::parse(&format!("{}\n{}\n", url, url));
    let nodes_dir = tmp.path().join("custom_nodes");

    let report = synchronizer(&nodes_dir).run(&list, None).await.unwrap();

    assert_eq!(report.results[0].outcome, SyncOutcome::Cloned);
    assert_eq!(report.results[1].outcome, SyncOutcome::UpToDate);
}

#[tokio::test]
async fn test_shallow_clone_depth() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (origin, url) = create_origin(tmp.path(), "theta");
    commit_file(&origin, "second.txt", "2\n", "second");
    commit_file(&origin, "third.txt", "3\n", "third");
    let nodes_dir = tmp.path().join("custom_nodes");

    synchronizer(&nodes_dir).run(&NodeList::parse(&url), None).await.unwrap();

    let repo = Repository::open(nodes_dir.join("theta")).unwrap();
    assert!(repo.is_shallow());
    let tags = repo.tag_names(None).unwrap();
    assert_eq!(tags.len(), 0);
}

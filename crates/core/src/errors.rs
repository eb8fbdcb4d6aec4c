//! Error types for the comfyprov core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

// ---------------------------------------------------------------------------
// Node entry errors
// ---------------------------------------------------------------------------

/// A node config line that does not describe a repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    /// The line matches neither `.../name.git` nor `http.../name`.
    #[error("unrecognized repository URL shape: '{0}'")]
    UnrecognizedShape(String),

    /// The URL matched a known shape but the derived name is unusable.
    #[error("repository URL '{0}' yields an empty or reserved directory name")]
    EmptyName(String),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from invoking the `git` CLI or inspecting working copies.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Fatal errors from the repository synchronizer.
///
/// Per-repository failures never surface here; they are recorded in the
/// sync report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The node list file does not exist.
    #[error("node config file not found: {0}")]
    ConfigMissing(String),

    /// Could not read the node list or create the target directory.
    #[error("sync I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Config editor errors
// ---------------------------------------------------------------------------

/// Usage and validation errors from the add-node / add-model helpers.
#[derive(Debug, Error)]
pub enum EditorError {
    /// A required argument was not supplied.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// The model folder is not in the allow-list.
    #[error("invalid folder '{folder}' (valid folders: {allowed})")]
    InvalidFolder { folder: String, allowed: String },

    /// The node URL is not a GitHub repository URL.
    #[error("invalid repository URL '{url}' (expected {expected})")]
    InvalidNodeUrl { url: String, expected: String },

    /// No usable filename could be derived from the model URL.
    #[error("could not derive a filename from '{0}'; please provide one explicitly")]
    FilenameUnresolved(String),

    /// Reading or appending to the config file failed.
    #[error("config editor I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Downloader errors
// ---------------------------------------------------------------------------

/// Errors from the external model downloader.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The model list file does not exist.
    #[error("model config file not found: {0}")]
    ConfigMissing(String),

    /// The downloader binary was not found on `$PATH`.
    #[error("downloader binary not found: {0}")]
    BinaryNotFound(String),

    /// The downloader exited with a non-zero status.
    #[error("download failed (exit {exit_code})")]
    Failed { exit_code: i32 },

    /// Generic I/O wrapper.
    #[error("download I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// GPU / PyTorch installer errors
// ---------------------------------------------------------------------------

/// Errors from installing PyTorch for the detected backend.
///
/// Detection itself never fails: a missing or failing query tool simply
/// means that accelerator was not found.
#[derive(Debug, Error)]
pub enum GpuError {
    /// The package installer was not found on `$PATH`.
    #[error("installer binary not found: {0}")]
    InstallerNotFound(String),

    /// The installer exited with a non-zero status.
    #[error("PyTorch install failed (exit {exit_code})")]
    InstallFailed { exit_code: i32 },

    /// Generic I/O wrapper.
    #[error("installer I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from settings loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the settings file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

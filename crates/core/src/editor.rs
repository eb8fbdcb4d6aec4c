//! Append-only editing of the node and model lists.
//!
//! Both helpers validate first and only then touch the file. Existing lines
//! are never rewritten or reordered; a successful add appends to the end.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::errors::EditorError;
use crate::git::remote_url::{
    is_github_repo_url, normalize_node_url, repository_name, RepositoryName, GITHUB_URL_FORMAT,
};
use crate::models::{resolve_filename, ModelEntry, ModelFolder};

/// What an add operation did to the list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was appended.
    Added,
    /// The entry was already listed; the file is unchanged.
    AlreadyPresent,
    /// The user declined to add a duplicate; the file is unchanged.
    Cancelled,
}

/// Result of [`add_node`].
#[derive(Debug, Clone)]
pub struct NodeAddition {
    /// Normalized `.git` URL.
    pub url: String,
    pub name: RepositoryName,
    pub outcome: AddOutcome,
}

/// Result of [`add_model`].
#[derive(Debug, Clone)]
pub struct ModelAddition {
    pub url: String,
    /// `folder/filename`.
    pub out: String,
    pub outcome: AddOutcome,
}

/// Input for [`add_model`].
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub url: &'a str,
    pub folder: &'a str,
    pub filename: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Append a GitHub repository URL to the node list at `path`.
pub fn add_node(path: &Path, url: &str) -> Result<NodeAddition, EditorError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(EditorError::MissingArgument("url".into()));
    }

    let url = normalize_node_url(url);
    if !is_github_repo_url(&url) {
        return Err(EditorError::InvalidNodeUrl {
            url,
            expected: GITHUB_URL_FORMAT.into(),
        });
    }
    let name = repository_name(&url).map_err(|_| EditorError::InvalidNodeUrl {
        url: url.clone(),
        expected: GITHUB_URL_FORMAT.into(),
    })?;

    let existing = read_existing(path)?;
    if existing.contains(&url) {
        warn!(repo = %name, "node_exists");
        return Ok(NodeAddition {
            url,
            name,
            outcome: AddOutcome::AlreadyPresent,
        });
    }

    let separator = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    append(path, &format!("{}{}\n", separator, url))?;
    info!(config_file = %path.display(), repo = %name, url = %url, "node_added");

    Ok(NodeAddition {
        url,
        name,
        outcome: AddOutcome::Added,
    })
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Append a model download to the model list at `path`.
///
/// `confirm` is asked whether to continue when the output path is already
/// listed; answering `false` leaves the file untouched.
pub fn add_model<F>(
    path: &Path,
    request: ModelRequest<'_>,
    confirm: F,
) -> Result<ModelAddition, EditorError>
where
    F: FnOnce(&str) -> std::io::Result<bool>,
{
    let url = request.url.trim();
    if url.is_empty() {
        return Err(EditorError::MissingArgument("url".into()));
    }
    if request.folder.trim().is_empty() {
        return Err(EditorError::MissingArgument("folder".into()));
    }

    let folder = ModelFolder::parse(request.folder)?;
    let filename = resolve_filename(url, request.filename)?;
    let out = format!("{}/{}", folder, filename);

    let existing = read_existing(path)?;
    if existing.contains(&ModelEntry::out_option(&out)) {
        warn!(out = %out, "model_exists");
        if !confirm(&out)? {
            info!("cancelled");
            return Ok(ModelAddition {
                url: url.to_string(),
                out,
                outcome: AddOutcome::Cancelled,
            });
        }
    }

    append(path, &ModelEntry::render_block(url, &out))?;
    info!(config_file = %path.display(), folder = %folder, name = %filename, "model_added");

    Ok(ModelAddition {
        url: url.to_string(),
        out,
        outcome: AddOutcome::Added,
    })
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_existing(path: &Path) -> Result<String, EditorError> {
    if path.exists() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}

fn append(path: &Path, text: &str) -> Result<(), EditorError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

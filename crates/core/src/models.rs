//! Model list entries.
//!
//! The model list is consumed directly by `aria2c --input-file`: each entry
//! is a URL line followed by indented option lines, of which `out=` names
//! the destination `folder/filename` relative to the models directory.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::EditorError;

/// Folders under the models directory that ComfyUI loads from.
pub const MODEL_FOLDERS: &[&str] = &[
    "checkpoints",
    "clip",
    "clip_vision",
    "configs",
    "controlnet",
    "controlnet/flux",
    "diffusers",
    "diffusion_models",
    "embeddings",
    "gligen",
    "hypernetworks",
    "loras",
    "photomaker",
    "style_models",
    "unet",
    "upscale_models",
    "vae",
    "vae_approx",
    "sam2",
    "ultralytics/bbox",
    "ultralytics/segm",
    "mmdets",
    "onnx",
    "liveportrait",
];

/// Last path segments that name an endpoint rather than a file.
const NON_FILENAMES: &[&str] = &["download", "resolve"];

// ---------------------------------------------------------------------------
// Folder
// ---------------------------------------------------------------------------

/// A member of [`MODEL_FOLDERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFolder(&'static str);

impl ModelFolder {
    pub fn parse(folder: &str) -> Result<Self, EditorError> {
        let folder = folder.trim().trim_end_matches('/');
        MODEL_FOLDERS
            .iter()
            .copied()
            .find(|f| *f == folder)
            .map(ModelFolder)
            .ok_or_else(|| EditorError::InvalidFolder {
                folder: folder.to_string(),
                allowed: MODEL_FOLDERS.join(", "),
            })
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ModelFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ---------------------------------------------------------------------------
// Filename resolution
// ---------------------------------------------------------------------------

/// Pick the output filename for a model download.
///
/// An explicit non-empty name wins. Otherwise the last segment of the URL
/// path is used, with the query string and fragment dropped and
/// percent-escapes decoded. Segments that are empty, purely numeric, or an
/// endpoint word such as `download` cannot be used. Neither source may be
/// `.`, `..` or contain control characters or backslashes, since the name
/// lands on its own line in the aria2 input file.
pub fn resolve_filename(url: &str, explicit: Option<&str>) -> Result<String, EditorError> {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        if !is_safe_filename(name) {
            return Err(EditorError::FilenameUnresolved(url.to_string()));
        }
        return Ok(name.to_string());
    }

    let path = url_path(url.trim());
    let decoded = urlencoding::decode(path)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| path.to_string());
    let segment = decoded
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim();

    let unusable = segment.is_empty()
        || !is_safe_filename(segment)
        || segment.chars().all(|c| c.is_ascii_digit())
        || NON_FILENAMES.contains(&segment);
    if unusable {
        return Err(EditorError::FilenameUnresolved(url.to_string()));
    }

    debug!(url, filename = segment, "derived filename from url");
    Ok(segment.to_string())
}

fn is_safe_filename(name: &str) -> bool {
    name != "." && name != ".." && !name.chars().any(|c| c.is_control() || c == '\\')
}

/// Path component of `url`: no scheme, authority, query or fragment.
fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let without_query = &url[..end];
    match without_query.find("://") {
        Some(pos) => {
            let rest = &without_query[pos + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        None => without_query,
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One download: a source URL and its output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub url: String,
    /// `folder/filename`, relative to the models directory.
    pub out: Option<String>,
    /// Line number of the URL line.
    pub line_no: usize,
}

impl ModelEntry {
    /// `out=` line as it appears in the list.
    pub fn out_option(path: &str) -> String {
        format!("out={}", path)
    }

    /// The block appended to the list: a separating blank line, the URL
    /// and the indented `out=` line.
    pub fn render_block(url: &str, out: &str) -> String {
        format!("\n{}\n  {}\n", url, Self::out_option(out))
    }
}

/// Parsed model list.
#[derive(Debug, Clone, Default)]
pub struct ModelList {
    entries: Vec<ModelEntry>,
}

impl ModelList {
    /// Read the model list at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let list = Self::parse(&contents);
        info!(path = %path.display(), count = list.len(), "loaded model list");
        Ok(list)
    }

    /// Parse aria2 input-file text. Options other than `out=` are ignored.
    pub fn parse(contents: &str) -> Self {
        let mut entries: Vec<ModelEntry> = Vec::new();

        for (idx, raw) in contents.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let is_option = raw.starts_with(' ') || raw.starts_with('\t');
            if !is_option {
                entries.push(ModelEntry {
                    url: trimmed.to_string(),
                    out: None,
                    line_no: idx + 1,
                });
                continue;
            }

            if let (Some(entry), Some(out)) = (entries.last_mut(), trimmed.strip_prefix("out=")) {
                entry.out = Some(out.trim().to_string());
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

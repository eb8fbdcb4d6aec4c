//! TOML-based settings for comfyprov.
//!
//! Every operation receives a [`ProvisionConfig`] explicitly. Settings come
//! from built-in defaults, optionally overlaid by a TOML file, then by the
//! `CONFIG_FILE` environment variable for the add-* helpers, and finally by
//! positional command-line arguments (applied by the CLI).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Environment variable that overrides the list file used by add-node / add-model.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// Settings file picked up from the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "comfyprov.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level settings loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Directory and list-file locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// External downloader settings.
    #[serde(default)]
    pub download: DownloadConfig,

    /// Git invocation settings.
    #[serde(default)]
    pub git: GitConfig,

    /// Inline node list.
    #[serde(default)]
    pub nodes: NodesConfig,

    /// GPU query tools and the PyTorch installer.
    #[serde(default)]
    pub gpu: GpuConfig,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where custom node repositories are cloned.
    #[serde(default = "default_nodes_dir")]
    pub nodes_dir: PathBuf,

    /// Node list: one repository URL per line.
    #[serde(default = "default_nodes_config")]
    pub nodes_config: PathBuf,

    /// Root directory handed to the downloader.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Model list: URL lines followed by indented `out=` lines.
    #[serde(default = "default_models_config")]
    pub models_config: PathBuf,
}

fn default_nodes_dir() -> PathBuf {
    PathBuf::from("data/custom_nodes")
}
fn default_nodes_config() -> PathBuf {
    PathBuf::from("setup/nodes.txt")
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("data/models")
}
fn default_models_config() -> PathBuf {
    PathBuf::from("setup/models.txt")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            nodes_dir: default_nodes_dir(),
            nodes_config: default_nodes_config(),
            models_dir: default_models_dir(),
            models_config: default_models_config(),
        }
    }
}

// ---------------------------------------------------------------------------
// Downloader
// ---------------------------------------------------------------------------

/// Settings for the multi-connection downloader (`aria2c`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Downloader executable.
    #[serde(default = "default_download_binary")]
    pub binary: String,

    /// Connections per server (`-x`).
    #[serde(default = "default_connections")]
    pub connections: u32,

    /// Pass `--disable-ipv6`.
    #[serde(default = "default_true")]
    pub disable_ipv6: bool,

    /// Pass `--continue=true` so partial files are resumed.
    #[serde(default = "default_true")]
    pub resume: bool,
}

fn default_download_binary() -> String {
    "aria2c".into()
}
fn default_connections() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            binary: default_download_binary(),
            connections: default_connections(),
            disable_ipv6: true,
            resume: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Git executable.
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// History depth for fresh clones.
    #[serde(default = "default_depth")]
    pub depth: u32,
}

fn default_git_binary() -> String {
    "git".into()
}
fn default_depth() -> u32 {
    1
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            depth: default_depth(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inline node list
// ---------------------------------------------------------------------------

/// Node repositories embedded directly in the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodesConfig {
    #[serde(default)]
    pub repositories: Vec<String>,
}

// ---------------------------------------------------------------------------
// GPU detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuConfig {
    /// NVIDIA query tool.
    #[serde(default = "default_nvidia_smi")]
    pub nvidia_smi: String,

    /// AMD ROCm query tool.
    #[serde(default = "default_rocm_smi")]
    pub rocm_smi: String,

    /// Package installer invoked as `<installer> pip install ...`.
    #[serde(default = "default_installer")]
    pub installer: String,
}

fn default_nvidia_smi() -> String {
    "nvidia-smi".into()
}
fn default_rocm_smi() -> String {
    "rocm-smi".into()
}
fn default_installer() -> String {
    "uv".into()
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: default_nvidia_smi(),
            rocm_smi: default_rocm_smi(),
            installer: default_installer(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

/// Which list file a `CONFIG_FILE` override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFile {
    Nodes,
    Models,
}

impl ProvisionConfig {
    /// Load a [`ProvisionConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading settings");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: ProvisionConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("settings parsed successfully");
        Ok(config)
    }

    /// Load the explicit settings file if given, otherwise `comfyprov.toml`
    /// from the working directory if present, otherwise the defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_SETTINGS_FILE);
                if fallback.exists() {
                    Self::load_from_file(fallback)?
                } else {
                    debug!("no settings file, using defaults");
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply the `CONFIG_FILE` environment override to the given list file.
    pub fn apply_env(&mut self, target: ListFile) {
        let value = resolve_optional_env(CONFIG_FILE_ENV);
        self.apply_config_file_override(target, value);
    }

    /// Point the given list file at `value` when it is present.
    pub fn apply_config_file_override(&mut self, target: ListFile, value: Option<String>) {
        let Some(value) = value else {
            return;
        };
        let path = PathBuf::from(value);
        match target {
            ListFile::Nodes => self.paths.nodes_config = path,
            ListFile::Models => self.paths.models_config = path,
        }
    }

    /// Validate that values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git.depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "git.depth".into(),
                detail: "clone depth must be > 0".into(),
            });
        }
        if self.download.connections == 0 || self.download.connections > 16 {
            return Err(ConfigError::InvalidValue {
                field: "download.connections".into(),
                detail: "connections must be between 1 and 16".into(),
            });
        }
        if self.git.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.binary".into(),
                detail: "git binary must not be empty".into(),
            });
        }
        if self.download.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "download.binary".into(),
                detail: "downloader binary must not be empty".into(),
            });
        }
        if self.gpu.installer.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "gpu.installer".into(),
                detail: "installer must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Read an environment variable, treating an empty value as unset.
fn resolve_optional_env(env_name: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => {
            debug!(env_name, value = %val, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(env_name, "env var is set but empty");
            None
        }
        Err(_) => None,
    }
}

//! comfyprov command-line tool.
//!
//! Provides subcommands for syncing ComfyUI custom node repositories,
//! downloading model files, appending entries to the node and model lists,
//! detecting the GPU for PyTorch, and checking that the external tools are
//! in place.

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use comfyprov_core::config::{ListFile, ProvisionConfig};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Provision ComfyUI custom nodes and model files.
#[derive(Parser, Debug)]
#[command(
    name = "comfyprov",
    version,
    about = "Provision ComfyUI custom nodes and model files"
)]
struct Cli {
    /// Path to a TOML settings file (default: ./comfyprov.toml if present).
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Show debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone or update every repository in the node list.
    DownloadNodes {
        /// Directory that receives the repositories.
        dir: Option<PathBuf>,

        /// Node list file.
        config: Option<PathBuf>,

        /// Use the `[nodes] repositories` list from the settings file.
        #[arg(long, conflicts_with = "config")]
        inline: bool,

        /// Print the report as JSON instead of status lines.
        #[arg(long)]
        json: bool,

        /// Exit with status 1 when any repository failed.
        #[arg(long)]
        strict: bool,
    },

    /// Download every model in the model list with aria2c.
    DownloadModels {
        /// Models root directory.
        dir: Option<PathBuf>,

        /// Model list file.
        config: Option<PathBuf>,
    },

    /// Append a GitHub repository to the node list.
    AddNode {
        /// Repository URL; prompts when omitted.
        url: Option<String>,
    },

    /// Append a model download to the model list.
    AddModel {
        /// Direct download URL; starts the interactive wizard when omitted.
        url: Option<String>,

        /// Target folder under the models directory (e.g. checkpoints, loras).
        folder: Option<String>,

        /// Output filename; derived from the URL when omitted.
        filename: Option<String>,

        /// Add duplicates without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the node list with derived repository names.
    ListNodes,

    /// Show the model list with output paths.
    ListModels,

    /// Check external tools and list files.
    Doctor,

    /// Detect the GPU and recommend (or install) a matching PyTorch build.
    DetectGpu {
        /// Run the install command instead of printing it.
        #[arg(long)]
        install: bool,

        /// Print only the backend name (cpu, cuda, mps or rocm).
        #[arg(long, conflicts_with = "install")]
        output_backend: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", commands::style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_settings(cli.settings.as_deref())?;
    tracing::debug!(
        nodes_dir = %config.paths.nodes_dir.display(),
        models_dir = %config.paths.models_dir.display(),
        "settings loaded"
    );

    match cli.command {
        Commands::DownloadNodes {
            dir,
            config: list,
            inline,
            json,
            strict,
        } => {
            override_path(&mut config.paths.nodes_dir, dir);
            override_path(&mut config.paths.nodes_config, list);
            config.paths.nodes_dir = absolute(&config.paths.nodes_dir)?;
            let opts = commands::nodes::SyncOptions { inline, json, strict };
            commands::nodes::run_download(&config, opts).await
        }
        Commands::DownloadModels { dir, config: list } => {
            override_path(&mut config.paths.models_dir, dir);
            override_path(&mut config.paths.models_config, list);
            config.paths.models_dir = absolute(&config.paths.models_dir)?;
            commands::models::run_download(&config).await
        }
        Commands::AddNode { url } => {
            config.apply_env(ListFile::Nodes);
            commands::nodes::run_add(&config, url)
        }
        Commands::AddModel {
            url,
            folder,
            filename,
            yes,
        } => {
            config.apply_env(ListFile::Models);
            commands::models::run_add(&config, url, folder, filename, yes)
        }
        Commands::ListNodes => commands::nodes::run_list(&config),
        Commands::ListModels => commands::models::run_list(&config),
        Commands::Doctor => commands::doctor::run_doctor(&config).await,
        Commands::DetectGpu {
            install,
            output_backend,
        } => commands::gpu::run_detect(&config, install, output_backend).await,
    }
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

fn load_settings(path: Option<&Path>) -> Result<ProvisionConfig> {
    let path = path.map(expand_tilde);
    ProvisionConfig::load_or_default(path.as_deref()).context("failed to load settings")
}

fn override_path(slot: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

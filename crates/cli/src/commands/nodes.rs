//! `download-nodes`, `add-node` and `list-nodes`.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

use comfyprov_core::config::ProvisionConfig;
use comfyprov_core::editor::{add_node, AddOutcome};
use comfyprov_core::git::{repository_name, RepositoryName};
use comfyprov_core::node_list::NodeList;
use comfyprov_core::signals::setup_signal_handlers;
use comfyprov_core::sync_engine::{
    RepoResult, RepoSynchronizer, SyncAction, SyncObserver, SyncOutcome, SyncReport,
};

use super::style;

/// Exit status used when an interrupt cut the batch short.
const INTERRUPTED_EXIT: u8 = 130;

/// Flags for `download-nodes`.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub inline: bool,
    pub json: bool,
    pub strict: bool,
}

// ---------------------------------------------------------------------------
// download-nodes
// ---------------------------------------------------------------------------

/// Prints one status line per repository behind a spinner.
struct ConsoleObserver {
    spinner: ProgressBar,
}

impl ConsoleObserver {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
            spinner.set_style(
                template.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl SyncObserver for ConsoleObserver {
    fn on_start(&mut self, name: &RepositoryName, action: SyncAction) {
        let verb = match action {
            SyncAction::Clone => "Cloning",
            SyncAction::Pull => "Updating",
        };
        self.spinner.set_message(format!("{} {}...", verb, name));
    }

    fn on_result(&mut self, result: &RepoResult) {
        self.spinner.println(format!("  {}", describe(result)));
    }
}

/// One human-readable status line for a repository result.
fn describe(result: &RepoResult) -> String {
    let name = result
        .name
        .as_ref()
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("line {}", result.line_no));

    match &result.outcome {
        SyncOutcome::Cloned => style::success(&format!("{:<40} cloned", name)),
        SyncOutcome::Updated { to, .. } => {
            let short = to.as_deref().map(|s| &s[..7.min(s.len())]).unwrap_or("?");
            style::success(&format!("{:<40} updated to {}", name, short))
        }
        SyncOutcome::UpToDate => style::success(&format!("{:<40} up to date", name)),
        SyncOutcome::Diverged { detail } => style::warn(&format!(
            "{:<40} skipped: local history diverged ({})",
            name, detail
        )),
        SyncOutcome::Failed { reason } => {
            style::error(&format!("{:<40} failed: {}", name, reason))
        }
        SyncOutcome::Invalid { reason } => style::error(&format!("{:<40} {}", name, reason)),
    }
}

/// Sync the node list and print the tally.
pub async fn run_download(config: &ProvisionConfig, opts: SyncOptions) -> Result<ExitCode> {
    let list = if opts.inline {
        NodeList::from_inline(&config.nodes.repositories)
    } else {
        NodeList::load(&config.paths.nodes_config).context("cannot read node list")?
    };

    let shutdown = setup_signal_handlers();
    let sync = RepoSynchronizer::new(config);

    let report = if opts.json {
        let report = sync.run(&list, Some(&shutdown)).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        report
    } else {
        println!();
        println!(
            "{}",
            style::header(&format!(
                "Syncing {} custom node(s) into {}",
                list.len(),
                config.paths.nodes_dir.display()
            ))
        );
        println!();
        let mut observer = ConsoleObserver::new();
        let report = sync.run_with(&list, Some(&shutdown), &mut observer).await;
        observer.finish();
        let report = report?;
        print_summary(&report);
        report
    };

    if report.interrupted {
        return Ok(ExitCode::from(INTERRUPTED_EXIT));
    }
    if opts.strict && report.failed() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &SyncReport) {
    println!();
    println!(
        "  Successful: {}   Failed: {}   (cloned {}, pulled {}, diverged {})",
        report.successful(),
        report.failed(),
        report.cloned(),
        report.pulled(),
        report.diverged()
    );
    if report.interrupted {
        println!(
            "  {}",
            style::warn(&format!("Interrupted: {} entries not processed", report.skipped))
        );
    }
    if report.failed() == 0 && !report.interrupted {
        println!();
        println!(
            "  {}",
            style::dim("Tip: run 'make install-node-deps' to install Python dependencies for custom nodes")
        );
    }
    println!();
}

// ---------------------------------------------------------------------------
// add-node
// ---------------------------------------------------------------------------

fn prompt_url() -> Result<String> {
    println!();
    println!("{}", style::header("Add Custom Node"));
    println!("{}", "═".repeat(15));
    println!();
    style::print_prompt_box(
        "GitHub Repository URL",
        &[
            "Paste the GitHub URL for the custom node repository.",
            "The .git extension is optional.",
        ],
        &[
            "https://github.com/ltdrdata/ComfyUI-Manager",
            "https://github.com/cubiq/ComfyUI_essentials.git",
            "https://github.com/Kosinkadink/ComfyUI-VideoHelperSuite",
        ],
    );
    println!();

    let url: String = Input::new()
        .with_prompt("GitHub URL")
        .interact_text()
        .context("failed to read URL")?;
    Ok(url)
}

/// Append a node URL, prompting for it when not given.
pub fn run_add(config: &ProvisionConfig, url: Option<String>) -> Result<ExitCode> {
    let url = match url {
        Some(url) => url,
        None => prompt_url()?,
    };

    let path = &config.paths.nodes_config;
    let added = add_node(path, &url)?;

    match added.outcome {
        AddOutcome::Added => {
            println!(
                "{}",
                style::success(&format!("Added {} to {}", added.name, path.display()))
            );
            println!("  {}", style::dim(&added.url));
            println!("  {}", style::dim("Run 'make download-nodes' to download"));
        }
        AddOutcome::AlreadyPresent | AddOutcome::Cancelled => {
            println!(
                "{}",
                style::warn(&format!("{} is already in {}", added.name, path.display()))
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// list-nodes
// ---------------------------------------------------------------------------

/// Table of the node list and whether each repository is on disk.
pub fn run_list(config: &ProvisionConfig) -> Result<ExitCode> {
    let list = NodeList::load(&config.paths.nodes_config).context("cannot read node list")?;

    if list.is_empty() {
        println!();
        println!("{}", style::warn("Node list is empty"));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Custom Nodes ({}) from {}",
            list.len(),
            config.paths.nodes_config.display()
        ))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Line", "Repository", "URL", "Installed"]);

    for line in list.iter() {
        let (name_cell, installed_cell) = match repository_name(&line.url) {
            Ok(name) => {
                let installed = if config.paths.nodes_dir.join(&name).is_dir() {
                    Cell::new("✓").fg(Color::Green)
                } else {
                    Cell::new("—")
                };
                (Cell::new(name.as_str()), installed)
            }
            Err(_) => (Cell::new("invalid").fg(Color::Red), Cell::new("")),
        };
        table.add_row(vec![
            Cell::new(line.line_no),
            name_cell,
            Cell::new(&line.url),
            installed_cell,
        ]);
    }

    println!("{}", table);
    println!();
    Ok(ExitCode::SUCCESS)
}

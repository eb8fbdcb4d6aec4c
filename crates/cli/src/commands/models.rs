//! `download-models`, `add-model` and `list-models`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use dialoguer::{Confirm, Input, Select};

use comfyprov_core::config::ProvisionConfig;
use comfyprov_core::downloader::ModelDownloader;
use comfyprov_core::editor::{add_model, AddOutcome, ModelRequest};
use comfyprov_core::errors::{DownloadError, EditorError};
use comfyprov_core::models::{ModelList, MODEL_FOLDERS};

use super::style;

// ---------------------------------------------------------------------------
// download-models
// ---------------------------------------------------------------------------

/// Run aria2c over the model list; its exit status becomes ours.
pub async fn run_download(config: &ProvisionConfig) -> Result<ExitCode> {
    let downloader = ModelDownloader::new(config);

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Downloading models into {}",
            downloader.models_dir().display()
        ))
    );
    println!();

    match downloader.run().await {
        Ok(count) => {
            println!();
            println!("{}", style::success(&format!("{} model(s) downloaded or already complete", count)));
            println!();
            Ok(ExitCode::SUCCESS)
        }
        Err(DownloadError::Failed { exit_code }) => {
            eprintln!("{}", style::error(&format!("aria2c exited with status {}", exit_code)));
            let code = u8::try_from(exit_code).unwrap_or(1);
            Ok(ExitCode::from(code.max(1)))
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// add-model
// ---------------------------------------------------------------------------

/// Answers collected by the interactive wizard.
struct WizardAnswers {
    url: String,
    folder: String,
    filename: Option<String>,
}

fn prompt_model() -> Result<WizardAnswers> {
    println!();
    println!("{}", style::header("Add Model to Download List"));
    println!("{}", "═".repeat(26));
    println!();

    style::print_prompt_box(
        "STEP 1: Model URL",
        &["Paste the direct download URL for the model file."],
        &["https://huggingface.co/org/repo/resolve/main/model.safetensors"],
    );
    println!();
    let url: String = Input::new()
        .with_prompt("Model URL")
        .interact_text()
        .context("failed to read model URL")?;
    println!();

    style::print_prompt_box(
        "STEP 2: Target Folder",
        &[
            "Where should this model be saved?",
            "checkpoints = main models, loras = LoRA/LyCORIS, vae = VAE models,",
            "upscale_models = upscalers, clip / unet = FLUX components.",
        ],
        &[],
    );
    println!();
    let choice = Select::new()
        .with_prompt("Target folder")
        .items(MODEL_FOLDERS)
        .default(0)
        .interact()
        .context("failed to read folder selection")?;
    let folder = MODEL_FOLDERS[choice].to_string();
    println!();

    style::print_prompt_box(
        "STEP 3: Filename (optional)",
        &[
            "Press ENTER to keep the original filename from the URL.",
            "Or type a new name if you want to rename it.",
        ],
        &["my_custom_model.safetensors"],
    );
    println!();
    let filename: String = Input::new()
        .with_prompt("New filename (press ENTER to skip)")
        .allow_empty(true)
        .interact_text()
        .context("failed to read filename")?;

    Ok(WizardAnswers {
        url,
        folder,
        filename: Some(filename).filter(|f| !f.trim().is_empty()),
    })
}

fn confirm_duplicate(out: &str, assume_yes: bool) -> std::io::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    println!("{}", style::warn(&format!("{} is already in the model list", out)));
    Confirm::new()
        .with_prompt("Add anyway?")
        .default(false)
        .interact()
        .map_err(std::io::Error::other)
}

/// Append a model download, running the wizard when no URL is given.
pub fn run_add(
    config: &ProvisionConfig,
    url: Option<String>,
    folder: Option<String>,
    filename: Option<String>,
    assume_yes: bool,
) -> Result<ExitCode> {
    let answers = match (url, folder) {
        (None, _) => prompt_model()?,
        (Some(_), None) => {
            eprintln!("{}", style::error("usage: comfyprov add-model <url> <folder> [filename]"));
            return Err(EditorError::MissingArgument("folder".into()).into());
        }
        (Some(url), Some(folder)) => WizardAnswers { url, folder, filename },
    };

    let path = &config.paths.models_config;
    let request = ModelRequest {
        url: &answers.url,
        folder: &answers.folder,
        filename: answers.filename.as_deref(),
    };
    let added = add_model(path, request, |out| confirm_duplicate(out, assume_yes))?;

    match added.outcome {
        AddOutcome::Added => {
            println!(
                "{}",
                style::success(&format!("Added {} to {}", added.out, path.display()))
            );
            println!("  {}", style::dim("Run 'make download-models' to download"));
        }
        AddOutcome::Cancelled | AddOutcome::AlreadyPresent => {
            println!("{}", style::dim("Cancelled. The model list was not modified."));
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// list-models
// ---------------------------------------------------------------------------

/// Table of the model list and whether each output file exists.
pub fn run_list(config: &ProvisionConfig) -> Result<ExitCode> {
    let path = &config.paths.models_config;
    let list = ModelList::load(path)
        .with_context(|| format!("cannot read model list {}", path.display()))?;

    if list.is_empty() {
        println!();
        println!("{}", style::warn("Model list is empty"));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!(
        "{}",
        style::header(&format!("Models ({}) from {}", list.len(), path.display()))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Line", "Output", "URL", "Present"]);

    for entry in list.entries() {
        let (out_cell, present_cell) = match &entry.out {
            Some(out) => {
                let present = if config.paths.models_dir.join(out).is_file() {
                    Cell::new("✓").fg(Color::Green)
                } else {
                    Cell::new("—")
                };
                (Cell::new(out), present)
            }
            None => (Cell::new("(no out=)").fg(Color::Yellow), Cell::new("")),
        };
        table.add_row(vec![
            Cell::new(entry.line_no),
            out_cell,
            Cell::new(&entry.url),
            present_cell,
        ]);
    }

    println!("{}", table);
    println!();
    Ok(ExitCode::SUCCESS)
}

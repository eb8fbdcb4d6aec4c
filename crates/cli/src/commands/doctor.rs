//! Preflight check for the provisioning tools and list files.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use comfyprov_core::config::ProvisionConfig;
use comfyprov_core::downloader::ModelDownloader;
use comfyprov_core::git::{repository_name, GitClient};
use comfyprov_core::gpu::GpuDetector;
use comfyprov_core::models::ModelList;
use comfyprov_core::node_list::NodeList;

use super::style;

/// Check the git and aria2c binaries, both list files, the GPU and the target directories.
pub async fn run_doctor(config: &ProvisionConfig) -> Result<ExitCode> {
    println!();
    println!("{}", style::header("comfyprov Doctor"));
    println!("{}", "═".repeat(16));
    println!();

    let mut issues = Vec::new();

    // 1. git
    match GitClient::new(&config.git).version().await {
        Ok(version) => println!("  {}", style::success(&format!("git               {}", version))),
        Err(e) => {
            println!("  {}", style::error(&format!("git               {}", e)));
            issues.push(format!("Install git or set [git] binary (currently '{}')", config.git.binary));
        }
    }

    // 2. aria2c
    match ModelDownloader::new(config).version().await {
        Ok(version) => println!("  {}", style::success(&format!("aria2c            {}", version))),
        Err(e) => {
            println!("  {}", style::error(&format!("aria2c            {}", e)));
            issues.push(format!(
                "Install aria2 or set [download] binary (currently '{}')",
                config.download.binary
            ));
        }
    }

    // 3. Node list
    let nodes_config = &config.paths.nodes_config;
    match NodeList::load(nodes_config) {
        Ok(list) => {
            let invalid: Vec<usize> = list
                .iter()
                .filter(|line| repository_name(&line.url).is_err())
                .map(|line| line.line_no)
                .collect();
            if invalid.is_empty() {
                println!(
                    "  {}",
                    style::success(&format!(
                        "Node List         {} ({} entries)",
                        nodes_config.display(),
                        list.len()
                    ))
                );
            } else {
                println!(
                    "  {}",
                    style::warn(&format!(
                        "Node List         {} invalid line(s) in {}",
                        invalid.len(),
                        nodes_config.display()
                    ))
                );
                issues.push(format!("Fix node list lines {}", join_numbers(&invalid)));
            }
        }
        Err(_) => {
            println!(
                "  {}",
                style::error(&format!("Node List         {} (missing)", nodes_config.display()))
            );
            issues.push(format!(
                "Create the node list or run {}",
                style::accent("comfyprov add-node")
            ));
        }
    }

    // 4. Model list
    let models_config = &config.paths.models_config;
    if models_config.is_file() {
        match ModelList::load(models_config) {
            Ok(list) => {
                let unnamed: Vec<usize> = list
                    .entries()
                    .iter()
                    .filter(|entry| entry.out.is_none())
                    .map(|entry| entry.line_no)
                    .collect();
                if unnamed.is_empty() {
                    println!(
                        "  {}",
                        style::success(&format!(
                            "Model List        {} ({} entries)",
                            models_config.display(),
                            list.len()
                        ))
                    );
                } else {
                    println!(
                        "  {}",
                        style::warn(&format!(
                            "Model List        {} entries without out=",
                            unnamed.len()
                        ))
                    );
                    issues.push(format!(
                        "Add an out= option for model list lines {}",
                        join_numbers(&unnamed)
                    ));
                }
            }
            Err(e) => {
                println!("  {}", style::error(&format!("Model List        {}", e)));
                issues.push(format!("Check permissions on {}", models_config.display()));
            }
        }
    } else {
        println!(
            "  {}",
            style::error(&format!("Model List        {} (missing)", models_config.display()))
        );
        issues.push(format!(
            "Create the model list or run {}",
            style::accent("comfyprov add-model")
        ));
    }

    // 5. GPU
    let gpu = GpuDetector::new(&config.gpu).detect().await;
    if gpu.is_some() {
        println!("  {}", super::gpu::describe(gpu.as_ref()));
    } else {
        println!("  {}", style::dim("  ○ GPU               None detected (CPU mode)"));
    }

    // 6. Target directories
    report_dir("Nodes Directory", &config.paths.nodes_dir);
    report_dir("Models Directory", &config.paths.models_dir);

    // Summary
    println!();
    if issues.is_empty() {
        println!("  {} All checks passed!", console::style("✓").green().bold());
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "  {} {} issue(s) found:",
        console::style("!").yellow().bold(),
        issues.len()
    );
    for (i, issue) in issues.iter().enumerate() {
        println!("    {}. {}", i + 1, issue);
    }
    println!();
    Ok(ExitCode::FAILURE)
}

/// Missing target directories are created on first download, so they only rate a note.
fn report_dir(label: &str, dir: &Path) {
    if dir.is_dir() {
        println!(
            "  {}",
            style::success(&format!("{:<18}{}", label, dir.display()))
        );
    } else {
        println!(
            "  {}",
            style::dim(&format!(
                "  ○ {:<18}{} (created on first download)",
                label,
                dir.display()
            ))
        );
    }
}

fn join_numbers(numbers: &[usize]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

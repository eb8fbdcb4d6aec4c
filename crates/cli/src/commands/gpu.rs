//! `detect-gpu`.

use std::process::ExitCode;

use anyhow::Result;

use comfyprov_core::config::ProvisionConfig;
use comfyprov_core::errors::GpuError;
use comfyprov_core::gpu::{GpuDetector, GpuInfo, InstallPlan};

use super::style;

/// One status line describing the detection result.
pub fn describe(gpu: Option<&GpuInfo>) -> String {
    match gpu {
        Some(gpu) => style::success(&format!("GPU               {}", gpu)),
        None => style::warn("GPU               None detected (CPU mode)"),
    }
}

/// Detect the accelerator, then print or run the PyTorch install command.
///
/// With `backend_only` just the backend name is printed, for scripts.
pub async fn run_detect(config: &ProvisionConfig, install: bool, backend_only: bool) -> Result<ExitCode> {
    let (gpu, plan) = GpuDetector::new(&config.gpu).plan().await;

    if backend_only {
        println!("{}", plan.backend.name());
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!("{}", style::header("GPU Detection"));
    println!("{}", "═".repeat(13));
    println!();
    println!("  {}", describe(gpu.as_ref()));
    println!("  Recommended PyTorch backend: {}", style::accent(&plan.backend.to_string()));
    println!();

    if !install {
        println!("To install PyTorch, run:");
        println!("  {}", plan.command_line());
        println!();
        println!("{}", style::dim("Or use: make install-pytorch"));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    install_plan(&plan).await
}

async fn install_plan(plan: &InstallPlan) -> Result<ExitCode> {
    println!("{}", style::dim(&plan.command_line()));
    match plan.install().await {
        Ok(()) => {
            println!();
            println!("{}", style::success(&format!("PyTorch installed for {}", plan.backend)));
            println!();
            Ok(ExitCode::SUCCESS)
        }
        Err(GpuError::InstallFailed { exit_code }) => {
            eprintln!("{}", style::error(&format!("PyTorch install exited with status {}", exit_code)));
            let code = u8::try_from(exit_code).unwrap_or(1);
            Ok(ExitCode::from(code.max(1)))
        }
        Err(e) => Err(e.into()),
    }
}

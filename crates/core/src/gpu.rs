//! GPU detection and PyTorch install recommendation.
//!
//! Accelerators are queried in a fixed order: NVIDIA (`nvidia-smi`), Apple
//! Silicon (`sysctl`, macOS only), then AMD ROCm (`rocm-smi`). A query tool
//! that cannot run or outlives [`QUERY_TIMEOUT`] counts as "not found". The
//! detected backend selects the PyTorch wheel index.

use std::fmt;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::GpuConfig;
use crate::errors::GpuError;

/// Upper bound for a single query command.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

const TORCH_PACKAGES: &[&str] = &["torch", "torchvision", "torchaudio"];
const PYTORCH_INDEX: &str = "https://download.pytorch.org/whl";
const ROCM_WHEEL: &str = "rocm6.2";

/// Wheel used when the driver's CUDA version is unknown or unmapped.
const DEFAULT_CUDA_WHEEL: &str = "cu124";

static CUDA_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CUDA Version:\s*(\d+\.\d+)").expect("valid cuda version regex")
});

/// A detected accelerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GpuInfo {
    Nvidia {
        name: String,
        driver: String,
        memory: String,
        cuda_version: Option<String>,
    },
    Mps {
        name: String,
    },
    Rocm {
        name: String,
    },
}

impl GpuInfo {
    pub fn name(&self) -> &str {
        match self {
            Self::Nvidia { name, .. } | Self::Mps { name } | Self::Rocm { name } => name,
        }
    }
}

impl fmt::Display for GpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvidia {
                name,
                driver,
                memory,
                cuda_version,
            } => {
                write!(f, "NVIDIA {} (driver {}, {}", name, driver, memory)?;
                if let Some(cuda) = cuda_version {
                    write!(f, ", CUDA {}", cuda)?;
                }
                f.write_str(")")
            }
            Self::Mps { name } => write!(f, "Apple Silicon {} (MPS)", name),
            Self::Rocm { name } => write!(f, "AMD {} (ROCm)", name),
        }
    }
}

/// PyTorch build to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cpu,
    Cuda { wheel: &'static str },
    Mps,
    Rocm,
}

impl Backend {
    /// Short name for scripts: `cpu`, `cuda`, `mps` or `rocm`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda { .. } => "cuda",
            Self::Mps => "mps",
            Self::Rocm => "rocm",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda { wheel } => write!(f, "cuda ({})", wheel),
            other => f.write_str(other.name()),
        }
    }
}

/// Map a driver CUDA version such as `12.4` to a PyTorch wheel tag.
pub fn cuda_wheel(cuda_version: Option<&str>) -> &'static str {
    let major = cuda_version
        .and_then(|v| v.trim().split('.').next())
        .unwrap_or_default();
    match major {
        "13" | "12" => "cu124",
        "11" => "cu118",
        _ => DEFAULT_CUDA_WHEEL,
    }
}

/// Backend recommended for the detected accelerator.
pub fn backend_for(gpu: Option<&GpuInfo>) -> Backend {
    match gpu {
        None => Backend::Cpu,
        Some(GpuInfo::Nvidia { cuda_version, .. }) => Backend::Cuda {
            wheel: cuda_wheel(cuda_version.as_deref()),
        },
        Some(GpuInfo::Mps { .. }) => Backend::Mps,
        Some(GpuInfo::Rocm { .. }) => Backend::Rocm,
    }
}

/// First GPU from `nvidia-smi --query-gpu=name,driver_version,memory.total
/// --format=csv,noheader` as `(name, driver, memory)`.
pub fn parse_nvidia_query(stdout: &str) -> Option<(String, String, String)> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut parts = line.split(',').map(str::trim);
    let name = parts.next().filter(|p| !p.is_empty())?;
    let driver = parts.next()?;
    let memory = parts.next()?;
    Some((name.to_string(), driver.to_string(), memory.to_string()))
}

/// `CUDA Version: X.Y` from the `nvidia-smi` banner.
pub fn parse_cuda_version(stdout: &str) -> Option<String> {
    CUDA_VERSION_RE
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Install plan
// ---------------------------------------------------------------------------

/// The installer invocation for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub backend: Backend,
    pub program: String,
    pub args: Vec<String>,
}

impl InstallPlan {
    pub fn new(installer: &str, backend: Backend) -> Self {
        let mut args: Vec<String> = vec!["pip".into(), "install".into()];
        args.extend(TORCH_PACKAGES.iter().map(|p| p.to_string()));

        let index = match backend {
            Backend::Cpu => Some("cpu"),
            Backend::Cuda { wheel } => Some(wheel),
            Backend::Rocm => Some(ROCM_WHEEL),
            Backend::Mps => None,
        };
        if let Some(wheel) = index {
            args.push("--index-url".into());
            args.push(format!("{}/{}", PYTORCH_INDEX, wheel));
        }

        Self {
            backend,
            program: installer.to_string(),
            args,
        }
    }

    /// The full command line, for display.
    pub fn command_line(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }

    /// Run the installer with inherited stdio.
    pub async fn install(&self) -> Result<(), GpuError> {
        info!(command = %self.command_line(), "installing_pytorch");
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GpuError::InstallerNotFound(self.program.clone())
                } else {
                    GpuError::IoError(e)
                }
            })?;

        if !status.success() {
            let exit_code = status.code().unwrap_or(1);
            error!(exit_code, "pytorch_install_failed");
            return Err(GpuError::InstallFailed { exit_code });
        }
        info!(backend = %self.backend, "pytorch_installed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

pub struct GpuDetector {
    settings: GpuConfig,
}

impl GpuDetector {
    pub fn new(settings: &GpuConfig) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Look for an accelerator; `None` means CPU only.
    pub async fn detect(&self) -> Option<GpuInfo> {
        info!("detecting_gpu");
        let gpu = match self.detect_nvidia().await {
            Some(gpu) => Some(gpu),
            None => match detect_apple_silicon().await {
                Some(gpu) => Some(gpu),
                None => self.detect_rocm().await,
            },
        };
        match &gpu {
            Some(gpu) => info!(gpu = %gpu, "gpu_detected"),
            None => warn!(fallback = "CPU mode", "no_gpu_detected"),
        }
        gpu
    }

    /// Detect and build the matching install plan.
    pub async fn plan(&self) -> (Option<GpuInfo>, InstallPlan) {
        let gpu = self.detect().await;
        let backend = backend_for(gpu.as_ref());
        info!(backend = %backend, "recommended_pytorch");
        (gpu, InstallPlan::new(&self.settings.installer, backend))
    }

    async fn detect_nvidia(&self) -> Option<GpuInfo> {
        let query = run_query(
            &self.settings.nvidia_smi,
            &[
                "--query-gpu=name,driver_version,memory.total",
                "--format=csv,noheader",
            ],
        )
        .await?;
        let (name, driver, memory) = parse_nvidia_query(&query)?;
        let cuda_version = run_query(&self.settings.nvidia_smi, &[])
            .await
            .as_deref()
            .and_then(parse_cuda_version);
        Some(GpuInfo::Nvidia {
            name,
            driver,
            memory,
            cuda_version,
        })
    }

    async fn detect_rocm(&self) -> Option<GpuInfo> {
        let stdout = run_query(&self.settings.rocm_smi, &["--showproductname"]).await?;
        let name = stdout.trim();
        (!name.is_empty()).then(|| GpuInfo::Rocm {
            name: name.to_string(),
        })
    }
}

#[cfg(target_os = "macos")]
async fn detect_apple_silicon() -> Option<GpuInfo> {
    let brand = run_query("sysctl", &["-n", "machdep.cpu.brand_string"]).await?;
    let brand = brand.trim();
    brand.contains("Apple").then(|| GpuInfo::Mps {
        name: brand.to_string(),
    })
}

#[cfg(not(target_os = "macos"))]
async fn detect_apple_silicon() -> Option<GpuInfo> {
    None
}

/// Stdout of a successful query command, or `None`.
async fn run_query(binary: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(QUERY_TIMEOUT, output).await {
        Ok(Ok(out)) if out.status.success() => {
            Some(String::from_utf8_lossy(&out.stdout).into_owned())
        }
        Ok(Ok(out)) => {
            debug!(binary, exit_code = ?out.status.code(), "gpu query exited non-zero");
            None
        }
        Ok(Err(e)) => {
            debug!(binary, error = %e, "gpu query unavailable");
            None
        }
        Err(_) => {
            warn!(binary, "gpu query timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuda_wheel_mapping() {
        assert_eq!(cuda_wheel(Some("13.0")), "cu124");
        assert_eq!(cuda_wheel(Some("12.4")), "cu124");
        assert_eq!(cuda_wheel(Some("12.8")), "cu124");
        assert_eq!(cuda_wheel(Some("11.8")), "cu118");
        assert_eq!(cuda_wheel(Some("10.2")), "cu124");
        assert_eq!(cuda_wheel(None), "cu124");
    }

    #[test]
    fn test_parse_nvidia_query() {
        let out = "NVIDIA GeForce RTX 4090, 550.54.14, 24564 MiB\nNVIDIA GeForce RTX 3060, 550.54.14, 12288 MiB\n";
        assert_eq!(
            parse_nvidia_query(out),
            Some((
                "NVIDIA GeForce RTX 4090".to_string(),
                "550.54.14".to_string(),
                "24564 MiB".to_string()
            ))
        );
    }

    #[test]
    fn test_parse_nvidia_query_rejects_short_rows() {
        assert_eq!(parse_nvidia_query(""), None);
        assert_eq!(parse_nvidia_query("\n\n"), None);
        assert_eq!(parse_nvidia_query("NVIDIA A100, 535.0"), None);
    }

    #[test]
    fn test_parse_cuda_version() {
        let banner = "\
+-----------------------------------------------------------------------------+
| NVIDIA-SMI 550.54.14    Driver Version: 550.54.14    CUDA Version: 12.4     |
|-------------------------------+----------------------+----------------------+";
        assert_eq!(parse_cuda_version(banner).as_deref(), Some("12.4"));
        assert_eq!(parse_cuda_version("no banner here"), None);
    }

    #[test]
    fn test_backend_for_detected_gpu() {
        let nvidia = GpuInfo::Nvidia {
            name: "RTX".into(),
            driver: "470".into(),
            memory: "8 GiB".into(),
            cuda_version: Some("11.4".into()),
        };
        assert_eq!(backend_for(Some(&nvidia)), Backend::Cuda { wheel: "cu118" });
        assert_eq!(backend_for(Some(&GpuInfo::Mps { name: "Apple M2".into() })), Backend::Mps);
        assert_eq!(backend_for(Some(&GpuInfo::Rocm { name: "RX 7900".into() })), Backend::Rocm);
        assert_eq!(backend_for(None), Backend::Cpu);
        assert_eq!(Backend::Cuda { wheel: "cu124" }.to_string(), "cuda (cu124)");
        assert_eq!(Backend::Cuda { wheel: "cu124" }.name(), "cuda");
    }

    #[test]
    fn test_install_plan_index_urls() {
        let plan = InstallPlan::new("uv", Backend::Cuda { wheel: "cu118" });
        assert_eq!(
            plan.command_line(),
            "uv pip install torch torchvision torchaudio --index-url https://download.pytorch.org/whl/cu118"
        );
        assert!(InstallPlan::new("uv", Backend::Cpu).command_line().ends_with("/whl/cpu"));
        assert!(InstallPlan::new("uv", Backend::Rocm).command_line().ends_with("/whl/rocm6.2"));
        assert_eq!(
            InstallPlan::new("uv", Backend::Mps).command_line(),
            "uv pip install torch torchvision torchaudio"
        );
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn test_missing_query_tools_mean_cpu() {
        let detector = GpuDetector::new(&GpuConfig {
            nvidia_smi: "definitely-not-nvidia-smi".into(),
            rocm_smi: "definitely-not-rocm-smi".into(),
            installer: "uv".into(),
        });
        let (gpu, plan) = detector.plan().await;
        assert_eq!(gpu, None);
        assert_eq!(plan.backend, Backend::Cpu);
    }

    #[tokio::test]
    async fn test_missing_installer() {
        let plan = InstallPlan::new("definitely-not-uv", Backend::Cpu);
        assert!(matches!(plan.install().await, Err(GpuError::InstallerNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installer_exit_code_propagates() {
        let plan = InstallPlan::new("false", Backend::Cpu);
        assert!(matches!(plan.install().await, Err(GpuError::InstallFailed { exit_code: 1 })));
    }
}

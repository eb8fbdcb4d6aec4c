//! Model downloads through `aria2c`.
//!
//! The model list is already in aria2's input-file format, so it is passed
//! straight through with `--input-file`. Output is inherited so the
//! downloader's own progress display reaches the terminal.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, info, instrument};

use crate::config::{DownloadConfig, ProvisionConfig};
use crate::errors::DownloadError;
use crate::models::ModelList;

pub struct ModelDownloader {
    settings: DownloadConfig,
    models_dir: PathBuf,
    models_config: PathBuf,
}

impl ModelDownloader {
    pub fn new(config: &ProvisionConfig) -> Self {
        Self {
            settings: config.download.clone(),
            models_dir: config.paths.models_dir.clone(),
            models_config: config.paths.models_config.clone(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Arguments passed to the downloader.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string(), self.settings.connections.to_string()];
        if self.settings.disable_ipv6 {
            args.push("--disable-ipv6".into());
        }
        args.push("--input-file".into());
        args.push(self.models_config.display().to_string());
        args.push("--dir".into());
        args.push(self.models_dir.display().to_string());
        if self.settings.resume {
            args.push("--continue=true".into());
        }
        args
    }

    /// Check the model list, then run the downloader over it.
    ///
    /// Returns the number of entries handed to the downloader.
    #[instrument(skip(self), fields(models_dir = %self.models_dir.display()))]
    pub async fn run(&self) -> Result<usize, DownloadError> {
        if !self.models_config.exists() {
            error!(config_file = %self.models_config.display(), "config_not_found");
            return Err(DownloadError::ConfigMissing(
                self.models_config.display().to_string(),
            ));
        }
        std::fs::create_dir_all(&self.models_dir)?;

        let list = ModelList::load(&self.models_config)?;
        info!(
            config_file = %self.models_config.display(),
            count = list.len(),
            "download_models_start"
        );

        let args = self.args();
        debug!(cmd = ?format!("{} {}", self.settings.binary, args.join(" ")), "starting_download");
        let status = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::BinaryNotFound(self.settings.binary.clone())
                } else {
                    DownloadError::IoError(e)
                }
            })?;

        if !status.success() {
            let exit_code = status.code().unwrap_or(1);
            error!(exit_code, "download_failed");
            return Err(DownloadError::Failed { exit_code });
        }

        info!("download_models_complete");
        Ok(list.len())
    }

    /// First line of `aria2c --version`, used by preflight checks.
    pub async fn version(&self) -> Result<String, DownloadError> {
        let output = Command::new(&self.settings.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::BinaryNotFound(self.settings.binary.clone())
                } else {
                    DownloadError::IoError(e)
                }
            })?;
        if !output.status.success() {
            return Err(DownloadError::Failed {
                exit_code: output.status.code().unwrap_or(1),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> ProvisionConfig {
        let mut config = ProvisionConfig::default();
        config.paths.models_dir = dir.join("models");
        config.paths.models_config = dir.join("models.txt");
        config
    }

    #[test]
    fn test_default_args() {
        let mut config = ProvisionConfig::default();
        config.paths.models_dir = PathBuf::from("/data/models");
        config.paths.models_config = PathBuf::from("/setup/models.txt");
        let args = ModelDownloader::new(&config).args();
        assert_eq!(
            args,
            vec![
                "-x",
                "10",
                "--disable-ipv6",
                "--input-file",
                "/setup/models.txt",
                "--dir",
                "/data/models",
                "--continue=true",
            ]
        );
    }

    #[test]
    fn test_args_respect_settings() {
        let mut config = ProvisionConfig::default();
        config.download.connections = 4;
        config.download.disable_ipv6 = false;
        config.download.resume = false;
        let args = ModelDownloader::new(&config).args();
        assert!(!args.contains(&"--disable-ipv6".to_string()));
        assert!(!args.contains(&"--continue=true".to_string()));
        assert_eq!(args[1], "4");
    }

    #[tokio::test]
    async fn test_missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = ModelDownloader::new(&config_in(dir.path()));
        let err = downloader.run().await.unwrap_err();
        assert!(matches!(err, DownloadError::ConfigMissing(_)));
        assert!(!dir.path().join("models").exists());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.download.binary = "definitely-not-aria2c".into();
        std::fs::write(&config.paths.models_config, "https://x/a.bin\n  out=vae/a.bin\n").unwrap();

        let err = ModelDownloader::new(&config).run().await.unwrap_err();
        assert!(matches!(err, DownloadError::BinaryNotFound(_)));
        assert!(dir.path().join("models").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.download.binary = "false".into();
        std::fs::write(&config.paths.models_config, "").unwrap();

        let err = ModelDownloader::new(&config).run().await.unwrap_err();
        assert!(matches!(err, DownloadError::Failed { exit_code: 1 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_reports_entry_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.download.binary = "true".into();
        std::fs::write(
            &config.paths.models_config,
            "https://x/a.bin\n  out=vae/a.bin\n\nhttps://x/b.bin\n  out=loras/b.bin\n",
        )
        .unwrap();

        let count = ModelDownloader::new(&config).run().await.unwrap();
        assert_eq!(count, 2);
    }
}

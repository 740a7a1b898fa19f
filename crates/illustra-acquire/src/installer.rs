use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use std::path::PathBuf;
use tracing::{error, info};

/// Something that can put a usable browser driver on disk.
///
/// Invoked at most once, when no executable could be found. Returns the
/// reported install path on success; `None` means the browser strategy is
/// unavailable for this handler, which is not a pipeline error.
#[async_trait]
pub trait DriverInstaller: Send + Sync {
    async fn ensure(&self) -> Option<PathBuf>;
}

/// Downloads a managed Chromium build with the `chromiumoxide` fetcher.
pub struct FetcherInstaller {
    install_dir: PathBuf,
}

impl FetcherInstaller {
    pub fn new(install_dir: Option<PathBuf>) -> Self {
        let install_dir = install_dir.unwrap_or_else(default_install_dir);
        Self { install_dir }
    }

    async fn install(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.install_dir).with_context(|| {
            format!("Failed to create install dir {}", self.install_dir.display())
        })?;

        let options = BrowserFetcherOptions::builder()
            .with_path(&self.install_dir)
            .build()
            .context("Failed to build fetcher options")?;
        let revision = BrowserFetcher::new(options)
            .fetch()
            .await
            .context("Failed to fetch browser")?;

        Ok(revision.executable_path)
    }
}

#[async_trait]
impl DriverInstaller for FetcherInstaller {
    async fn ensure(&self) -> Option<PathBuf> {
        info!(dir = %self.install_dir.display(), "Installing managed Chromium");
        match self.install().await {
            Ok(path) => {
                info!(path = %path.display(), "Managed Chromium installed");
                Some(path)
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to install managed Chromium");
                None
            }
        }
    }
}

fn default_install_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("illustra")
        .join("chromium")
}

/// Installer used when automatic installation is turned off.
pub struct NoInstaller;

#[async_trait]
impl DriverInstaller for NoInstaller {
    async fn ensure(&self) -> Option<PathBuf> {
        None
    }
}

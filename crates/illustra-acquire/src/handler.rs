use crate::browser::BrowserSearch;
use crate::download::Downloader;
use crate::installer::{DriverInstaller, FetcherInstaller, NoInstaller};
use crate::locator::{find_browser_executable, resolve_driver_path};
use crate::output;
use crate::provider::ImageSearchProvider;
use crate::scrape::HttpScrapeSearch;
use anyhow::{Context, Result};
use illustra_model::{BrowserSettings, ImageConfig, ImageUrl, SearchQuery};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Acquires illustration images for a query, degrading from the browser
/// search to the HTTP scrape to the bundled default images.
///
/// Every public operation is infallible from the caller's point of view: an
/// empty result means "no image available" and the caller should carry on
/// without one.
pub struct ImageHandler {
    temp_root: PathBuf,
    default_dir: PathBuf,
    providers: Vec<Box<dyn ImageSearchProvider>>,
    downloader: Downloader,
    driver_path: Option<PathBuf>,
}

impl ImageHandler {
    /// Build a handler with the standard provider chain.
    ///
    /// Runs driver discovery once, installing a managed Chromium when nothing
    /// is found and `browser.auto_install` is set.
    pub async fn from_config(config: &ImageConfig) -> Result<Self> {
        if config.browser.auto_install {
            let installer = FetcherInstaller::new(config.browser.install_dir.clone());
            Self::with_installer(config, &installer).await
        } else {
            Self::with_installer(config, &NoInstaller).await
        }
    }

    /// Like [`ImageHandler::from_config`] with a caller-supplied installer.
    pub async fn with_installer(
        config: &ImageConfig,
        installer: &dyn DriverInstaller,
    ) -> Result<Self> {
        let driver_path = discover_driver(&config.browser, installer).await;

        let providers: Vec<Box<dyn ImageSearchProvider>> = vec![
            Box::new(BrowserSearch::new(
                driver_path.clone(),
                config.browser.clone(),
                &config.http.user_agent,
            )),
            Box::new(HttpScrapeSearch::new(&config.http)?),
        ];

        let mut handler = Self::with_providers(config, providers)?;
        handler.driver_path = driver_path;
        Ok(handler)
    }

    /// Build a handler around an explicit, ordered provider list.
    pub fn with_providers(
        config: &ImageConfig,
        providers: Vec<Box<dyn ImageSearchProvider>>,
    ) -> Result<Self> {
        for dir in [&config.temp_root, &config.default_images_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        Ok(Self {
            temp_root: config.temp_root.clone(),
            default_dir: config.default_images_dir.clone(),
            providers,
            downloader: Downloader::new(&config.http)?,
            driver_path: None,
        })
    }

    /// Resolved browser executable, if the browser strategy is usable.
    pub fn driver_path(&self) -> Option<&Path> {
        self.driver_path.as_deref()
    }

    /// Search for and download images for `"<topic> <keywords>"`.
    ///
    /// Returns at most `count` paths: freshly downloaded or copied files first,
    /// then anything already in the query directory.
    pub async fn search_and_download_images(
        &self,
        topic: &str,
        keywords: &str,
        count: usize,
    ) -> Vec<PathBuf> {
        self.acquire(topic, keywords, count).await
    }

    pub async fn acquire(&self, topic: &str, keywords: &str, count: usize) -> Vec<PathBuf> {
        if count == 0 {
            return Vec::new();
        }

        let query = match SearchQuery::new(topic, keywords, count) {
            Ok(query) => query,
            Err(e) => {
                warn!(error = %e, "Error in image search");
                return Vec::new();
            }
        };
        let query_string = query.query_string();
        let count = query.requested_count();
        info!(
            topic = query.topic(),
            keywords = query.keywords(),
            count,
            "Searching for images"
        );

        let dir = match output::prepare_query_dir(&self.temp_root, &query_string) {
            Ok(dir) => dir,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Error in image search");
                return Vec::new();
            }
        };

        let mut produced: Vec<PathBuf> = Vec::new();
        if let Some(urls) = self.find_image_urls(&query_string, count).await {
            produced = self
                .downloader
                .download(&urls, &dir)
                .await
                .into_iter()
                .map(|image| image.file_path)
                .collect();
            if produced.is_empty() {
                warn!("All image downloads failed");
            }
        }

        if produced.is_empty() {
            produced = self.use_defaults(&dir, count);
        }

        let results = output::collect_results(&dir, &produced, count);
        if results.is_empty() {
            warn!(query = %query_string, "No images available");
        } else {
            info!(query = %query_string, images = results.len(), "Image acquisition finished");
        }
        results
    }

    /// Try each provider in order; the first non-empty answer wins.
    async fn find_image_urls(&self, query: &str, count: usize) -> Option<Vec<ImageUrl>> {
        for provider in &self.providers {
            info!(provider = provider.name(), "Trying image search");
            let mut urls = provider.search(query, count).await;
            if !urls.is_empty() {
                urls.truncate(count);
                info!(provider = provider.name(), found = urls.len(), "Image search succeeded");
                return Some(urls);
            }
            warn!(provider = provider.name(), "No images found");
        }
        None
    }

    fn use_defaults(&self, dir: &Path, count: usize) -> Vec<PathBuf> {
        let defaults = output::list_images(&self.default_dir);
        if defaults.is_empty() {
            warn!(dir = %self.default_dir.display(), "No default images available");
            return Vec::new();
        }
        info!(available = defaults.len(), "Falling back to default images");
        output::copy_defaults(&defaults, dir, count)
    }

    /// The image to feature: always the first one, `None` when there are none.
    pub fn select_featured_image<'a>(&self, images: &'a [PathBuf]) -> Option<&'a Path> {
        select_featured_image(images)
    }

    /// Delete everything acquired under the temp root. Returns entries removed.
    pub fn cleanup(&self) -> usize {
        output::clean_root(&self.temp_root)
    }
}

/// First element of `images`, or `None` when empty. No scoring is applied.
pub fn select_featured_image(images: &[PathBuf]) -> Option<&Path> {
    images.first().map(PathBuf::as_path)
}

async fn discover_driver(
    settings: &BrowserSettings,
    installer: &dyn DriverInstaller,
) -> Option<PathBuf> {
    if !settings.enabled {
        info!("Browser search disabled");
        return None;
    }

    let configured = settings.executable.as_ref().and_then(|path| {
        if path.exists() {
            Some(path.clone())
        } else {
            warn!(path = %path.display(), "Configured browser executable not found");
            None
        }
    });

    let reported = match configured.or_else(find_browser_executable) {
        Some(path) => Some(path),
        None => {
            warn!("Browser executable not found, trying to install one");
            installer.ensure().await
        }
    };

    let Some(reported) = reported else {
        error!("No browser driver available; browser search disabled");
        return None;
    };

    Some(resolve_driver_path(
        &reported,
        std::env::consts::OS,
        std::env::consts::ARCH,
        &settings.executable_name,
    ))
}

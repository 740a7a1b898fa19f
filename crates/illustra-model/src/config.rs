use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.google.com/search";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Top-level configuration for the acquisition pipeline.
///
/// Every field has a default, so an empty TOML file (or no file at all)
/// yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Root under which one directory per distinct query is created.
    pub temp_root: PathBuf,
    /// Read-only store of bundled images used when every search fails.
    pub default_images_dir: PathBuf,
    /// Number of images requested when the caller does not say.
    pub default_count: usize,
    pub browser: BrowserSettings,
    pub http: HttpSettings,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("illustra");
        Self {
            temp_root: base.join("images"),
            default_images_dir: base.join("defaults"),
            default_count: 5,
            browser: BrowserSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl ImageConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

/// Settings for the headless-browser search strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Disable to skip the browser strategy entirely.
    pub enabled: bool,
    /// Explicit browser executable; discovered when absent.
    pub executable: Option<PathBuf>,
    /// File name the driver locator looks for next to a reported install path.
    pub executable_name: String,
    /// Download a managed Chromium when no executable can be found.
    pub auto_install: bool,
    /// Where managed downloads go; a per-user cache directory when absent.
    pub install_dir: Option<PathBuf>,
    pub search_base_url: String,
    pub thumbnail_selector: String,
    pub full_image_selector: String,
    /// Wait after navigation for dynamic results to render.
    pub settle_ms: u64,
    /// Wait after clicking a thumbnail for the full image to load.
    pub expand_ms: u64,
    /// Wall-clock ceiling for one browser search, launch included.
    pub max_duration_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: None,
            executable_name: "chromium".to_string(),
            auto_install: true,
            install_dir: None,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            thumbnail_selector: "img.rg_i, img.YQ4gaf".to_string(),
            full_image_selector: "img.r48jcc, img.sFlh5c, img.iPVvYb".to_string(),
            settle_ms: 2000,
            expand_ms: 1000,
            max_duration_secs: 60,
        }
    }
}

/// Settings shared by the HTTP scrape strategy and the downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub search_base_url: String,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub search_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            search_timeout_secs: 10,
            download_timeout_secs: 10,
        }
    }
}

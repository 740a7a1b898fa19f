//! Image acquisition: browser search, HTTP scrape fallback, downloads, and
//! the default-image store, coordinated by [`ImageHandler`].

pub mod browser;
pub mod download;
pub mod handler;
pub mod installer;
pub mod locator;
pub mod output;
pub mod provider;
pub mod scrape;

pub use browser::BrowserSearch;
pub use download::Downloader;
pub use handler::{select_featured_image, ImageHandler};
pub use installer::{DriverInstaller, FetcherInstaller, NoInstaller};
pub use locator::{find_browser_executable, resolve_driver_path};
pub use provider::ImageSearchProvider;
pub use scrape::{extract_image_urls, HttpScrapeSearch};

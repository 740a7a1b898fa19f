//! Primary search: a headless Chromium session driven over CDP.
//!
//! The session is owned by a single `search` call and is closed before that
//! call returns, whether extraction succeeded, failed, or hit the wall-clock
//! ceiling.

use crate::provider::{image_search_url, ImageSearchProvider, UrlSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use illustra_model::{BrowserSettings, ImageUrl};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Extra time granted to a browser shutdown beyond the search ceiling.
const CLOSE_GRACE: Duration = Duration::from_secs(5);
/// Bound on waiting for a killed browser process to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Private browser profile directory, removed when dropped.
///
/// Owned by the launch future first and by the session afterwards, so the
/// directory goes away even when a launch is cancelled by a timeout.
pub(crate) struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    pub(crate) fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "illustra_chrome_{}_{}",
            std::process::id(),
            SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(dir = %self.path.display(), error = %e, "Failed to remove browser profile dir");
            }
        }
    }
}

/// A running browser process plus the task pumping its CDP events.
///
/// Call [`BrowserSession::close`] when done. If a session is dropped without
/// being closed (panic, cancelled future) the handler task is aborted and the
/// `Browser` drop kills the child process.
pub(crate) struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    closed: bool,
    // Declared last so the profile outlives the browser fields on drop.
    _profile: ProfileDir,
}

impl BrowserSession {
    pub(crate) async fn launch(
        executable: &Path,
        settings: &BrowserSettings,
        user_agent: &str,
    ) -> Result<Self> {
        let profile = ProfileDir::create()?;

        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .request_timeout(Duration::from_secs(settings.max_duration_secs.max(1)))
            .window_size(1366, 900)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg(format!("--user-agent={user_agent}"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        info!(executable = %executable.display(), "Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "Browser handler event error");
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            closed: false,
            _profile: profile,
        })
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Shut the browser down, waiting at most `limit` for a clean exit.
    ///
    /// A failed or overdue shutdown falls back to killing the process.
    pub(crate) async fn close(&mut self, limit: Duration) {
        if self.closed {
            return;
        }
        self.closed = true;

        let started = Instant::now();
        let clean = within(limit, "close browser", self.browser.close()).await
            && within(
                limit.saturating_sub(started.elapsed()),
                "wait for browser exit",
                self.browser.wait(),
            )
            .await;

        if !clean {
            warn!("Browser did not shut down cleanly, killing process");
            let kill = async { self.browser.kill().await.unwrap_or(Ok(())) };
            within(KILL_GRACE, "kill browser", kill).await;
        }
        self.handler.abort();
        info!("Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Browser session dropped without close; aborting handler");
        }
        self.handler.abort();
    }
}

/// Await one fallible shutdown step for at most `limit`.
///
/// Returns `true` only when the step finished in time and succeeded.
async fn within<T, E, F>(limit: Duration, step: &str, fut: F) -> bool
where
    E: std::fmt::Display,
    F: std::future::Future<Output = std::result::Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(step, error = %e, "Browser shutdown step failed");
            false
        }
        Err(_) => {
            debug!(step, secs = limit.as_secs_f64(), "Browser shutdown step timed out");
            false
        }
    }
}

/// Time left for shutdown: whatever remains of the ceiling, plus a grace period.
fn close_budget(ceiling: Duration, elapsed: Duration) -> Duration {
    ceiling.saturating_sub(elapsed) + CLOSE_GRACE
}

/// Image search through a real browser.
pub struct BrowserSearch {
    executable: Option<PathBuf>,
    settings: BrowserSettings,
    user_agent: String,
}

impl BrowserSearch {
    pub fn new(executable: Option<PathBuf>, settings: BrowserSettings, user_agent: &str) -> Self {
        Self {
            executable,
            settings,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    async fn run(&self, executable: &Path, query: &str, limit: usize) -> Vec<ImageUrl> {
        let url = match image_search_url(&self.settings.search_base_url, query) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid browser search URL");
                return Vec::new();
            }
        };

        let ceiling = Duration::from_secs(self.settings.max_duration_secs);
        let started = Instant::now();

        let mut session = match tokio::time::timeout(
            ceiling,
            BrowserSession::launch(executable, &self.settings, &self.user_agent),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                warn!(error = %format!("{e:#}"), "Browser unavailable, skipping browser search");
                return Vec::new();
            }
            Err(_) => {
                warn!(secs = ceiling.as_secs(), "Timed out launching browser");
                return Vec::new();
            }
        };

        let mut found = UrlSet::new(limit);
        let remaining = ceiling.saturating_sub(started.elapsed());
        let outcome = tokio::time::timeout(
            remaining,
            collect_image_urls(session.browser(), url.as_str(), limit, &self.settings, &mut found),
        )
        .await;
        session.close(close_budget(ceiling, started.elapsed())).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %format!("{e:#}"), "Error in browser image search"),
            Err(_) => warn!(
                secs = ceiling.as_secs(),
                "Browser search hit its time limit; keeping partial results"
            ),
        }

        let urls = found.into_vec();
        info!(found = urls.len(), "Browser search finished");
        urls
    }
}

#[async_trait]
impl ImageSearchProvider for BrowserSearch {
    fn name(&self) -> &str {
        "browser"
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<ImageUrl> {
        let Some(executable) = self.executable.as_deref() else {
            warn!("Browser driver not available, skipping browser search");
            return Vec::new();
        };
        if limit == 0 {
            return Vec::new();
        }
        self.run(executable, query, limit).await
    }
}

async fn collect_image_urls(
    browser: &Browser,
    url: &str,
    limit: usize,
    settings: &BrowserSettings,
    found: &mut UrlSet,
) -> Result<()> {
    info!(url = %url, "Searching images in browser");
    let page = browser.new_page(url).await.context("Failed to open search page")?;

    tokio::time::sleep(Duration::from_millis(settings.settle_ms)).await;

    let thumbnails = page
        .find_elements(settings.thumbnail_selector.as_str())
        .await
        .context("Failed to query thumbnails")?;
    info!(count = thumbnails.len(), "Found thumbnails");

    for (index, thumbnail) in thumbnails.iter().take(limit).enumerate() {
        if found.is_full() {
            break;
        }
        match expand_thumbnail(&page, thumbnail, settings).await {
            Ok(Some(src)) => {
                if found.push(&src) {
                    info!(index, url = %src, "Found image URL");
                }
            }
            Ok(None) => debug!(index, "No full-resolution image after expanding thumbnail"),
            Err(e) => warn!(index, error = %format!("{e:#}"), "Error getting image"),
        }
    }

    if let Err(e) = page.close().await {
        debug!(error = %e, "Failed to close search page");
    }
    Ok(())
}

/// Click a thumbnail and read the `src` of the full-resolution preview.
async fn expand_thumbnail(
    page: &Page,
    thumbnail: &Element,
    settings: &BrowserSettings,
) -> Result<Option<String>> {
    thumbnail.click().await.context("Failed to click thumbnail")?;
    tokio::time::sleep(Duration::from_millis(settings.expand_ms)).await;

    let previews = page
        .find_elements(settings.full_image_selector.as_str())
        .await
        .context("Failed to query full image")?;
    let Some(preview) = previews.first() else {
        return Ok(None);
    };

    let src = preview.attribute("src").await.context("Failed to read src")?;
    Ok(src.filter(|s| s.starts_with("http")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BrowserSettings {
        BrowserSettings {
            max_duration_secs: 10,
            settle_ms: 0,
            expand_ms: 0,
            ..BrowserSettings::default()
        }
    }

    #[tokio::test]
    async fn test_missing_driver_yields_empty() {
        let search = BrowserSearch::new(None, settings(), "test-agent");
        assert!(search.executable().is_none());
        assert!(search.search("electric cars", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_skips_launch() {
        let search = BrowserSearch::new(
            Some(PathBuf::from("/nonexistent/chromium")),
            settings(),
            "test-agent",
        );
        assert!(search.search("electric cars", 0).await.is_empty());
    }

    #[test]
    fn test_profile_dir_removed_on_drop() {
        let profile = ProfileDir::create().unwrap();
        let path = profile.path().to_path_buf();
        assert!(path.is_dir());
        std::fs::write(path.join("Local State"), "{}").unwrap();

        drop(profile);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stalled_shutdown_step_gives_up() {
        let started = Instant::now();
        let stalled = std::future::pending::<std::result::Result<(), std::io::Error>>();
        assert!(!within(Duration::from_millis(50), "stall", stalled).await);
        assert!(started.elapsed() < Duration::from_secs(5));

        let failed = async { Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "gone")) };
        assert!(!within(Duration::from_secs(1), "fail", failed).await);

        let ok = async { Ok::<_, std::io::Error>(()) };
        assert!(within(Duration::from_secs(1), "ok", ok).await);
    }

    #[test]
    fn test_close_budget_always_has_grace() {
        let ceiling = Duration::from_secs(60);
        assert_eq!(
            close_budget(ceiling, Duration::from_secs(50)),
            Duration::from_secs(10) + CLOSE_GRACE
        );
        assert_eq!(close_budget(ceiling, Duration::from_secs(90)), CLOSE_GRACE);
    }

    #[tokio::test]
    async fn test_launch_failure_yields_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("not-a-browser");
        let search = BrowserSearch::new(Some(bogus), settings(), "test-agent");
        assert!(search.search("electric cars", 3).await.is_empty());
    }
}

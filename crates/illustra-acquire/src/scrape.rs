//! Fallback search: one plain HTTP GET against the image-search endpoint and
//! a regex sweep over the raw body. No JavaScript runs, so results are
//! coarser than the browser strategy's, but nothing beyond an HTTP client is
//! needed.

use crate::provider::{image_search_url, ImageSearchProvider, UrlSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use illustra_model::{HttpSettings, ImageUrl};
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, UPGRADE_INSECURE_REQUESTS,
};
use std::time::Duration;
use tracing::{info, warn};

pub struct HttpScrapeSearch {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScrapeSearch {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: browser_like_client(settings)?,
            base_url: settings.search_base_url.clone(),
        })
    }

    async fn fetch_results_page(&self, query: &str) -> Result<Option<String>> {
        let url = image_search_url(&self.base_url, query)?;
        info!(url = %url, "Fetching image search page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("Failed to fetch search page")?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "Search page returned non-success status");
            return Ok(None);
        }

        let body = response.text().await.context("Failed to read search page body")?;
        info!(bytes = body.len(), "Received search page");
        Ok(Some(body))
    }
}

#[async_trait]
impl ImageSearchProvider for HttpScrapeSearch {
    fn name(&self) -> &str {
        "http-scrape"
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<ImageUrl> {
        if limit == 0 {
            return Vec::new();
        }
        match self.fetch_results_page(query).await {
            Ok(Some(body)) => {
                let urls = extract_image_urls(&body, limit);
                info!(found = urls.len(), "Extracted image URLs from search page");
                urls
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "HTTP image search failed");
                Vec::new()
            }
        }
    }
}

/// Build a client that presents itself like a desktop browser.
pub(crate) fn browser_like_client(settings: &HttpSettings) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_str(&settings.accept)?);
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&settings.accept_language)?);
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(settings.search_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Pull `https://...(jpg|jpeg|png|webp)` URLs out of arbitrary text.
///
/// Matches are de-duplicated by exact string and capped at `limit`, keeping
/// first-seen order.
pub fn extract_image_urls(body: &str, limit: usize) -> Vec<ImageUrl> {
    let re = Regex::new(r#"(?i)https://[^\s"'<>\\()\[\]{}]+?\.(?:jpg|jpeg|png|webp)\b"#)
        .expect("valid image URL pattern");

    let mut set = UrlSet::new(limit);
    for m in re.find_iter(body) {
        if set.is_full() {
            break;
        }
        set.push(m.as_str());
    }
    set.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn as_strings(urls: Vec<ImageUrl>) -> Vec<String> {
        urls.into_iter().map(String::from).collect()
    }

    #[test]
    fn test_extract_from_mixed_markup() {
        let body = r#"
            <html><body>
            <img src="https://cdn.example.com/cars/ev-1.jpg">
            <script>var data = ["https://img.example.org/charger.PNG",640,480];</script>
            <a href="https://example.net/page.html">not an image</a>
            <div style="background:url(https://static.example.com/bg.webp)"></div>
            <img src="http://insecure.example.com/skip.jpg">
            </body></html>
        "#;
        let urls = as_strings(extract_image_urls(body, 10));
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/cars/ev-1.jpg",
                "https://img.example.org/charger.PNG",
                "https://static.example.com/bg.webp",
            ]
        );
    }

    #[test]
    fn test_extract_prefers_full_jpeg_extension() {
        let urls = as_strings(extract_image_urls("x https://a.example/photo.jpeg y", 5));
        assert_eq!(urls, vec!["https://a.example/photo.jpeg"]);
    }

    #[test]
    fn test_extract_dedups_and_caps() {
        let body = "https://a.example/1.jpg https://a.example/1.jpg \
                    https://a.example/2.jpg https://a.example/3.jpg";
        let urls = as_strings(extract_image_urls(body, 2));
        assert_eq!(urls, vec!["https://a.example/1.jpg", "https://a.example/2.jpg"]);
    }

    #[test]
    fn test_extract_nothing() {
        assert!(extract_image_urls("<html>no images here</html>", 5).is_empty());
        assert!(extract_image_urls("https://a.example/1.jpg", 0).is_empty());
    }

    fn settings_for(server: &mockito::ServerGuard) -> HttpSettings {
        HttpSettings {
            search_base_url: format!("{}/search", server.url()),
            search_timeout_secs: 5,
            ..HttpSettings::default()
        }
    }

    #[tokio::test]
    async fn test_search_sends_browser_headers_and_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "electric cars".into()),
                Matcher::UrlEncoded("tbm".into(), "isch".into()),
            ]))
            .match_header("user-agent", Matcher::Regex("Mozilla".into()))
            .match_header("accept-language", Matcher::Any)
            .match_header("upgrade-insecure-requests", "1")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<img src="https://cdn.example.com/a.jpg"><img src="https://cdn.example.com/b.png">"#)
            .create_async()
            .await;

        let search = HttpScrapeSearch::new(&settings_for(&server)).unwrap();
        let urls = as_strings(search.search("electric cars", 5).await);

        mock.assert_async().await;
        assert_eq!(urls, vec!["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.png"]);
    }

    #[tokio::test]
    async fn test_search_non_success_yields_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("https://cdn.example.com/should-not-be-read.jpg")
            .create_async()
            .await;

        let search = HttpScrapeSearch::new(&settings_for(&server)).unwrap();
        assert!(search.search("cars", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_unreachable_host_yields_empty() {
        let settings = HttpSettings {
            search_base_url: "http://127.0.0.1:9/search".to_string(),
            search_timeout_secs: 2,
            ..HttpSettings::default()
        };
        let search = HttpScrapeSearch::new(&settings).unwrap();
        assert!(search.search("cars", 5).await.is_empty());
    }
}

use async_trait::async_trait;
use illustra_model::ImageUrl;
use std::collections::HashSet;
use tracing::debug;

/// One way of turning a query into candidate image URLs.
///
/// Implementations never fail: every internal problem is logged and turned
/// into an empty (or shorter) result, so the handler can move on to the next
/// provider.
#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// At most `limit` distinct, well-formed http(s) URLs, in discovery order.
    async fn search(&self, query: &str, limit: usize) -> Vec<ImageUrl>;
}

/// Build the image-search URL for `query` against `base`.
///
/// `base` is the engine's search endpoint; `q` carries the query and
/// `tbm=isch` selects image results.
pub fn image_search_url(base: &str, query: &str) -> anyhow::Result<url::Url> {
    let url = url::Url::parse_with_params(base, &[("q", query), ("tbm", "isch")])?;
    Ok(url)
}

/// Ordered, de-duplicated, capped collection of image URLs.
#[derive(Debug)]
pub(crate) struct UrlSet {
    seen: HashSet<String>,
    urls: Vec<ImageUrl>,
    limit: usize,
}

impl UrlSet {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            urls: Vec::new(),
            limit,
        }
    }

    /// Add a raw candidate; returns `true` if it was accepted.
    ///
    /// Rejects malformed or non-http(s) strings, exact duplicates, and
    /// anything past the limit.
    pub(crate) fn push(&mut self, raw: &str) -> bool {
        if self.is_full() {
            return false;
        }
        let url = match ImageUrl::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "Rejected candidate URL");
                return false;
            }
        };
        if !self.seen.insert(url.as_str().to_string()) {
            return false;
        }
        self.urls.push(url);
        true
    }

    pub(crate) fn is_full(&self) -> bool {
        self.urls.len() >= self.limit
    }

    pub(crate) fn into_vec(self) -> Vec<ImageUrl> {
        self.urls
    }
}

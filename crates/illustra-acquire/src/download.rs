use crate::output;
use anyhow::{Context, Result};
use futures::StreamExt;
use illustra_model::{DownloadedImage, HttpSettings, ImageExtension, ImageUrl};
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Fetches image URLs one at a time and writes them into a query directory.
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.download_timeout_secs))
            .build()
            .context("Failed to build download client")?;
        Ok(Self { client })
    }

    /// Download `urls` in order into `dest_dir`.
    ///
    /// Files are named `<stem><index>.<ext>`, where the stem is the
    /// alphanumeric part of the directory name and the index is the URL's
    /// position in `urls`. Failed items are logged and skipped; the result
    /// holds only images whose bytes were completely written.
    pub async fn download(&self, urls: &[ImageUrl], dest_dir: &Path) -> Vec<DownloadedImage> {
        let stem = output::file_stem_for(dest_dir);
        let mut images = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            match self.download_one(url, dest_dir, &stem, index).await {
                Ok(Some(image)) => {
                    info!(path = %image.file_path.display(), url = %url, "Saved image");
                    images.push(image);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(index, url = %url, error = %format!("{e:#}"), "Error downloading image");
                }
            }
        }

        info!(saved = images.len(), requested = urls.len(), "Download batch finished");
        images
    }

    async fn download_one(
        &self,
        url: &ImageUrl,
        dest_dir: &Path,
        stem: &str,
        index: usize,
    ) -> Result<Option<DownloadedImage>> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            warn!(index, url = %url, status = %status, "Skipping image with non-success status");
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let extension = ImageExtension::from_content_type(content_type);
        debug!(index, content_type = ?content_type, ext = %extension, "Chose extension");

        let file_path = dest_dir.join(format!("{stem}{index}.{extension}"));
        let written = match write_body(response, &file_path).await {
            Ok(n) => n,
            Err(e) => {
                discard_partial(&file_path).await;
                return Err(e);
            }
        };

        if written == 0 {
            discard_partial(&file_path).await;
            warn!(index, url = %url, "Skipping image with empty body");
            return Ok(None);
        }

        Ok(Some(DownloadedImage {
            source_url: url.clone(),
            file_path,
            extension,
        }))
    }
}

async fn write_body(response: reqwest::Response, path: &PathBuf) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed while reading body")?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok(written)
}

async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}

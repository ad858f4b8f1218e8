//! Artifact fetcher: downloads BuildTools once.

use super::Stage;
use crate::config::DebugOptions;
use crate::context::StageContext;
use crate::errors::DebugflowError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Downloads a remote file to a local path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` to `dest`, returning the number of bytes written.
    ///
    /// Implementations must not leave a partial file at `dest` on failure.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DebugflowError>;
}

/// HTTP downloader backed by `reqwest`.
///
/// The body is streamed into a temporary file next to the destination and
/// renamed into place only once complete.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Creates a downloader with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a downloader using the given client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn download_error(url: &str, reason: impl std::fmt::Display) -> DebugflowError {
    DebugflowError::Download {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DebugflowError> {
        let parent = dest
            .parent()
            .ok_or_else(|| download_error(url, format!("{} has no parent directory", dest.display())))?;
        tokio::fs::create_dir_all(parent).await?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(url, e))?;

        if !response.status().is_success() {
            return Err(download_error(url, format!("HTTP {}", response.status())));
        }

        // Dropped (and deleted) on any early return below.
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(parent)?;
        let mut file = tokio::fs::File::from_std(temp.reopen()?);
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| download_error(url, e))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        if written == 0 {
            return Err(download_error(url, "empty response body"));
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        temp.persist(dest).map_err(|e| e.error)?;
        Ok(written)
    }
}

/// Ensures `dest` exists, downloading it from `url` if it does not.
///
/// Returns `true` if a download happened. An existing file is trusted as-is.
pub async fn fetch_artifact(
    downloader: &dyn Downloader,
    url: &str,
    dest: &Path,
) -> Result<bool, DebugflowError> {
    if dest.exists() {
        debug!(path = %dest.display(), "Artifact already present, not downloading");
        return Ok(false);
    }

    info!(url = %url, path = %dest.display(), "Downloading");
    let bytes = downloader.download(url, dest).await?;
    info!(path = %dest.display(), bytes, "Download finished");
    Ok(true)
}

/// Downloads the BuildTools jar unless it is already present.
pub struct FetchBuildToolsStage {
    options: Arc<DebugOptions>,
    downloader: Arc<dyn Downloader>,
}

impl FetchBuildToolsStage {
    /// Stage name.
    pub const NAME: &'static str = "download-build-tools";

    /// Creates the stage.
    #[must_use]
    pub fn new(options: Arc<DebugOptions>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            options,
            downloader,
        }
    }
}

impl std::fmt::Debug for FetchBuildToolsStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchBuildToolsStage")
            .field("destination", &self.options.build_tool_jar())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for FetchBuildToolsStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Download the BuildTools."
    }

    fn skip_reason(&self) -> Option<String> {
        let jar = self.options.build_tool_jar();
        jar.is_file()
            .then(|| format!("{} already present", jar.display()))
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        ctx.ensure_not_cancelled()?;
        let fetch = fetch_artifact(
            self.downloader.as_ref(),
            self.options.build_tool_url(),
            self.options.build_tool_jar(),
        );

        tokio::select! {
            downloaded = fetch => {
                if downloaded? {
                    ctx.emit("artifact.downloaded", serde_json::json!({
                        "path": self.options.build_tool_jar().display().to_string(),
                    }));
                }
                Ok(())
            }
            () = ctx.token().cancelled() => ctx.ensure_not_cancelled(),
        }
    }
}

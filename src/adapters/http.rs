//! HTTP downloader backed by reqwest.
//!
//! Streams the remote file into a temporary location and hands the path
//! to the ingestion pipeline. This backend has no interactive cancel
//! path: it either acquires the file or fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use super::{Acquisition, DownloadRequest, DownloadedFile, Downloader};

/// Downloader that fetches publications over HTTP(S)
#[derive(Debug, Default)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create a downloader with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a downloader with a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, request: &DownloadRequest) -> Result<Acquisition<DownloadedFile>> {
        let mut response = self
            .client
            .get(&request.url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", request.url))?
            .error_for_status()
            .with_context(|| format!("Server rejected download of {}", request.url))?;

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());

        let temp = tempfile::Builder::new()
            .prefix("libris-download-")
            .tempfile()
            .context("Failed to create temporary download file")?;
        let temp_path = temp.into_temp_path();

        let mut out = tokio::fs::File::create(&temp_path)
            .await
            .context("Failed to open temporary download file")?;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Download of {} was interrupted", request.url))?
        {
            out.write_all(&chunk)
                .await
                .context("Failed to write download chunk")?;
        }
        out.flush().await.context("Failed to flush download")?;
        drop(out);

        let local_path = temp_path
            .keep()
            .context("Failed to persist downloaded file")?;

        Ok(Acquisition::Acquired(DownloadedFile {
            local_path,
            media_type,
        }))
    }
}

//! Package Fetcher
//!
//! Pulls the whole update package into memory for the blob delivery method.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Download error types
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Package held in memory, ready to be handed to the host as a local object
#[derive(Debug, Clone, PartialEq)]
pub struct PackageBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl PackageBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Where the blob method gets package bytes from
#[async_trait]
pub trait PackageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PackageBlob, DownloadError>;
}

pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Largest buffer reserved up front from an advertised `Content-Length`
pub const MAX_PREALLOC_BYTES: u64 = 8 * 1024 * 1024;

/// Packages above this size are refused
pub const DEFAULT_MAX_PACKAGE_BYTES: u64 = 512 * 1024 * 1024;

/// Download manager for update packages
pub struct Downloader {
    client: reqwest::Client,
    on_progress: Option<ProgressFn>,
    max_bytes: u64,
}

impl Downloader {
    /// Create a new downloader
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Zefest-Updater")
            .build()
            .unwrap_or_default();
        Self {
            client,
            on_progress: None,
            max_bytes: DEFAULT_MAX_PACKAGE_BYTES,
        }
    }

    /// Report `(downloaded, total)` after every received chunk; total is 0 when unknown
    pub fn with_progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    /// Refuse packages larger than `max_bytes`, advertised or received
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn check_size(&self, size: u64) -> Result<(), DownloadError> {
        if size > self.max_bytes {
            return Err(DownloadError::InvalidResponse(format!(
                "package of {} bytes exceeds the {} byte limit",
                size, self.max_bytes
            )));
        }
        Ok(())
    }
}

/// Sibling path a package is written to before being renamed into place
pub fn partial_path(dest: &Path) -> PathBuf {
    dest.with_extension("partial")
}

/// Write package bytes to `dest` through its `.partial` sibling
pub async fn write_package(dest: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(dest);
    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, dest).await
}

impl Downloader {
    async fn open(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }
        self.check_size(content_length(&response))?;
        Ok(response)
    }

    /// Stream the package straight to disk; returns the number of bytes written
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.open(url).await?;
        let total_size = content_length(&response);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(dest);
        let mut file = tokio::fs::File::create(&partial).await?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Network(e.to_string()))?;
            written += chunk.len() as u64;
            if let Err(e) = self.check_size(written) {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
            file.write_all(&chunk).await?;
            if let Some(on_progress) = &self.on_progress {
                on_progress(written, total_size);
            }
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;
        debug!(url, path = %dest.display(), bytes = written, "package written");
        Ok(written)
    }
}

fn content_length(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0)
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageSource for Downloader {
    async fn fetch(&self, url: &str) -> Result<PackageBlob, DownloadError> {
        let response = self.open(url).await?;
        let total_size = content_length(&response);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // The header is untrusted; reserve at most a bounded amount
        let mut bytes = Vec::with_capacity(total_size.min(MAX_PREALLOC_BYTES) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Network(e.to_string()))?;
            self.check_size((bytes.len() + chunk.len()) as u64)?;
            bytes.extend_from_slice(&chunk);
            if let Some(on_progress) = &self.on_progress {
                on_progress(bytes.len() as u64, total_size);
            }
        }

        debug!(url, bytes = bytes.len(), "package fetched");
        Ok(PackageBlob {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    /// Serves two bytes while advertising `content_length`
    async fn lying_server(content_length: u64) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\nPK",
                    content_length
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}/app.apk", addr)
    }

    #[tokio::test]
    async fn test_oversized_content_length_is_refused() {
        let url = lying_server(1_000_000_000_000_000).await;

        let result = Downloader::new().fetch(&url).await;

        assert!(matches!(result, Err(DownloadError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_huge_content_length_does_not_reserve_it() {
        let url = lying_server(1_000_000_000_000_000).await;

        // Limit lifted: the body is actually read and ends early
        let result = Downloader::new().with_max_bytes(u64::MAX).fetch(&url).await;

        assert!(matches!(result, Err(DownloadError::Network(_))));
    }

    #[tokio::test]
    async fn test_download_to_refuses_oversized_package() {
        let url = lying_server(DEFAULT_MAX_PACKAGE_BYTES + 1).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app-update.apk");

        let result = Downloader::new().download_to(&url, &dest).await;

        assert!(matches!(result, Err(DownloadError::InvalidResponse(_))));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_small_limit_rejects_body() {
        let url = lying_server(2).await;

        let result = Downloader::new().with_max_bytes(1).fetch(&url).await;
        assert!(matches!(result, Err(DownloadError::InvalidResponse(_))));

        let blob = Downloader::new().fetch(&url).await.unwrap();
        assert_eq!(blob.bytes, b"PK");
    }

    #[test]
    fn test_blob_len() {
        let blob = PackageBlob {
            bytes: vec![1, 2, 3],
            content_type: Some("application/vnd.android.package-archive".to_string()),
        };
        assert_eq!(blob.len(), 3);
        assert!(!blob.is_empty());
    }

    #[tokio::test]
    async fn test_write_package_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("app-update.apk");

        write_package(&dest, b"PK").await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"PK");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_to_unreachable_host_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app-update.apk");

        let result = Downloader::new()
            .download_to("http://127.0.0.1:1/app.apk", &dest)
            .await;

        assert!(matches!(result, Err(DownloadError::Network(_))));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let downloader = Downloader::new();
        let result = downloader.fetch("http://127.0.0.1:1/app.apk").await;
        assert!(matches!(result, Err(DownloadError::Network(_))));
    }
}

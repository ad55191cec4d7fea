//! Platform Detection and Desktop Delivery Host
//!
//! Outside the mobile shell there is no bridge, no DOM and no share sheet. The
//! desktop host opens packages with the system opener and saves fetched
//! packages into the user's download directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::updater::download::{write_package, PackageBlob};
use crate::engine::updater::host::{DeliveryHost, HostError, HostResponse};

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    MacOS,
    Linux,
    Windows,
    Unknown,
}

impl Platform {
    /// Detect current platform
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Unknown
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }

    /// Where fetched packages are written
    pub fn download_dir(&self) -> Option<PathBuf> {
        dirs::download_dir().or_else(|| dirs::data_dir().map(|d| d.join("zefest").join("downloads")))
    }

    /// Default location of the persisted client store
    pub fn storage_path(&self) -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("zefest").join("storage.json"))
    }

    /// Program and leading arguments used to open a URL
    pub fn opener(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Platform::Linux => Some(("xdg-open", &[])),
            Platform::MacOS => Some(("open", &[])),
            Platform::Windows => Some(("cmd", &["/C", "start", ""])),
            _ => None,
        }
    }
}

/// System opener resolved on PATH
#[derive(Debug, Clone)]
pub struct Opener {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Opener {
    pub fn detect(platform: Platform) -> Option<Self> {
        let (program, args) = platform.opener()?;
        let program = which::which(program).ok()?;
        Some(Self {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }
}

pub struct DesktopHost {
    platform: Platform,
    download_dir: PathBuf,
    opener: Option<Opener>,
}

impl DesktopHost {
    pub fn new() -> Self {
        let platform = Platform::current();
        let download_dir = platform
            .download_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("zefest"));
        Self {
            platform,
            download_dir,
            opener: Opener::detect(platform),
        }
    }

    pub fn with_download_dir(mut self, dir: &Path) -> Self {
        self.download_dir = dir.to_path_buf();
        self
    }

    /// Never launch external programs; packages can only be saved
    pub fn without_opener(mut self) -> Self {
        self.opener = None;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

impl Default for DesktopHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryHost for DesktopHost {
    async fn open_window(&self, url: &str) -> Result<HostResponse, HostError> {
        let Some(opener) = &self.opener else {
            return Ok(HostResponse::Unsupported);
        };

        debug!(program = %opener.program.display(), url, "launching system opener");
        let status = Command::new(&opener.program)
            .args(&opener.args)
            .arg(url)
            .status()
            .await
            .map_err(|e| HostError::CallFailed(e.to_string()))?;

        if status.success() {
            Ok(HostResponse::Accepted)
        } else {
            Ok(HostResponse::Declined(format!("opener exited with {}", status)))
        }
    }

    fn supports_blob_save(&self) -> bool {
        true
    }

    async fn save_blob(&self, blob: PackageBlob, file_name: &str) -> Result<HostResponse, HostError> {
        let dest = self.download_dir.join(file_name);
        write_package(&dest, &blob.bytes)
            .await
            .map_err(|e| HostError::CallFailed(e.to_string()))?;

        info!(path = %dest.display(), bytes = blob.len(), "package saved");
        Ok(HostResponse::Accepted)
    }

    async fn navigate(&self, url: &str) -> Result<HostResponse, HostError> {
        debug!(url, "no page to navigate outside the app shell");
        Ok(HostResponse::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_platform_detection() {
        let platform = Platform::current();

        #[cfg(target_os = "linux")]
        assert_eq!(platform, Platform::Linux);

        #[cfg(target_os = "macos")]
        assert_eq!(platform, Platform::MacOS);

        assert!(!platform.is_mobile() || cfg!(any(target_os = "android", target_os = "ios")));
    }

    #[tokio::test]
    async fn test_save_blob_writes_package() {
        let dir = tempdir().unwrap();
        let host = DesktopHost::new()
            .with_download_dir(&dir.path().join("dl"))
            .without_opener();

        let blob = PackageBlob {
            bytes: b"PK\x03\x04".to_vec(),
            content_type: None,
        };
        let response = host.save_blob(blob, "app-update.apk").await.unwrap();

        assert_eq!(response, HostResponse::Accepted);
        let written = std::fs::read(dir.path().join("dl").join("app-update.apk")).unwrap();
        assert_eq!(written, b"PK\x03\x04");
        assert!(!dir.path().join("dl").join("app-update.partial").exists());
    }

    #[tokio::test]
    async fn test_without_opener_window_is_unsupported() {
        let host = DesktopHost::new().without_opener();
        assert_eq!(
            host.open_window("https://cdn.example/app.apk").await,
            Ok(HostResponse::Unsupported)
        );
        assert_eq!(host.navigate("u").await, Ok(HostResponse::Unsupported));
    }
}

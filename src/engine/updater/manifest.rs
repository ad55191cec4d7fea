//! Update Manifest
//!
//! The small JSON descriptor published next to each Android release.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Manifest endpoint returned HTTP {0}")]
    Status(u16),
    #[error("Invalid manifest: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Manifest as served, e.g. `{"android_version":"2.0.0","apk_url":"…","force":false}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateManifest {
    #[serde(rename = "android_version")]
    pub available_version: String,
    #[serde(rename = "apk_url")]
    pub package_url: String,
    #[serde(rename = "force", default)]
    pub force_update: bool,
}

/// Fetches the manifest fresh on every check
pub struct ManifestClient {
    manifest_url: String,
    client: reqwest::Client,
}

impl ManifestClient {
    pub fn new(manifest_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Zefest-Updater")
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            manifest_url: manifest_url.to_string(),
            client,
        }
    }

    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }

    pub async fn fetch(&self) -> Result<UpdateManifest, ManifestError> {
        let response = self.client.get(&self.manifest_url).send().await?;
        if !response.status().is_success() {
            return Err(ManifestError::Status(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;
        let manifest: UpdateManifest = serde_json::from_slice(&bytes)?;
        debug!(
            version = %manifest.available_version,
            force = manifest.force_update,
            "fetched update manifest"
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let manifest: UpdateManifest = serde_json::from_str(
            r#"{"android_version":"2.1.0","apk_url":"https://cdn.example/app.apk","force":true}"#,
        )
        .unwrap();
        assert_eq!(manifest.available_version, "2.1.0");
        assert_eq!(manifest.package_url, "https://cdn.example/app.apk");
        assert!(manifest.force_update);
    }

    #[test]
    fn test_force_defaults_to_false() {
        let manifest: UpdateManifest =
            serde_json::from_str(r#"{"android_version":"2.1.0","apk_url":"u"}"#).unwrap();
        assert!(!manifest.force_update);
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let parsed: Result<UpdateManifest, _> = serde_json::from_str(r#"{"apk_url":"u"}"#);
        assert!(parsed.is_err());
    }
}

//! Delivery Host Capabilities
//!
//! What the surrounding environment can do with a package URL. Every capability is
//! optional: the default implementations report `Unsupported` and the sequencer
//! moves on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::download::PackageBlob;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Host call failed: {0}")]
    CallFailed(String),
}

/// How the host answered a capability call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostResponse {
    Accepted,
    /// Capability exists but refused, e.g. a blocked popup
    Declined(String),
    /// Capability does not exist in this host
    Unsupported,
}

/// The two shapes a native download bridge can be injected as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeShape {
    /// A bare download function
    InjectedFunction,
    /// An object exposing a download method
    DownloaderObject,
}

impl BridgeShape {
    pub const ALL: [BridgeShape; 2] = [BridgeShape::InjectedFunction, BridgeShape::DownloaderObject];
}

/// Payload for the share sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub title: String,
    pub text: String,
    pub url: String,
    pub dialog_title: String,
}

#[async_trait]
pub trait DeliveryHost: Send + Sync {
    async fn call_native_bridge(
        &self,
        _shape: BridgeShape,
        _url: &str,
    ) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }

    /// Create a hidden anchor with a download attribute, click it, remove it
    async fn trigger_anchor(&self, _url: &str, _file_name: &str) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }

    async fn open_in_app_browser(&self, _url: &str) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }

    /// Open a new window or tab; a blocked (null) handle is `Declined`
    async fn open_window(&self, _url: &str) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }

    /// Whether `save_blob` is implemented; checked before the package is fetched
    fn supports_blob_save(&self) -> bool {
        false
    }

    /// Wrap fetched bytes as a downloadable object and trigger it
    async fn save_blob(
        &self,
        _blob: PackageBlob,
        _file_name: &str,
    ) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }

    /// Navigate the current page to the URL; cannot observe what happens next
    async fn navigate(&self, _url: &str) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }

    async fn share(&self, _request: ShareRequest) -> Result<HostResponse, HostError> {
        Ok(HostResponse::Unsupported)
    }
}

//! Update Prompt Controller
//!
//! Ties the manifest, the prompt gate and the persisted version markers together
//! and launches the delivery sequencer when the user accepts an update.
//!
//! Marker writes are optimistic: accepting an offer records the version as
//! installed before delivery has even started, and nothing reconciles the marker
//! if delivery later fails silently. The `DeliveryTask` still exposes the
//! outcome for callers that want to observe it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::download::PackageSource;
use super::gate::{self, GateInput, PromptDecision, UpdateOffer};
use super::host::DeliveryHost;
use super::manifest::{ManifestClient, ManifestError, UpdateManifest};
use super::sequencer::{DeliverySequencer, SequencerOptions};
use super::state::{DeliveryReport, DeliveryStatus};
use crate::engine::config::UpdateConfig;
use crate::engine::storage::{KeyValueStore, StorageError, StorageKey};

/// The two persisted version decisions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarkers {
    pub installed: Option<String>,
    pub dismissed: Option<String>,
}

/// One gate evaluation and the version it was made against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub current_version: String,
    pub decision: PromptDecision,
    pub offer: Option<UpdateOffer>,
}

/// Handle on a delivery running in the background
pub struct DeliveryTask {
    handle: JoinHandle<DeliveryReport>,
    cancel: CancellationToken,
    status: watch::Receiver<DeliveryStatus>,
}

impl DeliveryTask {
    /// Abandon the run; methods already in flight are interrupted
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeliveryStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end; `None` if the task panicked or was aborted
    pub async fn wait(self) -> Option<DeliveryReport> {
        match self.handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("delivery task ended abnormally: {}", e);
                None
            }
        }
    }
}

pub struct UpdateController {
    store: Arc<dyn KeyValueStore>,
    manifests: ManifestClient,
    sequencer: Arc<DeliverySequencer>,
    bundled_version: String,
}

impl UpdateController {
    pub fn new(
        config: &UpdateConfig,
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn DeliveryHost>,
        source: Arc<dyn PackageSource>,
    ) -> Self {
        let sequencer = DeliverySequencer::new(host, source, SequencerOptions::from(config));
        Self {
            store,
            manifests: ManifestClient::new(&config.manifest_url, config.method_timeout()),
            sequencer: Arc::new(sequencer),
            bundled_version: config.bundled_version.clone(),
        }
    }

    pub fn sequencer(&self) -> Arc<DeliverySequencer> {
        self.sequencer.clone()
    }

    pub fn markers(&self) -> VersionMarkers {
        VersionMarkers {
            installed: self.store.get(StorageKey::InstalledVersion),
            dismissed: self.store.get(StorageKey::DismissedVersion),
        }
    }

    pub fn clear_markers(&self) -> Result<(), StorageError> {
        self.store.remove(StorageKey::InstalledVersion)?;
        self.store.remove(StorageKey::DismissedVersion)
    }

    /// Last version the user chose to install, else the version shipped in the bundle
    pub fn current_version(&self) -> String {
        self.store
            .get(StorageKey::InstalledVersion)
            .unwrap_or_else(|| self.bundled_version.clone())
    }

    pub fn manifest_url(&self) -> &str {
        self.manifests.manifest_url()
    }

    /// Run the prompt gate against a manifest and the stored markers
    pub fn evaluate_manifest(&self, manifest: &UpdateManifest) -> Option<UpdateOffer> {
        self.gate_report(manifest, None).offer
    }

    /// Full gate evaluation; `current_override` replaces the resolved current version
    pub fn gate_report(&self, manifest: &UpdateManifest, current_override: Option<&str>) -> GateReport {
        let current = current_override
            .map(str::to_string)
            .unwrap_or_else(|| self.current_version());
        let markers = self.markers();
        let input = GateInput {
            manifest,
            current_version: &current,
            installed_marker: markers.installed.as_deref(),
            dismissed_marker: markers.dismissed.as_deref(),
        };

        let decision = gate::evaluate(input);
        debug!(
            available = %manifest.available_version,
            current = %current,
            installed = ?markers.installed,
            dismissed = ?markers.dismissed,
            force = manifest.force_update,
            ?decision,
            "update gate evaluated"
        );
        let offer = gate::offer_for(input);
        GateReport {
            current_version: current,
            decision,
            offer,
        }
    }

    pub async fn fetch_manifest(&self) -> Result<UpdateManifest, ManifestError> {
        self.manifests.fetch().await
    }

    /// Fetch the manifest and decide; a failed fetch hides the prompt for this session
    pub async fn check(&self) -> Option<UpdateOffer> {
        match self.fetch_manifest().await {
            Ok(manifest) => self.evaluate_manifest(&manifest),
            Err(e) => {
                warn!(url = %self.manifests.manifest_url(), "error checking for updates: {}", e);
                None
            }
        }
    }

    /// User accepted the offer: record it, then deliver in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn download(&self, offer: &UpdateOffer) -> DeliveryTask {
        if let Err(e) = self.store.set(StorageKey::InstalledVersion, &offer.version) {
            warn!("could not record installed version {}: {}", offer.version, e);
        }
        if let Err(e) = self.store.remove(StorageKey::DismissedVersion) {
            warn!("could not clear dismissed version: {}", e);
        }
        info!(version = %offer.version, forced = offer.forced, "update accepted");

        let cancel = CancellationToken::new();
        let status = self.sequencer.subscribe();
        let handle = {
            let sequencer = self.sequencer.clone();
            let cancel = cancel.clone();
            let url = offer.package_url.clone();
            tokio::spawn(async move { sequencer.run(&url, &cancel).await })
        };

        DeliveryTask {
            handle,
            cancel,
            status,
        }
    }

    /// User postponed the offer
    pub fn dismiss(&self, offer: &UpdateOffer) {
        if let Err(e) = self.store.set(StorageKey::DismissedVersion, &offer.version) {
            warn!("could not record dismissed version {}: {}", offer.version, e);
        }
        info!(version = %offer.version, "update dismissed");
    }
}

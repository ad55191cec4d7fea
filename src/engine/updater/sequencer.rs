//! Delivery Sequencer
//!
//! Hands a package URL to the host, trying each delivery method in a fixed order
//! until one reports success. Every method is awaited to completion under a
//! bounded timeout. When all of them fail the page is navigated to the URL as a
//! last resort. A run never returns an error; it always ends in a terminal
//! `DeliveryStatus`.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::download::{DownloadError, PackageSource};
use super::host::{BridgeShape, DeliveryHost, HostError, HostResponse, ShareRequest};
use super::state::{AttemptOutcome, DeliveryMethod, DeliveryReport, DeliveryStatus};
use crate::engine::config::UpdateConfig;

#[derive(Debug, Clone)]
pub struct SequencerOptions {
    /// Upper bound for a single method, including the package fetch
    pub method_timeout: Duration,
    pub file_name: String,
    pub share_title: String,
    pub share_text: String,
    pub share_dialog_title: String,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self::from(&UpdateConfig::default())
    }
}

impl From<&UpdateConfig> for SequencerOptions {
    fn from(config: &UpdateConfig) -> Self {
        Self {
            method_timeout: config.method_timeout(),
            file_name: config.package_file_name.clone(),
            share_title: config.share_title.clone(),
            share_text: config.share_text.clone(),
            share_dialog_title: config.share_dialog_title.clone(),
        }
    }
}

fn outcome_of(response: Result<HostResponse, HostError>) -> AttemptOutcome {
    match response {
        Ok(HostResponse::Accepted) => AttemptOutcome::Delivered,
        Ok(HostResponse::Declined(reason)) => AttemptOutcome::Declined { reason },
        Ok(HostResponse::Unsupported) => AttemptOutcome::Unsupported,
        Err(e) => AttemptOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

pub struct DeliverySequencer {
    host: Arc<dyn DeliveryHost>,
    source: Arc<dyn PackageSource>,
    options: SequencerOptions,
    status: watch::Sender<DeliveryStatus>,
}

impl DeliverySequencer {
    pub fn new(
        host: Arc<dyn DeliveryHost>,
        source: Arc<dyn PackageSource>,
        options: SequencerOptions,
    ) -> Self {
        let (status, _) = watch::channel(DeliveryStatus::Idle);
        Self {
            host,
            source,
            options,
            status,
        }
    }

    /// Follow status transitions of the current run
    pub fn subscribe(&self) -> watch::Receiver<DeliveryStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status.borrow().clone()
    }

    fn publish(&self, status: &DeliveryStatus) {
        self.status.send_replace(status.clone());
    }

    /// Run the whole fallback chain for `url`
    pub async fn run(&self, url: &str, cancel: &CancellationToken) -> DeliveryReport {
        let mut report = DeliveryReport::new(url);
        info!(url, "starting package delivery");

        for method in DeliveryMethod::ORDER {
            if cancel.is_cancelled() {
                return self.abandon(report);
            }

            report.start_attempt(method);
            self.publish(&report.status);

            let started_at = Utc::now();
            let clock = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => AttemptOutcome::Interrupted,
                attempt = tokio::time::timeout(self.options.method_timeout, self.attempt(method, url)) => {
                    attempt.unwrap_or(AttemptOutcome::TimedOut)
                }
            };

            match &outcome {
                AttemptOutcome::Delivered => {
                    info!("delivery triggered using method {} ({})", method.position(), method)
                }
                AttemptOutcome::Unsupported => debug!("{} not available in this host", method),
                AttemptOutcome::Declined { reason } => warn!("{} declined: {}", method, reason),
                AttemptOutcome::Failed { reason } => error!("{} failed: {}", method, reason),
                AttemptOutcome::TimedOut => warn!(
                    "{} timed out after {:?}",
                    method, self.options.method_timeout
                ),
                AttemptOutcome::Interrupted => debug!("{} interrupted", method),
            }

            let interrupted = outcome == AttemptOutcome::Interrupted;
            let delivered = outcome.is_delivered();
            report.record_attempt(method, outcome, started_at, clock.elapsed());

            if interrupted {
                return self.abandon(report);
            }
            if delivered {
                self.publish(&report.status);
                return report;
            }
        }

        if cancel.is_cancelled() {
            return self.abandon(report);
        }

        error!("all delivery methods failed, navigating to the package as final fallback");
        match tokio::time::timeout(self.options.method_timeout, self.host.navigate(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("final navigation reported: {}", e),
            Err(_) => debug!("final navigation did not return in time"),
        }
        report.mark_forced_fallback();
        self.publish(&report.status);
        report
    }

    fn abandon(&self, mut report: DeliveryReport) -> DeliveryReport {
        info!(url = %report.package_url, "package delivery abandoned");
        report.mark_abandoned();
        self.publish(&report.status);
        report
    }

    async fn attempt(&self, method: DeliveryMethod, url: &str) -> AttemptOutcome {
        let host = self.host.as_ref();
        match method {
            DeliveryMethod::NativeBridge => self.attempt_native_bridge(url).await,
            DeliveryMethod::AnchorDownload => {
                outcome_of(host.trigger_anchor(url, &self.options.file_name).await)
            }
            DeliveryMethod::InAppBrowser => outcome_of(host.open_in_app_browser(url).await),
            DeliveryMethod::WindowOpen => outcome_of(host.open_window(url).await),
            DeliveryMethod::BlobDownload => self.attempt_blob(url).await,
            DeliveryMethod::PageNavigation => match host.navigate(url).await {
                // Once issued, navigation counts as delivered
                Ok(HostResponse::Unsupported) => AttemptOutcome::Unsupported,
                Ok(_) => AttemptOutcome::Delivered,
                Err(e) => AttemptOutcome::Failed {
                    reason: e.to_string(),
                },
            },
            DeliveryMethod::ShareSheet => {
                let request = ShareRequest {
                    title: self.options.share_title.clone(),
                    text: self.options.share_text.clone(),
                    url: url.to_string(),
                    dialog_title: self.options.share_dialog_title.clone(),
                };
                outcome_of(host.share(request).await)
            }
        }
    }

    /// Try both bridge shapes; the method is unsupported only if neither exists
    async fn attempt_native_bridge(&self, url: &str) -> AttemptOutcome {
        let mut outcome = AttemptOutcome::Unsupported;
        for shape in BridgeShape::ALL {
            match outcome_of(self.host.call_native_bridge(shape, url).await) {
                AttemptOutcome::Delivered => {
                    debug!(?shape, "native bridge accepted the package");
                    return AttemptOutcome::Delivered;
                }
                AttemptOutcome::Unsupported => continue,
                other => {
                    debug!(?shape, "native bridge attempt: {:?}", other);
                    outcome = other;
                }
            }
        }
        outcome
    }

    async fn attempt_blob(&self, url: &str) -> AttemptOutcome {
        if !self.host.supports_blob_save() {
            return AttemptOutcome::Unsupported;
        }
        match self.source.fetch(url).await {
            Ok(blob) => outcome_of(self.host.save_blob(blob, &self.options.file_name).await),
            Err(DownloadError::InvalidResponse(reason)) => AttemptOutcome::Declined { reason },
            Err(e) => AttemptOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

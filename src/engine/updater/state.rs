//! Delivery State Machine
//!
//! Tracks one sequencer run: which method is being attempted, what each attempt
//! produced, and how the run ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery mechanisms in the order the sequencer tries them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Host-injected download function or downloader object
    NativeBridge,
    /// Transient anchor element pointing at the package URL
    AnchorDownload,
    /// In-app browser plugin
    InAppBrowser,
    /// New window or tab
    WindowOpen,
    /// Fetch the whole package, then hand it over as a local object
    BlobDownload,
    /// Navigate the page to the package URL
    PageNavigation,
    /// Share sheet plugin
    ShareSheet,
}

impl DeliveryMethod {
    pub const ORDER: [DeliveryMethod; 7] = [
        DeliveryMethod::NativeBridge,
        DeliveryMethod::AnchorDownload,
        DeliveryMethod::InAppBrowser,
        DeliveryMethod::WindowOpen,
        DeliveryMethod::BlobDownload,
        DeliveryMethod::PageNavigation,
        DeliveryMethod::ShareSheet,
    ];

    /// 1-based position in the attempt order
    pub fn position(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|m| m == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeliveryMethod::NativeBridge => "native bridge",
            DeliveryMethod::AnchorDownload => "anchor download",
            DeliveryMethod::InAppBrowser => "in-app browser",
            DeliveryMethod::WindowOpen => "window open",
            DeliveryMethod::BlobDownload => "blob download",
            DeliveryMethod::PageNavigation => "page navigation",
            DeliveryMethod::ShareSheet => "share sheet",
        };
        f.write_str(name)
    }
}

/// Result of a single method attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Delivered,
    /// Capability present but it refused (blocked window, non-OK response)
    Declined { reason: String },
    /// Capability absent in this host
    Unsupported,
    /// Capability raised an error
    Failed { reason: String },
    TimedOut,
    /// Run was abandoned while this attempt was in flight
    Interrupted,
}

impl AttemptOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, AttemptOutcome::Delivered)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub method: DeliveryMethod,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Current status of a delivery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Not started
    Idle,
    Attempting { method: DeliveryMethod },
    Succeeded { method: DeliveryMethod },
    /// Every method failed; the unconditional navigation was issued
    ForcedFallback,
    /// Cancelled before reaching a terminal state
    Abandoned,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Succeeded { .. }
                | DeliveryStatus::ForcedFallback
                | DeliveryStatus::Abandoned
        )
    }
}

/// Full account of one run, returned when the sequencer finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub package_url: String,
    pub status: DeliveryStatus,
    pub attempts: Vec<AttemptRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeliveryReport {
    pub fn new(package_url: &str) -> Self {
        Self {
            package_url: package_url.to_string(),
            status: DeliveryStatus::Idle,
            attempts: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Transition to attempting a method
    pub fn start_attempt(&mut self, method: DeliveryMethod) {
        self.status = DeliveryStatus::Attempting { method };
    }

    /// Record how an attempt ended; a delivered attempt ends the run
    pub fn record_attempt(
        &mut self,
        method: DeliveryMethod,
        outcome: AttemptOutcome,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) {
        if outcome.is_delivered() {
            self.status = DeliveryStatus::Succeeded { method };
            self.finished_at = Some(Utc::now());
        }
        self.attempts.push(AttemptRecord {
            method,
            outcome,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    pub fn mark_forced_fallback(&mut self) {
        self.status = DeliveryStatus::ForcedFallback;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_abandoned(&mut self) {
        self.status = DeliveryStatus::Abandoned;
        self.finished_at = Some(Utc::now());
    }

    pub fn was_attempted(&self, method: DeliveryMethod) -> bool {
        self.attempts.iter().any(|a| a.method == method)
    }

    /// Method that delivered the package, if any
    pub fn delivered_by(&self) -> Option<DeliveryMethod> {
        match self.status {
            DeliveryStatus::Succeeded { method } => Some(method),
            _ => None,
        }
    }
}

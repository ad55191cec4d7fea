//! Zefest Update System
//!
//! Prompts for new Android builds and hands the package to whatever delivery
//! mechanism the host offers.
//!
//! Components:
//! - `version` - Dot-integer version comparison
//! - `manifest` - Release manifest model and fetcher
//! - `gate` - Prompt show/hide decision
//! - `state` - Delivery state machine and report
//! - `host` - Host delivery capabilities
//! - `download` - Package fetch for the blob method
//! - `sequencer` - Ordered delivery fallback chain
//! - `controller` - Prompt lifecycle and version markers

pub mod version;
pub mod manifest;
pub mod gate;
pub mod state;
pub mod host;
pub mod download;
pub mod sequencer;
pub mod controller;

pub use controller::{DeliveryTask, GateReport, UpdateController, VersionMarkers};
pub use gate::{PromptDecision, UpdateOffer};
pub use manifest::UpdateManifest;
pub use sequencer::DeliverySequencer;
pub use state::{DeliveryMethod, DeliveryReport, DeliveryStatus};
pub use version::is_newer;

//! Update Prompt Gate
//!
//! Decides whether the update prompt is shown for a freshly fetched manifest.

use serde::{Deserialize, Serialize};

use super::manifest::UpdateManifest;
use super::version::is_newer;

/// Why the prompt stays hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HideReason {
    /// Manifest version is exactly the current one
    UpToDate,
    AlreadyInstalled,
    Dismissed,
    /// Older or equivalent version without the force flag
    NotNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum PromptDecision {
    Hidden(HideReason),
    ShowForced,
    ShowOptional,
}

impl PromptDecision {
    pub fn is_shown(&self) -> bool {
        !matches!(self, PromptDecision::Hidden(_))
    }
}

/// What the prompt offers when shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOffer {
    pub version: String,
    pub package_url: String,
    pub forced: bool,
}

/// Inputs to one gate evaluation
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub manifest: &'a UpdateManifest,
    pub current_version: &'a str,
    pub installed_marker: Option<&'a str>,
    pub dismissed_marker: Option<&'a str>,
}

/// Pure decision over the manifest and the two persisted markers
pub fn evaluate(input: GateInput<'_>) -> PromptDecision {
    let available = input.manifest.available_version.as_str();

    if available == input.current_version {
        return PromptDecision::Hidden(HideReason::UpToDate);
    }

    let newer = is_newer(available, input.current_version);
    let already_installed = input.installed_marker == Some(available);
    let was_dismissed = input.dismissed_marker == Some(available);

    if already_installed {
        PromptDecision::Hidden(HideReason::AlreadyInstalled)
    } else if was_dismissed {
        PromptDecision::Hidden(HideReason::Dismissed)
    } else if input.manifest.force_update {
        PromptDecision::ShowForced
    } else if newer {
        PromptDecision::ShowOptional
    } else {
        PromptDecision::Hidden(HideReason::NotNewer)
    }
}

/// Evaluate and build the offer when the prompt is to be shown
pub fn offer_for(input: GateInput<'_>) -> Option<UpdateOffer> {
    let decision = evaluate(input);
    decision.is_shown().then(|| UpdateOffer {
        version: input.manifest.available_version.clone(),
        package_url: input.manifest.package_url.clone(),
        forced: decision == PromptDecision::ShowForced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(version: &str, force: bool) -> UpdateManifest {
        UpdateManifest {
            available_version: version.to_string(),
            package_url: format!("https://cdn.example/zefest-{}.apk", version),
            force_update: force,
        }
    }

    fn input<'a>(
        manifest: &'a UpdateManifest,
        current: &'a str,
        installed: Option<&'a str>,
        dismissed: Option<&'a str>,
    ) -> GateInput<'a> {
        GateInput {
            manifest,
            current_version: current,
            installed_marker: installed,
            dismissed_marker: dismissed,
        }
    }

    #[test]
    fn test_equal_version_never_shows() {
        let m = manifest("2.0.0", true);
        for installed in [None, Some("2.0.0"), Some("1.0.0")] {
            for dismissed in [None, Some("2.0.0")] {
                assert_eq!(
                    evaluate(input(&m, "2.0.0", installed, dismissed)),
                    PromptDecision::Hidden(HideReason::UpToDate)
                );
            }
        }
    }

    #[test]
    fn test_forced_show() {
        let m = manifest("2.0.0", true);
        let offer = offer_for(input(&m, "1.0.0", None, None)).unwrap();
        assert_eq!(offer.version, "2.0.0");
        assert!(offer.forced);
    }

    #[test]
    fn test_forced_applies_to_older_version() {
        let m = manifest("1.5.0", true);
        assert_eq!(
            evaluate(input(&m, "2.0.0", None, None)),
            PromptDecision::ShowForced
        );
    }

    #[test]
    fn test_optional_show_for_newer() {
        let m = manifest("1.1.0", false);
        assert_eq!(
            evaluate(input(&m, "1.0.0", None, None)),
            PromptDecision::ShowOptional
        );
        assert_eq!(
            evaluate(input(&m, "1.2.0", None, None)),
            PromptDecision::Hidden(HideReason::NotNewer)
        );
    }

    #[test]
    fn test_installed_marker_suppresses_even_forced() {
        let m = manifest("2.0.0", true);
        assert_eq!(
            evaluate(input(&m, "1.0.0", Some("2.0.0"), None)),
            PromptDecision::Hidden(HideReason::AlreadyInstalled)
        );
    }

    #[test]
    fn test_dismissal_then_reoffer_on_new_version() {
        let first = manifest("2.0.0", false);
        assert_eq!(
            evaluate(input(&first, "1.0.0", None, Some("2.0.0"))),
            PromptDecision::Hidden(HideReason::Dismissed)
        );

        let second = manifest("2.1.0", false);
        assert_eq!(
            evaluate(input(&second, "1.0.0", None, Some("2.0.0"))),
            PromptDecision::ShowOptional
        );
    }

    #[test]
    fn test_gate_is_idempotent() {
        let m = manifest("3.0.0", false);
        let i = input(&m, "2.9.9", Some("2.9.9"), Some("2.0.0"));
        assert_eq!(evaluate(i), evaluate(i));
        assert_eq!(offer_for(i), offer_for(i));
    }
}

//! Raw-token normalization.
//!
//! Sources report presence as free-form strings (log tokens, API enums, UI
//! captions). This module owns the single many-to-one mapping onto
//! [`CanonicalStatus`]. Unmapped tokens are never dropped silently: they
//! produce a warning and resolve to `Unknown`.

use tracing::warn;

use crate::types::{CanonicalStatus, NormalizedReading};

/// Normalize one raw status token.
///
/// `source` names the reporting adapter and only appears in the unmapped
/// warning. `"NewActivity"` is notification noise (a new message, like, or
/// upload), not a presence change, and maps to [`NormalizedReading::Ignore`].
pub fn normalize(raw: &str, source: &str) -> NormalizedReading {
    match raw {
        "Available" => NormalizedReading::Mapped(CanonicalStatus::Available),
        "Away" | "BeRightBack" => NormalizedReading::Mapped(CanonicalStatus::Away),
        "Busy" | "OnThePhone" => NormalizedReading::Mapped(CanonicalStatus::Busy),
        "DoNotDisturb" | "Presenting" | "Do not disturb" => {
            NormalizedReading::Mapped(CanonicalStatus::DoNotDisturb)
        }
        "Offline" => NormalizedReading::Mapped(CanonicalStatus::Offline),
        "InAMeeting" | "In a call" | "In a meeting" => {
            NormalizedReading::Mapped(CanonicalStatus::InAMeeting)
        }
        "NewActivity" => NormalizedReading::Ignore,
        other => {
            warn!(source, token = other, "unrecognized presence token");
            NormalizedReading::Unmapped
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Available", CanonicalStatus::Available)]
    #[case("Away", CanonicalStatus::Away)]
    #[case("BeRightBack", CanonicalStatus::Away)]
    #[case("Busy", CanonicalStatus::Busy)]
    #[case("OnThePhone", CanonicalStatus::Busy)]
    #[case("DoNotDisturb", CanonicalStatus::DoNotDisturb)]
    #[case("Presenting", CanonicalStatus::DoNotDisturb)]
    #[case("Do not disturb", CanonicalStatus::DoNotDisturb)]
    #[case("Offline", CanonicalStatus::Offline)]
    #[case("InAMeeting", CanonicalStatus::InAMeeting)]
    #[case("In a call", CanonicalStatus::InAMeeting)]
    #[case("In a meeting", CanonicalStatus::InAMeeting)]
    fn known_tokens_map(#[case] raw: &str, #[case] expected: CanonicalStatus) {
        assert_eq!(normalize(raw, "test"), NormalizedReading::Mapped(expected));
    }

    #[test]
    fn new_activity_is_ignore_not_unknown() {
        assert_eq!(normalize("NewActivity", "test"), NormalizedReading::Ignore);
    }

    #[rstest]
    #[case("")]
    #[case("available")] // mapping is case-sensitive
    #[case("Focusing")]
    #[case("OutOfOffice")] // never reported by the shipped sources
    fn unknown_tokens_are_unmapped(#[case] raw: &str) {
        assert_eq!(normalize(raw, "test"), NormalizedReading::Unmapped);
    }
}

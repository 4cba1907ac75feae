//! Domain types for presence synchronization.
//!
//! `CanonicalStatus` is the one enumeration every source and light agrees
//! on. Raw source tokens are plain `&str` values that live for a single
//! poll cycle; they never appear in a public signature beyond the
//! normalizer.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Canonical status
// ---------------------------------------------------------------------------

/// The normalized presence value the whole system agrees on.
///
/// `Unknown` means "no information" and is distinct from `Offline`, which is
/// an explicit absence reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalStatus {
    Available,
    Busy,
    DoNotDisturb,
    Away,
    Offline,
    #[default]
    Unknown,
    OutOfOffice,
    InAMeeting,
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalStatus::Available => write!(f, "available"),
            CanonicalStatus::Busy => write!(f, "busy"),
            CanonicalStatus::DoNotDisturb => write!(f, "do-not-disturb"),
            CanonicalStatus::Away => write!(f, "away"),
            CanonicalStatus::Offline => write!(f, "offline"),
            CanonicalStatus::Unknown => write!(f, "unknown"),
            CanonicalStatus::OutOfOffice => write!(f, "out-of-office"),
            CanonicalStatus::InAMeeting => write!(f, "in-a-meeting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer result
// ---------------------------------------------------------------------------

/// Three-way result of normalizing one raw token.
///
/// `Ignore` is a sentinel for tokens that carry no presence information
/// (notification noise); the previous status must be kept. It is not the
/// same as `Unmapped`, which resolves to [`CanonicalStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedReading {
    /// The token mapped to a canonical status.
    Mapped(CanonicalStatus),
    /// The token is presence-neutral; keep the previous status.
    Ignore,
    /// The token is not in the mapping table; resolves to `Unknown`.
    Unmapped,
}

impl NormalizedReading {
    /// Collapse to a canonical status given the previous cycle's value.
    pub fn resolve(self, previous: CanonicalStatus) -> CanonicalStatus {
        match self {
            NormalizedReading::Mapped(status) => status,
            NormalizedReading::Ignore => previous,
            NormalizedReading::Unmapped => CanonicalStatus::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

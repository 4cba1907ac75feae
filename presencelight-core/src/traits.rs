//! Capability boundaries between the sync loop and its collaborators.
//!
//! The loop owns exactly one [`StatusSource`] and one [`LightActuator`],
//! both as trait objects chosen once at startup from a closed set of
//! variants. Neither boundary is allowed to take the loop down: sources are
//! infallible by signature (they fall back to their previous status
//! internally) and actuator failures are ordinary `Result` values.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ActuatorError;
use crate::types::CanonicalStatus;

/// Anything producing a canonical presence reading.
#[async_trait]
pub trait StatusSource: Send {
    /// Polling period, fixed at construction. Always positive; a zero
    /// interval is rejected as a configuration error before the adapter
    /// exists.
    fn poll_interval(&self) -> Duration;

    /// Produce the current canonical status.
    ///
    /// Never fails: on any internal error the adapter logs and answers with
    /// the previous status it reported. Implementations must observe
    /// `cancel` so a read never outlives process shutdown by more than one
    /// polling interval.
    async fn read(&mut self, cancel: &CancellationToken) -> CanonicalStatus;
}

/// Anything converting a canonical status into a physical light effect.
#[async_trait]
pub trait LightActuator: Send {
    /// One-time device initialization. A failure here is non-fatal to the
    /// loop (it keeps polling with no physical effect).
    async fn start(&mut self) -> Result<(), ActuatorError>;

    /// Apply a status as a physical effect. Idempotent: applying the same
    /// status twice issues at most one device command.
    async fn apply(&mut self, status: CanonicalStatus) -> Result<(), ActuatorError>;

    /// Release the device. Called exactly once on loop shutdown; must be a
    /// no-op if `start` never succeeded.
    async fn shutdown(&mut self);
}

//! # presencelight-sync
//!
//! The polling loop that ties one [`StatusSource`] to one
//! [`LightActuator`]: read the current canonical status on a fixed
//! interval, skip no-op applies under the on-change policy, and push the
//! status into the device. The loop never exits on its own; it runs until
//! its [`CancellationToken`] fires, then releases the device exactly once.
//!
//! [`StatusSource`]: presencelight_core::StatusSource
//! [`LightActuator`]: presencelight_core::LightActuator
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod runtime;

pub use runtime::{SyncService, SyncState};

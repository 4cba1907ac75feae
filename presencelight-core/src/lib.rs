//! Presencelight core library — canonical status, normalizer, capability
//! traits, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — [`CanonicalStatus`] and [`NormalizedReading`]
//! - [`normalize`] — raw-token normalization
//! - [`traits`] — [`StatusSource`] / [`LightActuator`] boundaries
//! - [`config`] — YAML configuration model and validation
//! - [`error`] — [`ConfigError`] / [`ActuatorError`]

pub mod config;
pub mod error;
pub mod normalize;
pub mod traits;
pub mod types;

pub use config::{ApplyPolicy, Config, LightConfig, SourceConfig};
pub use error::{ActuatorError, ConfigError};
pub use normalize::normalize;
pub use traits::{LightActuator, StatusSource};
pub use types::{CanonicalStatus, NormalizedReading};

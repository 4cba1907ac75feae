//! # presencelight-light
//!
//! The two light actuator variants behind the
//! [`LightActuator`](presencelight_core::LightActuator) boundary:
//!
//! - [`RelayPairLight`] — two addressable on/off relays (red + green)
//! - [`RgbPeripheralLight`] — a single RGB peripheral
//!
//! Device transports sit behind their own traits ([`RelaySwitch`],
//! [`RgbDevice`]) so the actuator logic — idempotence, mutual exclusion,
//! lazy device-id resolution, retries — is testable without hardware.

pub mod relay;
pub mod rgb;

pub use relay::{HttpRelaySwitch, RelayColor, RelayPairLight, RelaySwitch};
pub use rgb::{ChromaRestDevice, Rgb, RgbDevice, RgbPeripheralLight};

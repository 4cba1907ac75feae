//! RGB peripheral light actuator.
//!
//! Colors a single RGB device (vendor localhost REST bridge) according to
//! the canonical status: green for available, yellow for away, purple for
//! out-of-office, red for busy/do-not-disturb/in-a-meeting, black (off)
//! for everything else. Either all zones or only the headset are targeted.
//!
//! Initialization may fail when the hardware or its bridge is absent; that
//! is non-fatal — `apply` becomes a no-op and the sync loop keeps running
//! with no physical effect.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use presencelight_core::config::RgbConfig;
use presencelight_core::{ActuatorError, CanonicalStatus, LightActuator};

/// An sRGB color triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    pub const YELLOW: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 0,
    };
    pub const PURPLE: Rgb = Rgb {
        r: 128,
        g: 0,
        b: 128,
    };
    pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// BGR packing used by the vendor wire format.
    pub fn bgr(self) -> u32 {
        u32::from(self.b) << 16 | u32::from(self.g) << 8 | u32::from(self.r)
    }
}

/// Status to color table.
fn color_for(status: CanonicalStatus) -> Rgb {
    match status {
        CanonicalStatus::Available => Rgb::GREEN,
        CanonicalStatus::Away => Rgb::YELLOW,
        CanonicalStatus::OutOfOffice => Rgb::PURPLE,
        CanonicalStatus::Busy | CanonicalStatus::DoNotDisturb | CanonicalStatus::InAMeeting => {
            Rgb::RED
        }
        _ => Rgb::BLACK,
    }
}

/// The physical RGB device. Faked in tests; the production implementation
/// is [`ChromaRestDevice`].
#[async_trait]
pub trait RgbDevice: Send {
    async fn initialize(&mut self) -> Result<(), ActuatorError>;
    async fn set_all(&mut self, color: Rgb) -> Result<(), ActuatorError>;
    async fn set_headset(&mut self, color: Rgb) -> Result<(), ActuatorError>;
    async fn uninitialize(&mut self) -> Result<(), ActuatorError>;
}

/// Colors one RGB peripheral according to the canonical status.
pub struct RgbPeripheralLight {
    device: Box<dyn RgbDevice>,
    headset_only: bool,
    initialized: bool,
    current: Option<Rgb>,
}

impl RgbPeripheralLight {
    pub fn new(device: Box<dyn RgbDevice>, headset_only: bool) -> Self {
        Self {
            device,
            headset_only,
            initialized: false,
            current: None,
        }
    }
}

#[async_trait]
impl LightActuator for RgbPeripheralLight {
    async fn start(&mut self) -> Result<(), ActuatorError> {
        info!("starting rgb peripheral light");
        self.device.initialize().await?;
        self.initialized = true;
        Ok(())
    }

    async fn apply(&mut self, status: CanonicalStatus) -> Result<(), ActuatorError> {
        if !self.initialized {
            debug!(status = %status, "rgb device not initialized; skipping");
            return Ok(());
        }
        let color = color_for(status);
        if self.current == Some(color) {
            return Ok(());
        }
        if self.headset_only {
            self.device.set_headset(color).await?;
        } else {
            self.device.set_all(color).await?;
        }
        self.current = Some(color);
        Ok(())
    }

    async fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        info!("shutting down rgb peripheral light");
        if let Err(err) = self.device.uninitialize().await {
            warn!(error = %err, "failed to uninitialize rgb device");
        }
        self.initialized = false;
    }
}

// ---------------------------------------------------------------------------
// Production REST bridge device
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SessionResponse {
    uri: String,
}

const ALL_ZONES: [&str; 6] = [
    "keyboard",
    "mouse",
    "headset",
    "mousepad",
    "keypad",
    "chromalink",
];

/// Vendor localhost REST bridge (Chroma-style session API).
pub struct ChromaRestDevice {
    http: reqwest::Client,
    bridge_url: String,
    session_url: Option<String>,
}

impl ChromaRestDevice {
    pub fn new(config: &RgbConfig) -> Result<Self, ActuatorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| transport_err("client-setup", e))?;
        Ok(Self {
            http,
            bridge_url: config.bridge_url.trim_end_matches('/').to_owned(),
            session_url: None,
        })
    }

    fn session(&self) -> Result<&str, ActuatorError> {
        self.session_url
            .as_deref()
            .ok_or_else(|| ActuatorError::Device {
                context: "session",
                message: "no active bridge session".to_owned(),
            })
    }

    async fn set_zone(&self, session: &str, zone: &str, color: Rgb) -> Result<(), ActuatorError> {
        self.http
            .put(format!("{session}/{zone}"))
            .json(&json!({ "effect": "CHROMA_STATIC", "param": { "color": color.bgr() } }))
            .send()
            .await
            .map_err(|e| transport_err("set-color", e))?
            .error_for_status()
            .map_err(|e| transport_err("set-color", e))?;
        Ok(())
    }
}

#[async_trait]
impl RgbDevice for ChromaRestDevice {
    async fn initialize(&mut self) -> Result<(), ActuatorError> {
        let response = self
            .http
            .post(&self.bridge_url)
            .json(&json!({
                "title": "presencelight",
                "description": "Mirrors presence status onto the peripheral",
                "author": { "name": "presencelight", "contact": "presencelight" },
                "device_supported": ALL_ZONES,
                "category": "application",
            }))
            .send()
            .await
            .map_err(|e| transport_err("initialize", e))?
            .error_for_status()
            .map_err(|e| transport_err("initialize", e))?;
        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| transport_err("initialize", e))?;
        self.session_url = Some(session.uri.trim_end_matches('/').to_owned());
        Ok(())
    }

    async fn set_all(&mut self, color: Rgb) -> Result<(), ActuatorError> {
        let session = self.session()?.to_owned();
        for zone in ALL_ZONES {
            self.set_zone(&session, zone, color).await?;
        }
        Ok(())
    }

    async fn set_headset(&mut self, color: Rgb) -> Result<(), ActuatorError> {
        let session = self.session()?.to_owned();
        self.set_zone(&session, "headset", color).await
    }

    async fn uninitialize(&mut self) -> Result<(), ActuatorError> {
        let session = self.session()?.to_owned();
        self.http
            .delete(&session)
            .send()
            .await
            .map_err(|e| transport_err("uninitialize", e))?
            .error_for_status()
            .map_err(|e| transport_err("uninitialize", e))?;
        self.session_url = None;
        Ok(())
    }
}

fn transport_err(context: &'static str, err: reqwest::Error) -> ActuatorError {
    ActuatorError::Transport {
        context,
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Init,
        All(Rgb),
        Headset(Rgb),
        Uninit,
    }

    #[derive(Default)]
    struct FakeInner {
        calls: Vec<Call>,
        fail_init: bool,
    }

    #[derive(Clone, Default)]
    struct FakeDevice(Arc<Mutex<FakeInner>>);

    impl FakeDevice {
        fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().calls.clone()
        }
    }

    #[async_trait]
    impl RgbDevice for FakeDevice {
        async fn initialize(&mut self) -> Result<(), ActuatorError> {
            let mut inner = self.0.lock().unwrap();
            if inner.fail_init {
                return Err(ActuatorError::Device {
                    context: "initialize",
                    message: "hardware absent".to_owned(),
                });
            }
            inner.calls.push(Call::Init);
            Ok(())
        }

        async fn set_all(&mut self, color: Rgb) -> Result<(), ActuatorError> {
            self.0.lock().unwrap().calls.push(Call::All(color));
            Ok(())
        }

        async fn set_headset(&mut self, color: Rgb) -> Result<(), ActuatorError> {
            self.0.lock().unwrap().calls.push(Call::Headset(color));
            Ok(())
        }

        async fn uninitialize(&mut self) -> Result<(), ActuatorError> {
            self.0.lock().unwrap().calls.push(Call::Uninit);
            Ok(())
        }
    }

    fn light(headset_only: bool) -> (FakeDevice, RgbPeripheralLight) {
        let device = FakeDevice::default();
        let light = RgbPeripheralLight::new(Box::new(device.clone()), headset_only);
        (device, light)
    }

    #[tokio::test]
    async fn status_colors_map_to_the_fixed_table() {
        let (device, mut light) = light(false);
        light.start().await.expect("start");

        for status in [
            CanonicalStatus::Available,
            CanonicalStatus::Away,
            CanonicalStatus::OutOfOffice,
            CanonicalStatus::Busy,
            CanonicalStatus::Offline,
        ] {
            light.apply(status).await.expect("apply");
        }

        assert_eq!(
            device.calls(),
            vec![
                Call::Init,
                Call::All(Rgb::GREEN),
                Call::All(Rgb::YELLOW),
                Call::All(Rgb::PURPLE),
                Call::All(Rgb::RED),
                Call::All(Rgb::BLACK),
            ]
        );
    }

    #[tokio::test]
    async fn same_color_is_not_reapplied() {
        let (device, mut light) = light(false);
        light.start().await.expect("start");

        light.apply(CanonicalStatus::Busy).await.expect("apply");
        // DoNotDisturb shares red with Busy; no second device call.
        light
            .apply(CanonicalStatus::DoNotDisturb)
            .await
            .expect("apply");

        assert_eq!(device.calls(), vec![Call::Init, Call::All(Rgb::RED)]);
    }

    #[tokio::test]
    async fn headset_only_targets_the_headset_zone() {
        let (device, mut light) = light(true);
        light.start().await.expect("start");

        light.apply(CanonicalStatus::Available).await.expect("apply");

        assert_eq!(
            device.calls(),
            vec![Call::Init, Call::Headset(Rgb::GREEN)]
        );
    }

    #[tokio::test]
    async fn absent_hardware_is_non_fatal() {
        let device = FakeDevice::default();
        device.0.lock().unwrap().fail_init = true;
        let mut light = RgbPeripheralLight::new(Box::new(device.clone()), false);

        light.start().await.expect_err("init must fail");
        // Applies become no-op successes; shutdown stays quiet.
        light.apply(CanonicalStatus::Busy).await.expect("apply");
        light.shutdown().await;

        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn shutdown_uninitializes_once() {
        let (device, mut light) = light(false);
        light.start().await.expect("start");

        light.shutdown().await;
        light.shutdown().await;

        assert_eq!(device.calls(), vec![Call::Init, Call::Uninit]);
    }

    #[test]
    fn bgr_packing() {
        assert_eq!(Rgb::RED.bgr(), 0x0000FF);
        assert_eq!(Rgb::GREEN.bgr(), 0x00FF00);
        assert_eq!(Rgb { r: 1, g: 2, b: 3 }.bgr(), 0x030201);
    }
}

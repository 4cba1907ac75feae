//! Relay-pair light actuator.
//!
//! Two independently addressable on/off relays — one behind a red lens, one
//! behind a green one — driven over a DIY-mode HTTP API. The adapter owns
//! the per-device state machine (`unresolved id → resolved → on/off`),
//! enforces mutual exclusion between colors, and retries transient
//! transport failures with a fixed backoff.
//!
//! Status mapping: `Available` → green, `Busy`/`InAMeeting` → red,
//! `DoNotDisturb` → both (the one sanctioned dual-on), everything else →
//! all off.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use presencelight_core::config::RelayPairConfig;
use presencelight_core::{ActuatorError, CanonicalStatus, LightActuator};

/// Attempts per device call, counting the first one.
const RETRY_ATTEMPTS: u32 = 3;
/// Fixed pause between attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Which relay of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayColor {
    Red,
    Green,
}

impl fmt::Display for RelayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayColor::Red => write!(f, "red"),
            RelayColor::Green => write!(f, "green"),
        }
    }
}

const COLORS: [RelayColor; 2] = [RelayColor::Red, RelayColor::Green];

/// Transport to the physical relays. Faked in tests; the production
/// implementation is [`HttpRelaySwitch`].
#[async_trait]
pub trait RelaySwitch: Send + Sync {
    /// Query the device id of the relay serving this color.
    async fn query_device_id(&self, color: RelayColor) -> Result<String, ActuatorError>;

    /// Drive the relay on or off.
    async fn set_power(
        &self,
        color: RelayColor,
        device_id: &str,
        on: bool,
    ) -> Result<(), ActuatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Power {
    On,
    Off,
}

struct RelayDevice {
    color: RelayColor,
    power: Power,
    /// Resolved once per adapter lifetime, then never re-queried.
    external_id: Option<String>,
}

/// Drives the red/green relay pair.
pub struct RelayPairLight {
    transport: Box<dyn RelaySwitch>,
    devices: [RelayDevice; 2],
    cancel: CancellationToken,
}

impl RelayPairLight {
    /// `cancel` is the process shutdown token; it short-circuits retry
    /// backoffs so shutdown is never held up by a retry ladder.
    pub fn new(transport: Box<dyn RelaySwitch>, cancel: CancellationToken) -> Self {
        Self {
            transport,
            devices: COLORS.map(|color| RelayDevice {
                color,
                power: Power::Off,
                external_id: None,
            }),
            cancel,
        }
    }

    fn device(&self, color: RelayColor) -> &RelayDevice {
        self.devices
            .iter()
            .find(|d| d.color == color)
            .expect("both colors are always present")
    }

    fn device_mut(&mut self, color: RelayColor) -> &mut RelayDevice {
        self.devices
            .iter_mut()
            .find(|d| d.color == color)
            .expect("both colors are always present")
    }

    async fn ensure_id(&mut self, color: RelayColor) -> Result<String, ActuatorError> {
        if let Some(id) = &self.device(color).external_id {
            return Ok(id.clone());
        }
        let transport = &self.transport;
        let id = call_with_retry(&self.cancel, "device-info", || {
            transport.query_device_id(color)
        })
        .await?;
        info!(color = %color, device_id = %id, "relay device id resolved");
        self.device_mut(color).external_id = Some(id.clone());
        Ok(id)
    }

    /// Raw off command; no exclusivity handling, no already-off check.
    async fn power_off(&mut self, color: RelayColor) -> Result<(), ActuatorError> {
        let id = self.ensure_id(color).await?;
        info!(color = %color, "switching relay off");
        let transport = &self.transport;
        call_with_retry(&self.cancel, "switch-off", || {
            transport.set_power(color, &id, false)
        })
        .await?;
        self.device_mut(color).power = Power::Off;
        Ok(())
    }

    /// Switch one relay on. With `exclusive`, every other relay that is on
    /// goes off first so two colors are never lit together.
    async fn switch_on(&mut self, color: RelayColor, exclusive: bool) -> Result<(), ActuatorError> {
        let id = self.ensure_id(color).await?;
        if exclusive {
            self.switch_off_all(Some(color), false).await?;
        }
        if self.device(color).power == Power::On {
            return Ok(());
        }
        info!(color = %color, "switching relay on");
        let transport = &self.transport;
        call_with_retry(&self.cancel, "switch-on", || {
            transport.set_power(color, &id, true)
        })
        .await?;
        self.device_mut(color).power = Power::On;
        Ok(())
    }

    /// Switch every relay (except `ignore`) off. `force` sends the command
    /// even to relays believed off already — used at start and shutdown
    /// when the cached state is not trustworthy.
    ///
    /// Best-effort: one failing relay does not stop the others; the first
    /// failure is reported after all were attempted.
    async fn switch_off_all(
        &mut self,
        ignore: Option<RelayColor>,
        force: bool,
    ) -> Result<(), ActuatorError> {
        let mut first_failure = None;
        for color in COLORS {
            if ignore == Some(color) {
                continue;
            }
            if !force && self.device(color).power == Power::Off {
                continue;
            }
            if let Err(err) = self.power_off(color).await {
                warn!(color = %color, error = %err, "failed to switch relay off");
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[async_trait]
impl LightActuator for RelayPairLight {
    async fn start(&mut self) -> Result<(), ActuatorError> {
        info!("starting relay pair light");
        self.switch_off_all(None, true).await
    }

    async fn apply(&mut self, status: CanonicalStatus) -> Result<(), ActuatorError> {
        match status {
            CanonicalStatus::Available => self.switch_on(RelayColor::Green, true).await,
            CanonicalStatus::Busy | CanonicalStatus::InAMeeting => {
                self.switch_on(RelayColor::Red, true).await
            }
            CanonicalStatus::DoNotDisturb => {
                self.switch_on(RelayColor::Red, false).await?;
                self.switch_on(RelayColor::Green, false).await
            }
            _ => self.switch_off_all(None, false).await,
        }
    }

    async fn shutdown(&mut self) {
        info!("shutting down relay pair light");
        if let Err(err) = self.switch_off_all(None, true).await {
            warn!(error = %err, "failed to switch relays off during shutdown");
        }
    }
}

/// Run one transport call with the fixed retry ladder. Cancellation during
/// a backoff pause aborts the ladder immediately.
async fn call_with_retry<T, F, Fut>(
    cancel: &CancellationToken,
    context: &'static str,
    mut op: F,
) -> Result<T, ActuatorError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, ActuatorError>> + Send,
    T: Send,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < RETRY_ATTEMPTS => {
                warn!(context, attempt, error = %err, "relay call failed; retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ActuatorError::Cancelled),
                    _ = tokio::time::sleep(RETRY_BACKOFF) => {}
                }
                attempt += 1;
            }
            Err(err) => {
                warn!(context, attempts = RETRY_ATTEMPTS, error = %err, "relay call failed; giving up");
                return Err(err);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Production HTTP transport (DIY-mode relay API)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct InfoResponse {
    data: InfoData,
}

#[derive(Deserialize)]
struct InfoData {
    deviceid: String,
}

/// DIY-mode HTTP transport: one base URL per relay.
pub struct HttpRelaySwitch {
    http: reqwest::Client,
    red_url: String,
    green_url: String,
    api_version: f64,
}

impl HttpRelaySwitch {
    pub fn new(config: &RelayPairConfig) -> Result<Self, ActuatorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| transport_err("client-setup", e))?;
        Ok(Self {
            http,
            red_url: config.red_url.trim_end_matches('/').to_owned(),
            green_url: config.green_url.trim_end_matches('/').to_owned(),
            api_version: config.api_version,
        })
    }

    fn base(&self, color: RelayColor) -> &str {
        match color {
            RelayColor::Red => &self.red_url,
            RelayColor::Green => &self.green_url,
        }
    }
}

#[async_trait]
impl RelaySwitch for HttpRelaySwitch {
    async fn query_device_id(&self, color: RelayColor) -> Result<String, ActuatorError> {
        // The info payload shape changed after firmware API 3.5.
        let payload = if self.api_version > 3.5 {
            json!({ "data": { "deviceid": "" } })
        } else {
            json!({ "deviceid": "", "data": {} })
        };
        let response = self
            .http
            .post(format!("{}/zeroconf/info", self.base(color)))
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_err("device-info", e))?
            .error_for_status()
            .map_err(|e| transport_err("device-info", e))?;
        let info: InfoResponse = response
            .json()
            .await
            .map_err(|e| transport_err("device-info", e))?;
        Ok(info.data.deviceid)
    }

    async fn set_power(
        &self,
        color: RelayColor,
        device_id: &str,
        on: bool,
    ) -> Result<(), ActuatorError> {
        let data = if on {
            json!({ "switch": "on", "pulse": "off" })
        } else {
            json!({ "switch": "off" })
        };
        let context = if on { "switch-on" } else { "switch-off" };
        self.http
            .post(format!("{}/zeroconf/switch", self.base(color)))
            .json(&json!({ "deviceid": device_id, "data": data }))
            .send()
            .await
            .map_err(|e| transport_err(context, e))?
            .error_for_status()
            .map_err(|e| transport_err(context, e))?;
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

    #[derive(Default)]
    struct FakeState {
        query_calls: Vec<RelayColor>,
        commands: Vec<(RelayColor, bool)>,
        fail_query: bool,
        fail_set_red: bool,
    }

    #[derive(Default)]
    struct FakeSwitch {
        state: Mutex<FakeState>,
    }

    impl FakeSwitch {
        fn query_calls(&self, color: RelayColor) -> usize {
            self.state
                .lock()
                .unwrap()
                .query_calls
                .iter()
                .filter(|c| **c == color)
                .count()
        }

        fn commands_for(&self, color: RelayColor) -> Vec<bool> {
            self.state
                .lock()
                .unwrap()
                .commands
                .iter()
                .filter(|(c, _)| *c == color)
                .map(|(_, on)| *on)
                .collect()
        }

        /// Physical state implied by the last command, if any.
        fn is_on(&self, color: RelayColor) -> bool {
            self.commands_for(color).last().copied().unwrap_or(false)
        }
    }

    #[async_trait]
    impl RelaySwitch for Arc<FakeSwitch> {
        async fn query_device_id(&self, color: RelayColor) -> Result<String, ActuatorError> {
            let mut state = self.state.lock().unwrap();
            state.query_calls.push(color);
            if state.fail_query {
                return Err(ActuatorError::Transport {
                    context: "device-info",
                    message: "connection refused".to_owned(),
                });
            }
            Ok(format!("device-{color}"))
        }

        async fn set_power(
            &self,
            color: RelayColor,
            _device_id: &str,
            on: bool,
        ) -> Result<(), ActuatorError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_set_red && color == RelayColor::Red {
                return Err(ActuatorError::Transport {
                    context: "switch-off",
                    message: "connection refused".to_owned(),
                });
            }
            state.commands.push((color, on));
            Ok(())
        }
    }

    fn light_with(state: FakeState) -> (Arc<FakeSwitch>, RelayPairLight) {
        let switch = Arc::new(FakeSwitch {
            state: Mutex::new(state),
        });
        let light = RelayPairLight::new(Box::new(switch.clone()), CancellationToken::new());
        (switch, light)
    }

    #[tokio::test]
    async fn apply_busy_is_idempotent() {
        let (switch, mut light) = light_with(FakeState::default());

        light.apply(CanonicalStatus::Busy).await.expect("first apply");
        light
            .apply(CanonicalStatus::Busy)
            .await
            .expect("second apply");

        assert_eq!(
            switch.commands_for(RelayColor::Red),
            vec![true],
            "exactly one on transition for red"
        );
        assert!(
            switch.commands_for(RelayColor::Green).is_empty(),
            "no commands for a device already in its target state"
        );
    }

    #[tokio::test]
    async fn device_id_is_resolved_once() {
        let (switch, mut light) = light_with(FakeState::default());

        light.apply(CanonicalStatus::Busy).await.expect("apply");
        light.apply(CanonicalStatus::Available).await.expect("apply");
        light.apply(CanonicalStatus::Busy).await.expect("apply");

        assert_eq!(switch.query_calls(RelayColor::Red), 1);
        assert_eq!(switch.query_calls(RelayColor::Green), 1);
    }

    #[tokio::test]
    async fn switching_colors_enforces_mutual_exclusion() {
        let (switch, mut light) = light_with(FakeState::default());

        light.apply(CanonicalStatus::Busy).await.expect("apply");
        light.apply(CanonicalStatus::Available).await.expect("apply");

        assert!(!switch.is_on(RelayColor::Red), "red must be off");
        assert!(switch.is_on(RelayColor::Green), "green must be on");
    }

    #[tokio::test]
    async fn do_not_disturb_lights_both() {
        let (switch, mut light) = light_with(FakeState::default());

        light.apply(CanonicalStatus::Busy).await.expect("apply");
        light
            .apply(CanonicalStatus::DoNotDisturb)
            .await
            .expect("apply");

        assert!(switch.is_on(RelayColor::Red));
        assert!(switch.is_on(RelayColor::Green));
        // The dual-on bypasses mutual exclusion: red was never toggled off.
        assert_eq!(switch.commands_for(RelayColor::Red), vec![true]);
    }

    #[tokio::test]
    async fn unlit_statuses_switch_everything_off() {
        let (switch, mut light) = light_with(FakeState::default());

        light
            .apply(CanonicalStatus::DoNotDisturb)
            .await
            .expect("apply");
        light.apply(CanonicalStatus::Away).await.expect("apply");

        assert!(!switch.is_on(RelayColor::Red));
        assert!(!switch.is_on(RelayColor::Green));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_call_is_attempted_exactly_three_times() {
        let (switch, mut light) = light_with(FakeState {
            fail_query: true,
            ..FakeState::default()
        });

        let err = light
            .apply(CanonicalStatus::Busy)
            .await
            .expect_err("must fail");
        assert!(matches!(err, ActuatorError::Transport { .. }));
        assert_eq!(switch.query_calls(RelayColor::Red), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn off_all_continues_past_a_failing_device() {
        let (switch, mut light) = light_with(FakeState::default());
        light
            .apply(CanonicalStatus::DoNotDisturb)
            .await
            .expect("apply");

        switch.state.lock().unwrap().fail_set_red = true;
        let err = light
            .apply(CanonicalStatus::Offline)
            .await
            .expect_err("red failure must surface");
        assert!(matches!(err, ActuatorError::Transport { .. }));
        assert!(
            !switch.is_on(RelayColor::Green),
            "green must still be switched off"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_short_circuits_the_retry_ladder() {
        let switch = Arc::new(FakeSwitch {
            state: Mutex::new(FakeState {
                fail_query: true,
                ..FakeState::default()
            }),
        });
        let cancel = CancellationToken::new();
        let mut light = RelayPairLight::new(Box::new(switch.clone()), cancel.clone());

        cancel.cancel();
        let err = light
            .apply(CanonicalStatus::Busy)
            .await
            .expect_err("must fail");
        assert!(matches!(err, ActuatorError::Cancelled));
        assert_eq!(
            switch.query_calls(RelayColor::Red),
            1,
            "no retries once cancelled"
        );
    }

    #[tokio::test]
    async fn start_and_shutdown_force_everything_off() {
        let (switch, mut light) = light_with(FakeState::default());

        light.start().await.expect("start");
        assert_eq!(switch.commands_for(RelayColor::Red), vec![false]);
        assert_eq!(switch.commands_for(RelayColor::Green), vec![false]);

        light.apply(CanonicalStatus::Busy).await.expect("apply");
        light.shutdown().await;
        assert!(!switch.is_on(RelayColor::Red));
        assert!(!switch.is_on(RelayColor::Green));
    }
}

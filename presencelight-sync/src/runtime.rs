//! The status-to-light polling loop.
//!
//! One loop instance owns exactly one source and one actuator. Each tick it
//! reads the source, publishes the reading on a watch channel, and applies
//! it to the light. Ticks never overlap: the next tick is awaited only
//! after the previous apply finished, and missed ticks are skipped rather
//! than bursted.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use presencelight_core::{ApplyPolicy, CanonicalStatus, LightActuator, StatusSource};

/// What the loop believes the physical light currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    /// Last status successfully applied to the light. `Unknown` until the
    /// first successful apply.
    pub last_applied: CanonicalStatus,
    /// When a source reading last made it onto the light. Failed applies
    /// leave the whole state untouched.
    pub last_source_update: DateTime<Utc>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_applied: CanonicalStatus::Unknown,
            last_source_update: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Drives one [`StatusSource`] into one [`LightActuator`] until cancelled.
pub struct SyncService {
    source: Box<dyn StatusSource>,
    light: Box<dyn LightActuator>,
    policy: ApplyPolicy,
    state: SyncState,
    status_tx: watch::Sender<CanonicalStatus>,
}

impl SyncService {
    /// Build a service and the watch receiver observers use to follow raw
    /// source readings (published every tick, before apply filtering).
    pub fn new(
        source: Box<dyn StatusSource>,
        light: Box<dyn LightActuator>,
        policy: ApplyPolicy,
    ) -> (Self, watch::Receiver<CanonicalStatus>) {
        let (status_tx, status_rx) = watch::channel(CanonicalStatus::Unknown);
        (
            Self {
                source,
                light,
                policy,
                state: SyncState::default(),
                status_tx,
            },
            status_rx,
        )
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Run until `cancel` fires, then release the light exactly once.
    ///
    /// A failing `start` is logged and the loop keeps polling; the actuator
    /// reports success with no physical effect until the device recovers at
    /// process restart.
    pub async fn run(mut self, cancel: CancellationToken) {
        if let Err(err) = self.light.start().await {
            warn!(error = %err, "light failed to start; continuing without physical effect");
        }

        let period = self.source.poll_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(policy = %self.policy, period_secs = period.as_secs(), "sync loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(&cancel).await;
                    discard_overdue_tick(&mut interval).await;
                }
            }
        }

        info!("sync loop stopping");
        self.light.shutdown().await;
    }

    async fn tick(&mut self, cancel: &CancellationToken) {
        let status = self.source.read(cancel).await;
        let _ = self.status_tx.send(status);

        if self.policy == ApplyPolicy::OnChange && status == self.state.last_applied {
            debug!(status = %status, "status unchanged; skipping apply");
            return;
        }

        match self.light.apply(status).await {
            Ok(()) => {
                if status != self.state.last_applied {
                    info!(from = %self.state.last_applied, to = %status, "light updated");
                }
                self.state.last_applied = status;
                self.state.last_source_update = Utc::now();
            }
            Err(err) => {
                // State stays put so the next tick retries the apply.
                warn!(status = %status, error = %err, "light apply failed");
            }
        }
    }
}

/// Consume the tick that fell due while the previous tick body was still
/// running, if any. `MissedTickBehavior::Skip` collapses further missed
/// ticks, but the first overdue one still completes immediately once
/// awaited; draining it keeps overrun cycles on the interval grid instead
/// of running back-to-back.
async fn discard_overdue_tick(interval: &mut tokio::time::Interval) {
    tokio::select! {
        biased;
        _ = interval.tick() => {}
        _ = std::future::ready(()) => {}
    }
}

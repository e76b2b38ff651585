//! Periodic position sampling for the current sound.
//!
//! Backends are not required to report every position change, so the
//! orchestrator keeps one repeating timer that asks the current sound's
//! backend for its playhead. Samples only refresh the cached position; they
//! do not publish events.

use core_async::sync::CancellationToken;
use core_async::time::{interval, MissedTickBehavior};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::relay::EventRelay;

/// Result of one sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No current sound.
    Idle,
    Unchanged,
    Updated(Duration),
    /// The backend could not report a position; logged and ignored.
    Failed,
}

/// Handle to the background sampling task. Dropping it stops the task.
#[derive(Debug)]
pub struct PositionPoller {
    token: CancellationToken,
    period: Duration,
}

impl PositionPoller {
    /// Spawns the sampling task. Must be called inside a tokio runtime.
    pub fn start(relay: &Arc<EventRelay>, period: Duration, shutdown: &CancellationToken) -> Self {
        let token = shutdown.child_token();
        let relay = Arc::downgrade(relay);
        let stop = token.clone();

        core_async::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;

            loop {
                core_async::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticks.tick() => {
                        let Some(relay) = relay.upgrade() else { break };
                        sample(&relay);
                    }
                }
            }
            debug!("position poller stopped");
        });

        debug!(
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "position poller started"
        );
        Self { token, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for PositionPoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Samples the current sound once.
pub fn sample(relay: &EventRelay) -> PollOutcome {
    let Some(sound) = relay.current() else {
        return PollOutcome::Idle;
    };

    let before = sound.position();
    match sound.sample_position() {
        Ok(position) if position == before => PollOutcome::Unchanged,
        Ok(position) => PollOutcome::Updated(position),
        Err(e) => {
            warn!(sound = %sound.id(), error = %e, "failed to sample position");
            PollOutcome::Failed
        }
    }
}

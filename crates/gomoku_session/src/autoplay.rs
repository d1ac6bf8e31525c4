//! Auto-play scheduler: unattended engine-vs-engine stepping on a timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument};

use crate::session::SessionController;
use crate::types::GameSnapshot;

/// Delay between auto-play steps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AutoPlaySpeed {
    /// One step every two seconds.
    Slow,
    /// One step per second.
    #[default]
    Medium,
    /// Two steps per second.
    Fast,
}

impl AutoPlaySpeed {
    /// Tick interval for this speed.
    pub fn interval(self) -> Duration {
        match self {
            Self::Slow => Duration::from_millis(2000),
            Self::Medium => Duration::from_millis(1000),
            Self::Fast => Duration::from_millis(500),
        }
    }
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoPlayState {
    /// Whether ticks are being scheduled.
    pub is_playing: bool,
    /// Current tick speed.
    pub speed: AutoPlaySpeed,
}

/// Auto-play may run only for an unfinished engine-vs-engine game.
fn governs(snapshot: Option<&GameSnapshot>) -> bool {
    snapshot.is_some_and(|s| s.is_engine_vs_engine() && !s.is_terminal())
}

#[derive(Debug)]
struct Control {
    state: AutoPlayState,
    /// Bumped on every start, stop and speed change; a ticker whose
    /// generation is stale must not dispatch.
    generation: u64,
    ticker: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    state: watch::Sender<AutoPlayState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, control: &Control) {
        self.state.send_replace(control.state);
    }

    /// Stops on behalf of the ticker of `generation` once the game no
    /// longer qualifies for auto-play.
    fn force_stop(&self, generation: u64) {
        let mut control = self.lock();
        if control.generation != generation || !control.state.is_playing {
            return;
        }
        info!("Auto-play stopped: game is no longer an unfinished engine-vs-engine game");
        control.state.is_playing = false;
        control.generation += 1;
        // The ticker calling this is about to return; detach rather than abort it.
        drop(control.ticker.take());
        self.publish(&control);
    }
}

/// Drives [`SessionController::request_engine_step`] on a cancellable timer.
///
/// Steps share the session's move latch, so a tick that finds a step still
/// in flight (its own or a manual one) is skipped, never queued. Stopping
/// cancels the timer only; an in-flight step runs to completion and its
/// snapshot is still applied.
#[derive(Debug)]
pub struct AutoPlayScheduler {
    session: SessionController,
    shared: Arc<Shared>,
}

impl AutoPlayScheduler {
    /// Creates a stopped scheduler at `speed`.
    #[instrument(skip(session))]
    pub fn new(session: SessionController, speed: AutoPlaySpeed) -> Self {
        let state = AutoPlayState {
            is_playing: false,
            speed,
        };
        let (tx, _rx) = watch::channel(state);
        Self {
            session,
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    state,
                    generation: 0,
                    ticker: None,
                }),
                state: tx,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> AutoPlayState {
        self.shared.lock().state
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AutoPlayState> {
        self.shared.state.subscribe()
    }

    /// Starts stepping: one step immediately, then one per interval.
    ///
    /// No-op unless the current game is an unfinished engine-vs-engine game.
    #[instrument(skip(self))]
    pub fn start(&self) {
        let mut control = self.shared.lock();
        if control.state.is_playing {
            debug!("Auto-play already running");
            return;
        }
        if !governs(self.session.snapshot().as_ref()) {
            debug!("Auto-play refused: not an unfinished engine-vs-engine game");
            return;
        }
        control.state.is_playing = true;
        control.generation += 1;
        let speed = control.state.speed;
        control.ticker = Some(self.spawn_ticker(control.generation, speed, Duration::ZERO));
        info!(speed = %speed, "Auto-play started");
        self.shared.publish(&control);
    }

    /// Stops stepping. No tick fires after this returns.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let mut control = self.shared.lock();
        if !control.state.is_playing {
            return;
        }
        control.state.is_playing = false;
        control.generation += 1;
        if let Some(ticker) = control.ticker.take() {
            ticker.abort();
        }
        info!("Auto-play stopped");
        self.shared.publish(&control);
    }

    /// Changes the tick speed, re-arming the timer without an extra step.
    #[instrument(skip(self))]
    pub fn set_speed(&self, speed: AutoPlaySpeed) {
        let mut control = self.shared.lock();
        if control.state.speed == speed {
            return;
        }
        control.state.speed = speed;
        if control.state.is_playing {
            control.generation += 1;
            if let Some(ticker) = control.ticker.take() {
                ticker.abort();
            }
            control.ticker =
                Some(self.spawn_ticker(control.generation, speed, speed.interval()));
            debug!(speed = %speed, "Auto-play timer re-armed");
        }
        self.shared.publish(&control);
    }

    fn spawn_ticker(
        &self,
        generation: u64,
        speed: AutoPlaySpeed,
        first_delay: Duration,
    ) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let session = self.session.clone();
        tokio::spawn(run_ticker(shared, session, generation, speed, first_delay))
    }
}

impl Drop for AutoPlayScheduler {
    fn drop(&mut self) {
        let mut control = self.shared.lock();
        control.state.is_playing = false;
        control.generation += 1;
        if let Some(ticker) = control.ticker.take() {
            ticker.abort();
        }
    }
}

/// Tick loop for one generation of the scheduler.
async fn run_ticker(
    shared: Arc<Shared>,
    session: SessionController,
    generation: u64,
    speed: AutoPlaySpeed,
    first_delay: Duration,
) {
    let period = speed.interval();
    let mut ticker = interval_at(Instant::now() + first_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut snapshots = session.subscribe();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !dispatch_tick(&shared, &session, generation) {
                    return;
                }
            }
            changed = snapshots.changed() => {
                let still_governs =
                    changed.is_ok() && governs(snapshots.borrow_and_update().as_ref());
                if !still_governs {
                    shared.force_stop(generation);
                    return;
                }
            }
        }
    }
}

/// Dispatches one step if this generation is still current.
///
/// The generation check and the latch claim happen under the scheduler lock,
/// so a concurrent `stop()` either precedes the claim (no step) or follows
/// it (exactly one step). Returns `false` once the ticker should exit.
fn dispatch_tick(shared: &Shared, session: &SessionController, generation: u64) -> bool {
    let guard = {
        let control = shared.lock();
        if control.generation != generation || !control.state.is_playing {
            return false;
        }
        if !governs(session.snapshot().as_ref()) {
            drop(control);
            shared.force_stop(generation);
            return false;
        }
        match session.try_claim() {
            Some(guard) => guard,
            None => {
                debug!("Tick skipped: previous step still in flight");
                return true;
            }
        }
    };

    let session = session.clone();
    tokio::spawn(async move {
        let outcome = session.step_claimed(guard, false).await;
        debug!(outcome = ?outcome, "Auto-play step settled");
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_intervals() {
        assert_eq!(AutoPlaySpeed::Slow.interval(), Duration::from_millis(2000));
        assert_eq!(AutoPlaySpeed::Medium.interval(), Duration::from_millis(1000));
        assert_eq!(AutoPlaySpeed::Fast.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_speed_parses_from_config_text() {
        assert_eq!("fast".parse::<AutoPlaySpeed>().ok(), Some(AutoPlaySpeed::Fast));
        assert_eq!(AutoPlaySpeed::Slow.to_string(), "slow");
    }
}

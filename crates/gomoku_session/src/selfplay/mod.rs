//! Self-play tracker: background calibration runs, progress and ETA.

mod eta;
mod request;

pub use eta::{estimate_remaining, format_eta};
pub use request::{MAX_LEVEL, MIN_LEVEL, SelfPlayRequest};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorSlot, ErrorSource, SessionError};
use crate::gateway::{EngineClient, EngineEvent, EventStream};
use crate::guard::InFlight;
use crate::hooks::SessionHooks;
use crate::types::{SelfPlayProgress, SelfPlayReport};

/// What the UI shows about self-play.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelfPlayView {
    /// A run is in progress on the engine.
    pub busy: bool,
    /// Latest progress of the current run.
    pub progress: Option<SelfPlayProgress>,
    /// Summary of the last finished run, kept until the next one starts.
    pub report: Option<SelfPlayReport>,
    /// Estimated time left, when defined.
    pub eta: Option<Duration>,
}

impl SelfPlayView {
    /// ETA rendered with [`format_eta`].
    pub fn eta_text(&self) -> Option<String> {
        self.eta.map(format_eta)
    }
}

#[derive(Debug, Default)]
struct RunState {
    /// Identifies the subscription whose events may mutate the view.
    run_id: u64,
    /// Reference time for throughput extrapolation.
    anchor: Option<Instant>,
    pump: Option<JoinHandle<()>>,
}

impl RunState {
    /// Invalidates the current subscription and returns the next run id.
    fn next_run(&mut self) -> u64 {
        self.run_id += 1;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.run_id
    }
}

struct Inner {
    engine: EngineClient,
    errors: ErrorSlot,
    hooks: Arc<dyn SessionHooks>,
    calls: InFlight,
    run: Mutex<RunState>,
    view: watch::Sender<SelfPlayView>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one event if it belongs to the current run.
    fn apply(&self, run_id: u64, event: EngineEvent, now: Instant) {
        let mut run = self.lock();
        if run.run_id != run_id {
            debug!(run_id, current = run.run_id, "Dropping event from stale run");
            return;
        }
        match event {
            EngineEvent::Progress(progress) => {
                if progress.completed > 0 && run.anchor.is_none() {
                    run.anchor = Some(now);
                }
                let eta = run.anchor.and_then(|anchor| {
                    estimate_remaining(progress.completed, progress.total, now - anchor)
                });
                debug!(
                    completed = progress.completed,
                    total = progress.total,
                    eta_secs = eta.map(|d| d.as_secs()),
                    "Self-play progress"
                );
                self.view.send_modify(|view| {
                    view.progress = Some(progress);
                    view.eta = eta;
                });
            }
            EngineEvent::Done(report) => {
                run.anchor = None;
                drop(run.pump.take());
                drop(run);
                info!(
                    completed = report.completed_games,
                    total = report.total_games,
                    stopped = report.stopped,
                    "Self-play finished"
                );
                self.view.send_modify(|view| {
                    view.busy = false;
                    view.progress = None;
                    view.eta = None;
                    view.report = Some(report);
                });
                self.hooks.ratings_changed();
            }
            EngineEvent::Failed(message) => {
                run.anchor = None;
                drop(run.pump.take());
                drop(run);
                self.view.send_modify(|view| {
                    view.busy = false;
                    view.progress = None;
                    view.eta = None;
                });
                self.errors
                    .raise(SessionError::new(ErrorSource::SelfPlay, message));
            }
        }
    }

    fn set_idle(&self) {
        self.view.send_modify(|view| {
            view.busy = false;
            view.eta = None;
        });
    }
}

/// Message raised when the event stream closes before the run reports.
pub const EVENTS_LOST_MESSAGE: &str = "Lost connection to self-play events";

/// Forwards one subscription's events into the tracker until the run ends.
///
/// A stream that closes before a terminal event ends the run as failed, so
/// `busy` never outlives the connection that would have cleared it.
async fn pump(inner: Weak<Inner>, run_id: u64, mut events: EventStream) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let terminal = event.is_terminal();
        inner.apply(run_id, event, Instant::now());
        if terminal {
            return;
        }
    }
    warn!(run_id, "Self-play event stream ended before the run reported");
    if let Some(inner) = inner.upgrade() {
        inner.apply(
            run_id,
            EngineEvent::Failed(EVENTS_LOST_MESSAGE.to_string()),
            Instant::now(),
        );
    }
}

/// Starts and stops calibration runs and turns their event stream into a
/// stable [`SelfPlayView`].
///
/// Independent of the move pipeline: it has its own in-flight latch and
/// shares only the error slot. Stopping is cooperative; `busy` clears only
/// when the job's own completion or error event arrives.
#[derive(Clone)]
pub struct SelfPlayTracker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SelfPlayTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfPlayTracker")
            .field("view", &*self.inner.view.borrow())
            .finish_non_exhaustive()
    }
}

impl SelfPlayTracker {
    /// Creates an idle tracker.
    #[instrument(skip_all)]
    pub fn new(engine: EngineClient, errors: ErrorSlot, hooks: Arc<dyn SessionHooks>) -> Self {
        info!("Creating SelfPlayTracker");
        let (view, _rx) = watch::channel(SelfPlayView::default());
        Self {
            inner: Arc::new(Inner {
                engine,
                errors,
                hooks,
                calls: InFlight::new("self_play"),
                run: Mutex::new(RunState::default()),
                view,
            }),
        }
    }

    /// Current view.
    pub fn view(&self) -> SelfPlayView {
        self.inner.view.borrow().clone()
    }

    /// Subscribes to view changes.
    pub fn subscribe(&self) -> watch::Receiver<SelfPlayView> {
        self.inner.view.subscribe()
    }

    /// Whether a run is in progress.
    pub fn is_busy(&self) -> bool {
        self.inner.view.borrow().busy
    }

    async fn attach(&self, run_id: u64) -> Result<(), SessionError> {
        let events = self
            .inner
            .engine
            .subscribe()
            .await
            .map_err(|e| SessionError::from_gateway(ErrorSource::SelfPlay, &e))?;
        let mut run = self.inner.lock();
        if run.run_id != run_id {
            debug!(run_id, "Run superseded before its subscription opened");
            return Ok(());
        }
        let weak = Arc::downgrade(&self.inner);
        run.pump = Some(tokio::spawn(pump(weak, run_id, events)));
        Ok(())
    }

    /// Launches a calibration run.
    ///
    /// No-op while a run is in progress. Returns whether the engine
    /// started the job; when it did not, or the call failed, `busy` is
    /// cleared and nothing else changes.
    #[instrument(skip(self))]
    pub async fn start(&self, request: SelfPlayRequest) -> bool {
        let Some(_guard) = self.inner.calls.try_begin() else {
            return false;
        };
        if self.is_busy() {
            debug!("Self-play already running");
            return false;
        }
        if let Err(message) = request.validate() {
            self.inner
                .errors
                .raise(SessionError::new(ErrorSource::SelfPlay, message));
            return false;
        }

        let run_id = {
            let mut run = self.inner.lock();
            let run_id = run.next_run();
            run.anchor = Some(Instant::now());
            run_id
        };
        self.inner.view.send_modify(|view| {
            view.busy = true;
            view.progress = None;
            view.report = None;
            view.eta = None;
        });

        // Subscribe first so no event emitted right after the start call is lost.
        if let Err(error) = self.attach(run_id).await {
            self.inner.lock().next_run();
            self.inner.set_idle();
            self.inner.errors.raise(error);
            return false;
        }

        match self.inner.engine.start_self_play(&request).await {
            Ok(true) => {
                info!(
                    games_per_pair = request.games_per_pair,
                    include_llm = request.include_llm,
                    "Self-play started"
                );
                true
            }
            Ok(false) => {
                warn!("Engine declined to start self-play");
                self.inner.lock().next_run();
                self.inner.set_idle();
                false
            }
            Err(e) => {
                warn!(error = %e, "Self-play start call failed");
                self.inner.lock().next_run();
                self.inner.set_idle();
                false
            }
        }
    }

    /// Asks the running job to stop. `busy` stays set until the job reports.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        if !self.is_busy() {
            return;
        }
        let Some(_guard) = self.inner.calls.try_begin() else {
            return;
        };
        match self.inner.engine.stop_self_play().await {
            Ok(()) => info!("Self-play stop requested"),
            Err(e) => self
                .inner
                .errors
                .raise(SessionError::from_gateway(ErrorSource::SelfPlay, &e)),
        }
    }

    /// Tears down the event subscription, e.g. when the owning view closes.
    ///
    /// Events already in flight for the old subscription are discarded.
    #[instrument(skip(self))]
    pub fn detach(&self) {
        let mut run = self.inner.lock();
        run.next_run();
        run.anchor = None;
        debug!("Self-play subscription detached");
    }

    /// Re-subscribes to a run still in progress after [`detach`](Self::detach).
    ///
    /// The ETA re-anchors on the first progress event with a completed game.
    #[instrument(skip(self))]
    pub async fn reattach(&self) {
        if !self.is_busy() {
            return;
        }
        let run_id = {
            let mut run = self.inner.lock();
            let run_id = run.next_run();
            run.anchor = None;
            run_id
        };
        self.inner.view.send_modify(|view| view.eta = None);
        if let Err(error) = self.attach(run_id).await {
            self.inner.errors.raise(error);
        }
    }
}

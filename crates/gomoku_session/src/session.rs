//! Session controller: the move pipeline and owner of the game snapshot.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorSlot, ErrorSource, SessionError};
use crate::gateway::EngineClient;
use crate::guard::{FlightGuard, InFlight};
use crate::hooks::SessionHooks;
use crate::types::{GameMode, GameSnapshot, RuleSetKind};

/// What a pipeline operation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A precondition failed or another operation was pending; nothing was sent.
    Skipped,
    /// The engine answered and the snapshot was replaced.
    Applied,
    /// The engine call failed and the error slot was set.
    Failed,
}

struct Inner {
    engine: EngineClient,
    snapshot: watch::Sender<Option<GameSnapshot>>,
    errors: ErrorSlot,
    moves: InFlight,
    hooks: Arc<dyn SessionHooks>,
}

/// Owns the authoritative [`GameSnapshot`] and sequences every game call.
///
/// All game-mutating operations share one in-flight latch. A call made while
/// another is pending is a silent no-op returning [`StepOutcome::Skipped`];
/// the UI is expected to have disabled the control already. Cloning yields
/// another handle to the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("busy", &self.inner.moves.is_busy())
            .field("snapshot", &*self.inner.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Creates a controller with no game loaded.
    #[instrument(skip_all)]
    pub fn new(engine: EngineClient, errors: ErrorSlot, hooks: Arc<dyn SessionHooks>) -> Self {
        info!("Creating SessionController");
        let (snapshot, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                engine,
                snapshot,
                errors,
                moves: InFlight::new("moves"),
                hooks,
            }),
        }
    }

    /// Typed engine access for collaborators (ratings, users, profiles).
    pub fn engine(&self) -> &EngineClient {
        &self.inner.engine
    }

    /// The shared error slot.
    pub fn errors(&self) -> &ErrorSlot {
        &self.inner.errors
    }

    /// Current snapshot, if a game has been loaded.
    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribes to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Option<GameSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    /// Currently visible error.
    pub fn error(&self) -> Option<SessionError> {
        self.inner.errors.current()
    }

    /// Whether a game operation is pending.
    pub fn is_busy(&self) -> bool {
        self.inner.moves.is_busy()
    }

    /// Clears the visible error.
    pub fn dismiss_error(&self) {
        self.inner.errors.clear();
    }

    fn publish(&self, snapshot: GameSnapshot) {
        debug!(
            moves = snapshot.moves.len(),
            to_move = %snapshot.to_move,
            result = ?snapshot.result,
            "Publishing snapshot"
        );
        self.inner.errors.clear();
        self.inner.snapshot.send_replace(Some(snapshot));
    }

    fn accept(&self, snapshot: GameSnapshot) {
        self.publish(snapshot.clone());
        self.inner.hooks.move_accepted(&snapshot);
        if snapshot.is_terminal() {
            info!(result = ?snapshot.result, "Game finished");
            self.inner.hooks.ratings_changed();
        }
    }

    /// Places a human stone at `(x, y)` and, when owed, the engine's reply.
    ///
    /// Preconditions checked locally: nothing pending, game not over, the
    /// human may move, and the cell is empty. A rejected human move leaves
    /// the snapshot untouched and surfaces a non-retryable error. A failed
    /// reply keeps the human move applied and surfaces a retryable error.
    #[instrument(skip(self))]
    pub async fn submit_move(&self, x: usize, y: usize) -> StepOutcome {
        let Some(guard) = self.inner.moves.try_begin() else {
            return StepOutcome::Skipped;
        };
        let Some(current) = self.snapshot() else {
            debug!("No game loaded");
            return StepOutcome::Skipped;
        };
        if current.is_terminal() || !current.can_human_move || current.cell(x, y).is_some() {
            debug!(
                terminal = current.is_terminal(),
                can_human_move = current.can_human_move,
                "Move precondition failed"
            );
            return StepOutcome::Skipped;
        }

        let snapshot = match self.inner.engine.make_move(x, y).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.inner
                    .errors
                    .raise(SessionError::from_gateway(ErrorSource::Move, &e));
                return StepOutcome::Failed;
            }
        };

        let reply_owed = snapshot.reply_owed();
        self.accept(snapshot);

        if !reply_owed {
            return StepOutcome::Applied;
        }
        debug!("Engine reply owed");
        self.engine_step(&guard).await
    }

    /// Asks the engine for one move.
    ///
    /// Drives both the manual "single step" control and the auto-play
    /// scheduler. `force` bypasses the game-over check, needed when a new
    /// game starts with the engine to move.
    #[instrument(skip(self))]
    pub async fn request_engine_step(&self, force: bool) -> StepOutcome {
        let Some(guard) = self.inner.moves.try_begin() else {
            return StepOutcome::Skipped;
        };
        self.step_claimed(guard, force).await
    }

    /// Claims the move latch without issuing a call.
    pub(crate) fn try_claim(&self) -> Option<FlightGuard> {
        self.inner.moves.try_begin()
    }

    /// Runs an engine step under a latch the caller already holds.
    pub(crate) async fn step_claimed(&self, guard: FlightGuard, force: bool) -> StepOutcome {
        let current = self.snapshot();
        if !force && current.as_ref().is_none_or(GameSnapshot::is_terminal) {
            debug!("Engine step skipped: no game in progress");
            return StepOutcome::Skipped;
        }
        if let Some(snapshot) = &current
            && (snapshot.mode == GameMode::HumanVsHuman || snapshot.can_human_move)
        {
            debug!("Engine step skipped: the human is to move");
            return StepOutcome::Skipped;
        }
        self.engine_step(&guard).await
    }

    async fn engine_step(&self, _guard: &FlightGuard) -> StepOutcome {
        match self.inner.engine.ai_move().await {
            Ok(snapshot) => {
                self.accept(snapshot);
                StepOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, "Engine move failed");
                self.inner
                    .errors
                    .raise(SessionError::from_gateway(ErrorSource::AutoReply, &e));
                StepOutcome::Failed
            }
        }
    }

    /// Re-issues the engine step behind a retryable error.
    ///
    /// Does nothing unless the visible error is retryable.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> StepOutcome {
        if !self.error().is_some_and(|e| e.is_retryable()) {
            return StepOutcome::Skipped;
        }
        let Some(guard) = self.inner.moves.try_begin() else {
            return StepOutcome::Skipped;
        };
        self.inner.errors.clear();
        self.step_claimed(guard, false).await
    }

    /// Starts a new game; if the engine moves first, requests its move.
    #[instrument(skip(self))]
    pub async fn new_game(&self, rule_set: RuleSetKind, mode: GameMode) -> StepOutcome {
        let Some(guard) = self.inner.moves.try_begin() else {
            return StepOutcome::Skipped;
        };
        let snapshot = match self.inner.engine.new_game(rule_set, &mode).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.inner
                    .errors
                    .raise(SessionError::from_gateway(ErrorSource::Game, &e));
                return StepOutcome::Failed;
            }
        };
        info!(mode = ?snapshot.mode, "New game started");
        let reply_owed = snapshot.reply_owed();
        self.publish(snapshot);
        if reply_owed {
            debug!("Engine opens the game");
            return self.step_claimed(guard, true).await;
        }
        StepOutcome::Applied
    }

    /// Re-reads the engine's game state.
    ///
    /// Whether a reply is still owed is derivable from the refreshed snapshot
    /// via [`GameSnapshot::reply_owed`]; refreshing does not issue one.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> StepOutcome {
        let Some(_guard) = self.inner.moves.try_begin() else {
            return StepOutcome::Skipped;
        };
        match self.inner.engine.get_state().await {
            Ok(snapshot) => {
                self.publish(snapshot);
                StepOutcome::Applied
            }
            Err(e) => {
                self.inner
                    .errors
                    .raise(SessionError::from_gateway(ErrorSource::Game, &e));
                StepOutcome::Failed
            }
        }
    }

    /// Loads a saved game and makes it current.
    #[instrument(skip(self))]
    pub async fn load_game(&self, path: &str) -> StepOutcome {
        let Some(_guard) = self.inner.moves.try_begin() else {
            return StepOutcome::Skipped;
        };
        match self.inner.engine.load_game(path).await {
            Ok(snapshot) => {
                info!(path, moves = snapshot.moves.len(), "Game loaded");
                self.publish(snapshot);
                StepOutcome::Applied
            }
            Err(e) => {
                self.inner
                    .errors
                    .raise(SessionError::from_gateway(ErrorSource::Game, &e));
                StepOutcome::Failed
            }
        }
    }

    /// Saves the current game record.
    #[instrument(skip(self))]
    pub async fn save_game(&self, path: &str) -> bool {
        self.report(self.inner.engine.save_game(path).await)
    }

    /// Exports training samples of the current game.
    #[instrument(skip(self))]
    pub async fn export_training(&self, path: &str) -> bool {
        self.report(self.inner.engine.export_training(path).await)
    }

    fn report(&self, result: Result<(), crate::GatewayError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.inner
                    .errors
                    .raise(SessionError::from_gateway(ErrorSource::Game, &e));
                false
            }
        }
    }
}

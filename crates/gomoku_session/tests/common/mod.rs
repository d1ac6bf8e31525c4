//! Scripted in-memory engine host shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use gomoku_session::{
    EngineClient, EngineCommand, EngineEvent, EngineGateway, ErrorSlot, EventStream, GameMode,
    GameResult, GameSnapshot, GatewayError, Move, Player, RuleSetKind, SessionController,
    SessionHooks,
};
use serde_json::{Value, json};
use tokio::sync::{Semaphore, mpsc};

/// Side length of the scripted board.
pub const BOARD_SIZE: usize = 15;

#[derive(Debug, Clone)]
struct Game {
    board: Vec<Option<Player>>,
    to_move: Player,
    moves: Vec<Move>,
    mode: GameMode,
    result: Option<GameResult>,
}

impl Game {
    fn new(mode: GameMode) -> Self {
        Self {
            board: vec![None; BOARD_SIZE * BOARD_SIZE],
            to_move: Player::B,
            moves: Vec::new(),
            mode,
            result: None,
        }
    }

    fn can_human_move(&self) -> bool {
        if self.result.is_some() {
            return false;
        }
        match &self.mode {
            GameMode::HumanVsAi { human_color } => self.to_move == *human_color,
            GameMode::HumanVsHuman => true,
            GameMode::AiVsAi { .. } => false,
        }
    }

    fn place(&mut self, x: usize, y: usize, finish_after: Option<usize>) {
        self.board[y * BOARD_SIZE + x] = Some(self.to_move);
        self.moves.push(Move {
            x,
            y,
            player: self.to_move,
            t: None,
        });
        if finish_after.is_some_and(|n| self.moves.len() >= n) {
            self.result = Some(match self.to_move {
                Player::B => GameResult::BWin,
                Player::W => GameResult::WWin,
            });
        }
        self.to_move = self.to_move.other();
    }

    fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            board_size: BOARD_SIZE,
            board: self.board.clone(),
            rule_set: RuleSetKind::Standard,
            to_move: self.to_move,
            result: self.result,
            moves: self.moves.clone(),
            mode: self.mode.clone(),
            can_human_move: self.can_human_move(),
        }
    }
}

/// Engine host double: a tiny board model plus call accounting, scripted
/// failures, held calls and pushed events.
///
/// Locks are never held across an await.
pub struct ScriptedGateway {
    game: Mutex<Game>,
    finish_after: Mutex<Option<usize>>,
    calls: Mutex<HashMap<EngineCommand, usize>>,
    failures: Mutex<HashMap<EngineCommand, VecDeque<GatewayError>>>,
    holds: Mutex<HashMap<EngineCommand, Arc<Semaphore>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<EngineEvent>>>,
    self_play_result: Mutex<Value>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            game: Mutex::new(Game::new(GameMode::default())),
            finish_after: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            self_play_result: Mutex::new(json!(true)),
        }
    }
}

impl ScriptedGateway {
    /// Number of times `command` reached the gateway.
    pub fn count(&self, command: EngineCommand) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(&command)
            .copied()
            .unwrap_or(0)
    }

    /// Fails the next call of `command` with `error`.
    pub fn fail_next(&self, command: EngineCommand, error: GatewayError) {
        self.failures
            .lock()
            .expect("failures lock")
            .entry(command)
            .or_default()
            .push_back(error);
    }

    /// Blocks every later call of `command` until [`release`](Self::release).
    pub fn hold(&self, command: EngineCommand) {
        self.holds
            .lock()
            .expect("holds lock")
            .insert(command, Arc::new(Semaphore::new(0)));
    }

    /// Lets one held call of `command` proceed.
    pub fn release(&self, command: EngineCommand) {
        if let Some(gate) = self.holds.lock().expect("holds lock").get(&command) {
            gate.add_permits(1);
        }
    }

    /// Stops holding `command` and releases everything waiting on it.
    pub fn unhold(&self, command: EngineCommand) {
        if let Some(gate) = self.holds.lock().expect("holds lock").remove(&command) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Ends the game once the board holds `moves` stones.
    pub fn finish_after(&self, moves: usize) {
        *self.finish_after.lock().expect("finish lock") = Some(moves);
    }

    /// Raw JSON returned by `start_self_play`.
    pub fn set_self_play_result(&self, value: Value) {
        *self.self_play_result.lock().expect("self-play lock") = value;
    }

    /// Pushes an event to every open subscription.
    pub fn emit(&self, event: EngineEvent) {
        self.subscribers
            .lock()
            .expect("subscribers lock")
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drops every open subscription, as a host that lost its stream would.
    pub fn close_streams(&self) {
        self.subscribers.lock().expect("subscribers lock").clear();
    }

    /// Open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().expect("subscribers lock");
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Current engine-side game.
    pub fn snapshot(&self) -> GameSnapshot {
        self.game.lock().expect("game lock").snapshot()
    }

    fn dispatch(&self, command: EngineCommand, args: &Value) -> Result<Value, GatewayError> {
        let finish_after = *self.finish_after.lock().expect("finish lock");
        let mut game = self.game.lock().expect("game lock");
        let snapshot = match command {
            EngineCommand::NewGame => {
                let mode: GameMode = serde_json::from_value(args["mode"].clone())?;
                *game = Game::new(mode);
                game.snapshot()
            }
            EngineCommand::GetState | EngineCommand::LoadGame => game.snapshot(),
            EngineCommand::MakeMove => {
                if game.result.is_some() {
                    return Err(GatewayError::rejected("Game is over"));
                }
                let x = args["x"].as_u64().unwrap_or(u64::MAX) as usize;
                let y = args["y"].as_u64().unwrap_or(u64::MAX) as usize;
                if x >= BOARD_SIZE || y >= BOARD_SIZE {
                    return Err(GatewayError::rejected("Move out of bounds"));
                }
                if game.board[y * BOARD_SIZE + x].is_some() {
                    return Err(GatewayError::rejected("Cell occupied"));
                }
                game.place(x, y, finish_after);
                game.snapshot()
            }
            EngineCommand::AiMove => {
                if game.result.is_some() {
                    return Err(GatewayError::rejected("Game is over"));
                }
                let Some(index) = game.board.iter().position(Option::is_none) else {
                    return Err(GatewayError::rejected("Board is full"));
                };
                game.place(index % BOARD_SIZE, index / BOARD_SIZE, finish_after);
                game.snapshot()
            }
            EngineCommand::SaveGame
            | EngineCommand::ExportTraining
            | EngineCommand::StopSelfPlay => return Ok(Value::Null),
            EngineCommand::StartSelfPlay => {
                return Ok(self.self_play_result.lock().expect("self-play lock").clone());
            }
            other => return Err(GatewayError::rejected(format!("{} not scripted", other))),
        };
        Ok(serde_json::to_value(snapshot)?)
    }
}

#[async_trait::async_trait]
impl EngineGateway for ScriptedGateway {
    async fn call(&self, command: EngineCommand, args: Value) -> Result<Value, GatewayError> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(command)
            .or_insert(0) += 1;

        let gate = self.holds.lock().expect("holds lock").get(&command).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate open").forget();
        }

        let failure = self
            .failures
            .lock()
            .expect("failures lock")
            .get_mut(&command)
            .and_then(VecDeque::pop_front);
        if let Some(error) = failure {
            return Err(error);
        }
        self.dispatch(command, &args)
    }

    async fn subscribe(&self) -> Result<EventStream, GatewayError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().expect("subscribers lock").push(tx);
        Ok(rx)
    }
}

/// Hooks that count their invocations.
#[derive(Default)]
pub struct CountingHooks {
    accepted: Mutex<usize>,
    ratings: Mutex<usize>,
}

impl CountingHooks {
    /// Times `move_accepted` fired.
    pub fn accepted(&self) -> usize {
        *self.accepted.lock().expect("hooks lock")
    }

    /// Times `ratings_changed` fired.
    pub fn ratings(&self) -> usize {
        *self.ratings.lock().expect("hooks lock")
    }
}

impl SessionHooks for CountingHooks {
    fn move_accepted(&self, _snapshot: &GameSnapshot) {
        *self.accepted.lock().expect("hooks lock") += 1;
    }

    fn ratings_changed(&self) {
        *self.ratings.lock().expect("hooks lock") += 1;
    }
}

/// A session wired to a fresh scripted engine.
pub fn setup_session() -> (Arc<ScriptedGateway>, Arc<CountingHooks>, SessionController) {
    let gateway = Arc::new(ScriptedGateway::default());
    let hooks = Arc::new(CountingHooks::default());
    let session = SessionController::new(
        EngineClient::new(gateway.clone()),
        ErrorSlot::new(),
        hooks.clone(),
    );
    (gateway, hooks, session)
}

/// Yields until `command` has reached the gateway `n` times.
pub async fn wait_for_calls(gateway: &ScriptedGateway, command: EngineCommand, n: usize) {
    for _ in 0..10_000 {
        if gateway.count(command) >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!(
        "{} reached the gateway {} times, expected {}",
        command,
        gateway.count(command),
        n
    );
}

/// Lets spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

/// Engine-vs-engine mode used by the auto-play tests.
pub fn engines() -> GameMode {
    GameMode::AiVsAi {
        black_id: "lvl3".to_string(),
        white_id: "lvl7".to_string(),
    }
}

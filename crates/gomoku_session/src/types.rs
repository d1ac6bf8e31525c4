//! Wire types exchanged with the engine host.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Stone colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Player {
    /// Black, moves first.
    B,
    /// White.
    W,
}

impl Player {
    /// Returns the opposing colour.
    pub fn other(self) -> Self {
        match self {
            Self::B => Self::W,
            Self::W => Self::B,
        }
    }
}

/// Rule set the engine applies to a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleSetKind {
    /// Five or more in a row wins.
    #[default]
    Standard,
}

/// Terminal outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameResult {
    /// Black won.
    #[strum(serialize = "black wins")]
    BWin,
    /// White won.
    #[strum(serialize = "white wins")]
    WWin,
    /// Board filled without a winner.
    #[strum(serialize = "draw")]
    Draw,
}

/// A placed stone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Who placed it.
    pub player: Player,
    /// Engine timestamp, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
}

/// Who controls each colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameMode {
    /// A local human against the engine.
    #[serde(rename_all = "camelCase")]
    HumanVsAi {
        /// Colour the human plays.
        human_color: Player,
    },
    /// Two engine profiles against each other.
    #[serde(rename_all = "camelCase")]
    AiVsAi {
        /// Profile playing black.
        black_id: String,
        /// Profile playing white.
        white_id: String,
    },
    /// Two humans sharing the board.
    HumanVsHuman,
}

impl Default for GameMode {
    fn default() -> Self {
        Self::HumanVsAi {
            human_color: Player::B,
        }
    }
}

/// Authoritative game state returned by every successful game call.
///
/// Snapshots are replaced wholesale; nothing in this crate mutates one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Side length of the square board.
    pub board_size: usize,
    /// Row-major cell occupancy, `board_size * board_size` long.
    pub board: Vec<Option<Player>>,
    /// Active rule set.
    pub rule_set: RuleSetKind,
    /// Colour to move next.
    pub to_move: Player,
    /// Terminal result, if the game is over.
    pub result: Option<GameResult>,
    /// Moves in play order.
    pub moves: Vec<Move>,
    /// Who controls each colour.
    pub mode: GameMode,
    /// Whether the local human may place the next stone.
    pub can_human_move: bool,
}

impl GameSnapshot {
    /// Returns the occupant of `(x, y)`, or `None` when empty or out of bounds.
    pub fn cell(&self, x: usize, y: usize) -> Option<Player> {
        if x >= self.board_size || y >= self.board_size {
            return None;
        }
        self.board.get(y * self.board_size + x).copied().flatten()
    }

    /// Whether the game has ended.
    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    /// Whether both colours are engine-controlled.
    pub fn is_engine_vs_engine(&self) -> bool {
        matches!(self.mode, GameMode::AiVsAi { .. })
    }

    /// Whether the engine owes an automatic reply to the local human.
    ///
    /// Derived purely from the snapshot so a refreshed state carries the
    /// obligation without any separate bookkeeping.
    pub fn reply_owed(&self) -> bool {
        self.result.is_none()
            && matches!(self.mode, GameMode::HumanVsAi { .. })
            && !self.can_human_move
    }

    /// Whether the board vector matches the declared size.
    pub fn is_consistent(&self) -> bool {
        self.board.len() == self.board_size * self.board_size
    }
}

/// Latest progress reported by a running self-play job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, derive_new::new)]
#[serde(rename_all = "camelCase")]
pub struct SelfPlayProgress {
    /// Games finished so far.
    pub completed: u32,
    /// Games scheduled in total.
    pub total: u32,
    /// Completion in percent.
    pub percent: f32,
}

/// Terminal summary of a self-play job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(rename_all = "camelCase")]
pub struct SelfPlayReport {
    /// Games played for every profile pairing.
    pub games_per_pair: u32,
    /// Games scheduled in total.
    pub total_games: u32,
    /// Games actually finished.
    pub completed_games: u32,
    /// Whether the job ended because it was asked to stop.
    pub stopped: bool,
}

/// Kind of engine profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Built-in search profile.
    #[default]
    Heuristic,
    /// Language-model backed profile.
    Llm,
}

/// Search parameters of a heuristic profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    /// Search depth in plies.
    pub depth: u8,
    /// Candidates considered per node.
    pub max_candidates: usize,
    /// Random jitter applied to scores.
    pub randomness: u8,
    /// Node budget per search.
    pub max_nodes: u32,
    /// Weight given to blocking the opponent.
    pub defense_weight: i32,
}

/// Connection settings of a language-model profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// API base URL.
    #[serde(default)]
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Number of candidate moves offered to the model.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    /// Whether a credential is stored for this profile.
    #[serde(default)]
    pub api_key_set: bool,
}

fn default_temperature() -> f32 {
    0.4
}

fn default_top_p() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    128
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_candidate_limit() -> usize {
    12
}

/// Rating record of the local player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    /// Current rating.
    pub rating: f64,
    /// Rated games played.
    pub games: u32,
    /// Wins.
    #[serde(default)]
    pub wins: u32,
    /// Draws.
    #[serde(default)]
    pub draws: u32,
    /// Losses.
    #[serde(default)]
    pub losses: u32,
}

/// Rating record of an engine profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRating {
    /// Profile id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current rating.
    pub rating: f64,
    /// Rated games played.
    pub games: u32,
    /// Wins.
    #[serde(default)]
    pub wins: u32,
    /// Draws.
    #[serde(default)]
    pub draws: u32,
    /// Losses.
    #[serde(default)]
    pub losses: u32,
    /// Profile kind.
    #[serde(default)]
    pub kind: ProfileKind,
    /// Search parameters for heuristic profiles.
    #[serde(default)]
    pub config: Option<AiConfig>,
    /// Connection settings for language-model profiles.
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

impl ProfileRating {
    /// Whether this is a language-model profile with a stored credential.
    pub fn is_provisioned_llm(&self) -> bool {
        self.kind == ProfileKind::Llm && self.llm.as_ref().is_some_and(|llm| llm.api_key_set)
    }
}

/// Ratings table plus matchmaking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsSnapshot {
    /// Local player's rating.
    pub player: RatingEntry,
    /// Every engine profile.
    pub profiles: Vec<ProfileRating>,
    /// Profile used for human-vs-engine games.
    pub active_profile: String,
    /// Whether the opponent is picked by rating.
    pub auto_match: bool,
    /// Rating offset applied when auto-matching.
    pub match_offset: i32,
}

/// A local user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation timestamp as reported by the engine host.
    pub created_at: String,
    /// Directory holding the user's data.
    pub data_dir: String,
}

/// All local users plus the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersSnapshot {
    /// Id of the active user.
    pub active_user: String,
    /// Every user.
    pub users: Vec<UserInfo>,
}

//! Engine gateway: the request/response boundary to the engine host.

mod client;
mod rpc;

pub use client::EngineClient;
pub use rpc::RpcGateway;

use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::GatewayError;
use crate::types::{SelfPlayProgress, SelfPlayReport};

/// Channel carrying repeated [`SelfPlayProgress`] events.
pub const PROGRESS_CHANNEL: &str = "self_play_progress";
/// Channel carrying the terminal [`SelfPlayReport`].
pub const DONE_CHANNEL: &str = "self_play_done";
/// Channel carrying the terminal error string.
pub const ERROR_CHANNEL: &str = "self_play_error";

/// Receiving half of an engine event subscription.
pub type EventStream = mpsc::UnboundedReceiver<EngineEvent>;

/// Commands understood by the engine host, with their contractual wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EngineCommand {
    /// Start a fresh game.
    NewGame,
    /// Read the current game state.
    GetState,
    /// Place a human stone.
    MakeMove,
    /// Let the engine place a stone.
    AiMove,
    /// Write the game record to disk.
    SaveGame,
    /// Read a game record from disk.
    LoadGame,
    /// Export training samples.
    ExportTraining,
    /// Read the ratings table.
    GetRatings,
    /// Configure rating-based matchmaking.
    SetMatchMode,
    /// Choose the engine profile for human games.
    SetActiveProfile,
    /// Register a language-model profile.
    CreateLlmProfile,
    /// Edit a language-model profile.
    UpdateLlmProfile,
    /// Remove a language-model profile.
    DeleteLlmProfile,
    /// List local users.
    GetUsers,
    /// Add a local user.
    CreateUser,
    /// Switch the active user.
    SetActiveUser,
    /// Remove a local user.
    DeleteUser,
    /// Rename a local user.
    UpdateUser,
    /// Launch the background calibration job.
    StartSelfPlay,
    /// Ask the calibration job to wind down.
    StopSelfPlay,
}

/// Push event emitted by a running self-play job.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Throughput update.
    Progress(SelfPlayProgress),
    /// The job finished or was stopped.
    Done(SelfPlayReport),
    /// The job failed.
    Failed(String),
}

impl EngineEvent {
    /// Decodes an event from its channel name and JSON payload.
    ///
    /// Returns `Ok(None)` for channels this crate does not consume.
    pub fn decode(channel: &str, payload: Value) -> Result<Option<Self>, GatewayError> {
        let event = match channel {
            PROGRESS_CHANNEL => Self::Progress(serde_json::from_value(payload)?),
            DONE_CHANNEL => Self::Done(serde_json::from_value(payload)?),
            ERROR_CHANNEL => Self::Failed(match payload {
                Value::String(message) => message,
                other => other.to_string(),
            }),
            other => {
                debug!(channel = other, "Ignoring event on unknown channel");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }

    /// Whether the event ends the run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Asynchronous call surface to the engine host.
///
/// The gateway performs no interpretation, retry or backoff; those are
/// decisions for the caller.
#[async_trait::async_trait]
pub trait EngineGateway: Send + Sync {
    /// Issues one command and returns its raw JSON result.
    async fn call(&self, command: EngineCommand, args: Value) -> Result<Value, GatewayError>;

    /// Opens a subscription to the engine's push-event channels.
    async fn subscribe(&self) -> Result<EventStream, GatewayError>;
}

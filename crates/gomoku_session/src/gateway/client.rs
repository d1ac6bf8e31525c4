//! Typed adapter over the raw gateway call primitive.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{EngineCommand, EngineGateway, EventStream};
use crate::error::GatewayError;
use crate::selfplay::SelfPlayRequest;
use crate::types::{
    GameMode, GameSnapshot, LlmConfig, RatingsSnapshot, RuleSetKind, UsersSnapshot,
};

/// One typed method per engine command.
///
/// Arguments are encoded with the engine's camelCase names and results are
/// decoded into the wire types of [`crate::types`].
#[derive(Clone)]
pub struct EngineClient {
    gateway: Arc<dyn EngineGateway>,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient").finish_non_exhaustive()
    }
}

impl EngineClient {
    /// Wraps a gateway.
    pub fn new(gateway: Arc<dyn EngineGateway>) -> Self {
        Self { gateway }
    }

    /// Opens the engine's event subscription.
    pub async fn subscribe(&self) -> Result<EventStream, GatewayError> {
        self.gateway.subscribe().await
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        command: EngineCommand,
        args: Value,
    ) -> Result<T, GatewayError> {
        let raw = self.gateway.call(command, args).await?;
        debug!(command = %command, "Decoding engine response");
        serde_json::from_value(raw).map_err(|e| {
            GatewayError::protocol(format!("Unexpected {} response: {}", command, e))
        })
    }

    async fn invoke_unit(&self, command: EngineCommand, args: Value) -> Result<(), GatewayError> {
        self.gateway.call(command, args).await.map(|_| ())
    }

    async fn invoke_snapshot(
        &self,
        command: EngineCommand,
        args: Value,
    ) -> Result<GameSnapshot, GatewayError> {
        let snapshot: GameSnapshot = self.invoke(command, args).await?;
        if !snapshot.is_consistent() {
            return Err(GatewayError::protocol(format!(
                "{} returned {} cells for a {}x{} board",
                command,
                snapshot.board.len(),
                snapshot.board_size,
                snapshot.board_size
            )));
        }
        Ok(snapshot)
    }

    /// Starts a fresh game.
    #[instrument(skip(self))]
    pub async fn new_game(
        &self,
        rule_set: RuleSetKind,
        mode: &GameMode,
    ) -> Result<GameSnapshot, GatewayError> {
        self.invoke_snapshot(
            EngineCommand::NewGame,
            json!({"ruleSet": rule_set, "mode": mode}),
        )
        .await
    }

    /// Reads the current game state.
    #[instrument(skip(self))]
    pub async fn get_state(&self) -> Result<GameSnapshot, GatewayError> {
        self.invoke_snapshot(EngineCommand::GetState, json!({})).await
    }

    /// Places a human stone at `(x, y)`.
    #[instrument(skip(self))]
    pub async fn make_move(&self, x: usize, y: usize) -> Result<GameSnapshot, GatewayError> {
        self.invoke_snapshot(EngineCommand::MakeMove, json!({"x": x, "y": y}))
            .await
    }

    /// Lets the engine place the next stone.
    #[instrument(skip(self))]
    pub async fn ai_move(&self) -> Result<GameSnapshot, GatewayError> {
        self.invoke_snapshot(EngineCommand::AiMove, json!({})).await
    }

    /// Writes the game record to `path`.
    #[instrument(skip(self))]
    pub async fn save_game(&self, path: &str) -> Result<(), GatewayError> {
        self.invoke_unit(EngineCommand::SaveGame, json!({"path": path}))
            .await
    }

    /// Loads a game record from `path`.
    #[instrument(skip(self))]
    pub async fn load_game(&self, path: &str) -> Result<GameSnapshot, GatewayError> {
        self.invoke_snapshot(EngineCommand::LoadGame, json!({"path": path}))
            .await
    }

    /// Exports training samples of the current game to `path`.
    #[instrument(skip(self))]
    pub async fn export_training(&self, path: &str) -> Result<(), GatewayError> {
        self.invoke_unit(EngineCommand::ExportTraining, json!({"path": path}))
            .await
    }

    /// Reads the ratings table.
    #[instrument(skip(self))]
    pub async fn get_ratings(&self) -> Result<RatingsSnapshot, GatewayError> {
        self.invoke(EngineCommand::GetRatings, json!({})).await
    }

    /// Configures rating-based matchmaking.
    #[instrument(skip(self))]
    pub async fn set_match_mode(
        &self,
        auto_match: bool,
        match_offset: i32,
    ) -> Result<RatingsSnapshot, GatewayError> {
        self.invoke(
            EngineCommand::SetMatchMode,
            json!({"autoMatch": auto_match, "matchOffset": match_offset}),
        )
        .await
    }

    /// Chooses the engine profile for human games.
    #[instrument(skip(self))]
    pub async fn set_active_profile(&self, id: &str) -> Result<RatingsSnapshot, GatewayError> {
        self.invoke(EngineCommand::SetActiveProfile, json!({"id": id}))
            .await
    }

    /// Registers a language-model profile.
    #[instrument(skip(self, config, api_key))]
    pub async fn create_llm_profile(
        &self,
        name: &str,
        config: &LlmConfig,
        api_key: &str,
    ) -> Result<RatingsSnapshot, GatewayError> {
        self.invoke(
            EngineCommand::CreateLlmProfile,
            json!({"name": name, "config": config, "apiKey": api_key}),
        )
        .await
    }

    /// Edits a language-model profile; `None` keeps the stored credential.
    #[instrument(skip(self, config, api_key))]
    pub async fn update_llm_profile(
        &self,
        id: &str,
        name: &str,
        config: &LlmConfig,
        api_key: Option<&str>,
    ) -> Result<RatingsSnapshot, GatewayError> {
        self.invoke(
            EngineCommand::UpdateLlmProfile,
            json!({"id": id, "name": name, "config": config, "apiKey": api_key}),
        )
        .await
    }

    /// Removes a language-model profile, optionally with its credential.
    #[instrument(skip(self))]
    pub async fn delete_llm_profile(
        &self,
        id: &str,
        delete_key: bool,
    ) -> Result<RatingsSnapshot, GatewayError> {
        self.invoke(
            EngineCommand::DeleteLlmProfile,
            json!({"id": id, "deleteKey": delete_key}),
        )
        .await
    }

    /// Lists local users.
    #[instrument(skip(self))]
    pub async fn get_users(&self) -> Result<UsersSnapshot, GatewayError> {
        self.invoke(EngineCommand::GetUsers, json!({})).await
    }

    /// Adds a local user.
    #[instrument(skip(self))]
    pub async fn create_user(&self, name: &str) -> Result<UsersSnapshot, GatewayError> {
        self.invoke(EngineCommand::CreateUser, json!({"name": name}))
            .await
    }

    /// Switches the active user.
    #[instrument(skip(self))]
    pub async fn set_active_user(&self, id: &str) -> Result<UsersSnapshot, GatewayError> {
        self.invoke(EngineCommand::SetActiveUser, json!({"id": id}))
            .await
    }

    /// Removes a local user, optionally with their data directory.
    #[instrument(skip(self))]
    pub async fn delete_user(
        &self,
        id: &str,
        delete_data: bool,
    ) -> Result<UsersSnapshot, GatewayError> {
        self.invoke(
            EngineCommand::DeleteUser,
            json!({"id": id, "deleteData": delete_data}),
        )
        .await
    }

    /// Renames a local user.
    #[instrument(skip(self))]
    pub async fn update_user(&self, id: &str, name: &str) -> Result<UsersSnapshot, GatewayError> {
        self.invoke(EngineCommand::UpdateUser, json!({"id": id, "name": name}))
            .await
    }

    /// Launches the calibration job; `false` means the engine did not start it.
    #[instrument(skip(self))]
    pub async fn start_self_play(&self, request: &SelfPlayRequest) -> Result<bool, GatewayError> {
        let started: Option<bool> = self
            .invoke(EngineCommand::StartSelfPlay, request.to_args())
            .await?;
        Ok(started.unwrap_or(false))
    }

    /// Asks the calibration job to wind down.
    #[instrument(skip(self))]
    pub async fn stop_self_play(&self) -> Result<(), GatewayError> {
        self.invoke_unit(EngineCommand::StopSelfPlay, json!({}))
            .await
    }
}

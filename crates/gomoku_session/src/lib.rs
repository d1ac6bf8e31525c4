//! Gomoku session core - client-side control of an engine-hosted game
//!
//! This library sequences every call a gomoku front end makes to the
//! engine host and publishes the resulting state for a UI to render.
//!
//! # Architecture
//!
//! - **Gateway**: typed engine commands over an async transport (JSON-RPC)
//! - **Session**: the move pipeline and the authoritative game snapshot
//! - **Auto-play**: timed engine-vs-engine stepping
//! - **Self-play**: calibration runs with progress and ETA
//! - **Navigation**: welcome / play / settings view state
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gomoku_session::{
//!     ClientConfig, EngineClient, ErrorSlot, GameMode, NoHooks, Player, RpcGateway,
//!     RuleSetKind, SessionController,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::default();
//! let gateway = RpcGateway::new(config.engine_url(), config.request_timeout())?;
//! let engine = EngineClient::new(Arc::new(gateway));
//! let session = SessionController::new(engine, ErrorSlot::new(), Arc::new(NoHooks));
//!
//! session
//!     .new_game(RuleSetKind::Standard, GameMode::HumanVsAi { human_color: Player::W })
//!     .await;
//! session.submit_move(7, 8).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod autoplay;
mod config;
mod error;
mod gateway;
mod guard;
mod hooks;
mod navigation;
mod selfplay;
mod session;
mod types;

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError, ENGINE_URL_ENV, SelfPlayDefaults};

// Crate-level exports - Errors
pub use error::{
    ENGINE_UNAVAILABLE_MESSAGE, ErrorSlot, ErrorSource, GatewayError, GatewayErrorKind,
    SessionError,
};

// Crate-level exports - Engine gateway
pub use gateway::{
    DONE_CHANNEL, ERROR_CHANNEL, EngineClient, EngineCommand, EngineEvent, EngineGateway,
    EventStream, PROGRESS_CHANNEL, RpcGateway,
};

// Crate-level exports - Pipelines
pub use autoplay::{AutoPlayScheduler, AutoPlaySpeed, AutoPlayState};
pub use guard::{FlightGuard, InFlight};
pub use hooks::{NoHooks, SessionHooks};
pub use selfplay::{
    EVENTS_LOST_MESSAGE, MAX_LEVEL, MIN_LEVEL, SelfPlayRequest, SelfPlayTracker, SelfPlayView,
    estimate_remaining, format_eta,
};
pub use session::{SessionController, StepOutcome};

// Crate-level exports - Navigation
pub use navigation::{Mode, Navigation, SettingsPage, View};

// Crate-level exports - Wire types
pub use types::{
    AiConfig, GameMode, GameResult, GameSnapshot, LlmConfig, Move, Player, ProfileKind,
    ProfileRating, RatingEntry, RatingsSnapshot, RuleSetKind, SelfPlayProgress, SelfPlayReport,
    UserInfo, UsersSnapshot,
};

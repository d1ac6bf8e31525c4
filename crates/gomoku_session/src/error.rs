//! Error types and the shared user-visible error slot.

use std::sync::Arc;

use derive_more::{Display, Error};
use strum::Display as StrumDisplay;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Message shown when the engine host cannot be reached at all.
pub const ENGINE_UNAVAILABLE_MESSAGE: &str =
    "The game engine is not reachable. Start the engine host and try again.";

/// Failure category reported by an [`EngineGateway`](crate::EngineGateway).
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum GatewayErrorKind {
    /// The engine could not be reached.
    Unavailable,
    /// The engine resolved the call but declined it.
    Rejected,
    /// The response could not be decoded.
    Protocol,
}

/// Engine call failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Engine {} error: {} at {}:{}", kind, message, file, line)]
pub struct GatewayError {
    /// Failure category.
    pub kind: GatewayErrorKind,
    /// Opaque message from the engine or transport.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GatewayError {
    /// Creates a new gateway error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// The engine could not be reached.
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Unavailable, message)
    }

    /// The engine declined the call.
    #[track_caller]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Rejected, message)
    }

    /// The response could not be decoded.
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Protocol, message)
    }

    /// Whether the engine could not be reached.
    pub fn is_unavailable(&self) -> bool {
        self.kind == GatewayErrorKind::Unavailable
    }
}

impl From<serde_json::Error> for GatewayError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("JSON error: {}", err))
    }
}

/// Operation whose failure is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorSource {
    /// The engine host was unreachable.
    Transport,
    /// A human move was rejected.
    Move,
    /// The engine's automatic reply failed.
    AutoReply,
    /// Any other game call (new game, load, save, refresh).
    Game,
    /// The background self-play job failed.
    SelfPlay,
}

/// The single user-visible error.
///
/// Only [`ErrorSource::AutoReply`] failures are retryable: a rejected human
/// move would fail again, while a crashed reply usually succeeds on retry.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{}", message)]
pub struct SessionError {
    source: ErrorSource,
    message: String,
}

impl SessionError {
    /// Creates an error from the given source.
    pub fn new(source: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }

    /// Maps a gateway failure onto the user-visible taxonomy.
    ///
    /// An unreachable engine always reports as a non-retryable transport
    /// error with a fixed message, whatever operation was attempted.
    pub fn from_gateway(source: ErrorSource, err: &GatewayError) -> Self {
        if err.is_unavailable() {
            Self::new(ErrorSource::Transport, ENGINE_UNAVAILABLE_MESSAGE)
        } else {
            Self::new(source, err.message.clone())
        }
    }

    /// Operation that failed.
    pub fn source(&self) -> ErrorSource {
        self.source
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether offering a retry makes sense.
    pub fn is_retryable(&self) -> bool {
        self.source == ErrorSource::AutoReply
    }
}

/// Shared single-slot error surface; last write wins.
///
/// Cloning yields another handle to the same slot, so the move pipeline and
/// the self-play tracker report through one visible error.
#[derive(Debug, Clone)]
pub struct ErrorSlot {
    tx: Arc<watch::Sender<Option<SessionError>>>,
}

impl ErrorSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replaces the visible error.
    #[instrument(skip(self), fields(source = %error.source()))]
    pub fn raise(&self, error: SessionError) {
        warn!(message = %error.message(), retryable = error.is_retryable(), "Surfacing session error");
        self.tx.send_replace(Some(error));
    }

    /// Clears the visible error, if any.
    pub fn clear(&self) {
        let previous = self.tx.send_replace(None);
        if previous.is_some() {
            debug!("Session error cleared");
        }
    }

    /// Returns the visible error.
    pub fn current(&self) -> Option<SessionError> {
        self.tx.borrow().clone()
    }

    /// Subscribes to error changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionError>> {
        self.tx.subscribe()
    }
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}

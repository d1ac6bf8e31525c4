//! Collaborator callbacks fired by the session and self-play pipelines.

use crate::types::GameSnapshot;

/// Side effects owned by collaborators outside this crate.
///
/// Every method has a no-op default so implementors override only what
/// they render.
pub trait SessionHooks: Send + Sync {
    /// A move was accepted by the engine (sound cue, animation).
    fn move_accepted(&self, _snapshot: &GameSnapshot) {}

    /// Rating data changed on the engine side and should be re-read.
    fn ratings_changed(&self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}

//! Error types for table sessions.

use dramatis_core::{RosterError, SceneId};
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while running a table session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The scene has not been opened.
    #[error("scene not open: {0}")]
    UnknownScene(SceneId),

    /// The action needs a running combat.
    #[error("no combat running in scene {0}")]
    NoCombat(SceneId),

    /// A combat is already running.
    #[error("combat already running in scene {0}")]
    CombatRunning(SceneId),

    /// No present participant can fight.
    #[error("no combat-capable participants in scene {0}")]
    NoCombatants(SceneId),

    /// Narrator turns describe; they do not take combat actions.
    #[error("the narrator cannot take combat actions")]
    NarratorAction,

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// A lock was poisoned by a panicking holder.
    #[error("session state lock poisoned")]
    LockPoisoned,

    /// Roster error.
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Combat error.
    #[error(transparent)]
    Combat(#[from] dramatis_combat::CombatError),
}

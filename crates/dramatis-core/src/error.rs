use crate::ids::{CharacterId, SceneId};

/// Alias for `Result<T, RosterError>`.
pub type RosterResult<T> = Result<T, RosterError>;

/// A roster store rejected a read or write.
#[derive(Debug, Clone, thiserror::Error)]
#[error("roster store: {0}")]
pub struct StoreError(pub String);

/// Errors that can occur when manipulating a roster.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// A fresh record was requested for a character that already has one.
    #[error("duplicate participant: character \"{character_id}\" already in scene {scene_id}")]
    DuplicateParticipant {
        /// The scene being modified.
        scene_id: SceneId,
        /// The character that already has a record.
        character_id: CharacterId,
    },

    /// The roster broke one of its structural invariants.
    ///
    /// This is a defect, not a user error: the idempotent upsert contract
    /// should make it unreachable.
    #[error("roster invariant violated in scene {scene_id}: {detail}")]
    InvariantViolation {
        /// The scene whose roster is inconsistent.
        scene_id: SceneId,
        /// What was found.
        detail: String,
    },

    /// The persistence layer failed; the in-memory change was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

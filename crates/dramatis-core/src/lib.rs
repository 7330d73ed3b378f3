//! Core types for Dramatis: participants, roles, capabilities, and the scene roster.
//!
//! The [`RosterManager`] is the single source of truth for who is present in a
//! scene and what they may do. Combat and turn sequencing query it; narration
//! never writes to it directly.

/// Error types used throughout the crate.
pub mod error;
/// Scene, character, and participant identifiers.
pub mod ids;
/// Read-only scene inspection for reporting.
pub mod inspect;
/// The roster manager service, keyed by scene.
pub mod manager;
/// Roles, capabilities, and participant records.
pub mod participant;
/// The per-scene roster and its legacy projection.
pub mod roster;
/// Legacy persisted scene snapshots.
pub mod snapshot;
/// Persistence and character store ports.
pub mod store;
/// Turn classification.
pub mod turn;

pub use error::{RosterError, RosterResult, StoreError};
pub use ids::{CharacterId, ParticipantId, SceneId};
pub use inspect::{SceneHealth, SceneReport, inspect_scenes};
pub use manager::RosterManager;
pub use participant::{ActorMention, Capability, CharacterRef, ParticipantRecord, Role};
pub use roster::{LegacyPresence, ParticipantDeltas, Roster, RosterEvent, RosterEventKind};
pub use snapshot::SceneSnapshot;
pub use store::{
    CharacterProfile, CharacterStore, MemoryCharacterStore, MemoryRosterStore, PersistedScene,
    RosterStore,
};
pub use turn::{RoleLookup, TurnType, classify};

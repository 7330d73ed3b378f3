//! Ports to the outside world: roster persistence and the character store.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{CharacterId, SceneId};
use crate::roster::{LegacyPresence, Roster, RosterEvent};

/// What a store keeps for one scene: the roster and its legacy projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedScene {
    /// Structured roster.
    pub roster: Roster,
    /// Flat lists derived from `roster`.
    pub legacy: LegacyPresence,
}

impl PersistedScene {
    /// Snapshot a roster together with its projection.
    pub fn of(roster: &Roster) -> Self {
        Self {
            roster: roster.clone(),
            legacy: roster.legacy_presence(),
        }
    }
}

/// Write-through persistence for rosters.
///
/// `persist` is called inside every mutating roster call; an error makes the
/// manager roll the in-memory change back.
pub trait RosterStore: Send + Sync {
    /// Store the roster after a change, together with the deltas that produced it.
    fn persist(&self, roster: &Roster, events: &[RosterEvent]) -> Result<(), StoreError>;

    /// Load the last persisted state of a scene.
    fn load(&self, scene_id: &SceneId) -> Result<Option<PersistedScene>, StoreError>;
}

/// In-process roster store.
#[derive(Debug, Default)]
pub struct MemoryRosterStore {
    scenes: Mutex<HashMap<SceneId, PersistedScene>>,
    events: Mutex<Vec<RosterEvent>>,
}

impl MemoryRosterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delta persisted so far, oldest first.
    pub fn events(&self) -> Vec<RosterEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl RosterStore for MemoryRosterStore {
    fn persist(&self, roster: &Roster, events: &[RosterEvent]) -> Result<(), StoreError> {
        let mut scenes = self
            .scenes
            .lock()
            .map_err(|_| StoreError("scene map poisoned".to_string()))?;
        let mut log = self
            .events
            .lock()
            .map_err(|_| StoreError("event log poisoned".to_string()))?;
        scenes.insert(roster.scene_id.clone(), PersistedScene::of(roster));
        log.extend_from_slice(events);
        Ok(())
    }

    fn load(&self, scene_id: &SceneId) -> Result<Option<PersistedScene>, StoreError> {
        let scenes = self
            .scenes
            .lock()
            .map_err(|_| StoreError("scene map poisoned".to_string()))?;
        Ok(scenes.get(scene_id).cloned())
    }
}

/// Identity data for a full character record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Character id.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
}

/// Read-only access to full character records.
///
/// Only identity comes from here; role and capabilities live in the roster.
pub trait CharacterStore: Send + Sync {
    /// Look up a character by id.
    fn lookup(&self, id: &CharacterId) -> Option<CharacterProfile>;
}

/// In-process character store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCharacterStore {
    characters: HashMap<CharacterId, CharacterProfile>,
}

impl MemoryCharacterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a character.
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        let id = CharacterId::new(id);
        self.characters.insert(
            id.clone(),
            CharacterProfile {
                id,
                name: name.into(),
            },
        );
    }
}

impl CharacterStore for MemoryCharacterStore {
    fn lookup(&self, id: &CharacterId) -> Option<CharacterProfile> {
        self.characters.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_projection() {
        let store = MemoryRosterStore::new();
        let roster = Roster::new(SceneId::new("keep"));
        store.persist(&roster, &[]).unwrap();
        let loaded = store.load(&SceneId::new("keep")).unwrap().unwrap();
        assert_eq!(loaded.roster, roster);
        assert_eq!(loaded.legacy, LegacyPresence::default());
        assert!(store.load(&SceneId::new("other")).unwrap().is_none());
    }

    #[test]
    fn character_store_lookup() {
        let mut chars = MemoryCharacterStore::new();
        chars.insert("char-7", "Shadow");
        let found = chars.lookup(&CharacterId::new("char-7")).unwrap();
        assert_eq!(found.name, "Shadow");
        assert!(chars.lookup(&CharacterId::new("char-8")).is_none());
    }
}

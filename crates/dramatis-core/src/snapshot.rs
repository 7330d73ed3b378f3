//! Persisted scene snapshots as older campaign files store them.

use serde::{Deserialize, Serialize};

use crate::ids::SceneId;
use crate::participant::Role;
use crate::roster::Roster;

/// A scene as loaded from storage.
///
/// Older scenes only carry flat name lists. Once a structured roster exists,
/// the lists are written back as its projection and are no longer read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Scene key.
    pub scene_id: SceneId,
    /// Player characters, by character id.
    #[serde(default, alias = "characters_present")]
    pub players: Vec<String>,
    /// Non-combat NPCs, by name.
    #[serde(default, alias = "npcs_present")]
    pub npcs: Vec<String>,
    /// Hostile NPCs, by name.
    #[serde(default)]
    pub enemies: Vec<String>,
    /// Structured roster, once one has been bootstrapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster: Option<Roster>,
}

impl SceneSnapshot {
    /// A snapshot with no one listed.
    pub fn empty(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: SceneId::new(scene_id),
            players: Vec::new(),
            npcs: Vec::new(),
            enemies: Vec::new(),
            roster: None,
        }
    }

    /// Every legacy name paired with the role its list implies.
    pub fn legacy_entries(&self) -> impl Iterator<Item = (&str, Role)> {
        let players = self.players.iter().map(|n| (n.as_str(), Role::Player));
        let npcs = self.npcs.iter().map(|n| (n.as_str(), Role::NpcSupport));
        let enemies = self.enemies.iter().map(|n| (n.as_str(), Role::NpcCombatant));
        players
            .chain(npcs)
            .chain(enemies)
            .map(|(n, r)| (n.trim(), r))
            .filter(|(n, _)| !n.is_empty())
    }

    /// Number of names in the legacy lists.
    pub fn legacy_count(&self) -> usize {
        self.legacy_entries().count()
    }

    /// Whether a structured roster is present.
    pub fn is_bootstrapped(&self) -> bool {
        self.roster.is_some()
    }
}

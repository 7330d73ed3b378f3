//! Read-only inspection of persisted scenes, for reporting.

use std::fmt;

use serde::Serialize;

use crate::ids::SceneId;
use crate::snapshot::SceneSnapshot;

/// State of one persisted scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SceneHealth {
    /// Structured roster present and consistent.
    Bootstrapped,
    /// Only legacy name lists; the roster has never been bootstrapped.
    MissingRoster,
    /// Structured roster present but its stored name lists disagree with it.
    LegacyDrift(String),
    /// Structured roster breaks an invariant.
    Invalid(String),
}

impl fmt::Display for SceneHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrapped => write!(f, "bootstrapped"),
            Self::MissingRoster => write!(f, "missing roster"),
            Self::LegacyDrift(d) => write!(f, "legacy drift ({d})"),
            Self::Invalid(d) => write!(f, "invalid ({d})"),
        }
    }
}

/// Report line for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneReport {
    /// Scene key.
    pub scene_id: SceneId,
    /// Names in the legacy lists.
    pub legacy_names: usize,
    /// Present participants in the structured roster.
    pub present: usize,
    /// Verdict.
    pub health: SceneHealth,
}

impl SceneReport {
    /// Whether the scene needs attention.
    pub fn needs_attention(&self) -> bool {
        self.health != SceneHealth::Bootstrapped
    }
}

/// Inspect persisted scenes without modifying them.
pub fn inspect_scenes(snapshots: &[SceneSnapshot]) -> Vec<SceneReport> {
    snapshots.iter().map(inspect_scene).collect()
}

fn inspect_scene(snapshot: &SceneSnapshot) -> SceneReport {
    let legacy_names = snapshot.legacy_count();
    let Some(roster) = &snapshot.roster else {
        return SceneReport {
            scene_id: snapshot.scene_id.clone(),
            legacy_names,
            present: 0,
            health: SceneHealth::MissingRoster,
        };
    };

    let health = match roster.verify() {
        Err(e) => SceneHealth::Invalid(e.to_string()),
        Ok(()) => drift(snapshot).map_or(SceneHealth::Bootstrapped, SceneHealth::LegacyDrift),
    };

    SceneReport {
        scene_id: snapshot.scene_id.clone(),
        legacy_names,
        present: roster.present().count(),
        health,
    }
}

/// Compare stored legacy lists to the roster projection. Empty lists are
/// treated as "not written", not as drift.
fn drift(snapshot: &SceneSnapshot) -> Option<String> {
    let roster = snapshot.roster.as_ref()?;
    if snapshot.legacy_count() == 0 {
        return None;
    }
    let projection = roster.legacy_presence();
    let mut stored_npcs: Vec<&String> = snapshot.npcs.iter().chain(&snapshot.enemies).collect();
    let mut derived_npcs: Vec<&String> = projection.npcs.iter().collect();
    stored_npcs.sort();
    derived_npcs.sort();

    let mut stored_players: Vec<&String> = snapshot.players.iter().collect();
    let mut derived_players: Vec<&String> = projection.players.iter().collect();
    stored_players.sort();
    derived_players.sort();

    if stored_players != derived_players {
        Some("players differ from roster".to_string())
    } else if stored_npcs != derived_npcs {
        Some("npcs differ from roster".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{CharacterRef, Role};
    use crate::roster::Roster;
    use chrono::Utc;

    fn roster_with(names: &[(&str, Role)]) -> Roster {
        let mut r = Roster::new(SceneId::new("s"));
        for (n, role) in names {
            r.upsert(&CharacterRef::character(*n, *role), n.to_string(), Utc::now())
                .unwrap();
        }
        r
    }

    #[test]
    fn flags_scene_without_roster() {
        let snap = SceneSnapshot {
            players: vec!["Aria".into()],
            ..SceneSnapshot::empty("s")
        };
        let report = &inspect_scenes(&[snap])[0];
        assert_eq!(report.health, SceneHealth::MissingRoster);
        assert!(report.needs_attention());
        assert_eq!(report.legacy_names, 1);
    }

    #[test]
    fn consistent_scene_is_healthy() {
        let snap = SceneSnapshot {
            players: vec!["Aria".into()],
            enemies: vec!["Guard".into()],
            roster: Some(roster_with(&[("Aria", Role::Player), ("Guard", Role::NpcCombatant)])),
            ..SceneSnapshot::empty("s")
        };
        let report = &inspect_scenes(&[snap])[0];
        assert_eq!(report.health, SceneHealth::Bootstrapped);
        assert_eq!(report.present, 2);
    }

    #[test]
    fn detects_legacy_drift() {
        let snap = SceneSnapshot {
            players: vec!["Aria".into(), "Bram".into()],
            roster: Some(roster_with(&[("Aria", Role::Player)])),
            ..SceneSnapshot::empty("s")
        };
        let report = &inspect_scenes(&[snap])[0];
        assert!(matches!(report.health, SceneHealth::LegacyDrift(_)));
    }
}

//! Turn classification.
//!
//! Evidence precedence, strongest first: an explicit override from the
//! caller, the narrator special case, the roster role, and finally a guess
//! from the actor id itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::participant::{ActorMention, Role};
use crate::roster::Roster;

/// Whose turn is being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnType {
    /// The DM / narrator.
    Narrator,
    /// A player character.
    Player,
    /// Any NPC or summon.
    NonPlayer,
}

impl TurnType {
    /// Parse a turn type tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "narrator" | "dm" => Some(Self::Narrator),
            "player" => Some(Self::Player),
            "non_player" | "npc" => Some(Self::NonPlayer),
            _ => None,
        }
    }
}

impl fmt::Display for TurnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narrator => write!(f, "narrator"),
            Self::Player => write!(f, "player"),
            Self::NonPlayer => write!(f, "non_player"),
        }
    }
}

/// Anything that can tell the role of an actor.
pub trait RoleLookup {
    /// Role on record for the actor, if any.
    fn role_of(&self, actor_id: &str) -> Option<Role>;
}

impl RoleLookup for Roster {
    fn role_of(&self, actor_id: &str) -> Option<Role> {
        self.find_actor(actor_id).map(|p| p.role)
    }
}

impl<F> RoleLookup for F
where
    F: Fn(&str) -> Option<Role>,
{
    fn role_of(&self, actor_id: &str) -> Option<Role> {
        self(actor_id)
    }
}

/// Classify the turn of an actor.
pub fn classify<R>(actor_id: &str, roles: &R, explicit_override: Option<TurnType>) -> TurnType
where
    R: RoleLookup + ?Sized,
{
    if let Some(turn) = explicit_override {
        return turn;
    }
    if is_narrator_id(actor_id) {
        return TurnType::Narrator;
    }
    match roles.role_of(actor_id) {
        Some(Role::Player) => TurnType::Player,
        Some(_) => TurnType::NonPlayer,
        None => guess_turn_type(actor_id),
    }
}

fn normalize(actor_id: &str) -> String {
    actor_id
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Whether an actor id names the DM / narrator.
pub fn is_narrator_id(actor_id: &str) -> bool {
    const EXACT: [&str; 6] = [
        "dm",
        "gm",
        "narrator",
        "dungeon_master",
        "game_master",
        "storyteller",
    ];
    const PREFIXES: [&str; 6] = ["dm_", "dm:", "gm_", "gm:", "narrator_", "narrator:"];

    let id = normalize(actor_id);
    EXACT.contains(&id.as_str()) || PREFIXES.iter().any(|p| id.starts_with(p))
}

fn has_npc_prefix(id: &str) -> bool {
    id == "npc" || ["npc_", "npc:", "npc."].iter().any(|p| id.starts_with(p))
}

fn has_summon_prefix(id: &str) -> bool {
    id.starts_with("summon")
}

fn has_player_prefix(id: &str) -> bool {
    ["pc_", "pc:", "player_", "player:"]
        .iter()
        .any(|p| id.starts_with(p))
}

/// Turn type guessed from the id alone, for actors missing from the roster.
fn guess_turn_type(actor_id: &str) -> TurnType {
    let id = normalize(actor_id);
    if has_npc_prefix(&id) || has_summon_prefix(&id) {
        TurnType::NonPlayer
    } else {
        TurnType::Player
    }
}

/// Role for an actor the roster has never seen, from the name alone.
///
/// Unmarked names become NPCs, fighting or not depending on whether they were
/// part of the combat.
pub fn infer_role(mention: &ActorMention) -> Role {
    let id = normalize(mention.character_id.as_ref().map_or(&mention.name, |c| &c.0));
    if has_player_prefix(&id) {
        Role::Player
    } else if has_summon_prefix(&id) {
        Role::Summon
    } else if mention.in_combat {
        Role::NpcCombatant
    } else {
        Role::NpcSupport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SceneId;
    use crate::participant::CharacterRef;
    use chrono::Utc;

    fn no_roster(_: &str) -> Option<Role> {
        None
    }

    #[test]
    fn narrator_without_roster_entry() {
        assert_eq!(classify("DM", &no_roster, None), TurnType::Narrator);
        assert_eq!(classify("Dungeon Master", &no_roster, None), TurnType::Narrator);
        assert_eq!(classify("narrator:intro", &no_roster, None), TurnType::Narrator);
    }

    #[test]
    fn narrator_beats_roster_role() {
        let mut roster = Roster::new(SceneId::new("s"));
        roster
            .upsert(&CharacterRef::character("dm", Role::Player), "DM".into(), Utc::now())
            .unwrap();
        assert_eq!(roster.role_of("dm"), Some(Role::Player));
        assert_eq!(classify("dm", &roster, None), TurnType::Narrator);
    }

    #[test]
    fn override_beats_everything() {
        assert_eq!(
            classify("DM", &no_roster, Some(TurnType::Player)),
            TurnType::Player
        );
    }

    #[test]
    fn roster_role_beats_prefix() {
        let lookup = |_: &str| Some(Role::Player);
        assert_eq!(classify("npc_shadow", &lookup, None), TurnType::Player);
        let lookup = |_: &str| Some(Role::Summon);
        assert_eq!(classify("Aria", &lookup, None), TurnType::NonPlayer);
    }

    #[test]
    fn prefix_guess_when_unknown() {
        assert_eq!(classify("npc_guard", &no_roster, None), TurnType::NonPlayer);
        assert_eq!(classify("NPC:Guard", &no_roster, None), TurnType::NonPlayer);
        assert_eq!(classify("Aria", &no_roster, None), TurnType::Player);
        assert!(!is_narrator_id("dmitri"));
    }

    #[test]
    fn classification_is_stable() {
        let first = classify("npc_guard", &no_roster, None);
        for _ in 0..10 {
            assert_eq!(classify("npc_guard", &no_roster, None), first);
        }
    }

    #[test]
    fn infer_role_from_name() {
        let mut m = ActorMention::named("Bandit");
        assert_eq!(infer_role(&m), Role::NpcSupport);
        m.in_combat = true;
        assert_eq!(infer_role(&m), Role::NpcCombatant);
        assert_eq!(infer_role(&ActorMention::named("pc_Bram")), Role::Player);
        assert_eq!(infer_role(&ActorMention::named("summoned wolf")), Role::Summon);
    }

    #[test]
    fn narrated_role_is_not_trusted() {
        let json = r#"{"name": "Bandit", "role_hint": "player", "in_combat": true}"#;
        let m: ActorMention = serde_json::from_str(json).unwrap();
        assert_eq!(infer_role(&m), Role::NpcCombatant);
    }

    #[test]
    fn turn_type_parse() {
        assert_eq!(TurnType::parse("non-player"), Some(TurnType::NonPlayer));
        assert_eq!(TurnType::parse(&TurnType::Narrator.to_string()), Some(TurnType::Narrator));
        assert_eq!(TurnType::parse("boss"), None);
    }
}

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, ParticipantId};

/// The narrative and mechanical standing of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A character controlled by a player.
    Player,
    /// A non-player character that takes part in fights.
    NpcCombatant,
    /// A non-player character that only supports the story (shopkeepers, guides).
    NpcSupport,
    /// A creature conjured by another participant.
    Summon,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [
        Role::Player,
        Role::NpcCombatant,
        Role::NpcSupport,
        Role::Summon,
    ];

    /// Returns true for player-controlled participants.
    pub fn is_player(self) -> bool {
        matches!(self, Self::Player)
    }

    /// Returns true for every role that is not player-controlled.
    pub fn is_npc(self) -> bool {
        !self.is_player()
    }

    /// Capabilities granted when the caller does not specify any.
    pub fn default_capabilities(self) -> BTreeSet<Capability> {
        use Capability::*;
        let caps: &[Capability] = match self {
            Self::Player => &[Combat, Narrative, Inventory, Skills],
            Self::NpcCombatant => &[Combat, Narrative, Skills],
            Self::NpcSupport => &[Narrative, Inventory],
            Self::Summon => &[Combat],
        };
        caps.iter().copied().collect()
    }

    /// Parse a role tag, accepting a few common spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "player" | "pc" => Some(Self::Player),
            "npc_combatant" | "combatant" | "enemy" => Some(Self::NpcCombatant),
            "npc_support" | "support" | "npc" => Some(Self::NpcSupport),
            "summon" => Some(Self::Summon),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::NpcCombatant => write!(f, "npc_combatant"),
            Self::NpcSupport => write!(f, "npc_support"),
            Self::Summon => write!(f, "summon"),
        }
    }
}

/// A permission flag gating which subsystem may act on a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May enter combat state and be targeted.
    Combat,
    /// May speak and be narrated.
    Narrative,
    /// May hold and trade items.
    Inventory,
    /// May make skill checks.
    Skills,
}

impl Capability {
    /// Parse a capability tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "combat" => Some(Self::Combat),
            "narrative" => Some(Self::Narrative),
            "inventory" => Some(Self::Inventory),
            "skills" => Some(Self::Skills),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combat => write!(f, "combat"),
            Self::Narrative => write!(f, "narrative"),
            Self::Inventory => write!(f, "inventory"),
            Self::Skills => write!(f, "skills"),
        }
    }
}

/// One actor's presence record within a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Generated identifier, stable across leave/rejoin.
    pub participant_id: ParticipantId,
    /// Full character record, if this is not a lightweight NPC.
    pub character_id: Option<CharacterId>,
    /// Name shown to players.
    pub display_label: String,
    /// Current role.
    pub role: Role,
    /// Capabilities currently granted.
    pub capabilities: BTreeSet<Capability>,
    /// Whether the participant is in the scene right now.
    pub present: bool,
    /// When the participant first joined the scene.
    pub joined_at: DateTime<Utc>,
    /// When the participant last left the scene, if absent.
    pub left_at: Option<DateTime<Utc>>,
}

impl ParticipantRecord {
    /// Create a present participant.
    pub fn new(
        character_id: Option<CharacterId>,
        display_label: impl Into<String>,
        role: Role,
        capabilities: BTreeSet<Capability>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            participant_id: ParticipantId::new(),
            character_id,
            display_label: display_label.into(),
            role,
            capabilities,
            present: true,
            joined_at,
            left_at: None,
        }
    }

    /// Whether the participant holds a capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Present and able to enter combat.
    pub fn is_active_combatant(&self) -> bool {
        self.present && self.has_capability(Capability::Combat)
    }

    /// The identifier other subsystems use for this participant:
    /// the character id when there is one, else the display label.
    pub fn actor_key(&self) -> &str {
        self.character_id
            .as_ref()
            .map(CharacterId::as_str)
            .unwrap_or(&self.display_label)
    }

    /// Whether a free-form actor reference names this participant.
    pub fn matches_actor(&self, actor: &str) -> bool {
        let actor = actor.trim();
        self.character_id.as_ref().is_some_and(|c| c.matches(actor))
            || self.display_label.eq_ignore_ascii_case(actor)
    }

    /// Mark the participant as gone. `left_at` never precedes `joined_at`.
    pub(crate) fn leave(&mut self, at: DateTime<Utc>) {
        self.present = false;
        self.left_at = Some(at.max(self.joined_at));
    }

    /// Bring the participant back, keeping the original join time.
    pub(crate) fn rejoin(&mut self) {
        self.present = true;
        self.left_at = None;
    }

    /// Check the presence window invariant.
    pub fn presence_violation(&self) -> Option<String> {
        match (self.present, self.left_at) {
            (false, None) => Some(format!(
                "participant {} is absent without a left_at",
                self.display_label
            )),
            (false, Some(left)) if left < self.joined_at => Some(format!(
                "participant {} left before joining",
                self.display_label
            )),
            (true, Some(_)) => Some(format!(
                "participant {} is present but has a left_at",
                self.display_label
            )),
            _ => None,
        }
    }
}

/// A request to place a character into a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRef {
    /// Character store id, absent for lightweight NPCs.
    pub character_id: Option<CharacterId>,
    /// Label override. Falls back to the character store, then the id.
    pub display_label: Option<String>,
    /// Role to assign.
    pub role: Role,
    /// Capabilities to grant; `None` uses the role's defaults.
    pub capabilities: Option<BTreeSet<Capability>>,
    /// Always create a fresh record instead of re-activating a matching one.
    #[serde(default)]
    pub new_entry: bool,
}

impl CharacterRef {
    /// Reference a character with a full record.
    pub fn character(id: impl Into<String>, role: Role) -> Self {
        Self {
            character_id: Some(CharacterId::new(id)),
            display_label: None,
            role,
            capabilities: None,
            new_entry: false,
        }
    }

    /// Reference a lightweight NPC known only by its label.
    pub fn lightweight(label: impl Into<String>, role: Role) -> Self {
        Self {
            character_id: None,
            display_label: Some(label.into()),
            role,
            capabilities: None,
            new_entry: false,
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = Some(label.into());
        self
    }

    /// Grant an explicit capability set.
    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = Some(caps.into_iter().collect());
        self
    }

    /// Force creation of a new record.
    pub fn as_new_entry(mut self) -> Self {
        self.new_entry = true;
        self
    }

    /// The capabilities this reference grants.
    pub fn resolved_capabilities(&self) -> BTreeSet<Capability> {
        self.capabilities
            .clone()
            .unwrap_or_else(|| self.role.default_capabilities())
    }
}

/// An actor named in a resolved turn, used to reconcile the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorMention {
    /// Name as written by the narration.
    pub name: String,
    /// Character store id, when the narration knew it. Kept only if the
    /// roster or the character store already knows the id.
    #[serde(default)]
    pub character_id: Option<CharacterId>,
    /// Whether the actor took part in the fight this turn.
    #[serde(default)]
    pub in_combat: bool,
}

impl ActorMention {
    /// A mention by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            character_id: None,
            in_combat: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_and_display() {
        for role in Role::ALL {
            assert_eq!(Role::parse(&role.to_string()), Some(role));
        }
        assert_eq!(Role::parse("NPC-Combatant"), Some(Role::NpcCombatant));
        assert_eq!(Role::parse("dragon"), None);
    }

    #[test]
    fn support_npcs_cannot_fight_by_default() {
        assert!(!Role::NpcSupport
            .default_capabilities()
            .contains(&Capability::Combat));
        assert!(Role::NpcCombatant
            .default_capabilities()
            .contains(&Capability::Combat));
        assert!(Role::Summon.is_npc());
    }

    #[test]
    fn leave_never_precedes_join() {
        let joined = Utc::now();
        let mut p = ParticipantRecord::new(
            None,
            "Guard",
            Role::NpcCombatant,
            Role::NpcCombatant.default_capabilities(),
            joined,
        );
        p.leave(joined - chrono::Duration::seconds(30));
        assert!(!p.present);
        assert_eq!(p.left_at, Some(joined));
        assert!(p.presence_violation().is_none());

        p.rejoin();
        assert!(p.present);
        assert!(p.left_at.is_none());
        assert_eq!(p.joined_at, joined);
    }

    #[test]
    fn presence_violation_detected() {
        let mut p = ParticipantRecord::new(
            None,
            "Ghost",
            Role::NpcSupport,
            BTreeSet::new(),
            Utc::now(),
        );
        p.present = false;
        assert!(p.presence_violation().is_some());
    }

    #[test]
    fn matches_actor_by_id_or_label() {
        let p = ParticipantRecord::new(
            Some(CharacterId::new("char-aria")),
            "Aria",
            Role::Player,
            Role::Player.default_capabilities(),
            Utc::now(),
        );
        assert!(p.matches_actor("char-aria"));
        assert!(p.matches_actor("ARIA"));
        assert!(!p.matches_actor("Guard"));
        assert_eq!(p.actor_key(), "char-aria");
    }

    #[test]
    fn character_ref_defaults_capabilities_from_role() {
        let r = CharacterRef::character("guard", Role::NpcCombatant);
        assert!(r.resolved_capabilities().contains(&Capability::Combat));
        let r = r.with_capabilities([Capability::Narrative]);
        assert!(!r.resolved_capabilities().contains(&Capability::Combat));
    }
}

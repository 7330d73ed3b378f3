//! The per-scene roster.
//!
//! Records are kept in join order and are never hard-deleted. Mutators are
//! crate-private: everything outside goes through [`crate::RosterManager`],
//! which persists each change before returning.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RosterError, RosterResult};
use crate::ids::{CharacterId, ParticipantId, SceneId};
use crate::participant::{ActorMention, CharacterRef, ParticipantRecord, Role};

/// What happened to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterEventKind {
    /// A new record was created.
    Joined,
    /// An absent record became present again.
    Rejoined,
    /// A present record was soft-removed.
    Left,
    /// Role, capabilities or label changed.
    Updated,
}

/// A delta emitted by every roster mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEvent {
    /// Scene the change happened in.
    pub scene_id: SceneId,
    /// Kind of change.
    pub kind: RosterEventKind,
    /// Affected record.
    pub participant_id: ParticipantId,
    /// Affected character, if the record has one.
    pub character_id: Option<CharacterId>,
    /// Label at the time of the change.
    pub display_label: String,
    /// Role after the change.
    pub role: Role,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Flat presence lists consumed by older scene files.
///
/// Always computed from a [`Roster`]; never edited on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPresence {
    /// Labels of present players.
    pub players: Vec<String>,
    /// Labels of every other present participant.
    pub npcs: Vec<String>,
}

/// Participants that appeared or disappeared between two roster states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDeltas {
    /// Present now, not present before.
    pub added: Vec<ParticipantRecord>,
    /// Present before, not present now.
    pub removed: Vec<ParticipantRecord>,
}

impl ParticipantDeltas {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Identity used for uniqueness and diffing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ParticipantKey {
    Character(CharacterId),
    Lightweight(ParticipantId),
}

fn key_of(record: &ParticipantRecord) -> ParticipantKey {
    match &record.character_id {
        Some(id) => ParticipantKey::Character(id.clone()),
        None => ParticipantKey::Lightweight(record.participant_id),
    }
}

/// Every participant record of one scene, ordered by join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    /// Scene this roster belongs to.
    pub scene_id: SceneId,
    participants: Vec<ParticipantRecord>,
}

impl Roster {
    /// An empty roster.
    pub fn new(scene_id: SceneId) -> Self {
        Self {
            scene_id,
            participants: Vec::new(),
        }
    }

    /// All records, present or not, in join order.
    pub fn participants(&self) -> &[ParticipantRecord] {
        &self.participants
    }

    /// Present records in join order.
    pub fn present(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.participants.iter().filter(|p| p.present)
    }

    /// Present records holding a role.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &ParticipantRecord> {
        self.present().filter(move |p| p.role == role)
    }

    /// Present records that may enter combat.
    pub fn combat_participants(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.participants.iter().filter(|p| p.is_active_combatant())
    }

    /// Number of records, present or not.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the roster has no records at all.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Look up a record by participant id.
    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantRecord> {
        self.participants.iter().find(|p| p.participant_id == id)
    }

    /// Look up the record of a character.
    pub fn find_by_character(&self, id: &CharacterId) -> Option<&ParticipantRecord> {
        self.participants
            .iter()
            .find(|p| p.character_id.as_ref() == Some(id))
    }

    /// Resolve a free-form actor reference, preferring present records.
    pub fn find_actor(&self, actor: &str) -> Option<&ParticipantRecord> {
        self.present()
            .find(|p| p.matches_actor(actor))
            .or_else(|| self.participants.iter().find(|p| p.matches_actor(actor)))
    }

    /// Project present participants onto the legacy name lists.
    pub fn legacy_presence(&self) -> LegacyPresence {
        let mut legacy = LegacyPresence::default();
        for p in self.present() {
            if p.role.is_player() {
                legacy.players.push(p.display_label.clone());
            } else {
                legacy.npcs.push(p.display_label.clone());
            }
        }
        legacy
    }

    /// Set difference of present participants against an earlier snapshot.
    pub fn deltas_since(&self, previous: &[ParticipantRecord]) -> ParticipantDeltas {
        let before: HashSet<ParticipantKey> =
            previous.iter().filter(|p| p.present).map(key_of).collect();
        let now: HashSet<ParticipantKey> = self.present().map(key_of).collect();

        ParticipantDeltas {
            added: self
                .present()
                .filter(|p| !before.contains(&key_of(p)))
                .cloned()
                .collect(),
            removed: previous
                .iter()
                .filter(|p| p.present && !now.contains(&key_of(p)))
                .cloned()
                .collect(),
        }
    }

    /// Check every structural invariant.
    pub fn verify(&self) -> RosterResult<()> {
        let mut seen: HashMap<&CharacterId, usize> = HashMap::new();
        for p in &self.participants {
            if let Some(detail) = p.presence_violation() {
                return Err(self.violation(detail));
            }
            if let Some(id) = &p.character_id {
                let count = seen.entry(id).or_default();
                *count += 1;
                if *count > 1 {
                    return Err(self.violation(format!(
                        "character {id} has more than one record"
                    )));
                }
            }
        }
        Ok(())
    }

    fn violation(&self, detail: String) -> RosterError {
        RosterError::InvariantViolation {
            scene_id: self.scene_id.clone(),
            detail,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert a participant or re-activate the matching record.
    pub(crate) fn upsert(
        &mut self,
        cref: &CharacterRef,
        label: String,
        at: DateTime<Utc>,
    ) -> RosterResult<(ParticipantRecord, Vec<RosterEvent>)> {
        let existing = match &cref.character_id {
            Some(id) => self
                .participants
                .iter()
                .position(|p| p.character_id.as_ref() == Some(id)),
            None if cref.new_entry => None,
            None => self.participants.iter().position(|p| {
                p.character_id.is_none() && p.display_label.eq_ignore_ascii_case(&label)
            }),
        };

        let Some(index) = existing else {
            let record = ParticipantRecord::new(
                cref.character_id.clone(),
                label,
                cref.role,
                cref.resolved_capabilities(),
                at,
            );
            let event = self.event(&record, RosterEventKind::Joined, at);
            self.insert(record.clone());
            return Ok((record, vec![event]));
        };

        if cref.new_entry {
            if let Some(character_id) = cref.character_id.clone() {
                return Err(RosterError::DuplicateParticipant {
                    scene_id: self.scene_id.clone(),
                    character_id,
                });
            }
        }

        let mut kinds = Vec::new();
        let record = &mut self.participants[index];
        if !record.present {
            record.rejoin();
            kinds.push(RosterEventKind::Rejoined);
        }

        let capabilities = cref.resolved_capabilities();
        let relabel = cref
            .display_label
            .as_ref()
            .is_some_and(|l| *l != record.display_label);
        if record.role != cref.role || record.capabilities != capabilities || relabel {
            record.role = cref.role;
            record.capabilities = capabilities;
            if relabel {
                record.display_label = label;
            }
            kinds.push(RosterEventKind::Updated);
        }

        let record = record.clone();
        let events = kinds
            .into_iter()
            .map(|kind| self.event(&record, kind, at))
            .collect();
        Ok((record, events))
    }

    /// Soft-remove a character. No-op when absent or unknown.
    pub(crate) fn soft_remove(
        &mut self,
        character_id: &CharacterId,
        at: DateTime<Utc>,
    ) -> Option<RosterEvent> {
        let record = self
            .participants
            .iter_mut()
            .find(|p| p.present && p.character_id.as_ref() == Some(character_id))?;
        record.leave(at);
        let record = record.clone();
        Some(self.event(&record, RosterEventKind::Left, at))
    }

    /// Make sure a mentioned actor is present, keeping any role already on record.
    pub(crate) fn admit(
        &mut self,
        mention: &ActorMention,
        role: Role,
        at: DateTime<Utc>,
    ) -> Option<(ParticipantRecord, RosterEvent)> {
        let index = self.participants.iter().position(|p| match &mention.character_id {
            Some(id) => p.character_id.as_ref() == Some(id),
            None => p.matches_actor(&mention.name),
        });

        match index {
            Some(i) if self.participants[i].present => None,
            Some(i) => {
                self.participants[i].rejoin();
                let record = self.participants[i].clone();
                let event = self.event(&record, RosterEventKind::Rejoined, at);
                Some((record, event))
            }
            None => {
                let record = ParticipantRecord::new(
                    mention.character_id.clone(),
                    mention.name.trim(),
                    role,
                    role.default_capabilities(),
                    at,
                );
                let event = self.event(&record, RosterEventKind::Joined, at);
                self.insert(record.clone());
                Some((record, event))
            }
        }
    }

    /// Insert keeping join order; ties keep insertion order.
    fn insert(&mut self, record: ParticipantRecord) {
        let at = self
            .participants
            .partition_point(|p| p.joined_at <= record.joined_at);
        self.participants.insert(at, record);
    }

    fn event(
        &self,
        record: &ParticipantRecord,
        kind: RosterEventKind,
        at: DateTime<Utc>,
    ) -> RosterEvent {
        RosterEvent {
            scene_id: self.scene_id.clone(),
            kind,
            participant_id: record.participant_id,
            character_id: record.character_id.clone(),
            display_label: record.display_label.clone(),
            role: record.role,
            at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Capability;

    fn roster() -> Roster {
        Roster::new(SceneId::new("tavern"))
    }

    fn add(r: &mut Roster, id: &str, role: Role) -> ParticipantRecord {
        let cref = CharacterRef::character(id, role);
        r.upsert(&cref, id.to_string(), Utc::now()).unwrap().0
    }

    #[test]
    fn readd_reuses_participant_id() {
        let mut r = roster();
        let first = add(&mut r, "Aria", Role::Player);
        r.soft_remove(&CharacterId::new("Aria"), Utc::now()).unwrap();
        let again = add(&mut r, "Aria", Role::Player);
        assert_eq!(first.participant_id, again.participant_id);
        assert!(again.present);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn upsert_of_present_character_emits_nothing() {
        let mut r = roster();
        add(&mut r, "Aria", Role::Player);
        let cref = CharacterRef::character("Aria", Role::Player);
        let (_, events) = r.upsert(&cref, "Aria".into(), Utc::now()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn new_entry_for_known_character_is_duplicate() {
        let mut r = roster();
        add(&mut r, "Aria", Role::Player);
        let cref = CharacterRef::character("Aria", Role::Player).as_new_entry();
        let err = r.upsert(&cref, "Aria".into(), Utc::now()).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateParticipant { .. }));
    }

    #[test]
    fn lightweight_entries_match_by_label_unless_forced() {
        let mut r = roster();
        let goblin = CharacterRef::lightweight("Goblin", Role::NpcCombatant);
        r.upsert(&goblin, "Goblin".into(), Utc::now()).unwrap();
        r.upsert(&goblin, "goblin".into(), Utc::now()).unwrap();
        assert_eq!(r.len(), 1);

        r.upsert(&goblin.clone().as_new_entry(), "Goblin".into(), Utc::now())
            .unwrap();
        assert_eq!(r.len(), 2);
        assert!(r.verify().is_ok());
    }

    #[test]
    fn role_change_updates_default_capabilities() {
        let mut r = roster();
        add(&mut r, "Guard", Role::NpcSupport);
        let cref = CharacterRef::character("Guard", Role::NpcCombatant);
        let (record, events) = r.upsert(&cref, "Guard".into(), Utc::now()).unwrap();
        assert!(record.has_capability(Capability::Combat));
        assert_eq!(events[0].kind, RosterEventKind::Updated);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut r = roster();
        assert!(r.soft_remove(&CharacterId::new("nobody"), Utc::now()).is_none());
        add(&mut r, "Aria", Role::Player);
        assert!(r.soft_remove(&CharacterId::new("Aria"), Utc::now()).is_some());
        assert!(r.soft_remove(&CharacterId::new("Aria"), Utc::now()).is_none());
    }

    #[test]
    fn legacy_projection_splits_players_and_npcs() {
        let mut r = roster();
        add(&mut r, "Aria", Role::Player);
        add(&mut r, "Guard", Role::NpcCombatant);
        add(&mut r, "Wolf", Role::Summon);
        r.soft_remove(&CharacterId::new("Guard"), Utc::now());
        let legacy = r.legacy_presence();
        assert_eq!(legacy.players, vec!["Aria"]);
        assert_eq!(legacy.npcs, vec!["Wolf"]);
    }

    #[test]
    fn deltas_by_character() {
        let mut r = roster();
        add(&mut r, "Aria", Role::Player);
        add(&mut r, "Guard", Role::NpcCombatant);
        let before = r.participants().to_vec();

        r.soft_remove(&CharacterId::new("Guard"), Utc::now());
        add(&mut r, "Innkeeper", Role::NpcSupport);

        let deltas = r.deltas_since(&before);
        assert_eq!(deltas.added.len(), 1);
        assert_eq!(deltas.added[0].display_label, "Innkeeper");
        assert_eq!(deltas.removed.len(), 1);
        assert_eq!(deltas.removed[0].display_label, "Guard");
        assert!(r.deltas_since(r.participants()).is_empty());
    }

    #[test]
    fn admit_keeps_recorded_role() {
        let mut r = roster();
        add(&mut r, "Guard", Role::NpcCombatant);
        r.soft_remove(&CharacterId::new("Guard"), Utc::now());

        let (record, event) = r
            .admit(&ActorMention::named("guard"), Role::NpcSupport, Utc::now())
            .unwrap();
        assert_eq!(record.role, Role::NpcCombatant);
        assert_eq!(event.kind, RosterEventKind::Rejoined);
        assert!(r.admit(&ActorMention::named("Guard"), Role::NpcSupport, Utc::now()).is_none());
    }

    #[test]
    fn verify_flags_duplicate_character_records() {
        let mut r = roster();
        add(&mut r, "Aria", Role::Player);
        let dup = r.participants[0].clone();
        r.participants.push(dup);
        assert!(matches!(
            r.verify(),
            Err(RosterError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn records_stay_in_join_order() {
        let mut r = roster();
        let now = Utc::now();
        let late = CharacterRef::character("Late", Role::Player);
        let early = CharacterRef::character("Early", Role::Player);
        r.upsert(&late, "Late".into(), now).unwrap();
        r.upsert(&early, "Early".into(), now - chrono::Duration::minutes(5))
            .unwrap();
        let labels: Vec<_> = r.participants().iter().map(|p| p.display_label.as_str()).collect();
        assert_eq!(labels, vec!["Early", "Late"]);
    }
}

//! Per-combatant action resource and hit points.
//!
//! The action resource is signed: spending is never refused, so a combatant
//! can go into debt for a desperate move. Whatever is still owed at the next
//! round boundary comes back as damage.

use dramatis_core::{CharacterId, ParticipantId};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dice::{Die, RollResult};

/// Most penalty dice rolled for one overdraft, however deep the debt.
pub const MAX_PENALTY_DICE: u32 = 10;

/// Starting numbers for a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStats {
    /// Action resource regained each round.
    pub max_resource: i32,
    /// Hit point maximum.
    pub max_hit_points: i32,
    /// Initiative score (higher goes first).
    pub initiative: i32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            max_resource: 3,
            max_hit_points: 10,
            initiative: 0,
        }
    }
}

impl CombatStats {
    /// Same stats with a different initiative.
    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = initiative;
        self
    }
}

/// Result of a spend. The spend has happened either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendOutcome {
    /// Cost that was charged.
    pub cost: u32,
    /// Whether the combatant could pay without going into debt.
    pub affordable: bool,
    /// Resource before the spend.
    pub before: i32,
    /// Resource after the spend; negative when overdrawn.
    pub after: i32,
}

/// Damage taken at a round boundary for an unpaid overdraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdraftPenalty {
    /// Combatant that paid.
    pub combatant_id: String,
    /// Resource owed before regeneration.
    pub deficit: u32,
    /// Penalty dice.
    pub roll: RollResult,
    /// Hit points left afterwards.
    pub hit_points: i32,
}

/// Mutable combat numbers for one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantState {
    /// Id used for targeting; unique within the combat.
    pub combatant_id: String,
    /// Roster participant this state belongs to.
    pub participant_id: Option<ParticipantId>,
    /// Character record, for non-lightweight participants.
    pub character_id: Option<CharacterId>,
    /// Copied from the roster role when combat starts.
    pub is_player: bool,
    /// Initiative score (higher goes first).
    pub initiative: i32,
    /// Action resource regained each round.
    pub max_resource: i32,
    /// Action resource available; may be negative.
    pub current_resource: i32,
    /// Cost charged since the last round boundary.
    pub spent_this_cycle: u32,
    /// Current hit points.
    pub hit_points: i32,
    /// Hit point maximum.
    pub max_hit_points: i32,
    /// Whether the combatant is awake.
    pub is_conscious: bool,
}

impl CombatantState {
    /// Create a fresh combatant at full resource and hit points.
    pub fn new(combatant_id: impl Into<String>, stats: CombatStats) -> Self {
        Self {
            combatant_id: combatant_id.into(),
            participant_id: None,
            character_id: None,
            is_player: false,
            initiative: stats.initiative,
            max_resource: stats.max_resource,
            current_resource: stats.max_resource,
            spent_this_cycle: 0,
            hit_points: stats.max_hit_points,
            max_hit_points: stats.max_hit_points,
            is_conscious: true,
        }
    }

    /// Mark the combatant as a player character.
    pub fn as_player(mut self) -> Self {
        self.is_player = true;
        self
    }

    // --- Spending ---

    /// Charge `cost` against the resource. Always executes.
    pub fn spend(&mut self, cost: u32) -> SpendOutcome {
        let before = self.current_resource;
        let charge = i32::try_from(cost).unwrap_or(i32::MAX);
        self.current_resource = before.saturating_sub(charge);
        self.spent_this_cycle = self.spent_this_cycle.saturating_add(cost);
        SpendOutcome {
            cost,
            affordable: before >= charge,
            before,
            after: self.current_resource,
        }
    }

    /// Whether `cost` can be paid without going into debt.
    pub fn can_afford(&self, cost: u32) -> bool {
        i64::from(self.current_resource) >= i64::from(cost)
    }

    /// Resource owed, or 0 when not overdrawn.
    pub fn overdraft(&self) -> u32 {
        if self.current_resource < 0 {
            self.current_resource.unsigned_abs()
        } else {
            0
        }
    }

    // --- Hit points ---

    /// Take damage. Reaching 0 hit points knocks the combatant out.
    pub fn apply_damage(&mut self, amount: u32) -> i32 {
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.hit_points = self.hit_points.saturating_sub(amount).max(0);
        if self.hit_points == 0 {
            self.is_conscious = false;
        }
        self.hit_points
    }

    /// Heal up to the maximum. Any hit points above 0 wake the combatant.
    pub fn heal(&mut self, amount: u32) -> i32 {
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.hit_points = self
            .hit_points
            .saturating_add(amount)
            .min(self.max_hit_points);
        if self.hit_points > 0 {
            self.is_conscious = true;
        }
        self.hit_points
    }

    /// Out of hit points.
    pub fn is_defeated(&self) -> bool {
        self.hit_points <= 0
    }

    /// Conscious with hit points left.
    pub fn can_act(&self) -> bool {
        self.is_conscious && !self.is_defeated()
    }

    // --- Round boundary ---

    /// Roll the overdraft penalty, if any, and apply it as damage.
    pub fn pay_overdraft<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<OverdraftPenalty> {
        let deficit = self.overdraft();
        if deficit == 0 {
            return None;
        }
        let roll = Die::D6.roll(deficit.min(MAX_PENALTY_DICE), rng);
        let hit_points = self.apply_damage(roll.total());
        Some(OverdraftPenalty {
            combatant_id: self.combatant_id.clone(),
            deficit,
            roll,
            hit_points,
        })
    }

    /// Regain the per-round resource and clear the cycle counter. Debt is
    /// carried: a combatant at -2 with max 3 starts the round at 1.
    pub fn reset_cycle(&mut self) {
        self.current_resource = self
            .current_resource
            .saturating_add(self.max_resource)
            .min(self.max_resource);
        self.spent_this_cycle = 0;
    }
}

impl std::fmt::Display for CombatantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: HP {}/{}, resource {}/{}",
            self.combatant_id,
            self.hit_points,
            self.max_hit_points,
            self.current_resource,
            self.max_resource
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn combatant(resource: i32) -> CombatantState {
        let mut c = CombatantState::new("fighter", CombatStats::default());
        c.current_resource = resource;
        c
    }

    #[test]
    fn overdraft_spend_executes() {
        let mut c = combatant(2);
        let outcome = c.spend(3);
        assert!(!outcome.affordable);
        assert_eq!(outcome.before, 2);
        assert_eq!(outcome.after, -1);
        assert_eq!(c.current_resource, -1);
        assert_eq!(c.spent_this_cycle, 3);
        assert_eq!(c.overdraft(), 1);
    }

    #[test]
    fn exact_spend_is_affordable() {
        let mut c = combatant(3);
        assert!(c.can_afford(3));
        assert!(c.spend(3).affordable);
        assert_eq!(c.current_resource, 0);
        assert_eq!(c.overdraft(), 0);
    }

    #[test]
    fn spent_this_cycle_accumulates() {
        let mut c = combatant(3);
        c.spend(1);
        c.spend(2);
        c.spend(4);
        assert_eq!(c.spent_this_cycle, 7);
        assert_eq!(c.current_resource, -4);
    }

    #[test]
    fn damage_and_heal_toggle_consciousness() {
        let mut c = combatant(3);
        assert_eq!(c.apply_damage(25), 0);
        assert!(!c.is_conscious);
        assert!(c.is_defeated());
        assert!(!c.can_act());

        assert_eq!(c.heal(4), 4);
        assert!(c.is_conscious);
        assert!(c.can_act());

        assert_eq!(c.heal(100), 10);
    }

    #[test]
    fn overdraft_penalty_caps_dice() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut c = combatant(-25);
        c.max_hit_points = 500;
        c.hit_points = 500;
        let penalty = c.pay_overdraft(&mut rng).unwrap();
        assert_eq!(penalty.deficit, 25);
        assert_eq!(penalty.roll.count(), 10);
        assert_eq!(c.hit_points, 500 - i32::try_from(penalty.roll.total()).unwrap());
    }

    #[test]
    fn no_penalty_without_debt() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut c = combatant(0);
        assert!(c.pay_overdraft(&mut rng).is_none());
        assert_eq!(c.hit_points, 10);
    }

    #[test]
    fn reset_carries_debt() {
        let mut c = combatant(-2);
        c.spent_this_cycle = 5;
        c.reset_cycle();
        assert_eq!(c.current_resource, 1);
        assert_eq!(c.spent_this_cycle, 0);

        let mut full = combatant(2);
        full.reset_cycle();
        assert_eq!(full.current_resource, 3);
    }
}

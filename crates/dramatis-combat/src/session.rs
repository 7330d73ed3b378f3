//! Combat state: combatants, initiative order, rounds, and the event log.

use dramatis_core::ParticipantRecord;
use rand::Rng;
use tracing::{debug, info};

use crate::action::CombatEvent;
use crate::error::{CombatError, CombatResult};
use crate::resource::{CombatStats, CombatantState, OverdraftPenalty};

/// The state of an ongoing combat encounter.
#[derive(Debug, Clone, Default)]
pub struct CombatSession {
    combatants: Vec<CombatantState>,
    /// Current round number (1-based, 0 before the start).
    pub round: u32,
    /// Position in `initiative_order` of the acting combatant.
    turn_index: usize,
    /// Combatant indices sorted by initiative (descending).
    initiative_order: Vec<usize>,
    /// Log of all resolved actions.
    pub log: Vec<CombatEvent>,
}

impl CombatSession {
    /// Create an empty combat.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a combat from roster records. Only present participants with
    /// the combat capability take part. Duplicate labels get a numeric suffix.
    pub fn from_participants<'a, I, F>(participants: I, mut stats: F) -> Self
    where
        I: IntoIterator<Item = &'a ParticipantRecord>,
        F: FnMut(&ParticipantRecord) -> CombatStats,
    {
        let mut session = Self::new();
        for record in participants.into_iter().filter(|p| p.is_active_combatant()) {
            let id = session.unique_id(&record.display_label);
            let mut state = CombatantState::new(id, stats(record));
            state.participant_id = Some(record.participant_id);
            state.character_id = record.character_id.clone();
            state.is_player = record.role.is_player();
            session.combatants.push(state);
        }
        session
    }

    /// Add a combatant. Ids are unique ignoring case.
    pub fn add_combatant(&mut self, state: CombatantState) -> CombatResult<()> {
        if self.position(&state.combatant_id).is_some() {
            return Err(CombatError::DuplicateCombatant(state.combatant_id));
        }
        self.combatants.push(state);
        if !self.is_not_started() {
            self.sort_initiative();
        }
        Ok(())
    }

    /// Add a combatant mid-fight under a free id derived from `label`.
    /// Returns the id it was given.
    pub fn enlist(&mut self, label: &str, stats: CombatStats, is_player: bool) -> String {
        let id = self.unique_id(label);
        let mut state = CombatantState::new(id.clone(), stats);
        state.is_player = is_player;
        self.combatants.push(state);
        if !self.is_not_started() {
            self.sort_initiative();
        }
        info!(combatant = %id, "combatant enlisted mid-fight");
        id
    }

    /// Start the combat: sort by initiative and begin round 1.
    pub fn start(&mut self) {
        self.round = 1;
        self.turn_index = 0;
        self.sort_initiative();
        info!(combatants = self.combatants.len(), "combat started");
    }

    // --- Lookup ---

    /// All combatants in insertion order.
    pub fn combatants(&self) -> &[CombatantState] {
        &self.combatants
    }

    /// Combatants in initiative order.
    pub fn in_initiative_order(&self) -> impl Iterator<Item = &CombatantState> {
        self.initiative_order.iter().map(|&i| &self.combatants[i])
    }

    /// Look up a combatant by id: exact match first, then ignoring case.
    pub fn combatant(&self, id: &str) -> Option<&CombatantState> {
        self.position(id).map(|i| &self.combatants[i])
    }

    /// Mutable lookup by id, same matching as [`Self::combatant`].
    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut CombatantState> {
        self.position(id).map(|i| &mut self.combatants[i])
    }

    /// Find the combatant acting for an actor reference: a combatant id or the
    /// character id behind it.
    pub fn find_for_actor(&self, actor: &str) -> Option<&CombatantState> {
        self.combatant(actor).or_else(|| {
            self.combatants
                .iter()
                .find(|c| c.character_id.as_ref().is_some_and(|id| id.matches(actor)))
        })
    }

    /// Ids a new action could target right now, sorted.
    pub fn valid_targets(&self, allow_unconscious: bool) -> Vec<String> {
        let mut ids: Vec<String> = self
            .combatants
            .iter()
            .filter(|c| !c.is_defeated() && (allow_unconscious || c.is_conscious))
            .map(|c| c.combatant_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of combatants.
    pub fn combatant_count(&self) -> usize {
        self.combatants.len()
    }

    fn position(&self, id: &str) -> Option<usize> {
        let id = id.trim();
        self.combatants
            .iter()
            .position(|c| c.combatant_id == id)
            .or_else(|| {
                self.combatants
                    .iter()
                    .position(|c| c.combatant_id.eq_ignore_ascii_case(id))
            })
    }

    fn unique_id(&self, label: &str) -> String {
        let base = label.trim();
        if self.position(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base} {n}"))
            .find(|candidate| self.position(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    // --- Turn order ---

    /// Index (into [`Self::combatants`]) of the acting combatant.
    pub fn current_combatant_index(&self) -> CombatResult<usize> {
        self.initiative_order
            .get(self.turn_index)
            .copied()
            .ok_or(CombatError::NoActiveCombatant)
    }

    /// The acting combatant.
    pub fn current_combatant(&self) -> CombatResult<&CombatantState> {
        let idx = self.current_combatant_index()?;
        Ok(&self.combatants[idx])
    }

    /// Advance to the next combatant able to act. Returns true if the round
    /// wrapped; the caller then settles the round with [`Self::settle_round`].
    pub fn next_turn(&mut self) -> bool {
        if self.initiative_order.is_empty() {
            return false;
        }
        let mut wrapped = false;
        for _ in 0..self.initiative_order.len() {
            self.turn_index += 1;
            if self.turn_index >= self.initiative_order.len() {
                self.turn_index = 0;
                self.round += 1;
                wrapped = true;
            }
            if self.combatants[self.initiative_order[self.turn_index]].can_act() {
                break;
            }
        }
        wrapped
    }

    /// Round boundary bookkeeping: charge overdraft penalties, then regain
    /// resources and reset the cycle counters.
    pub fn settle_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<OverdraftPenalty> {
        let mut penalties = Vec::new();
        for combatant in &mut self.combatants {
            if let Some(penalty) = combatant.pay_overdraft(rng) {
                info!(
                    combatant = %penalty.combatant_id,
                    deficit = penalty.deficit,
                    damage = penalty.roll.total(),
                    "overdraft penalty"
                );
                penalties.push(penalty);
            }
            combatant.reset_cycle();
        }
        debug!(round = self.round, "round settled");
        penalties
    }

    /// Close the current round immediately and start the next one.
    pub fn end_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<OverdraftPenalty> {
        let penalties = self.settle_round(rng);
        self.round += 1;
        self.turn_index = 0;
        penalties
    }

    /// Get the current round number.
    pub fn current_round(&self) -> u32 {
        self.round
    }

    /// Returns true if combat hasn't started yet.
    pub fn is_not_started(&self) -> bool {
        self.round == 0
    }

    /// One side has nobody left standing.
    pub fn is_decided(&self) -> bool {
        let standing = |player: bool| {
            self.combatants
                .iter()
                .any(|c| c.is_player == player && c.can_act())
        };
        !standing(true) || !standing(false)
    }

    /// Record a combat event in the log.
    pub fn log_event(&mut self, event: CombatEvent) {
        self.log.push(event);
    }

    /// Highest initiative first; ties broken by id so the order is stable.
    fn sort_initiative(&mut self) {
        let current = self.current_combatant_index().ok();
        let mut indices: Vec<usize> = (0..self.combatants.len()).collect();
        indices.sort_by(|&a, &b| {
            let (a, b) = (&self.combatants[a], &self.combatants[b]);
            b.initiative
                .cmp(&a.initiative)
                .then_with(|| a.combatant_id.cmp(&b.combatant_id))
        });
        self.initiative_order = indices;
        if let Some(current) = current {
            self.turn_index = self
                .initiative_order
                .iter()
                .position(|&i| i == current)
                .unwrap_or(0);
        }
    }
}

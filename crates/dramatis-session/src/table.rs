//! The table: scenes, their rosters, combats and journals.
//!
//! Each scene has its own async mutex held for the deterministic parts of a
//! turn. Narration generation runs with the lock released; its result is
//! merged after re-acquiring it. The roster manager sits behind a plain
//! `RwLock` that is only held for the duration of a single roster call and
//! never across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use dramatis_combat::{
    ActionReport, CapabilityCheck, CombatAction, CombatSession, CombatStats, CombatantState, Die,
    OverdraftPenalty,
};
use dramatis_core::{
    Capability, CharacterId, CharacterRef, LegacyPresence, ParticipantRecord, Roster,
    RosterEventKind, RosterManager, SceneId, SceneSnapshot, TurnType, classify,
};
use dramatis_narration::{
    NarrationGenerator, NarrationRequest, RunContext, Stage, ToolOutcome, generate_with_retry,
    normalize, normalize_failure,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::journal::{Journal, JournalEntry};
use crate::turn::{TurnOutcome, TurnRequest};

/// Mutable state of one scene, guarded by the scene's mutex.
#[derive(Debug)]
struct SceneState {
    context: RunContext,
    /// Run contexts of finished combats, oldest first.
    archive: Vec<RunContext>,
    combat: Option<CombatSession>,
    journal: Journal,
    rng: StdRng,
}

impl SceneState {
    fn new(scene_id: &SceneId, seed: u64) -> Self {
        let seed = scene_id
            .as_str()
            .bytes()
            .fold(seed, |h, b| h.rotate_left(5) ^ u64::from(b));
        Self {
            context: RunContext::new(),
            archive: Vec::new(),
            combat: None,
            journal: Journal::new(scene_id.clone()),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

/// Runs turns for any number of scenes.
pub struct Table {
    roster: RwLock<RosterManager>,
    scenes: RwLock<HashMap<SceneId, Arc<Mutex<SceneState>>>>,
    generator: Arc<dyn NarrationGenerator>,
    config: SessionConfig,
}

impl Table {
    /// Create a table around an injected roster manager and generator.
    pub fn new(
        roster: RosterManager,
        generator: Arc<dyn NarrationGenerator>,
        config: SessionConfig,
    ) -> Self {
        Self {
            roster: RwLock::new(roster),
            scenes: RwLock::new(HashMap::new()),
            generator,
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Ids of every open scene.
    pub fn scene_ids(&self) -> SessionResult<Vec<SceneId>> {
        let scenes = self.scenes.read().map_err(|_| SessionError::LockPoisoned)?;
        let mut ids: Vec<SceneId> = scenes.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Scenes and roster
    // -----------------------------------------------------------------------

    /// Open a scene, bootstrapping its roster from a persisted snapshot.
    /// Opening an open scene returns its current roster.
    pub async fn open_scene(
        &self,
        snapshot: &SceneSnapshot,
        previous: Option<&Roster>,
    ) -> SessionResult<Roster> {
        let scene_id = &snapshot.scene_id;
        let scene = self.scene_or_create(scene_id)?;
        let mut state = scene.lock().await;

        let before = self.participants(scene_id)?;
        let roster = self.roster_write()?.bootstrap(snapshot, previous)?;
        append_all(&mut state.journal, roster_changes(&before, roster.participants()));
        info!(scene = %scene_id, present = roster.present().count(), "scene opened");
        Ok(roster)
    }

    /// Add a participant to an open scene.
    pub async fn add_participant(
        &self,
        scene_id: &SceneId,
        character: CharacterRef,
    ) -> SessionResult<ParticipantRecord> {
        let scene = self.scene(scene_id)?;
        let mut state = scene.lock().await;
        let before = self.participants(scene_id)?;
        let record = self.roster_write()?.add_participant(scene_id, character)?;
        append_all(&mut state.journal, roster_changes(&before, &self.participants(scene_id)?));
        Ok(record)
    }

    /// Soft-remove a participant from an open scene.
    pub async fn remove_participant(
        &self,
        scene_id: &SceneId,
        character_id: &CharacterId,
    ) -> SessionResult<()> {
        let scene = self.scene(scene_id)?;
        let mut state = scene.lock().await;
        let before = self.participants(scene_id)?;
        self.roster_write()?
            .remove_participant(scene_id, character_id)?;
        append_all(&mut state.journal, roster_changes(&before, &self.participants(scene_id)?));
        Ok(())
    }

    /// Snapshot of a scene's roster.
    pub fn roster(&self, scene_id: &SceneId) -> SessionResult<Roster> {
        self.roster_read()?
            .roster(scene_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownScene(scene_id.clone()))
    }

    /// Flat presence lists for older consumers.
    pub fn legacy_presence(&self, scene_id: &SceneId) -> SessionResult<LegacyPresence> {
        Ok(self.roster(scene_id)?.legacy_presence())
    }

    // -----------------------------------------------------------------------
    // Combat
    // -----------------------------------------------------------------------

    /// Start combat with every present combat-capable participant.
    ///
    /// Participants named in `fixed` use those stats; everyone else gets the
    /// configured defaults with a d20 initiative roll. Each initiative is
    /// recorded in the run context. Returns the combatants in turn order.
    pub async fn start_combat(
        &self,
        scene_id: &SceneId,
        fixed: &BTreeMap<String, CombatStats>,
    ) -> SessionResult<Vec<CombatantState>> {
        let scene = self.scene(scene_id)?;
        let mut guard = scene.lock().await;
        let state = &mut *guard;
        if state.combat.is_some() {
            return Err(SessionError::CombatRunning(scene_id.clone()));
        }

        let participants = self.roster_read()?.get_combat_participants(scene_id);
        if participants.is_empty() {
            return Err(SessionError::NoCombatants(scene_id.clone()));
        }

        let defaults = self.config.default_stats;
        let rng = &mut state.rng;
        let mut combat = CombatSession::from_participants(&participants, |p| {
            fixed
                .iter()
                .find(|(name, _)| p.matches_actor(name))
                .map(|(_, stats)| *stats)
                .unwrap_or_else(|| {
                    let roll = Die::D20.roll(1, rng).total();
                    defaults.with_initiative(i32::try_from(roll).unwrap_or(0))
                })
        });
        combat.start();

        let order: Vec<CombatantState> = combat.in_initiative_order().cloned().collect();
        for combatant in &order {
            state.context.record(ToolOutcome::Initiative {
                name: combatant.combatant_id.clone(),
                value: combatant.initiative,
            });
        }
        state.journal.append(JournalEntry::CombatStart {
            order: order.iter().map(|c| c.combatant_id.clone()).collect(),
            timestamp: Utc::now(),
        });
        state.combat = Some(combat);
        info!(scene = %scene_id, combatants = order.len(), "combat started");
        Ok(order)
    }

    /// Move to the next combatant able to act, settling the round when the
    /// order wraps. Returns the id of the combatant now acting.
    pub async fn advance(&self, scene_id: &SceneId) -> SessionResult<String> {
        let scene = self.scene(scene_id)?;
        let mut guard = scene.lock().await;
        let state = &mut *guard;
        let combat = state
            .combat
            .as_mut()
            .ok_or_else(|| SessionError::NoCombat(scene_id.clone()))?;

        let round = combat.current_round();
        if combat.next_turn() {
            let penalties = combat.settle_round(&mut state.rng);
            state.journal.append(round_end(round, &penalties));
        }
        Ok(combat.current_combatant()?.combatant_id.clone())
    }

    /// Close the current round: overdraft penalties, then resources regained.
    pub async fn end_round(&self, scene_id: &SceneId) -> SessionResult<Vec<OverdraftPenalty>> {
        let scene = self.scene(scene_id)?;
        let mut guard = scene.lock().await;
        let state = &mut *guard;
        let combat = state
            .combat
            .as_mut()
            .ok_or_else(|| SessionError::NoCombat(scene_id.clone()))?;

        let round = combat.current_round();
        let penalties = combat.end_round(&mut state.rng);
        state.journal.append(round_end(round, &penalties));
        Ok(penalties)
    }

    /// End the combat. Its run context is archived and a fresh one begins.
    pub async fn end_combat(&self, scene_id: &SceneId) -> SessionResult<CombatSession> {
        let scene = self.scene(scene_id)?;
        let mut state = scene.lock().await;
        let combat = state
            .combat
            .take()
            .ok_or_else(|| SessionError::NoCombat(scene_id.clone()))?;
        let finished = std::mem::take(&mut state.context);
        state.archive.push(finished);
        info!(scene = %scene_id, rounds = combat.current_round(), "combat ended");
        Ok(combat)
    }

    /// Snapshot of the running combat, if any.
    pub async fn combat(&self, scene_id: &SceneId) -> SessionResult<Option<CombatSession>> {
        let scene = self.scene(scene_id)?;
        let state = scene.lock().await;
        Ok(state.combat.clone())
    }

    // -----------------------------------------------------------------------
    // Run context and journal
    // -----------------------------------------------------------------------

    /// Record a deterministic tool result. Returns its key.
    pub async fn record_fact(
        &self,
        scene_id: &SceneId,
        outcome: ToolOutcome,
    ) -> SessionResult<String> {
        let scene = self.scene(scene_id)?;
        let mut state = scene.lock().await;
        let key = state.context.record(outcome);
        debug!(scene = %scene_id, key = %key, "fact recorded");
        Ok(key)
    }

    /// Snapshot of the current run context.
    pub async fn run_context(&self, scene_id: &SceneId) -> SessionResult<RunContext> {
        let scene = self.scene(scene_id)?;
        let state = scene.lock().await;
        Ok(state.context.clone())
    }

    /// Snapshot of a scene's journal.
    pub async fn journal(&self, scene_id: &SceneId) -> SessionResult<Journal> {
        let scene = self.scene(scene_id)?;
        let state = scene.lock().await;
        Ok(state.journal.clone())
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// Run one turn.
    ///
    /// Classification and any combat action happen under the scene lock.
    /// A rejected action returns its error before anything changes. The
    /// narration is then generated unlocked, and normalized, synced into the
    /// roster and journaled under the lock again.
    pub async fn take_turn(
        &self,
        scene_id: &SceneId,
        request: TurnRequest,
    ) -> SessionResult<TurnOutcome> {
        let scene = self.scene(scene_id)?;

        let (turn_type, action, narration_request) = {
            let mut state = scene.lock().await;
            let roster = self.roster(scene_id)?;
            let turn_type = classify(&request.actor, &roster, request.turn_override);

            let resolved = match &request.action {
                None => None,
                Some(_) if turn_type == TurnType::Narrator => {
                    return Err(SessionError::NarratorAction);
                }
                Some(action) => Some(self.resolve(&mut state, &roster, &request.actor, action)?),
            };
            let (action, outcome) = resolved.unzip();

            let narration_request = NarrationRequest {
                scene_id: scene_id.clone(),
                actor: request.actor.clone(),
                turn_type,
                intent: request.intent.clone(),
                outcome,
                present: roster.present().map(|p| p.display_label.clone()).collect(),
                facts: state.context.facts().to_vec(),
            };
            (turn_type, action, narration_request)
        };

        let generated = generate_with_retry(
            self.generator.as_ref(),
            &narration_request,
            self.config.narration_timeout(),
            self.config.narration_attempts,
        )
        .await;

        let mut state = scene.lock().await;
        let narration = match &generated {
            Ok(raw) => normalize(raw, &state.context),
            Err(e) => normalize_failure(e, &state.context),
        };
        if narration.is_fallback() {
            let reason = narration
                .diagnostics
                .iter()
                .find(|d| d.stage != Stage::Fallback)
                .map(|d| d.message.clone())
                .unwrap_or_default();
            state.journal.append(JournalEntry::Fallback {
                actor: request.actor.clone(),
                reason,
                timestamp: Utc::now(),
            });
        }

        let before = self.participants(scene_id)?;
        let joined = self
            .roster_write()?
            .sync_from_turn(scene_id, &narration.payload.mentions)?;
        append_all(&mut state.journal, roster_changes(&before, &self.participants(scene_id)?));

        state.journal.append(JournalEntry::Turn {
            actor: request.actor.clone(),
            turn_type,
            text: narration.payload.narrative.text.clone(),
            source: narration.source,
            timestamp: Utc::now(),
        });
        info!(
            scene = %scene_id,
            actor = %request.actor,
            %turn_type,
            source = ?narration.source,
            joined = joined.len(),
            "turn complete"
        );

        Ok(TurnOutcome {
            turn_type,
            action,
            narration,
            joined,
        })
    }

    /// Capability check, then the action itself. Returns the report and a
    /// one-line description for the narration request.
    fn resolve(
        &self,
        state: &mut SceneState,
        roster: &Roster,
        actor: &str,
        action: &CombatAction,
    ) -> SessionResult<(ActionReport, String)> {
        let SceneState {
            context,
            combat,
            journal,
            ..
        } = state;
        let combat = combat
            .as_mut()
            .ok_or_else(|| SessionError::NoCombat(roster.scene_id.clone()))?;

        let record = roster.find_actor(actor);
        let check = self
            .config
            .capability_policy
            .check(actor, record, Capability::Combat)?;
        if let Some(target) = action.target() {
            dramatis_combat::validate_target(combat, target, action.allows_unconscious_target())?;
        }
        if check == CapabilityCheck::Waived {
            journal.append(JournalEntry::CapabilityWaived {
                actor: actor.to_string(),
                capability: Capability::Combat,
                timestamp: Utc::now(),
            });
        }

        let mut actor_ref = actor.to_string();
        if combat.find_for_actor(actor).is_none() {
            let label = record.map_or(actor, |r| r.display_label.as_str());
            let is_player = record.is_some_and(|r| r.role.is_player());
            actor_ref = combat.enlist(label, self.config.default_stats, is_player);
        }

        let report = dramatis_combat::resolve_action(combat, &actor_ref, action)?;
        let description = combat
            .log
            .last()
            .map(|e| e.description.clone())
            .unwrap_or_default();

        context.record(ToolOutcome::ResourceSpend {
            combatant: report.actor.clone(),
            round: combat.current_round(),
            cost: report.spend.cost,
            after: report.spend.after,
        });
        journal.append(JournalEntry::CombatAction {
            round: combat.current_round(),
            description: description.clone(),
            overdrawn: !report.spend.affordable,
            timestamp: Utc::now(),
        });
        Ok((report, description))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn scene(&self, scene_id: &SceneId) -> SessionResult<Arc<Mutex<SceneState>>> {
        self.scenes
            .read()
            .map_err(|_| SessionError::LockPoisoned)?
            .get(scene_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownScene(scene_id.clone()))
    }

    fn scene_or_create(&self, scene_id: &SceneId) -> SessionResult<Arc<Mutex<SceneState>>> {
        let mut scenes = self.scenes.write().map_err(|_| SessionError::LockPoisoned)?;
        let scene = scenes
            .entry(scene_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SceneState::new(scene_id, self.config.seed))));
        Ok(Arc::clone(scene))
    }

    fn participants(&self, scene_id: &SceneId) -> SessionResult<Vec<ParticipantRecord>> {
        Ok(self.roster_read()?.get_participants(scene_id, true))
    }

    fn roster_read(&self) -> SessionResult<RwLockReadGuard<'_, RosterManager>> {
        self.roster.read().map_err(|_| SessionError::LockPoisoned)
    }

    fn roster_write(&self) -> SessionResult<RwLockWriteGuard<'_, RosterManager>> {
        self.roster.write().map_err(|_| SessionError::LockPoisoned)
    }
}

fn append_all(journal: &mut Journal, entries: Vec<JournalEntry>) {
    for entry in entries {
        journal.append(entry);
    }
}

/// Journal entries for the difference between two roster states.
fn roster_changes(before: &[ParticipantRecord], after: &[ParticipantRecord]) -> Vec<JournalEntry> {
    let now = Utc::now();
    after
        .iter()
        .filter_map(|record| {
            let previous = before
                .iter()
                .find(|p| p.participant_id == record.participant_id);
            let kind = match previous {
                None if record.present => RosterEventKind::Joined,
                None => return None,
                Some(p) if !p.present && record.present => RosterEventKind::Rejoined,
                Some(p) if p.present && !record.present => RosterEventKind::Left,
                Some(p)
                    if p.role != record.role
                        || p.capabilities != record.capabilities
                        || p.display_label != record.display_label =>
                {
                    RosterEventKind::Updated
                }
                Some(_) => return None,
            };
            Some(JournalEntry::RosterChange {
                kind,
                label: record.display_label.clone(),
                role: record.role,
                timestamp: now,
            })
        })
        .collect()
}

fn round_end(round: u32, penalties: &[OverdraftPenalty]) -> JournalEntry {
    JournalEntry::RoundEnd {
        round,
        penalties: penalties
            .iter()
            .map(|p| {
                format!(
                    "{} pays {} overdraft: {} damage {} (HP {})",
                    p.combatant_id,
                    p.deficit,
                    p.roll.total(),
                    p.roll,
                    p.hit_points
                )
            })
            .collect(),
        timestamp: Utc::now(),
    }
}

//! Combat actions and event logging.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CombatError, CombatResult};
use crate::resource::SpendOutcome;
use crate::session::CombatSession;
use crate::target::validate_target;

/// An action a combatant can take during their turn.
///
/// Amounts come from deterministic tool results (a damage roll already in
/// the run context, say); this crate only applies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatAction {
    /// Deal damage to a target.
    Attack {
        /// Target combatant id.
        target: String,
        /// Resource cost.
        cost: u32,
        /// Hit points removed.
        damage: u32,
    },
    /// Restore hit points; may target the unconscious.
    Heal {
        /// Target combatant id.
        target: String,
        /// Resource cost.
        cost: u32,
        /// Hit points restored.
        amount: u32,
    },
    /// Take a defensive stance.
    Defend {
        /// Resource cost.
        cost: u32,
    },
    /// A free-form action described by text.
    Custom {
        /// What happens.
        description: String,
        /// Resource cost.
        cost: u32,
    },
}

impl CombatAction {
    /// Resource cost of the action.
    pub fn cost(&self) -> u32 {
        match self {
            Self::Attack { cost, .. }
            | Self::Heal { cost, .. }
            | Self::Defend { cost }
            | Self::Custom { cost, .. } => *cost,
        }
    }

    /// Target reference, for actions that have one.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Attack { target, .. } | Self::Heal { target, .. } => Some(target),
            Self::Defend { .. } | Self::Custom { .. } => None,
        }
    }

    /// Whether an unconscious target is acceptable.
    pub fn allows_unconscious_target(&self) -> bool {
        matches!(self, Self::Heal { .. })
    }
}

impl std::fmt::Display for CombatAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attack { target, damage, .. } => write!(f, "Attack {target} for {damage}"),
            Self::Heal { target, amount, .. } => write!(f, "Heal {target} for {amount}"),
            Self::Defend { .. } => write!(f, "Defend"),
            Self::Custom { description, .. } => write!(f, "{description}"),
        }
    }
}

/// A recorded combat event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Which round this happened in.
    pub round: u32,
    /// Acting combatant id.
    pub actor: String,
    /// What action was taken.
    pub action: CombatAction,
    /// Resource accounting for the action.
    pub spend: SpendOutcome,
    /// A short description of what happened.
    pub description: String,
}

/// What resolving an action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Acting combatant id.
    pub actor: String,
    /// Target combatant id, if any.
    pub target: Option<String>,
    /// Resource accounting for the action.
    pub spend: SpendOutcome,
    /// Target hit points after the action.
    pub target_hit_points: Option<i32>,
    /// Target went down as a result.
    pub target_down: bool,
}

/// Resolve a combat action.
///
/// The target is validated before anything is charged, so a rejected action
/// leaves the combat untouched. An unaffordable action still goes through
/// and leaves the actor in debt.
pub fn resolve_action(
    session: &mut CombatSession,
    actor_ref: &str,
    action: &CombatAction,
) -> CombatResult<ActionReport> {
    let actor = session
        .find_for_actor(actor_ref)
        .ok_or_else(|| CombatError::UnknownCombatant(actor_ref.to_string()))?;
    if !actor.can_act() {
        return Err(CombatError::ActorDown(actor.combatant_id.clone()));
    }
    let actor_id = actor.combatant_id.clone();

    let target_id = match action.target() {
        Some(target) => Some(
            validate_target(session, target, action.allows_unconscious_target())?
                .combatant_id
                .clone(),
        ),
        None => None,
    };

    let spend = session
        .combatant_mut(&actor_id)
        .map(|a| a.spend(action.cost()))
        .ok_or_else(|| CombatError::UnknownCombatant(actor_id.clone()))?;
    if !spend.affordable {
        warn!(actor = %actor_id, before = spend.before, after = spend.after, "overdraft spend");
    }

    let mut target_hit_points = None;
    let mut target_down = false;
    if let Some(id) = &target_id {
        let target = session
            .combatant_mut(id)
            .ok_or_else(|| CombatError::UnknownCombatant(id.clone()))?;
        let hp = match action {
            CombatAction::Attack { damage, .. } => target.apply_damage(*damage),
            CombatAction::Heal { amount, .. } => target.heal(*amount),
            CombatAction::Defend { .. } | CombatAction::Custom { .. } => target.hit_points,
        };
        target_down = !target.can_act();
        target_hit_points = Some(hp);
    }

    let description = describe(&actor_id, action, target_hit_points, target_down);
    debug!(actor = %actor_id, action = %action, "action resolved");
    session.log_event(CombatEvent {
        round: session.current_round(),
        actor: actor_id.clone(),
        action: action.clone(),
        spend,
        description,
    });

    Ok(ActionReport {
        actor: actor_id,
        target: target_id,
        spend,
        target_hit_points,
        target_down,
    })
}

fn describe(actor: &str, action: &CombatAction, hp: Option<i32>, down: bool) -> String {
    let mut text = format!("{actor}: {action}");
    if let Some(hp) = hp {
        text.push_str(&format!(" (HP {hp})"));
    }
    if down {
        text.push_str(", target down");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CombatStats, CombatantState};

    fn setup() -> CombatSession {
        let mut session = CombatSession::new();
        session
            .add_combatant(CombatantState::new("fighter", CombatStats::default()).as_player())
            .unwrap();
        session
            .add_combatant(CombatantState::new("goblin", CombatStats::default()))
            .unwrap();
        session.start();
        session
    }

    fn attack(target: &str, cost: u32, damage: u32) -> CombatAction {
        CombatAction::Attack {
            target: target.into(),
            cost,
            damage,
        }
    }

    #[test]
    fn attack_spends_and_damages() {
        let mut session = setup();
        let report = resolve_action(&mut session, "fighter", &attack("goblin", 2, 4)).unwrap();
        assert!(report.spend.affordable);
        assert_eq!(report.target_hit_points, Some(6));
        assert!(!report.target_down);
        assert_eq!(session.combatant("fighter").unwrap().current_resource, 1);
        assert_eq!(session.log.len(), 1);
        assert_eq!(session.log[0].description, "fighter: Attack goblin for 4 (HP 6)");
    }

    #[test]
    fn desperate_attack_overdraws() {
        let mut session = setup();
        let report = resolve_action(&mut session, "fighter", &attack("goblin", 5, 10)).unwrap();
        assert!(!report.spend.affordable);
        assert_eq!(report.spend.after, -2);
        assert!(report.target_down);
    }

    #[test]
    fn bad_target_charges_nothing() {
        let mut session = setup();
        let err = resolve_action(&mut session, "fighter", &attack("dragon", 2, 4)).unwrap_err();
        assert!(err.is_target_error());
        assert_eq!(session.combatant("fighter").unwrap().current_resource, 3);
        assert!(session.log.is_empty());
    }

    #[test]
    fn healing_reaches_unconscious_allies() {
        let mut session = setup();
        {
            let goblin = session.combatant_mut("goblin").unwrap();
            goblin.hit_points = 2;
            goblin.is_conscious = false;
        }
        let heal = CombatAction::Heal {
            target: "goblin".into(),
            cost: 1,
            amount: 3,
        };
        let report = resolve_action(&mut session, "fighter", &heal).unwrap();
        assert_eq!(report.target_hit_points, Some(5));
        assert!(session.combatant("goblin").unwrap().is_conscious);

        session.combatant_mut("goblin").unwrap().is_conscious = false;
        let err = resolve_action(&mut session, "fighter", &attack("goblin", 1, 1)).unwrap_err();
        assert!(matches!(err, CombatError::TargetUnconscious { .. }));
    }

    #[test]
    fn downed_actor_cannot_act() {
        let mut session = setup();
        session.combatant_mut("goblin").unwrap().apply_damage(10);
        let err =
            resolve_action(&mut session, "goblin", &CombatAction::Defend { cost: 1 }).unwrap_err();
        assert_eq!(err, CombatError::ActorDown("goblin".into()));
        assert!(matches!(
            resolve_action(&mut session, "troll", &CombatAction::Defend { cost: 1 }),
            Err(CombatError::UnknownCombatant(_))
        ));
    }

    #[test]
    fn action_deserializes_from_tagged_json() {
        let json = r#"{"kind":"heal","target":"fighter","cost":1,"amount":4}"#;
        let action: CombatAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.target(), Some("fighter"));
        assert!(action.allows_unconscious_target());
        assert_eq!(action.cost(), 1);
    }
}

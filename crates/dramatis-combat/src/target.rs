//! Target validation with helpful failures.

use strsim::jaro_winkler;

use crate::error::{CombatError, CombatResult};
use crate::resource::CombatantState;
use crate::session::CombatSession;

/// Minimum similarity for a "did you mean" hint (0.0-1.0).
const HINT_THRESHOLD: f64 = 0.8;

/// Check that `target_ref` names a combatant that can receive an action.
///
/// Healing passes `allow_unconscious = true`; harmful actions never do. A
/// target with no hit points is rejected either way. Errors carry the ids
/// that would have been accepted. The target is never swapped for another.
pub fn validate_target<'a>(
    session: &'a CombatSession,
    target_ref: &str,
    allow_unconscious: bool,
) -> CombatResult<&'a CombatantState> {
    let valid = || session.valid_targets(allow_unconscious);

    let Some(target) = session.combatant(target_ref) else {
        return Err(CombatError::TargetNotFound {
            target: target_ref.trim().to_string(),
            valid: valid(),
            hint: closest_id(session, target_ref),
        });
    };

    if !allow_unconscious && !target.is_conscious {
        return Err(CombatError::TargetUnconscious {
            target: target.combatant_id.clone(),
            valid: valid(),
        });
    }
    if target.is_defeated() {
        return Err(CombatError::TargetDefeated {
            target: target.combatant_id.clone(),
            valid: valid(),
        });
    }
    Ok(target)
}

fn closest_id(session: &CombatSession, target_ref: &str) -> Option<String> {
    let needle = target_ref.trim().to_lowercase();
    session
        .combatants()
        .iter()
        .map(|c| (jaro_winkler(&needle, &c.combatant_id.to_lowercase()), c))
        .filter(|(score, _)| *score >= HINT_THRESHOLD)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, c)| c.combatant_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::CombatStats;

    fn party() -> CombatSession {
        let mut session = CombatSession::new();
        for id in ["goblin", "fighter"] {
            session
                .add_combatant(CombatantState::new(id, CombatStats::default()))
                .unwrap();
        }
        session
    }

    #[test]
    fn unknown_target_lists_valid_ones() {
        let err = validate_target(&party(), "dragon", false).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("dragon"));
        assert!(message.contains("fighter"));
        assert!(message.contains("goblin"));
        assert!(message.find("fighter") < message.find("goblin"));
        assert_eq!(err.valid_targets(), ["fighter", "goblin"]);
    }

    #[test]
    fn near_miss_gets_a_hint() {
        let err = validate_target(&party(), "gobln", false).unwrap_err();
        match err {
            CombatError::TargetNotFound { hint, .. } => assert_eq!(hint.as_deref(), Some("goblin")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn case_insensitive_match() {
        let session = party();
        let target = validate_target(&session, "Goblin", false).unwrap();
        assert_eq!(target.combatant_id, "goblin");
    }

    #[test]
    fn unconscious_target_rules() {
        let mut session = party();
        session.combatant_mut("goblin").unwrap().is_conscious = false;

        let err = validate_target(&session, "goblin", false).unwrap_err();
        assert!(matches!(err, CombatError::TargetUnconscious { .. }));
        assert_eq!(err.valid_targets(), ["fighter"]);

        assert!(validate_target(&session, "goblin", true).is_ok());
    }

    #[test]
    fn defeated_target_rejected_even_for_healing() {
        let mut session = party();
        session.combatant_mut("fighter").unwrap().apply_damage(99);
        let err = validate_target(&session, "fighter", true).unwrap_err();
        assert!(matches!(err, CombatError::TargetDefeated { .. }));
        assert_eq!(err.valid_targets(), ["goblin"]);
    }
}

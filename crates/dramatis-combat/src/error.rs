//! Error types for combat resolution.

use dramatis_core::Capability;

/// Errors that can occur during combat operations.
///
/// Target errors are meant to be shown to the player as-is; they list the
/// targets that would have been accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    /// The target does not name any combatant.
    #[error(
        "target '{target}' not found{}; valid targets: {}",
        hint_suffix(.hint),
        listing(.valid)
    )]
    TargetNotFound {
        /// The reference as given.
        target: String,
        /// Ids that are currently valid targets, sorted.
        valid: Vec<String>,
        /// Closest id by spelling, if any is close.
        hint: Option<String>,
    },

    /// The target is unconscious and the action needs a conscious target.
    #[error("target '{target}' is unconscious; valid targets: {}", listing(.valid))]
    TargetUnconscious {
        /// Combatant id.
        target: String,
        /// Ids that are currently valid targets, sorted.
        valid: Vec<String>,
    },

    /// The target has no hit points left.
    #[error("target '{target}' is defeated; valid targets: {}", listing(.valid))]
    TargetDefeated {
        /// Combatant id.
        target: String,
        /// Ids that are currently valid targets, sorted.
        valid: Vec<String>,
    },

    /// The actor lacks a capability the action needs.
    #[error("{actor} lacks the {capability} capability")]
    CapabilityViolation {
        /// Acting participant.
        actor: String,
        /// Missing capability.
        capability: Capability,
    },

    /// The actor is not part of this combat.
    #[error("unknown combatant: {0}")]
    UnknownCombatant(String),

    /// A combatant with this id is already in the combat.
    #[error("duplicate combatant: {0}")]
    DuplicateCombatant(String),

    /// The actor is down and cannot act.
    #[error("{0} cannot act while down")]
    ActorDown(String),

    /// No combatant is currently active.
    #[error("no active combatant")]
    NoActiveCombatant,
}

fn listing(valid: &[String]) -> String {
    if valid.is_empty() {
        "none".to_string()
    } else {
        valid.join(", ")
    }
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(" (did you mean '{h}'?)"))
        .unwrap_or_default()
}

impl CombatError {
    /// Whether the error is about the chosen target, so the player can pick again.
    pub fn is_target_error(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound { .. }
                | Self::TargetUnconscious { .. }
                | Self::TargetDefeated { .. }
        )
    }

    /// Valid alternatives carried by a target error.
    pub fn valid_targets(&self) -> &[String] {
        match self {
            Self::TargetNotFound { valid, .. }
            | Self::TargetUnconscious { valid, .. }
            | Self::TargetDefeated { valid, .. } => valid,
            _ => &[],
        }
    }
}

/// Convenience result type for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_lists_alternatives() {
        let err = CombatError::TargetNotFound {
            target: "dragon".into(),
            valid: vec!["fighter".into(), "goblin".into()],
            hint: None,
        };
        assert_eq!(
            err.to_string(),
            "target 'dragon' not found; valid targets: fighter, goblin"
        );
        assert!(err.is_target_error());
        assert_eq!(err.valid_targets().len(), 2);
    }

    #[test]
    fn hint_and_empty_listing() {
        let err = CombatError::TargetNotFound {
            target: "gobin".into(),
            valid: vec![],
            hint: Some("goblin".into()),
        };
        assert_eq!(
            err.to_string(),
            "target 'gobin' not found (did you mean 'goblin'?); valid targets: none"
        );
    }

    #[test]
    fn capability_violation_is_not_a_target_error() {
        let err = CombatError::CapabilityViolation {
            actor: "Innkeeper".into(),
            capability: Capability::Combat,
        };
        assert!(!err.is_target_error());
        assert_eq!(err.to_string(), "Innkeeper lacks the combat capability");
    }
}

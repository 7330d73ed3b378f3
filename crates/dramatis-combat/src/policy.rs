//! What happens when a participant acts outside its capabilities.

use dramatis_core::{Capability, ParticipantRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CombatError, CombatResult};

/// Severity of capability violations. Deployment configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityPolicy {
    /// Reject the action.
    #[default]
    Enforce,
    /// Log a warning and let the action through.
    Warn,
}

/// Outcome of a permitted capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityCheck {
    /// The participant holds the capability.
    Granted,
    /// The participant lacks it, but the policy lets it pass.
    Waived,
}

impl CapabilityPolicy {
    /// Check that `participant` may use `capability`. An actor with no
    /// roster record holds no capabilities.
    pub fn check(
        self,
        actor: &str,
        participant: Option<&ParticipantRecord>,
        capability: Capability,
    ) -> CombatResult<CapabilityCheck> {
        if participant.is_some_and(|p| p.present && p.has_capability(capability)) {
            return Ok(CapabilityCheck::Granted);
        }
        match self {
            Self::Enforce => Err(CombatError::CapabilityViolation {
                actor: actor.to_string(),
                capability,
            }),
            Self::Warn => {
                warn!(actor, %capability, "capability violation allowed by policy");
                Ok(CapabilityCheck::Waived)
            }
        }
    }

    /// Parse a policy name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "enforce" => Some(Self::Enforce),
            "warn" => Some(Self::Warn),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dramatis_core::Role;

    fn innkeeper() -> ParticipantRecord {
        ParticipantRecord::new(
            None,
            "Innkeeper",
            Role::NpcSupport,
            Role::NpcSupport.default_capabilities(),
            Utc::now(),
        )
    }

    #[test]
    fn enforce_rejects() {
        let keeper = innkeeper();
        let err = CapabilityPolicy::default()
            .check("Innkeeper", Some(&keeper), Capability::Combat)
            .unwrap_err();
        assert!(matches!(err, CombatError::CapabilityViolation { .. }));
        assert_eq!(
            CapabilityPolicy::Enforce.check("Innkeeper", Some(&keeper), Capability::Narrative),
            Ok(CapabilityCheck::Granted)
        );
    }

    #[test]
    fn warn_waives() {
        assert_eq!(
            CapabilityPolicy::Warn.check("stranger", None, Capability::Combat),
            Ok(CapabilityCheck::Waived)
        );
    }

    #[test]
    fn parses_from_config() {
        assert_eq!(CapabilityPolicy::parse("Warn"), Some(CapabilityPolicy::Warn));
        let policy: CapabilityPolicy = serde_json::from_str("\"enforce\"").unwrap();
        assert_eq!(policy, CapabilityPolicy::Enforce);
        assert_eq!(CapabilityPolicy::parse("ignore"), None);
    }
}

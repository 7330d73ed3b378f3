//! The run context: deterministic tool outcomes recorded during a session.
//!
//! Facts are appended and never rewritten. Each fact carries an identity
//! key; merging narration against the context uses those keys to decide
//! which narration entries a fact replaces.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NarrationError, NarrationResult};

/// A deterministic tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// An initiative value for a combatant.
    Initiative {
        /// Combatant name.
        name: String,
        /// Rolled or assigned initiative.
        value: i32,
    },
    /// A labelled dice roll.
    DiceRoll {
        /// What the roll was for, e.g. "Shadow attack".
        label: String,
        /// Dice expression, e.g. "2d6".
        expression: String,
        /// Total rolled.
        total: i32,
    },
    /// A resource spend in combat.
    ResourceSpend {
        /// Combatant id.
        combatant: String,
        /// Round of the spend.
        round: u32,
        /// Cost charged.
        cost: u32,
        /// Resource afterwards.
        after: i32,
    },
}

impl ToolOutcome {
    /// Identity key for merging. Spends have none and are keyed by position.
    pub fn identity(&self) -> Option<String> {
        match self {
            Self::Initiative { name, .. } => {
                Some(format!("initiative:{}", name.trim().to_lowercase()))
            }
            Self::DiceRoll { label, .. } => Some(format!("dice:{}", label.trim().to_lowercase())),
            Self::ResourceSpend { .. } => None,
        }
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiative { name, value } => write!(f, "{name} initiative {value}"),
            Self::DiceRoll {
                label,
                expression,
                total,
            } => write!(f, "{label}: {expression} = {total}"),
            Self::ResourceSpend { combatant, round, cost, after } => {
                write!(f, "{combatant} spent {cost} in round {round} (now {after})")
            }
        }
    }
}

/// One recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Identity key.
    pub key: String,
    /// The outcome.
    pub outcome: ToolOutcome,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only record of tool outcomes for one scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    facts: Vec<Fact>,
}

impl RunContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and return its key. Repeating an identical outcome
    /// under the same key records nothing new.
    pub fn record(&mut self, outcome: ToolOutcome) -> String {
        let key = outcome
            .identity()
            .unwrap_or_else(|| format!("spend:{}", self.facts.len()));
        let repeated = self
            .facts
            .iter()
            .any(|f| f.key == key && f.outcome == outcome);
        if !repeated {
            self.facts.push(Fact {
                key: key.clone(),
                outcome,
                recorded_at: Utc::now(),
            });
        }
        key
    }

    /// All facts, oldest first.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// The earliest fact for each key, in recording order.
    pub fn resolved(&self) -> Vec<&Fact> {
        let mut seen = HashSet::new();
        self.facts
            .iter()
            .filter(|f| seen.insert(f.key.as_str()))
            .collect()
    }

    /// Like [`Self::resolved`], but fails when a key holds two different values.
    pub fn consistent(&self) -> NarrationResult<Vec<&Fact>> {
        let mut first: HashMap<&str, &ToolOutcome> = HashMap::new();
        for fact in &self.facts {
            match first.get(fact.key.as_str()) {
                Some(earlier) if **earlier != fact.outcome => {
                    return Err(NarrationError::ConflictingContext {
                        key: fact.key.clone(),
                        first: earlier.to_string(),
                        second: fact.outcome.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    first.insert(fact.key.as_str(), &fact.outcome);
                }
            }
        }
        Ok(self.resolved())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initiative(name: &str, value: i32) -> ToolOutcome {
        ToolOutcome::Initiative {
            name: name.into(),
            value,
        }
    }

    #[test]
    fn records_are_append_only() {
        let mut ctx = RunContext::new();
        assert_eq!(ctx.record(initiative("Shadow", 17)), "initiative:shadow");
        ctx.record(initiative("Shadow", 17));
        assert_eq!(ctx.len(), 1);

        ctx.record(initiative("shadow", 4));
        assert_eq!(ctx.len(), 2);
        let resolved = ctx.resolved();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].outcome, initiative("Shadow", 17));
    }

    #[test]
    fn conflicting_values_are_reported() {
        let mut ctx = RunContext::new();
        ctx.record(initiative("Shadow", 17));
        ctx.record(initiative("Shadow", 4));
        let err = ctx.consistent().unwrap_err();
        assert!(matches!(
            err,
            NarrationError::ConflictingContext { ref key, .. } if key == "initiative:shadow"
        ));
    }

    #[test]
    fn spends_never_collide() {
        let mut ctx = RunContext::new();
        let spend = ToolOutcome::ResourceSpend {
            combatant: "fighter".into(),
            round: 1,
            cost: 2,
            after: 1,
        };
        let a = ctx.record(spend.clone());
        let b = ctx.record(spend);
        assert_ne!(a, b);
        assert!(ctx.consistent().is_ok());
    }
}

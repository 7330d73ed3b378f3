//! Journal entry types.

use chrono::{DateTime, Utc};
use dramatis_core::{Capability, Role, RosterEventKind, TurnType};
use dramatis_narration::PayloadSource;
use serde::{Deserialize, Serialize};

/// A single entry in a scene journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Someone joined, left, rejoined or changed role.
    RosterChange {
        /// What changed.
        kind: RosterEventKind,
        /// Participant label.
        label: String,
        /// Role after the change.
        role: Role,
        /// When it changed.
        timestamp: DateTime<Utc>,
    },
    /// A completed turn.
    Turn {
        /// Acting participant.
        actor: String,
        /// How the turn was classified.
        turn_type: TurnType,
        /// Final narration text.
        text: String,
        /// Generated or fallback.
        source: PayloadSource,
        /// When the turn completed.
        timestamp: DateTime<Utc>,
    },
    /// Combat began.
    CombatStart {
        /// Combatant ids in initiative order.
        order: Vec<String>,
        /// When combat began.
        timestamp: DateTime<Utc>,
    },
    /// A resolved combat action.
    CombatAction {
        /// Round of the action.
        round: u32,
        /// What happened.
        description: String,
        /// Whether the actor went into debt.
        overdrawn: bool,
        /// When it was resolved.
        timestamp: DateTime<Utc>,
    },
    /// A round boundary.
    RoundEnd {
        /// Round that ended.
        round: u32,
        /// Overdraft penalties charged, one line each.
        penalties: Vec<String>,
        /// When the round ended.
        timestamp: DateTime<Utc>,
    },
    /// Narration was replaced by the fallback scaffold.
    Fallback {
        /// Acting participant.
        actor: String,
        /// Why.
        reason: String,
        /// When.
        timestamp: DateTime<Utc>,
    },
    /// An action went through despite a missing capability.
    CapabilityWaived {
        /// Acting participant.
        actor: String,
        /// Missing capability.
        capability: Capability,
        /// When.
        timestamp: DateTime<Utc>,
    },
}

impl JournalEntry {
    /// When the entry was recorded.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RosterChange { timestamp, .. }
            | Self::Turn { timestamp, .. }
            | Self::CombatStart { timestamp, .. }
            | Self::CombatAction { timestamp, .. }
            | Self::RoundEnd { timestamp, .. }
            | Self::Fallback { timestamp, .. }
            | Self::CapabilityWaived { timestamp, .. } => *timestamp,
        }
    }
}

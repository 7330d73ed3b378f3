//! Turn requests and outcomes.

use dramatis_combat::{ActionReport, CombatAction};
use dramatis_core::{ParticipantRecord, TurnType};
use dramatis_narration::NormalizedTurn;
use serde::{Deserialize, Serialize};

/// One actor's turn, as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Acting participant: a character id, a label, or a narrator id.
    pub actor: String,
    /// What the actor says they do.
    pub intent: String,
    /// Combat action to resolve, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<CombatAction>,
    /// Forced classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_override: Option<TurnType>,
}

impl TurnRequest {
    /// A turn without a combat action.
    pub fn new(actor: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            intent: intent.into(),
            action: None,
            turn_override: None,
        }
    }

    /// Attach a combat action.
    pub fn with_action(mut self, action: CombatAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Force the classification.
    pub fn with_override(mut self, turn_type: TurnType) -> Self {
        self.turn_override = Some(turn_type);
        self
    }
}

/// Everything a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// How the turn was classified.
    pub turn_type: TurnType,
    /// Resolved combat action, if one was requested.
    pub action: Option<ActionReport>,
    /// Normalized narration.
    pub narration: NormalizedTurn,
    /// Participants that joined or rejoined because the narration named them.
    pub joined: Vec<ParticipantRecord>,
}

//! Typed narration payload.
//!
//! Each section has a documented default used when the generator's version
//! of it is missing or invalid.

use std::fmt;

use dramatis_core::ActorMention;
use serde::{Deserialize, Serialize};

/// The prose of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeBlock {
    /// Narration text; empty by default.
    #[serde(default)]
    pub text: String,
}

/// Scene dressing. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBlock {
    /// Where the scene is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Time of day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    /// Weather.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    /// Mood or atmosphere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// A lingering effect on someone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Who is affected.
    pub target: String,
    /// What the effect does.
    pub description: String,
    /// Duration in rounds, if bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// One line of the initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    /// Combatant name.
    pub name: String,
    /// Initiative value.
    pub value: i32,
}

impl InitiativeEntry {
    /// Key used to decide whether two entries describe the same combatant.
    pub fn identity(&self) -> String {
        format!("initiative:{}", self.name.trim().to_lowercase())
    }
}

/// A dice roll as shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRecord {
    /// What the roll was for.
    pub label: String,
    /// Dice expression, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Total rolled.
    pub total: i32,
}

impl DiceRecord {
    /// Key used to decide whether two records describe the same roll.
    pub fn identity(&self) -> String {
        format!("dice:{}", self.label.trim().to_lowercase())
    }
}

/// The authoritative payload for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationPayload {
    /// Prose.
    pub narrative: NarrativeBlock,
    /// Scene dressing.
    pub environment: EnvironmentBlock,
    /// Effects applied this turn.
    pub effects: Vec<Effect>,
    /// Initiative order, highest first.
    pub initiative: Vec<InitiativeEntry>,
    /// Dice rolled this turn.
    pub dice: Vec<DiceRecord>,
    /// Actors the narration mentions.
    pub mentions: Vec<ActorMention>,
}

/// Where a normalized payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    /// Generator output, validated and merged.
    Generated,
    /// Scaffold built from the run context alone.
    Fallback,
}

/// Pipeline stage, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Turning raw output into an object.
    Extract,
    /// Checking each section.
    Validate,
    /// Reconciling with the run context.
    Merge,
    /// Building the scaffold.
    Fallback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Validate => write!(f, "validate"),
            Self::Merge => write!(f, "merge"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Something the pipeline noticed and handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stage that raised it.
    pub stage: Stage,
    /// What happened.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

/// Pipeline output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTurn {
    /// The payload to use.
    pub payload: NarrationPayload,
    /// Whether it came from the generator or the fallback.
    pub source: PayloadSource,
    /// Everything the pipeline repaired or rejected, in order.
    pub diagnostics: Vec<Diagnostic>,
}

impl NormalizedTurn {
    /// Whether the fallback scaffold was used.
    pub fn is_fallback(&self) -> bool {
        self.source == PayloadSource::Fallback
    }
}

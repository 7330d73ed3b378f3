//! Narration normalization for Dramatis.
//!
//! The narration generator proposes a structured payload for each turn. It
//! is trusted for flavor only: numbers and identities come from the run
//! context, the append-only record of deterministic tool results. The
//! pipeline here extracts, validates and merges a proposal against that
//! record, and falls back to a scaffold built from the record alone when
//! any stage fails.

/// Append-only record of deterministic tool outcomes.
pub mod context;
/// Error types for narration handling.
pub mod error;
/// The generator port and retry policy.
pub mod generator;
/// Typed payload schemas.
pub mod payload;
/// Extract, validate, merge, fallback.
pub mod pipeline;

pub use context::{Fact, RunContext, ToolOutcome};
pub use error::{NarrationError, NarrationResult};
pub use generator::{
    NarrationGenerator, NarrationRequest, Scripted, ScriptedGenerator, TemplateGenerator,
    generate_with_retry,
};
pub use payload::{
    Diagnostic, DiceRecord, Effect, EnvironmentBlock, InitiativeEntry, NarrationPayload,
    NarrativeBlock, NormalizedTurn, PayloadSource, Stage,
};
pub use pipeline::{extract, fallback, normalize, normalize_failure};

//! Error types for narration handling.

use std::time::Duration;

use thiserror::Error;

/// Result type for narration operations.
pub type NarrationResult<T> = Result<T, NarrationError>;

/// Errors that can occur while producing or normalizing narration.
///
/// None of these escape a normalization call: each one routes the turn to
/// the fallback payload and is kept as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    /// Generator output is neither an object nor a string holding one.
    #[error("malformed narration: {0}")]
    Malformed(String),

    /// Every sub-object of the payload failed validation or was missing.
    #[error("narration carries nothing usable")]
    NothingUsable,

    /// The run context holds two different values for one key.
    #[error("run context conflict on '{key}': {first} vs {second}")]
    ConflictingContext {
        /// Identity key.
        key: String,
        /// First recorded value.
        first: String,
        /// Later, different value.
        second: String,
    },

    /// The generator reported a failure.
    #[error("generator failed: {0}")]
    Generator(String),

    /// The generator did not answer in time.
    #[error("generator timed out after {0:?}")]
    Timeout(Duration),

    /// Every attempt failed; holds the last failure.
    #[error("generator gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        last: Box<NarrationError>,
    },
}

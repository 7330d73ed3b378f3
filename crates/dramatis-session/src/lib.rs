//! Turn orchestration for Dramatis.
//!
//! A [`Table`] owns the roster manager, one critical section per scene, and
//! the narration generator. Each turn is classified and resolved under the
//! scene's lock, narrated with the lock released, then merged, synced into
//! the roster and journaled under the lock again. Scenes never block each
//! other.

pub mod config;
pub mod error;
pub mod journal;
pub mod table;
pub mod turn;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use journal::{Journal, JournalEntry};
pub use table::Table;
pub use turn::{TurnOutcome, TurnRequest};

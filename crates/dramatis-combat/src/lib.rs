//! Combat resolution for Dramatis.
//!
//! Tracks per-combatant action resources and hit points, runs initiative
//! order across rounds, and validates targets before anything is spent.
//! Spending is allowed to overdraw; the debt is paid in damage at the next
//! round boundary.

pub mod action;
pub mod dice;
pub mod error;
pub mod policy;
pub mod resource;
pub mod session;
pub mod target;

pub use action::{ActionReport, CombatAction, CombatEvent, resolve_action};
pub use dice::{Die, DieResult, RollResult};
pub use error::{CombatError, CombatResult};
pub use policy::{CapabilityCheck, CapabilityPolicy};
pub use resource::{CombatStats, CombatantState, OverdraftPenalty, SpendOutcome};
pub use session::CombatSession;
pub use target::validate_target;

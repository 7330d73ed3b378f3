//! Configuration for a table session.

use std::time::Duration;

use dramatis_combat::{CapabilityPolicy, CombatStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SessionError, SessionResult};

/// Most narration attempts allowed per turn.
pub const MAX_NARRATION_ATTEMPTS: u32 = 5;

/// Configuration for a table session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// RNG seed for reproducible initiative and penalty rolls.
    pub seed: u64,
    /// Per-attempt narration timeout in milliseconds.
    pub narration_timeout_ms: u64,
    /// Narration attempts per turn (1-5).
    pub narration_attempts: u32,
    /// What to do when an actor lacks a capability.
    pub capability_policy: CapabilityPolicy,
    /// Stats for combatants without explicit ones.
    pub default_stats: CombatStats,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            narration_timeout_ms: 10_000,
            narration_attempts: 2,
            capability_policy: CapabilityPolicy::Enforce,
            default_stats: CombatStats::default(),
        }
    }
}

impl SessionConfig {
    /// Load a config from a JSON object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SessionResult<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| SessionError::Config(e.to_string()))?;
        if !value.is_object() {
            return Err(SessionError::Config("expected a JSON object".into()));
        }
        let config: Self =
            serde_json::from_value(value).map_err(|e| SessionError::Config(e.to_string()))?;
        let attempts = config.narration_attempts;
        Ok(config.with_attempts(attempts))
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the per-attempt narration timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.narration_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the number of narration attempts (clamped to 1-5).
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.narration_attempts = attempts.clamp(1, MAX_NARRATION_ATTEMPTS);
        self
    }

    /// Set the capability policy.
    pub fn with_policy(mut self, policy: CapabilityPolicy) -> Self {
        self.capability_policy = policy;
        self
    }

    /// Set the stats used for combatants without explicit ones.
    pub fn with_default_stats(mut self, stats: CombatStats) -> Self {
        self.default_stats = stats;
        self
    }

    /// Per-attempt narration timeout.
    pub fn narration_timeout(&self) -> Duration {
        Duration::from_millis(self.narration_timeout_ms)
    }
}

//! Engine configuration
//!
//! Defaults, optionally merged with a TOML file and `SKIRMISH_*` environment
//! variables.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::combat::CritPolicy;
use crate::error::{CombatError, Result};

/// Tunables for the combat core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Sides of the initiative die
    pub initiative_die: u32,
    /// Sides of the attack die
    pub attack_die: u32,
    /// Natural roll at or above which an attack is critical
    pub crit_threshold: u32,
    /// Sides of the die used in opposed flee checks
    pub flee_die: u32,
    /// Bonus to the opposing flee roll per extra living opponent
    pub flee_enemy_bonus: i32,
    /// Defense penalty applied for one round after a failed flee
    pub flee_failure_penalty: i32,
    /// Defense penalty carried by surprised entities during the surprise round
    pub surprise_penalty: i32,
    /// Defense bonus granted by the Defend action
    pub defend_bonus: i32,
    /// How critical hits amplify damage
    pub crit_policy: CritPolicy,
    /// Lower clamp for aggregated resistance percent (negative = vulnerability)
    pub resistance_min: i32,
    /// Upper clamp for aggregated resistance percent
    pub resistance_max: i32,
    /// Delay between paced display events
    pub pacing_ms: u64,
    /// Bound on every render/narration acknowledgment wait
    pub ack_timeout_ms: u64,
    /// Bound on automated intent providers
    pub intent_timeout_ms: u64,
    /// Bound on human intent; `None` waits indefinitely
    pub player_intent_timeout_ms: Option<u64>,
    /// Bound on narrator calls
    pub narration_timeout_ms: u64,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            initiative_die: 20,
            attack_die: 20,
            crit_threshold: 20,
            flee_die: 20,
            flee_enemy_bonus: 1,
            flee_failure_penalty: 2,
            surprise_penalty: 2,
            defend_bonus: 2,
            crit_policy: CritPolicy::default(),
            resistance_min: -100,
            resistance_max: 90,
            pacing_ms: 400,
            ack_timeout_ms: 5_000,
            intent_timeout_ms: 3_000,
            player_intent_timeout_ms: None,
            narration_timeout_ms: 2_000,
            seed: None,
        }
    }
}

impl CombatConfig {
    /// Load defaults, then an optional TOML file, then `SKIRMISH_*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(CombatConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: CombatConfig = figment.merge(Env::prefixed("SKIRMISH_")).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.resistance_min > self.resistance_max {
            return Err(CombatError::Config(format!(
                "resistance_min ({}) exceeds resistance_max ({})",
                self.resistance_min, self.resistance_max
            )));
        }
        if self.resistance_max >= 100 {
            return Err(CombatError::Config(
                "resistance_max must stay below 100".to_string(),
            ));
        }
        for (name, sides) in [
            ("initiative_die", self.initiative_die),
            ("attack_die", self.attack_die),
            ("flee_die", self.flee_die),
        ] {
            if sides == 0 {
                return Err(CombatError::Config(format!("{} must have at least one side", name)));
            }
        }
        if let CritPolicy::Multiplier { percent } = self.crit_policy {
            if percent < 100 {
                return Err(CombatError::Config(
                    "crit multiplier below 100% would weaken critical hits".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn intent_timeout(&self) -> Duration {
        Duration::from_millis(self.intent_timeout_ms)
    }

    pub fn player_intent_timeout(&self) -> Option<Duration> {
        self.player_intent_timeout_ms.map(Duration::from_millis)
    }

    pub fn narration_timeout(&self) -> Duration {
        Duration::from_millis(self.narration_timeout_ms)
    }
}

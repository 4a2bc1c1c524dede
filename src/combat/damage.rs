//! Damage types and mitigation
//!
//! Damage passes through flat mitigation (damage reduction for physical
//! types, magic defense for the rest) and then typed resistance, expressed as
//! a percentage summed over every contributing source and clamped to the
//! configured range. Negative resistance is vulnerability.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Types of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    /// Untyped physical damage
    Physical,
    /// Slashing damage (swords, claws)
    Slashing,
    /// Piercing damage (arrows, spears)
    Piercing,
    /// Bludgeoning damage (maces, hammers)
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Psychic,
    Force,
    Thunder,
}

/// Which flat mitigation stat applies to a damage type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageCategory {
    Physical,
    Magical,
}

impl DamageType {
    pub fn category(&self) -> DamageCategory {
        match self {
            DamageType::Physical
            | DamageType::Slashing
            | DamageType::Piercing
            | DamageType::Bludgeoning => DamageCategory::Physical,
            _ => DamageCategory::Magical,
        }
    }
}

impl FromStr for DamageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "physical" => Ok(DamageType::Physical),
            "slashing" => Ok(DamageType::Slashing),
            "piercing" => Ok(DamageType::Piercing),
            "bludgeoning" => Ok(DamageType::Bludgeoning),
            "fire" => Ok(DamageType::Fire),
            "cold" | "ice" => Ok(DamageType::Cold),
            "lightning" | "electric" => Ok(DamageType::Lightning),
            "acid" => Ok(DamageType::Acid),
            "poison" => Ok(DamageType::Poison),
            "necrotic" | "death" => Ok(DamageType::Necrotic),
            "radiant" | "holy" => Ok(DamageType::Radiant),
            "psychic" | "mental" => Ok(DamageType::Psychic),
            "force" | "magic" => Ok(DamageType::Force),
            "thunder" | "sonic" => Ok(DamageType::Thunder),
            other => Err(format!("unknown damage type: {}", other)),
        }
    }
}

impl std::fmt::Display for DamageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DamageType::Physical => "physical",
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Psychic => "psychic",
            DamageType::Force => "force",
            DamageType::Thunder => "thunder",
        };
        write!(f, "{}", s)
    }
}

/// How critical hits amplify damage
///
/// Applied to the rolled amount before any mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CritPolicy {
    /// Scale the rolled amount by `percent` / 100
    Multiplier { percent: u32 },
    /// Roll the dice twice as many times, modifier added once
    DoubleDice,
}

impl Default for CritPolicy {
    fn default() -> Self {
        CritPolicy::Multiplier { percent: 200 }
    }
}

impl CritPolicy {
    /// Scale an already rolled amount; a no-op for [`CritPolicy::DoubleDice`]
    pub fn scale(&self, raw: i32) -> i32 {
        match self {
            CritPolicy::Multiplier { percent } => {
                ((raw as i64 * *percent as i64) / 100).clamp(0, i32::MAX as i64) as i32
            }
            CritPolicy::DoubleDice => raw,
        }
    }
}

/// Per-type resistance percentages from a single source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resistances(BTreeMap<DamageType, i32>);

impl Resistances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, dtype: DamageType, percent: i32) -> Self {
        self.set(dtype, percent);
        self
    }

    pub fn set(&mut self, dtype: DamageType, percent: i32) {
        if percent == 0 {
            self.0.remove(&dtype);
        } else {
            self.0.insert(dtype, percent);
        }
    }

    pub fn get(&self, dtype: DamageType) -> i32 {
        self.0.get(&dtype).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DamageType, i32)> + '_ {
        self.0.iter().map(|(t, p)| (*t, *p))
    }
}

/// Breakdown of one damage computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mitigation {
    /// Amount entering mitigation
    pub raw: i32,
    /// Amount left after flat mitigation
    pub after_flat: i32,
    /// Clamped resistance percent that was applied
    pub resistance: i32,
    /// Final, non-negative damage
    pub final_damage: i32,
}

/// Apply flat mitigation, then clamped typed resistance
///
/// `final = floor(max(0, raw - flat) * (100 - R) / 100)` with `R` clamped to
/// `[min, max]`. Integer arithmetic keeps results identical across platforms.
pub fn mitigate(raw: i32, flat: i32, resistance: i32, bounds: (i32, i32)) -> Mitigation {
    let (min, max) = bounds;
    let resistance = resistance.clamp(min, max);
    let after_flat = (raw.max(0) as i64 - flat.max(0) as i64).max(0);
    let scaled = after_flat * (100 - resistance as i64) / 100;
    Mitigation {
        raw,
        after_flat: after_flat as i32,
        resistance,
        final_damage: scaled.clamp(0, i32::MAX as i64) as i32,
    }
}

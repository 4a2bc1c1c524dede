//! Status effects
//!
//! Timed conditions owned by the afflicted entity: damage or healing over
//! time, incapacitation, and stat/resistance contributions. Durations count
//! the owner's turns and are decremented once per turn boundary.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, StatKind};
use super::DamageType;

/// Kinds of status effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Takes poison damage each turn
    Poisoned,
    /// Cannot act
    Stunned,
    /// Reduced accuracy
    Blinded,
    /// Takes fire damage each turn
    Burning,
    /// Reduced defense
    Frozen,
    /// Cannot act
    Paralyzed,
    /// Acts later next round
    Slowed,
    /// Acts earlier next round
    Hasted,
    /// Increased stat-based damage
    Strengthened,
    /// Reduced stat-based damage
    Weakened,
    /// Increased physical damage reduction
    Protected,
    /// Reduced defense
    Exposed,
    /// Resistance to one damage type
    Warded,
    /// Heals each turn
    Regenerating,
    /// Cannot cast spells
    Silenced,
}

impl FromStr for StatusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poisoned" | "poison" => Ok(StatusKind::Poisoned),
            "stunned" | "stun" => Ok(StatusKind::Stunned),
            "blinded" | "blind" => Ok(StatusKind::Blinded),
            "burning" | "burn" => Ok(StatusKind::Burning),
            "frozen" | "freeze" => Ok(StatusKind::Frozen),
            "paralyzed" | "paralyze" => Ok(StatusKind::Paralyzed),
            "slowed" | "slow" => Ok(StatusKind::Slowed),
            "hasted" | "haste" => Ok(StatusKind::Hasted),
            "strengthened" | "strength" => Ok(StatusKind::Strengthened),
            "weakened" | "weak" => Ok(StatusKind::Weakened),
            "protected" | "protect" => Ok(StatusKind::Protected),
            "exposed" | "expose" => Ok(StatusKind::Exposed),
            "warded" | "ward" => Ok(StatusKind::Warded),
            "regenerating" | "regen" => Ok(StatusKind::Regenerating),
            "silenced" | "silence" => Ok(StatusKind::Silenced),
            other => Err(format!("unknown status kind: {}", other)),
        }
    }
}

impl StatusKind {
    /// Whether this effect prevents actions
    pub fn prevents_action(&self) -> bool {
        matches!(self, StatusKind::Stunned | StatusKind::Paralyzed)
    }

    /// Whether this effect is negative (a debuff)
    pub fn is_debuff(&self) -> bool {
        matches!(
            self,
            StatusKind::Poisoned
                | StatusKind::Stunned
                | StatusKind::Blinded
                | StatusKind::Burning
                | StatusKind::Frozen
                | StatusKind::Paralyzed
                | StatusKind::Slowed
                | StatusKind::Weakened
                | StatusKind::Exposed
                | StatusKind::Silenced
        )
    }

    /// Damage type dealt each turn when the effect does not name one
    fn default_damage_type(&self) -> Option<DamageType> {
        match self {
            StatusKind::Poisoned => Some(DamageType::Poison),
            StatusKind::Burning => Some(DamageType::Fire),
            _ => None,
        }
    }

    /// Signed contribution of `magnitude` to a derived stat
    fn stat_contribution(&self, stat: StatKind, magnitude: i32) -> i32 {
        match (self, stat) {
            (StatusKind::Hasted, StatKind::Initiative) => magnitude,
            (StatusKind::Slowed, StatKind::Initiative) => -magnitude,
            (StatusKind::Strengthened, StatKind::Power) => magnitude,
            (StatusKind::Weakened, StatKind::Power) => -magnitude,
            (StatusKind::Protected, StatKind::DamageReduction) => magnitude,
            (StatusKind::Exposed, StatKind::Defense) => -magnitude,
            (StatusKind::Frozen, StatKind::Defense) => -magnitude,
            (StatusKind::Blinded, StatKind::Attack) => -magnitude,
            _ => 0,
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusKind::Poisoned => "poisoned",
            StatusKind::Stunned => "stunned",
            StatusKind::Blinded => "blinded",
            StatusKind::Burning => "burning",
            StatusKind::Frozen => "frozen",
            StatusKind::Paralyzed => "paralyzed",
            StatusKind::Slowed => "slowed",
            StatusKind::Hasted => "hasted",
            StatusKind::Strengthened => "strengthened",
            StatusKind::Weakened => "weakened",
            StatusKind::Protected => "protected",
            StatusKind::Exposed => "exposed",
            StatusKind::Warded => "warded",
            StatusKind::Regenerating => "regenerating",
            StatusKind::Silenced => "silenced",
        };
        write!(f, "{}", s)
    }
}

/// How a new effect interacts with same-name effects already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackingRule {
    /// Keep independent instances
    Stack,
    /// Reset the existing instance's duration
    #[default]
    Refresh,
    /// Remove all prior instances first
    Replace,
    /// Ignore the new effect if one is present
    None,
}

/// What applying an effect actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOutcome {
    Added,
    Refreshed,
    Replaced(usize),
    Ignored,
}

/// A status effect instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Identity used by stacking rules and cleansing
    pub name: String,
    pub kind: StatusKind,
    /// Entity that applied the effect
    pub source: Option<EntityId>,
    /// Remaining owner turns
    pub remaining: u32,
    /// Damage/heal per turn or stat contribution
    pub magnitude: i32,
    /// Damage type for damage over time, or the warded type
    pub damage_type: Option<DamageType>,
}

/// Per-turn consequence of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periodic {
    Damage(i32, DamageType),
    Heal(i32),
}

impl StatusEffect {
    pub fn new(name: impl Into<String>, kind: StatusKind, duration: u32, magnitude: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            source: None,
            remaining: duration,
            magnitude,
            damage_type: kind.default_damage_type(),
        }
    }

    pub fn with_source(mut self, source: &EntityId) -> Self {
        self.source = Some(source.clone());
        self
    }

    pub fn with_damage_type(mut self, dtype: DamageType) -> Self {
        self.damage_type = Some(dtype);
        self
    }

    /// Damage or healing due at the owner's turn boundary
    pub fn periodic(&self) -> Option<Periodic> {
        if self.is_expired() || self.magnitude <= 0 {
            return None;
        }
        match self.kind {
            StatusKind::Regenerating => Some(Periodic::Heal(self.magnitude)),
            StatusKind::Poisoned | StatusKind::Burning => self
                .damage_type
                .map(|dtype| Periodic::Damage(self.magnitude, dtype)),
            _ => None,
        }
    }

    /// Decrement by one turn; returns false when already expired
    pub fn decrement(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub fn stat_contribution(&self, stat: StatKind) -> i32 {
        if self.is_expired() {
            return 0;
        }
        self.kind.stat_contribution(stat, self.magnitude)
    }

    pub fn resistance_contribution(&self, dtype: DamageType) -> i32 {
        match (self.kind, self.damage_type) {
            (StatusKind::Warded, Some(warded)) if warded == dtype && !self.is_expired() => {
                self.magnitude
            }
            _ => 0,
        }
    }
}

/// Result of one turn-boundary tick for a single effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTick {
    pub name: String,
    pub kind: StatusKind,
    pub periodic: Option<Periodic>,
    pub remaining: u32,
    pub expired: bool,
}

/// Effects on a single entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityEffects {
    effects: Vec<StatusEffect>,
}

impl EntityEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an effect under a stacking rule
    pub fn apply(&mut self, effect: StatusEffect, rule: StackingRule) -> StackOutcome {
        let present = self.effects.iter().any(|e| e.name == effect.name);
        match rule {
            StackingRule::Stack => {
                self.effects.push(effect);
                StackOutcome::Added
            }
            StackingRule::Refresh if present => {
                for existing in self.effects.iter_mut().filter(|e| e.name == effect.name) {
                    existing.remaining = effect.remaining;
                }
                StackOutcome::Refreshed
            }
            StackingRule::Replace if present => {
                let removed = self.remove(&effect.name);
                self.effects.push(effect);
                StackOutcome::Replaced(removed)
            }
            StackingRule::None if present => StackOutcome::Ignored,
            _ => {
                self.effects.push(effect);
                StackOutcome::Added
            }
        }
    }

    /// Remove every instance with this name, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| e.name != name);
        before - self.effects.len()
    }

    pub fn has(&self, name: &str) -> bool {
        self.effects.iter().any(|e| e.name == name && !e.is_expired())
    }

    pub fn has_kind(&self, kind: StatusKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind && !e.is_expired())
    }

    /// Check if entity can act (not stunned/paralyzed)
    pub fn can_act(&self) -> bool {
        !self
            .effects
            .iter()
            .any(|e| e.kind.prevents_action() && !e.is_expired())
    }

    pub fn can_cast(&self) -> bool {
        !self.has_kind(StatusKind::Silenced)
    }

    /// Owner's turn boundary: collect periodic effects, decrement, prune
    pub fn tick(&mut self) -> Vec<StatusTick> {
        let ticks = self
            .effects
            .iter_mut()
            .map(|effect| {
                let periodic = effect.periodic();
                effect.decrement();
                StatusTick {
                    name: effect.name.clone(),
                    kind: effect.kind,
                    periodic,
                    remaining: effect.remaining,
                    expired: effect.is_expired(),
                }
            })
            .collect();
        self.effects.retain(|e| !e.is_expired());
        ticks
    }

    /// Remove a named effect, or every debuff when `name` is `None`
    pub fn cleanse(&mut self, name: Option<&str>) -> Vec<StatusEffect> {
        let (removed, kept) = self.effects.drain(..).partition(|e| match name {
            Some(name) => e.name == name,
            None => e.kind.is_debuff(),
        });
        self.effects = kept;
        removed
    }

    pub fn stat_contribution(&self, stat: StatKind) -> i32 {
        self.effects.iter().map(|e| e.stat_contribution(stat)).sum()
    }

    pub fn resistance_contribution(&self, dtype: DamageType) -> i32 {
        self.effects
            .iter()
            .map(|e| e.resistance_contribution(dtype))
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

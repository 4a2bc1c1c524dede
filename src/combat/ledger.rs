//! Resource & modifier ledger
//!
//! All combat-core mutation of pools, statuses and timed modifiers funnels
//! through [`ResourceLedger`]. [`RosterLedger`] is the in-memory
//! implementation that owns the participants for the length of a fight.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::damage::DamageType;
use super::effects::{StackOutcome, StackingRule, StatusEffect, StatusTick};
use super::entity::{CombatEntity, EntityId, ResourceKind, ResourcePool, StatKind};
use crate::error::LedgerError;

/// What a timed modifier adjusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum ModifierTarget {
    Stat { stat: StatKind },
    Resistance { damage_type: DamageType },
}

/// A temporary adjustment keyed by its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedModifier {
    pub source: String,
    pub target: ModifierTarget,
    pub amount: i32,
    /// Round boundaries left; `None` lasts until removed
    pub rounds: Option<u32>,
}

impl TimedModifier {
    pub fn stat(source: &str, stat: StatKind, amount: i32, rounds: Option<u32>) -> Self {
        Self {
            source: source.to_string(),
            target: ModifierTarget::Stat { stat },
            amount,
            rounds,
        }
    }

    pub fn resistance(source: &str, damage_type: DamageType, amount: i32, rounds: Option<u32>) -> Self {
        Self {
            source: source.to_string(),
            target: ModifierTarget::Resistance { damage_type },
            amount,
            rounds,
        }
    }
}

/// Access to pools, derived stats, statuses and modifiers
pub trait ResourceLedger: Send {
    fn entity(&self, id: &EntityId) -> Option<&CombatEntity>;

    /// Participants in roster order
    fn entities(&self) -> Vec<&CombatEntity>;

    fn resource(&self, id: &EntityId, kind: ResourceKind) -> Result<ResourcePool, LedgerError>;

    /// Set a pool's current value; the ledger clamps to `[0, max]`
    fn set_resource(
        &mut self,
        id: &EntityId,
        kind: ResourceKind,
        value: i32,
    ) -> Result<ResourcePool, LedgerError>;

    /// Base stat plus status and modifier contributions
    fn stat(&self, id: &EntityId, stat: StatKind) -> Result<i32, LedgerError>;

    /// Unclamped sum of every resistance source for a damage type
    fn resistance(&self, id: &EntityId, dtype: DamageType) -> Result<i32, LedgerError>;

    fn add_status(
        &mut self,
        id: &EntityId,
        effect: StatusEffect,
        rule: StackingRule,
    ) -> Result<StackOutcome, LedgerError>;

    fn remove_status(&mut self, id: &EntityId, name: &str) -> Result<usize, LedgerError>;

    /// Remove a named status, or all debuffs
    fn cleanse(&mut self, id: &EntityId, name: Option<&str>) -> Result<Vec<StatusEffect>, LedgerError>;

    /// Owner's turn boundary for statuses
    fn tick_statuses(&mut self, id: &EntityId) -> Result<Vec<StatusTick>, LedgerError>;

    fn add_modifier(&mut self, id: &EntityId, modifier: TimedModifier) -> Result<(), LedgerError>;

    fn remove_modifier(&mut self, id: &EntityId, source: &str) -> Result<usize, LedgerError>;

    /// Round boundary for timed modifiers; returns the ones that expired
    fn tick_modifiers(&mut self) -> Vec<(EntityId, TimedModifier)>;

    /// Take one unit of an item; false when none are left
    fn consume_item(&mut self, id: &EntityId, item: &str) -> Result<bool, LedgerError>;

    fn mark_fled(&mut self, id: &EntityId) -> Result<(), LedgerError>;

    /// Clear statuses and modifiers once combat is over
    fn discard_combat_state(&mut self);

    /// Copy of every participant for persistence
    fn snapshot(&self) -> Vec<CombatEntity>;

    /// Check ledger invariants, describing the first violation
    fn verify(&self) -> Result<(), String>;
}

/// In-memory ledger owning the roster in its original order
#[derive(Debug, Clone, Default)]
pub struct RosterLedger {
    entities: Vec<CombatEntity>,
}

impl RosterLedger {
    pub fn new(entities: Vec<CombatEntity>) -> Self {
        Self { entities }
    }

    fn get(&self, id: &EntityId) -> Result<&CombatEntity, LedgerError> {
        self.entities
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| LedgerError::UnknownEntity(id.clone()))
    }

    fn get_mut(&mut self, id: &EntityId) -> Result<&mut CombatEntity, LedgerError> {
        self.entities
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| LedgerError::UnknownEntity(id.clone()))
    }
}

impl ResourceLedger for RosterLedger {
    fn entity(&self, id: &EntityId) -> Option<&CombatEntity> {
        self.get(id).ok()
    }

    fn entities(&self) -> Vec<&CombatEntity> {
        self.entities.iter().collect()
    }

    fn resource(&self, id: &EntityId, kind: ResourceKind) -> Result<ResourcePool, LedgerError> {
        Ok(self.get(id)?.pools.get(kind))
    }

    fn set_resource(
        &mut self,
        id: &EntityId,
        kind: ResourceKind,
        value: i32,
    ) -> Result<ResourcePool, LedgerError> {
        let entity = self.get_mut(id)?;
        let pool = entity.pools.get_mut(kind);
        let before = pool.current;
        pool.set(value);
        debug!("{} {}: {} -> {}", id, kind, before, pool.current);
        Ok(*pool)
    }

    fn stat(&self, id: &EntityId, stat: StatKind) -> Result<i32, LedgerError> {
        let entity = self.get(id)?;
        let modifiers: i32 = entity
            .modifiers
            .iter()
            .filter(|m| m.target == ModifierTarget::Stat { stat })
            .map(|m| m.amount)
            .sum();
        Ok(entity.stats.get(stat) + entity.effects.stat_contribution(stat) + modifiers)
    }

    fn resistance(&self, id: &EntityId, dtype: DamageType) -> Result<i32, LedgerError> {
        let entity = self.get(id)?;
        let modifiers: i32 = entity
            .modifiers
            .iter()
            .filter(|m| m.target == ModifierTarget::Resistance { damage_type: dtype })
            .map(|m| m.amount)
            .sum();
        Ok(entity.resistances.get(dtype) + entity.effects.resistance_contribution(dtype) + modifiers)
    }

    fn add_status(
        &mut self,
        id: &EntityId,
        effect: StatusEffect,
        rule: StackingRule,
    ) -> Result<StackOutcome, LedgerError> {
        Ok(self.get_mut(id)?.effects.apply(effect, rule))
    }

    fn remove_status(&mut self, id: &EntityId, name: &str) -> Result<usize, LedgerError> {
        Ok(self.get_mut(id)?.effects.remove(name))
    }

    fn cleanse(&mut self, id: &EntityId, name: Option<&str>) -> Result<Vec<StatusEffect>, LedgerError> {
        Ok(self.get_mut(id)?.effects.cleanse(name))
    }

    fn tick_statuses(&mut self, id: &EntityId) -> Result<Vec<StatusTick>, LedgerError> {
        Ok(self.get_mut(id)?.effects.tick())
    }

    fn add_modifier(&mut self, id: &EntityId, modifier: TimedModifier) -> Result<(), LedgerError> {
        self.get_mut(id)?.modifiers.push(modifier);
        Ok(())
    }

    fn remove_modifier(&mut self, id: &EntityId, source: &str) -> Result<usize, LedgerError> {
        let entity = self.get_mut(id)?;
        let before = entity.modifiers.len();
        entity.modifiers.retain(|m| m.source != source);
        Ok(before - entity.modifiers.len())
    }

    fn tick_modifiers(&mut self) -> Vec<(EntityId, TimedModifier)> {
        let mut expired = Vec::new();
        for entity in &mut self.entities {
            for modifier in &mut entity.modifiers {
                if let Some(rounds) = modifier.rounds.as_mut() {
                    *rounds = rounds.saturating_sub(1);
                }
            }
            let (gone, kept): (Vec<_>, Vec<_>) = entity
                .modifiers
                .drain(..)
                .partition(|m| m.rounds == Some(0));
            entity.modifiers = kept;
            expired.extend(gone.into_iter().map(|m| (entity.id.clone(), m)));
        }
        expired
    }

    fn consume_item(&mut self, id: &EntityId, item: &str) -> Result<bool, LedgerError> {
        let entity = self.get_mut(id)?;
        match entity.inventory.get_mut(item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_fled(&mut self, id: &EntityId) -> Result<(), LedgerError> {
        self.get_mut(id)?.fled = true;
        Ok(())
    }

    fn discard_combat_state(&mut self) {
        for entity in &mut self.entities {
            entity.effects.clear();
            entity.modifiers.clear();
        }
    }

    fn snapshot(&self) -> Vec<CombatEntity> {
        self.entities.clone()
    }

    fn verify(&self) -> Result<(), String> {
        for entity in &self.entities {
            for (kind, pool) in entity.pools.iter() {
                if !pool.is_valid() {
                    return Err(format!(
                        "{} {} escaped its clamp: {}/{}",
                        entity.id, kind, pool.current, pool.max
                    ));
                }
            }
        }
        Ok(())
    }
}

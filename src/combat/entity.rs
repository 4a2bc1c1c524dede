//! Combat participants
//!
//! A [`CombatEntity`] is created from a world entity when combat starts and
//! discarded when it ends. Resource pools are always clamped to `[0, max]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::damage::{DamageType, Resistances};
use super::effects::EntityEffects;
use super::ledger::TimedModifier;

/// Stable identifier of a combat participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side of the fight; outcomes are reported from the party's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Party,
    Foes,
}

impl Team {
    pub fn opponent(&self) -> Team {
        match self {
            Team::Party => Team::Foes,
            Team::Foes => Team::Party,
        }
    }
}

/// Who supplies intents for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Controller {
    Player,
    #[default]
    Npc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Health,
    Mana,
    Stamina,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Health => "health",
            ResourceKind::Mana => "mana",
            ResourceKind::Stamina => "stamina",
        };
        f.write_str(s)
    }
}

/// A bounded resource; `current` stays within `[0, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: i32,
    pub max: i32,
}

impl ResourcePool {
    /// A full pool
    pub fn full(max: i32) -> Self {
        let max = max.max(0);
        Self { current: max, max }
    }

    /// Set the current value, clamping into range; returns the stored value
    pub fn set(&mut self, value: i32) -> i32 {
        self.current = value.clamp(0, self.max.max(0));
        self.current
    }

    pub fn is_valid(&self) -> bool {
        self.max >= 0 && (0..=self.max).contains(&self.current)
    }

    pub fn is_empty(&self) -> bool {
        self.current == 0
    }
}

/// Pools left out of an encounter file are empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pools {
    pub health: ResourcePool,
    pub mana: ResourcePool,
    pub stamina: ResourcePool,
}

impl Pools {
    pub fn get(&self, kind: ResourceKind) -> ResourcePool {
        match kind {
            ResourceKind::Health => self.health,
            ResourceKind::Mana => self.mana,
            ResourceKind::Stamina => self.stamina,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut ResourcePool {
        match kind {
            ResourceKind::Health => &mut self.health,
            ResourceKind::Mana => &mut self.mana,
            ResourceKind::Stamina => &mut self.stamina,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, ResourcePool)> {
        [
            (ResourceKind::Health, self.health),
            (ResourceKind::Mana, self.mana),
            (ResourceKind::Stamina, self.stamina),
        ]
        .into_iter()
    }
}

/// Derived combat statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Bonus to attack rolls
    Attack,
    /// Target number for attack rolls against this entity
    Defense,
    /// Flat mitigation against physical damage
    DamageReduction,
    /// Flat mitigation against magical damage
    MagicDefense,
    Initiative,
    /// Used in opposed flee checks
    Escape,
    /// Scales stat-based magnitudes
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStats {
    pub attack: i32,
    pub defense: i32,
    pub damage_reduction: i32,
    pub magic_defense: i32,
    pub initiative: i32,
    pub escape: i32,
    pub power: i32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            attack: 0,
            defense: 10,
            damage_reduction: 0,
            magic_defense: 0,
            initiative: 0,
            escape: 0,
            power: 0,
        }
    }
}

impl CombatStats {
    pub fn get(&self, stat: StatKind) -> i32 {
        match stat {
            StatKind::Attack => self.attack,
            StatKind::Defense => self.defense,
            StatKind::DamageReduction => self.damage_reduction,
            StatKind::MagicDefense => self.magic_defense,
            StatKind::Initiative => self.initiative,
            StatKind::Escape => self.escape,
            StatKind::Power => self.power,
        }
    }

    pub fn set(&mut self, stat: StatKind, value: i32) {
        match stat {
            StatKind::Attack => self.attack = value,
            StatKind::Defense => self.defense = value,
            StatKind::DamageReduction => self.damage_reduction = value,
            StatKind::MagicDefense => self.magic_defense = value,
            StatKind::Initiative => self.initiative = value,
            StatKind::Escape => self.escape = value,
            StatKind::Power => self.power = value,
        }
    }
}

/// A combat participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEntity {
    pub id: EntityId,
    pub name: String,
    pub team: Team,
    #[serde(default)]
    pub controller: Controller,
    pub pools: Pools,
    #[serde(default)]
    pub stats: CombatStats,
    #[serde(default)]
    pub resistances: Resistances,
    #[serde(default)]
    pub effects: EntityEffects,
    #[serde(default)]
    pub modifiers: Vec<TimedModifier>,
    /// Catalog ids of weapons and spells this entity may use
    #[serde(default)]
    pub actions: Vec<String>,
    /// Consumable items by catalog id
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    /// Left the fight through a successful flee
    #[serde(default)]
    pub fled: bool,
}

impl CombatEntity {
    pub fn new(id: &str, name: &str, team: Team, controller: Controller) -> Self {
        Self {
            id: EntityId::from(id),
            name: name.to_string(),
            team,
            controller,
            pools: Pools {
                health: ResourcePool::full(1),
                ..Pools::default()
            },
            stats: CombatStats::default(),
            resistances: Resistances::new(),
            effects: EntityEffects::new(),
            modifiers: Vec::new(),
            actions: Vec::new(),
            inventory: BTreeMap::new(),
            fled: false,
        }
    }

    pub fn with_pool(mut self, kind: ResourceKind, max: i32) -> Self {
        *self.pools.get_mut(kind) = ResourcePool::full(max);
        self
    }

    pub fn with_stat(mut self, stat: StatKind, value: i32) -> Self {
        self.stats.set(stat, value);
        self
    }

    pub fn with_resistance(mut self, dtype: DamageType, percent: i32) -> Self {
        self.resistances.set(dtype, percent);
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.actions.push(action.to_string());
        self
    }

    pub fn with_item(mut self, item: &str, count: u32) -> Self {
        self.inventory.insert(item.to_string(), count);
        self
    }

    pub fn is_alive(&self) -> bool {
        self.pools.health.current > 0
    }

    /// Alive and still on the field
    pub fn is_active(&self) -> bool {
        self.is_alive() && !self.fled
    }

    pub fn can_act(&self) -> bool {
        self.is_active() && self.effects.can_act()
    }
}

//! Intents, combat actions and the action resolver
//!
//! Providers propose an [`Intent`], a closed tagged union validated at the
//! boundary. Once bound to its actor it becomes a [`CombatAction`], which the
//! [`ActionResolver`] turns into effect atoms from the [`ActionCatalog`].

use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dice::DiceRoll;
use super::engine::{apply_atoms, EffectAtom, EffectContext, EffectResult, Magnitude};
use super::entity::{CombatEntity, EntityId, ResourceKind, StatKind};
use super::ledger::TimedModifier;
use super::DamageType;
use crate::error::{CombatError, ResolutionError, ValidationError};

/// Catalog id of the weapon used when an attacker names none
pub const UNARMED: &str = "unarmed";

/// A proposed action, as supplied by a player or an automated provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    Attack {
        #[serde(default)]
        weapon: Option<String>,
        #[serde(default)]
        target: Option<EntityId>,
    },
    Spell {
        spell: String,
        #[serde(default)]
        targets: Vec<EntityId>,
    },
    Defend,
    Flee,
    UseItem {
        item: String,
        #[serde(default)]
        target: Option<EntityId>,
    },
    Pass,
    Surrender,
}

impl Intent {
    /// Parse a structured payload, e.g. `{"action": "attack", "target": "gob"}`
    pub fn from_json(value: &serde_json::Value) -> Result<Intent, ValidationError> {
        serde_json::from_value(value.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    pub fn attack(target: &str) -> Self {
        Intent::Attack {
            weapon: None,
            target: Some(EntityId::from(target)),
        }
    }

    pub fn spell(spell: &str, targets: &[&str]) -> Self {
        Intent::Spell {
            spell: spell.to_string(),
            targets: targets.iter().map(|t| EntityId::from(*t)).collect(),
        }
    }
}

/// An intent bound to its actor, built per turn and consumed immediately
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatAction {
    Attack {
        actor: EntityId,
        weapon: String,
        target: Option<EntityId>,
    },
    Spell {
        actor: EntityId,
        spell: String,
        targets: Vec<EntityId>,
    },
    Defend {
        actor: EntityId,
    },
    Flee {
        actor: EntityId,
    },
    UseItem {
        actor: EntityId,
        item: String,
        target: Option<EntityId>,
    },
    Pass {
        actor: EntityId,
    },
    Surrender {
        actor: EntityId,
    },
}

impl CombatAction {
    /// Bind an intent to the acting entity, filling in the default weapon
    pub fn bind(intent: Intent, actor: &CombatEntity, catalog: &ActionCatalog) -> Self {
        let id = actor.id.clone();
        match intent {
            Intent::Attack { weapon, target } => CombatAction::Attack {
                weapon: weapon.unwrap_or_else(|| catalog.default_weapon(actor)),
                actor: id,
                target,
            },
            Intent::Spell { spell, targets } => CombatAction::Spell {
                actor: id,
                spell,
                targets,
            },
            Intent::Defend => CombatAction::Defend { actor: id },
            Intent::Flee => CombatAction::Flee { actor: id },
            Intent::UseItem { item, target } => CombatAction::UseItem {
                actor: id,
                item,
                target,
            },
            Intent::Pass => CombatAction::Pass { actor: id },
            Intent::Surrender => CombatAction::Surrender { actor: id },
        }
    }

    pub fn actor(&self) -> &EntityId {
        match self {
            CombatAction::Attack { actor, .. }
            | CombatAction::Spell { actor, .. }
            | CombatAction::Defend { actor }
            | CombatAction::Flee { actor }
            | CombatAction::UseItem { actor, .. }
            | CombatAction::Pass { actor }
            | CombatAction::Surrender { actor } => actor,
        }
    }

    /// Explicitly chosen targets
    pub fn targets(&self) -> Vec<EntityId> {
        match self {
            CombatAction::Attack { target, .. } | CombatAction::UseItem { target, .. } => {
                target.iter().cloned().collect()
            }
            CombatAction::Spell { targets, .. } => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Short description for logs and narration prompts
    pub fn label(&self) -> String {
        match self {
            CombatAction::Attack { weapon, .. } => format!("attack with {}", weapon),
            CombatAction::Spell { spell, .. } => format!("cast {}", spell),
            CombatAction::Defend { .. } => "defend".to_string(),
            CombatAction::Flee { .. } => "flee".to_string(),
            CombatAction::UseItem { item, .. } => format!("use {}", item),
            CombatAction::Pass { .. } => "pass".to_string(),
            CombatAction::Surrender { .. } => "surrender".to_string(),
        }
    }
}

/// Who an action may be aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targeting {
    /// One opponent; picked at random among living ones if unspecified
    #[default]
    Enemy,
    /// One ally; defaults to the actor
    Ally,
    /// The actor only
    Caster,
    /// No explicit target; atoms select their own recipients
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub resource: ResourceKind,
    pub amount: i32,
}

/// Authored definition of a weapon, spell or item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub costs: Vec<ResourceCost>,
    pub atoms: Vec<EffectAtom>,
    #[serde(default)]
    pub targeting: Targeting,
    /// Requires an attack roll against the target's defense
    #[serde(default)]
    pub attack_roll: bool,
}

impl ActionDef {
    pub fn new(name: &str, targeting: Targeting, atoms: Vec<EffectAtom>) -> Self {
        Self {
            name: name.to_string(),
            costs: Vec::new(),
            atoms,
            targeting,
            attack_roll: false,
        }
    }

    pub fn with_cost(mut self, resource: ResourceKind, amount: i32) -> Self {
        self.costs.push(ResourceCost { resource, amount });
        self
    }

    pub fn with_attack_roll(mut self) -> Self {
        self.attack_roll = true;
        self
    }

    pub fn is_offensive(&self) -> bool {
        self.atoms.iter().any(|a| a.is_offensive())
    }
}

/// Weapons, spells and items by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCatalog {
    #[serde(default)]
    pub weapons: BTreeMap<String, ActionDef>,
    #[serde(default)]
    pub spells: BTreeMap<String, ActionDef>,
    #[serde(default)]
    pub items: BTreeMap<String, ActionDef>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from TOML text
    pub fn from_toml(text: &str) -> Result<Self, CombatError> {
        Ok(Figment::from(Toml::string(text)).extract()?)
    }

    pub fn load(path: &Path) -> Result<Self, CombatError> {
        Ok(Figment::from(Toml::file(path)).extract()?)
    }

    pub fn with_weapon(mut self, id: &str, def: ActionDef) -> Self {
        self.weapons.insert(id.to_string(), def);
        self
    }

    pub fn with_spell(mut self, id: &str, def: ActionDef) -> Self {
        self.spells.insert(id.to_string(), def);
        self
    }

    pub fn with_item(mut self, id: &str, def: ActionDef) -> Self {
        self.items.insert(id.to_string(), def);
        self
    }

    /// Look up a weapon; `unarmed` always resolves
    pub fn weapon(&self, id: &str) -> Option<ActionDef> {
        self.weapons
            .get(id)
            .cloned()
            .or_else(|| (id == UNARMED).then(unarmed_strike))
    }

    /// First weapon the entity knows, else `unarmed`
    pub fn default_weapon(&self, entity: &CombatEntity) -> String {
        entity
            .actions
            .iter()
            .find(|a| self.weapons.contains_key(a.as_str()))
            .cloned()
            .unwrap_or_else(|| UNARMED.to_string())
    }

    /// Definition behind an action, if it has one
    pub fn definition(&self, action: &CombatAction) -> Option<ActionDef> {
        match action {
            CombatAction::Attack { weapon, .. } => self.weapon(weapon),
            CombatAction::Spell { spell, .. } => self.spells.get(spell).cloned(),
            CombatAction::UseItem { item, .. } => self.items.get(item).cloned(),
            _ => None,
        }
    }
}

fn unarmed_strike() -> ActionDef {
    ActionDef::new(
        "Unarmed strike",
        Targeting::Enemy,
        vec![EffectAtom::damage(Magnitude::dice("1d2"), DamageType::Bludgeoning)],
    )
    .with_attack_roll()
}

/// An attack roll against a defense value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub natural: u32,
    pub total: i32,
    pub defense: i32,
    pub hit: bool,
    pub critical: bool,
    pub fumble: bool,
}

impl AttackRoll {
    pub fn new(natural: u32, attack_bonus: i32, defense: i32, crit_threshold: u32) -> Self {
        let critical = natural >= crit_threshold;
        let fumble = natural == 1 && !critical;
        let total = natural as i32 + attack_bonus;
        // Critical always hits, fumble always misses
        let hit = critical || (!fumble && total >= defense);
        Self {
            natural,
            total,
            defense,
            hit,
            critical,
            fumble,
        }
    }
}

/// Opposed flee roll against the strongest remaining opponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleeCheck {
    pub opponent: Option<EntityId>,
    pub roll: i32,
    pub against: i32,
    pub success: bool,
}

impl FleeCheck {
    /// Strictly higher than the opposing roll escapes
    pub fn new(opponent: Option<EntityId>, roll: i32, against: i32) -> Self {
        Self {
            opponent,
            roll,
            against,
            success: roll > against,
        }
    }
}

/// A resource cost taken on attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostPaid {
    pub resource: ResourceKind,
    pub amount: i32,
    pub before: i32,
    pub after: i32,
}

/// Everything one resolved action produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub targets: Vec<EntityId>,
    pub costs: Vec<CostPaid>,
    pub attack: Option<AttackRoll>,
    pub flee: Option<FleeCheck>,
    pub results: Vec<EffectResult>,
    /// Set when the turn was consumed without mechanical effect
    pub wasted: Option<String>,
}

impl Resolution {
    pub fn defeated(&self) -> impl Iterator<Item = &EntityId> {
        self.results.iter().filter(|r| r.defeated).map(|r| &r.target)
    }
}

/// Turns validated actions into effect atoms and applies them
#[derive(Debug, Clone)]
pub struct ActionResolver<'c> {
    catalog: &'c ActionCatalog,
}

impl<'c> ActionResolver<'c> {
    pub fn new(catalog: &'c ActionCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve one action; pure aside from ledger mutation
    ///
    /// Flee and surrender carry no atoms and resolve to an empty result; the
    /// state machine settles them.
    pub fn resolve(
        &self,
        action: &CombatAction,
        ctx: &mut EffectContext<'_>,
    ) -> Result<Resolution, ResolutionError> {
        let actor = action.actor().clone();
        let mut resolution = Resolution::default();

        match action {
            CombatAction::Pass { .. } | CombatAction::Flee { .. } | CombatAction::Surrender { .. } => {
                return Ok(resolution);
            }
            CombatAction::Defend { .. } => {
                let bonus = ctx.config.defend_bonus;
                ctx.ledger.add_modifier(
                    &actor,
                    TimedModifier::stat("defend", StatKind::Defense, bonus, Some(1)),
                )?;
                ctx.ledger.add_modifier(
                    &actor,
                    TimedModifier::stat("defend", StatKind::DamageReduction, bonus, Some(1)),
                )?;
                resolution.targets = vec![actor];
                return Ok(resolution);
            }
            CombatAction::UseItem { item, .. } => {
                if !ctx.ledger.consume_item(&actor, item)? {
                    resolution.wasted = Some(format!("no {} left", item));
                    return Ok(resolution);
                }
            }
            _ => {}
        }

        let def = self
            .catalog
            .definition(action)
            .ok_or_else(|| ResolutionError::UnknownDefinition(action.label()))?;

        // Costs are paid on attempt, even when short or on a miss
        let mut short = Vec::new();
        for cost in &def.costs {
            let before = ctx.ledger.resource(&actor, cost.resource)?.current;
            let after = ctx
                .ledger
                .set_resource(&actor, cost.resource, before - cost.amount)?
                .current;
            if before < cost.amount {
                short.push(format!("{} {} (has {})", cost.amount, cost.resource, before));
            }
            resolution.costs.push(CostPaid {
                resource: cost.resource,
                amount: cost.amount,
                before,
                after,
            });
        }
        if !short.is_empty() {
            resolution.wasted = Some(format!(
                "not enough resources to {}: needs {}",
                action.label(),
                short.join(", ")
            ));
            return Ok(resolution);
        }

        resolution.targets = self.choose_targets(action, &def, ctx);
        if def.targeting != Targeting::Area && resolution.targets.is_empty() {
            resolution.wasted = Some(format!("no valid target to {}", action.label()));
            return Ok(resolution);
        }

        let mut critical = false;
        if def.attack_roll {
            if let Some(target) = resolution.targets.first() {
                let roll = self.attack_roll(&actor, target, ctx)?;
                resolution.attack = Some(roll);
                if !roll.hit {
                    debug!("{} misses {} ({} vs {})", actor, target, roll.total, roll.defense);
                    resolution.results.push(EffectResult::missed(target));
                    return Ok(resolution);
                }
                critical = roll.critical;
            }
        }

        resolution.results = apply_atoms(&def.atoms, &actor, &resolution.targets, critical, ctx);
        Ok(resolution)
    }

    fn attack_roll(
        &self,
        actor: &EntityId,
        target: &EntityId,
        ctx: &mut EffectContext<'_>,
    ) -> Result<AttackRoll, ResolutionError> {
        let bonus = ctx.ledger.stat(actor, StatKind::Attack)?;
        let defense = ctx.ledger.stat(target, StatKind::Defense)?;
        let natural = DiceRoll::new(1, ctx.config.attack_die, 0).roll(ctx.roller) as u32;
        Ok(AttackRoll::new(natural, bonus, defense, ctx.config.crit_threshold))
    }

    /// Explicit targets, or a default chosen by the definition's targeting
    fn choose_targets(
        &self,
        action: &CombatAction,
        def: &ActionDef,
        ctx: &mut EffectContext<'_>,
    ) -> Vec<EntityId> {
        let actor = action.actor();
        let explicit: Vec<EntityId> = action
            .targets()
            .into_iter()
            .filter(|t| ctx.ledger.entity(t).is_some_and(|e| e.is_active()))
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }
        match def.targeting {
            Targeting::Area => Vec::new(),
            Targeting::Caster | Targeting::Ally => vec![actor.clone()],
            Targeting::Enemy => {
                let Some(team) = ctx.ledger.entity(actor).map(|e| e.team) else {
                    return Vec::new();
                };
                let candidates: Vec<EntityId> = ctx
                    .ledger
                    .entities()
                    .into_iter()
                    .filter(|e| e.team != team && e.is_active())
                    .map(|e| e.id.clone())
                    .collect();
                if candidates.is_empty() {
                    return Vec::new();
                }
                let pick = ctx.roller.pick(candidates.len());
                debug!("{} picks {} among {} enemies", actor, candidates[pick], candidates.len());
                vec![candidates[pick].clone()]
            }
        }
    }
}

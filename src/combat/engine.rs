//! Effects engine
//!
//! Stateless transformation of authored [`EffectAtom`]s into resolved
//! [`EffectResult`]s. Every mutation goes through the [`ResourceLedger`];
//! atoms apply in authored order and recipients that are already down are
//! skipped.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::damage::{mitigate, CritPolicy, DamageCategory, DamageType};
use super::dice::{parse_dice, Roller};
use super::effects::{Periodic, StackOutcome, StackingRule, StatusEffect, StatusKind};
use super::entity::{EntityId, ResourceKind, StatKind};
use super::ledger::ResourceLedger;
use crate::config::CombatConfig;
use crate::error::ResolutionError;

/// What an atom does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    Damage,
    Heal,
    Status,
    Cleanse,
    /// Raise a non-health resource
    Restore,
    /// Lower a resource without mitigation
    Drain,
}

/// Who an atom lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// The action's chosen targets
    #[default]
    Target,
    Caster,
    AllEnemies,
    AllAllies,
}

/// How large an atom is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Magnitude {
    Flat { value: i32 },
    Dice { notation: String },
    /// `base + caster_stat * percent / 100`
    Stat { stat: StatKind, percent: i32, #[serde(default)] base: i32 },
}

impl Magnitude {
    pub fn flat(value: i32) -> Self {
        Magnitude::Flat { value }
    }

    pub fn dice(notation: &str) -> Self {
        Magnitude::Dice {
            notation: notation.to_string(),
        }
    }
}

/// Status created by a status atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTemplate {
    pub name: String,
    pub kind: StatusKind,
}

/// Smallest authored unit of a mechanical effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectAtom {
    pub kind: AtomKind,
    #[serde(default)]
    pub selector: Selector,
    pub magnitude: Magnitude,
    /// Status duration in owner turns
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default)]
    pub resource: Option<ResourceKind>,
    #[serde(default)]
    pub status: Option<StatusTemplate>,
    #[serde(default)]
    pub stacking: StackingRule,
}

impl EffectAtom {
    pub fn damage(magnitude: Magnitude, dtype: DamageType) -> Self {
        Self {
            kind: AtomKind::Damage,
            selector: Selector::Target,
            magnitude,
            duration: None,
            damage_type: Some(dtype),
            resource: None,
            status: None,
            stacking: StackingRule::default(),
        }
    }

    pub fn heal(magnitude: Magnitude) -> Self {
        Self {
            kind: AtomKind::Heal,
            damage_type: None,
            ..Self::damage(magnitude, DamageType::Physical)
        }
    }

    pub fn status(name: &str, kind: StatusKind, duration: u32, magnitude: i32) -> Self {
        Self {
            kind: AtomKind::Status,
            duration: Some(duration),
            damage_type: None,
            status: Some(StatusTemplate {
                name: name.to_string(),
                kind,
            }),
            ..Self::damage(Magnitude::flat(magnitude), DamageType::Physical)
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_stacking(mut self, stacking: StackingRule) -> Self {
        self.stacking = stacking;
        self
    }

    pub fn with_damage_type(mut self, dtype: DamageType) -> Self {
        self.damage_type = Some(dtype);
        self
    }

    /// Whether the atom harms its recipients
    pub fn is_offensive(&self) -> bool {
        match self.kind {
            AtomKind::Damage | AtomKind::Drain => true,
            AtomKind::Status => self
                .status
                .as_ref()
                .is_some_and(|s| s.kind.is_debuff()),
            _ => false,
        }
    }
}

/// What happened to one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EffectOutcome {
    Damaged,
    /// Resolved to zero; narrated as "no effect"
    NoEffect,
    Healed,
    ResourceChanged,
    StatusApplied { name: String },
    StatusRefreshed { name: String },
    StatusReplaced { name: String, removed: usize },
    StatusIgnored { name: String },
    Cleansed { removed: Vec<String> },
    Missed,
    /// Resolution failed; zero effect
    Failed { reason: String },
}

/// Resolved outcome of one atom on one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectResult {
    /// Index of the atom within its action
    pub atom: usize,
    pub target: EntityId,
    pub outcome: EffectOutcome,
    pub resource: Option<ResourceKind>,
    pub damage_type: Option<DamageType>,
    /// Rolled amount, after any critical amplification
    pub raw: i32,
    /// Amount after flat mitigation
    pub mitigated: i32,
    /// Amount actually applied
    pub amount: i32,
    pub before: i32,
    pub after: i32,
    pub critical: bool,
    /// The recipient went down because of this result
    pub defeated: bool,
}

impl EffectResult {
    fn new(atom: usize, target: &EntityId, outcome: EffectOutcome) -> Self {
        Self {
            atom,
            target: target.clone(),
            outcome,
            resource: None,
            damage_type: None,
            raw: 0,
            mitigated: 0,
            amount: 0,
            before: 0,
            after: 0,
            critical: false,
            defeated: false,
        }
    }

    pub fn missed(target: &EntityId) -> Self {
        Self::new(0, target, EffectOutcome::Missed)
    }

    /// Change in the affected pool, if any
    pub fn delta(&self) -> i32 {
        self.after - self.before
    }
}

/// Everything the engine needs besides the atoms themselves
pub struct EffectContext<'a> {
    pub ledger: &'a mut dyn ResourceLedger,
    pub roller: &'a mut dyn Roller,
    pub config: &'a CombatConfig,
}

/// Apply atoms in authored order on behalf of `source`
///
/// Resolution errors are logged and yield a zero-effect `Failed` result.
pub fn apply_atoms(
    atoms: &[EffectAtom],
    source: &EntityId,
    targets: &[EntityId],
    critical: bool,
    ctx: &mut EffectContext<'_>,
) -> Vec<EffectResult> {
    let mut results = Vec::new();
    for (index, atom) in atoms.iter().enumerate() {
        let recipients = select(atom.selector, source, targets, &*ctx.ledger);
        let critical = critical && atom.kind == AtomKind::Damage;
        let rolled = match roll_magnitude(&atom.magnitude, source, critical, ctx) {
            Ok(rolled) => rolled,
            Err(err) => {
                warn!("atom {} from {} failed to roll: {}", index, source, err);
                results.extend(recipients.iter().map(|t| failed(index, t, &err)));
                continue;
            }
        };
        for target in &recipients {
            // Defeated recipients are skipped by later atoms
            let alive = ctx.ledger.entity(target).is_some_and(|e| e.is_alive());
            if !alive {
                debug!("skipping defeated {} for atom {}", target, index);
                continue;
            }
            let result = apply_one(index, atom, rolled, critical, source, target, ctx)
                .unwrap_or_else(|err| {
                    warn!("atom {} on {} failed: {}", index, target, err);
                    failed(index, target, &err)
                });
            results.push(result);
        }
    }
    results
}

/// Periodic damage or healing from a status at its owner's turn boundary
///
/// Periodic damage skips flat mitigation but respects typed resistance.
pub fn apply_periodic(
    owner: &EntityId,
    periodic: Periodic,
    ctx: &mut EffectContext<'_>,
) -> Result<EffectResult, ResolutionError> {
    match periodic {
        Periodic::Damage(amount, dtype) => damage(0, owner, amount, 0, dtype, false, ctx),
        Periodic::Heal(amount) => change_pool(0, owner, ResourceKind::Health, amount, EffectOutcome::Healed, ctx),
    }
}

fn failed(index: usize, target: &EntityId, err: &ResolutionError) -> EffectResult {
    EffectResult::new(
        index,
        target,
        EffectOutcome::Failed {
            reason: err.to_string(),
        },
    )
}

fn select(
    selector: Selector,
    source: &EntityId,
    targets: &[EntityId],
    ledger: &dyn ResourceLedger,
) -> Vec<EntityId> {
    let team = ledger.entity(source).map(|e| e.team);
    match (selector, team) {
        (Selector::Target, _) => targets.to_vec(),
        (Selector::Caster, _) => vec![source.clone()],
        (Selector::AllEnemies, Some(team)) => ledger
            .entities()
            .into_iter()
            .filter(|e| e.team != team && e.is_active())
            .map(|e| e.id.clone())
            .collect(),
        (Selector::AllAllies, Some(team)) => ledger
            .entities()
            .into_iter()
            .filter(|e| e.team == team && e.is_active())
            .map(|e| e.id.clone())
            .collect(),
        (_, None) => Vec::new(),
    }
}

fn roll_magnitude(
    magnitude: &Magnitude,
    source: &EntityId,
    critical: bool,
    ctx: &mut EffectContext<'_>,
) -> Result<i32, ResolutionError> {
    let rolled = match magnitude {
        Magnitude::Flat { value } => *value,
        Magnitude::Dice { notation } => {
            let dice = parse_dice(notation).map_err(|reason| ResolutionError::BadNotation {
                notation: notation.clone(),
                reason,
            })?;
            if critical && ctx.config.crit_policy == CritPolicy::DoubleDice {
                return Ok(dice.roll_doubled(ctx.roller).total);
            }
            dice.roll(ctx.roller)
        }
        Magnitude::Stat { stat, percent, base } => {
            let value = ctx.ledger.stat(source, *stat)? as i64;
            (*base as i64 + value * *percent as i64 / 100).clamp(i32::MIN as i64, i32::MAX as i64) as i32
        }
    };
    Ok(if critical {
        ctx.config.crit_policy.scale(rolled)
    } else {
        rolled
    })
}

fn apply_one(
    index: usize,
    atom: &EffectAtom,
    rolled: i32,
    critical: bool,
    source: &EntityId,
    target: &EntityId,
    ctx: &mut EffectContext<'_>,
) -> Result<EffectResult, ResolutionError> {
    match atom.kind {
        AtomKind::Damage => {
            let dtype = atom
                .damage_type
                .ok_or(ResolutionError::MissingDamageType { index })?;
            let flat = match dtype.category() {
                DamageCategory::Physical => ctx.ledger.stat(target, StatKind::DamageReduction)?,
                DamageCategory::Magical => ctx.ledger.stat(target, StatKind::MagicDefense)?,
            };
            damage(index, target, rolled, flat, dtype, critical, ctx)
        }
        AtomKind::Heal => change_pool(index, target, ResourceKind::Health, rolled.max(0), EffectOutcome::Healed, ctx),
        AtomKind::Restore => {
            let resource = atom.resource.ok_or(ResolutionError::MissingResource { index })?;
            change_pool(index, target, resource, rolled.max(0), EffectOutcome::ResourceChanged, ctx)
        }
        AtomKind::Drain => {
            let resource = atom.resource.ok_or(ResolutionError::MissingResource { index })?;
            change_pool(index, target, resource, -rolled.max(0), EffectOutcome::ResourceChanged, ctx)
        }
        AtomKind::Status => {
            let template = atom
                .status
                .as_ref()
                .ok_or(ResolutionError::MissingStatus { index })?;
            let mut effect = StatusEffect::new(
                &template.name,
                template.kind,
                atom.duration.unwrap_or(1),
                rolled,
            )
            .with_source(source);
            if let Some(dtype) = atom.damage_type {
                effect = effect.with_damage_type(dtype);
            }
            let name = template.name.clone();
            let outcome = match ctx.ledger.add_status(target, effect, atom.stacking)? {
                StackOutcome::Added => EffectOutcome::StatusApplied { name },
                StackOutcome::Refreshed => EffectOutcome::StatusRefreshed { name },
                StackOutcome::Replaced(removed) => EffectOutcome::StatusReplaced { name, removed },
                StackOutcome::Ignored => EffectOutcome::StatusIgnored { name },
            };
            let mut result = EffectResult::new(index, target, outcome);
            result.raw = rolled;
            result.amount = rolled;
            Ok(result)
        }
        AtomKind::Cleanse => {
            let name = atom.status.as_ref().map(|s| s.name.as_str());
            let removed = ctx
                .ledger
                .cleanse(target, name)?
                .into_iter()
                .map(|e| e.name)
                .collect();
            Ok(EffectResult::new(index, target, EffectOutcome::Cleansed { removed }))
        }
    }
}

fn damage(
    index: usize,
    target: &EntityId,
    raw: i32,
    flat: i32,
    dtype: DamageType,
    critical: bool,
    ctx: &mut EffectContext<'_>,
) -> Result<EffectResult, ResolutionError> {
    let resistance = ctx.ledger.resistance(target, dtype)?;
    let bounds = (ctx.config.resistance_min, ctx.config.resistance_max);
    let m = mitigate(raw, flat, resistance, bounds);

    let before = ctx.ledger.resource(target, ResourceKind::Health)?.current;
    let after = ctx
        .ledger
        .set_resource(target, ResourceKind::Health, before - m.final_damage)?
        .current;

    debug!(
        "{} takes {} {} ({} raw, {} after flat, {}% resisted)",
        target, m.final_damage, dtype, raw, m.after_flat, m.resistance
    );

    let outcome = if m.final_damage > 0 {
        EffectOutcome::Damaged
    } else {
        EffectOutcome::NoEffect
    };
    Ok(EffectResult {
        atom: index,
        target: target.clone(),
        outcome,
        resource: Some(ResourceKind::Health),
        damage_type: Some(dtype),
        raw,
        mitigated: m.after_flat,
        amount: before - after,
        before,
        after,
        critical,
        defeated: before > 0 && after == 0,
    })
}

fn change_pool(
    index: usize,
    target: &EntityId,
    resource: ResourceKind,
    delta: i32,
    outcome: EffectOutcome,
    ctx: &mut EffectContext<'_>,
) -> Result<EffectResult, ResolutionError> {
    let before = ctx.ledger.resource(target, resource)?.current;
    let after = ctx.ledger.set_resource(target, resource, before + delta)?.current;
    let outcome = if after == before {
        EffectOutcome::NoEffect
    } else {
        outcome
    };
    Ok(EffectResult {
        atom: index,
        target: target.clone(),
        outcome,
        resource: Some(resource),
        damage_type: None,
        raw: delta.abs(),
        mitigated: delta.abs(),
        amount: (after - before).abs(),
        before,
        after,
        critical: false,
        defeated: resource == ResourceKind::Health && before > 0 && after == 0,
    })
}

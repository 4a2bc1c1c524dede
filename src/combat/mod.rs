//! Combat system module
//!
//! Turn-based combat resolution with:
//! - Dice rolling (e.g., "2d6+3") through a seedable [`Roller`]
//! - Typed damage with flat mitigation, resistances and criticals
//! - Status effects with stacking rules and periodic ticks
//! - A resource ledger owning pools, stats and timed modifiers
//! - An action resolver and stateless effects engine
//! - A resumable, step-at-a-time combat state machine

mod action;
mod damage;
mod dice;
mod effects;
mod engine;
mod entity;
mod initiative;
mod ledger;
mod machine;
mod rules;
mod state;

pub use action::{
    ActionCatalog, ActionDef, ActionResolver, AttackRoll, CombatAction, CostPaid, FleeCheck, Intent,
    Resolution, ResourceCost, Targeting, UNARMED,
};
pub use damage::{mitigate, CritPolicy, DamageCategory, DamageType, Mitigation, Resistances};
pub use dice::{parse_dice, DiceRoll, RngRoller, RollOutcome, Roller, RollerState, ScriptedRoller};
pub use effects::{
    EntityEffects, Periodic, StackOutcome, StackingRule, StatusEffect, StatusKind, StatusTick,
};
pub use engine::{
    apply_atoms, apply_periodic, AtomKind, EffectAtom, EffectContext, EffectOutcome, EffectResult,
    Magnitude, Selector, StatusTemplate,
};
pub use entity::{
    CombatEntity, CombatStats, Controller, EntityId, Pools, ResourceKind, ResourcePool, StatKind,
    Team,
};
pub use initiative::{roll_initiative, InitiativeRoll};
pub use ledger::{ModifierTarget, ResourceLedger, RosterLedger, TimedModifier};
pub use machine::{Collaborators, CombatMachine, StepOutcome};
pub use rules::{RuleValidator, StandardRules, Verdict};
pub use state::{CombatSnapshot, CombatState, Outcome, Step, SurpriseInfo};

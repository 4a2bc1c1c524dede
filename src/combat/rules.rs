//! Legality checks for proposed actions
//!
//! Validation runs before resolution. It rejects actions that cannot be
//! carried out at all (unknown spell, missing target, empty inventory) but
//! never pre-blocks on resources: a short caster still spends the turn.

use super::action::{ActionCatalog, CombatAction, UNARMED};
use super::entity::{CombatEntity, EntityId};
use super::ledger::ResourceLedger;
use crate::error::ValidationError;

/// Result of validating an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Legal,
    Illegal(ValidationError),
}

impl Verdict {
    pub fn is_legal(&self) -> bool {
        matches!(self, Verdict::Legal)
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            Verdict::Legal => Ok(()),
            Verdict::Illegal(err) => Err(err),
        }
    }
}

impl From<Result<(), ValidationError>> for Verdict {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Verdict::Legal,
            Err(err) => Verdict::Illegal(err),
        }
    }
}

/// Decides whether an action may be attempted
pub trait RuleValidator: Send + Sync {
    fn validate(
        &self,
        action: &CombatAction,
        actor: &CombatEntity,
        ledger: &dyn ResourceLedger,
        catalog: &ActionCatalog,
    ) -> Verdict;
}

/// Default rules: known actions, living targets, items in stock
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    fn check(
        &self,
        action: &CombatAction,
        actor: &CombatEntity,
        ledger: &dyn ResourceLedger,
        catalog: &ActionCatalog,
    ) -> Result<(), ValidationError> {
        if action.actor() != &actor.id {
            return Err(ValidationError::NotYourTurn(action.actor().clone()));
        }
        if !actor.can_act() {
            return Err(ValidationError::Illegal(format!("{} cannot act right now", actor.name)));
        }

        match action {
            CombatAction::Attack { weapon, .. } => {
                let known = weapon == UNARMED || actor.actions.iter().any(|a| a == weapon);
                if !known || catalog.weapon(weapon).is_none() {
                    return Err(ValidationError::UnknownAction {
                        actor: actor.id.clone(),
                        name: weapon.clone(),
                    });
                }
            }
            CombatAction::Spell { spell, .. } => {
                if !actor.actions.iter().any(|a| a == spell) || !catalog.spells.contains_key(spell) {
                    return Err(ValidationError::UnknownAction {
                        actor: actor.id.clone(),
                        name: spell.clone(),
                    });
                }
                if !actor.effects.can_cast() {
                    return Err(ValidationError::Illegal(format!("{} is silenced", actor.name)));
                }
            }
            CombatAction::UseItem { item, .. } => {
                if !catalog.items.contains_key(item) {
                    return Err(ValidationError::UnknownAction {
                        actor: actor.id.clone(),
                        name: item.clone(),
                    });
                }
                if actor.inventory.get(item).copied().unwrap_or(0) == 0 {
                    return Err(ValidationError::OutOfItem {
                        actor: actor.id.clone(),
                        item: item.clone(),
                    });
                }
            }
            _ => {}
        }

        for target in action.targets() {
            check_target(&target, ledger)?;
        }
        Ok(())
    }
}

fn check_target(target: &EntityId, ledger: &dyn ResourceLedger) -> Result<(), ValidationError> {
    match ledger.entity(target) {
        None => Err(ValidationError::UnknownTarget(target.clone())),
        Some(entity) if !entity.is_active() => Err(ValidationError::TargetDefeated(target.clone())),
        Some(_) => Ok(()),
    }
}

impl RuleValidator for StandardRules {
    fn validate(
        &self,
        action: &CombatAction,
        actor: &CombatEntity,
        ledger: &dyn ResourceLedger,
        catalog: &ActionCatalog,
    ) -> Verdict {
        self.check(action, actor, ledger, catalog).into()
    }
}

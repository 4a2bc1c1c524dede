//! Built-in NPC behavior

use async_trait::async_trait;

use super::{BattleView, IntentProvider};
use crate::combat::{EntityId, Intent};
use crate::error::ProviderError;

/// Deterministic default: attack the first active enemy, else pass
///
/// Used whenever an NPC's own provider times out, fails, or proposes
/// something illegal.
pub fn fallback_intent(view: &BattleView) -> Intent {
    match view.enemies().next() {
        Some(enemy) => Intent::Attack {
            weapon: None,
            target: Some(enemy.id.clone()),
        },
        None => Intent::Pass,
    }
}

/// Simple NPC: strikes the weakest active enemy with its default weapon
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNpc;

#[async_trait]
impl IntentProvider for DefaultNpc {
    async fn get_intent(&self, _actor: &EntityId, view: &BattleView) -> Result<Intent, ProviderError> {
        // min_by_key keeps the first of equal elements, so ties go to roster order
        let weakest = view.enemies().min_by_key(|e| e.health.current);
        Ok(match weakest {
            Some(enemy) => Intent::Attack {
                weapon: None,
                target: Some(enemy.id.clone()),
            },
            None => Intent::Pass,
        })
    }
}

//! Initiative
//!
//! Each active entity rolls `1dN + initiative`. Higher totals act first; ties
//! go to the higher modifier, then to roster order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dice::{DiceRoll, Roller};
use super::entity::{EntityId, StatKind, Team};
use super::ledger::ResourceLedger;

/// One entity's initiative for the round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub entity: EntityId,
    pub natural: i32,
    pub modifier: i32,
    pub total: i32,
    /// Position in the roster, the final tie-breaker
    pub index: usize,
}

/// Roll initiative for active entities, optionally limited to one team
///
/// Returns rolls sorted into turn order.
pub fn roll_initiative(
    ledger: &dyn ResourceLedger,
    roller: &mut dyn Roller,
    die: u32,
    team: Option<Team>,
) -> Vec<InitiativeRoll> {
    let d = DiceRoll::new(1, die, 0);
    let mut rolls: Vec<InitiativeRoll> = ledger
        .entities()
        .into_iter()
        .enumerate()
        .filter(|(_, e)| e.is_active() && team.is_none_or(|t| e.team == t))
        .map(|(index, e)| {
            let modifier = ledger.stat(&e.id, StatKind::Initiative).unwrap_or(e.stats.initiative);
            let natural = d.roll(roller);
            InitiativeRoll {
                entity: e.id.clone(),
                natural,
                modifier,
                total: natural + modifier,
                index,
            }
        })
        .collect();

    rolls.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then(b.modifier.cmp(&a.modifier))
            .then(a.index.cmp(&b.index))
    });

    for roll in &rolls {
        debug!(
            "initiative {}: {} + {} = {}",
            roll.entity, roll.natural, roll.modifier, roll.total
        );
    }
    rolls
}

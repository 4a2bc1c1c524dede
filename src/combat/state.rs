//! Combat state tracking
//!
//! [`CombatState`] is the only resumable unit of a fight: the current step,
//! round, turn order and anything carried between steps. Together with the
//! ledger's entities it forms a [`CombatSnapshot`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::{CombatAction, Intent, Resolution};
use super::dice::RollerState;
use super::entity::{CombatEntity, EntityId, Team};
use super::initiative::InitiativeRoll;
use crate::error::Result;

/// One logical step of the combat loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Starting,
    SurpriseCheck,
    SurpriseAttack,
    SurpriseOutcome,
    SurpriseEnd,
    RollingInitiative,
    RoundStarting,
    AwaitingPlayerInput,
    AwaitingNpcIntent,
    ProcessingAction,
    ResolvingMechanics,
    NarratingOutcome,
    ApplyingStatusEffects,
    AdvancingTurn,
    EndingCombat,
    Terminated,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Starting => "STARTING",
            Step::SurpriseCheck => "SURPRISE_CHECK",
            Step::SurpriseAttack => "SURPRISE_ATTACK",
            Step::SurpriseOutcome => "SURPRISE_OUTCOME",
            Step::SurpriseEnd => "SURPRISE_END",
            Step::RollingInitiative => "ROLLING_INITIATIVE",
            Step::RoundStarting => "ROUND_STARTING",
            Step::AwaitingPlayerInput => "AWAITING_PLAYER_INPUT",
            Step::AwaitingNpcIntent => "AWAITING_NPC_INTENT",
            Step::ProcessingAction => "PROCESSING_ACTION",
            Step::ResolvingMechanics => "RESOLVING_MECHANICS",
            Step::NarratingOutcome => "NARRATING_OUTCOME",
            Step::ApplyingStatusEffects => "APPLYING_STATUS_EFFECTS",
            Step::AdvancingTurn => "ADVANCING_TURN",
            Step::EndingCombat => "ENDING_COMBAT",
            Step::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// How a fight ended, from the party's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Victory,
    Defeat,
    Fled,
    Surrendered,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Victory => "VICTORY",
            Outcome::Defeat => "DEFEAT",
            Outcome::Fled => "FLED",
            Outcome::Surrendered => "SURRENDERED",
        };
        f.write_str(s)
    }
}

/// Who ambushed whom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurpriseInfo {
    /// Team acting in the surprise round
    pub initiating: Team,
    /// Entities caught off guard
    pub surprised: Vec<EntityId>,
}

impl SurpriseInfo {
    pub fn new(initiating: Team, surprised: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            initiating,
            surprised: surprised.into_iter().collect(),
        }
    }

    pub fn is_surprised(&self, id: &EntityId) -> bool {
        self.surprised.contains(id)
    }
}

/// Resumable combat context, owned by the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub step: Step,
    /// 0 during the surprise round, then 1, 2, ...
    pub round: u32,
    pub turn_order: Vec<EntityId>,
    pub active_index: usize,
    /// This round's initiative rolls, in turn order
    #[serde(default)]
    pub initiative: Vec<InitiativeRoll>,
    #[serde(default)]
    pub surprise: Option<SurpriseInfo>,
    #[serde(default)]
    pub in_surprise_round: bool,
    pub pending_action: Option<CombatAction>,
    /// Intents submitted ahead of the actor's turn
    #[serde(default)]
    pub deferred: BTreeMap<EntityId, Intent>,
    pub last_result: Option<Resolution>,
    /// Defeated entities in the order they fell
    #[serde(default)]
    pub defeated: Vec<EntityId>,
    pub outcome: Option<Outcome>,
}

impl CombatState {
    pub fn new(surprise: Option<SurpriseInfo>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            step: Step::Starting,
            round: 0,
            turn_order: Vec::new(),
            active_index: 0,
            initiative: Vec::new(),
            surprise,
            in_surprise_round: false,
            pending_action: None,
            deferred: BTreeMap::new(),
            last_result: None,
            defeated: Vec::new(),
            outcome: None,
        }
    }

    /// Entity whose turn it is
    pub fn current_actor(&self) -> Option<&EntityId> {
        self.turn_order.get(self.active_index)
    }

    pub fn is_terminated(&self) -> bool {
        self.step == Step::Terminated
    }

    /// Whether `id` is surprised and the surprise round is still running
    pub fn is_caught_off_guard(&self, id: &EntityId) -> bool {
        self.in_surprise_round && self.surprise.as_ref().is_some_and(|s| s.is_surprised(id))
    }

    /// Initiative total rolled this round, if any
    pub fn initiative_of(&self, id: &EntityId) -> Option<i32> {
        self.initiative.iter().find(|r| &r.entity == id).map(|r| r.total)
    }
}

/// Everything needed to resume a fight at a step boundary
///
/// `dice` is only present for seeded rollers; a fight restored without it
/// keeps whatever roller the new collaborators bring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub state: CombatState,
    pub entities: Vec<CombatEntity>,
    #[serde(default)]
    pub dice: Option<RollerState>,
}

impl CombatSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

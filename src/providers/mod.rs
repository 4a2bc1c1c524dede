//! External collaborators: intent providers and narrators
//!
//! Both may take arbitrarily long (a human at a keyboard, a remote model).
//! The state machine wraps every call in a timeout and has a fallback for
//! each, so implementations only need to answer eventually.

mod narrator;
mod npc;
mod scripted;

pub use narrator::{template_line, TemplateNarrator};
pub use npc::{fallback_intent, DefaultNpc};
pub use scripted::{ScriptedNarrator, ScriptedProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::combat::{EntityId, Intent, ResourceLedger, ResourcePool, Team};
use crate::error::ProviderError;
use crate::output::EventKind;

/// A participant as seen by whoever is choosing an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    pub name: String,
    pub team: Team,
    pub health: ResourcePool,
    pub mana: ResourcePool,
    pub stamina: ResourcePool,
    pub statuses: Vec<String>,
    pub active: bool,
}

/// Read-only picture of the fight handed to intent providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleView {
    pub round: u32,
    pub actor: EntityId,
    pub team: Team,
    /// Catalog ids the actor knows
    pub actions: Vec<String>,
    /// Items the actor still carries
    pub items: Vec<String>,
    pub entities: Vec<EntityView>,
}

impl BattleView {
    pub fn build(ledger: &dyn ResourceLedger, round: u32, actor: &EntityId) -> Option<Self> {
        let me = ledger.entity(actor)?;
        let entities = ledger
            .entities()
            .into_iter()
            .map(|e| EntityView {
                id: e.id.clone(),
                name: e.name.clone(),
                team: e.team,
                health: e.pools.health,
                mana: e.pools.mana,
                stamina: e.pools.stamina,
                statuses: e.effects.iter().map(|s| s.name.clone()).collect(),
                active: e.is_active(),
            })
            .collect();
        Some(Self {
            round,
            actor: actor.clone(),
            team: me.team,
            actions: me.actions.clone(),
            items: me
                .inventory
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(item, _)| item.clone())
                .collect(),
            entities,
        })
    }

    /// Active opponents of the actor, in roster order
    pub fn enemies(&self) -> impl Iterator<Item = &EntityView> {
        self.entities.iter().filter(move |e| e.active && e.team != self.team)
    }

    pub fn allies(&self) -> impl Iterator<Item = &EntityView> {
        self.entities.iter().filter(move |e| e.active && e.team == self.team)
    }
}

/// Source of actions for an entity
#[async_trait]
pub trait IntentProvider: Send + Sync {
    /// Propose an action for `actor`; `Intent::Pass` is always acceptable
    async fn get_intent(&self, actor: &EntityId, view: &BattleView) -> Result<Intent, ProviderError>;
}

/// Turns mechanical summaries into prose
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, kind: EventKind, summary: &Value) -> Result<String, ProviderError>;
}

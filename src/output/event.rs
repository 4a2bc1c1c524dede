//! Display events
//!
//! Everything the state machine wants shown is a [`DisplayEvent`]. Events
//! carry a JSON payload for renderers and are destroyed once drained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::combat::{EntityId, ResourceKind};

/// What an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CombatStart,
    Surprise,
    SurpriseOver,
    Initiative,
    RoundStart,
    TurnStart,
    TurnSkipped,
    ActionDeclared,
    ActionResult,
    ResourceBar,
    StatusApplied,
    StatusTick,
    StatusExpired,
    Defeated,
    FleeAttempt,
    Fled,
    Surrendered,
    Narration,
    System,
    CombatEnd,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::CombatStart => "combat_start",
            EventKind::Surprise => "surprise",
            EventKind::SurpriseOver => "surprise_over",
            EventKind::Initiative => "initiative",
            EventKind::RoundStart => "round_start",
            EventKind::TurnStart => "turn_start",
            EventKind::TurnSkipped => "turn_skipped",
            EventKind::ActionDeclared => "action_declared",
            EventKind::ActionResult => "action_result",
            EventKind::ResourceBar => "resource_bar",
            EventKind::StatusApplied => "status_applied",
            EventKind::StatusTick => "status_tick",
            EventKind::StatusExpired => "status_expired",
            EventKind::Defeated => "defeated",
            EventKind::FleeAttempt => "flee_attempt",
            EventKind::Fled => "fled",
            EventKind::Surrendered => "surrendered",
            EventKind::Narration => "narration",
            EventKind::System => "system",
            EventKind::CombatEnd => "combat_end",
        };
        f.write_str(s)
    }
}

/// Renderer an event is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Combat log
    Log,
    /// Resource bars
    Bars,
    /// Narrated prose
    Narration,
    /// Out-of-fiction messages to the player
    System,
}

/// Half of an animated resource-bar change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarPhase {
    /// Old value plus pending delta
    Phase1,
    /// Commit of the new value
    Phase2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayEvent {
    /// Assigned on enqueue, strictly increasing
    pub id: u64,
    pub kind: EventKind,
    pub payload: Value,
    pub channel: Channel,
    pub pacing_eligible: bool,
    pub narration_eligible: bool,
    #[serde(default)]
    pub phase: Option<BarPhase>,
    pub created_at: DateTime<Utc>,
}

impl DisplayEvent {
    pub fn new(kind: EventKind, channel: Channel, payload: Value) -> Self {
        Self {
            id: 0,
            kind,
            payload,
            channel,
            pacing_eligible: true,
            narration_eligible: false,
            phase: None,
            created_at: Utc::now(),
        }
    }

    /// Combat log entry
    pub fn log(kind: EventKind, payload: Value) -> Self {
        Self::new(kind, Channel::Log, payload)
    }

    /// Unpaced message on the system channel
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(EventKind::System, Channel::System, json!({ "text": text.into() })).paced(false)
    }

    /// Prose for the narration channel, also played back
    pub fn narration(text: impl Into<String>, about: EventKind) -> Self {
        Self::new(
            EventKind::Narration,
            Channel::Narration,
            json!({ "text": text.into(), "about": about }),
        )
        .narrated()
    }

    /// First half of a bar change: the old value with the pending delta
    pub fn bar_pending(entity: &EntityId, resource: ResourceKind, before: i32, delta: i32, max: i32) -> Self {
        let mut event = Self::new(
            EventKind::ResourceBar,
            Channel::Bars,
            json!({
                "entity": entity,
                "resource": resource,
                "value": before,
                "pending": delta,
                "max": max,
            }),
        );
        event.phase = Some(BarPhase::Phase1);
        event
    }

    /// Second half of a bar change
    pub fn bar_commit(entity: &EntityId, resource: ResourceKind, after: i32, max: i32) -> Self {
        let mut event = Self::new(
            EventKind::ResourceBar,
            Channel::Bars,
            json!({
                "entity": entity,
                "resource": resource,
                "value": after,
                "max": max,
            }),
        );
        event.phase = Some(BarPhase::Phase2);
        event
    }

    pub fn narrated(mut self) -> Self {
        self.narration_eligible = true;
        self
    }

    pub fn paced(mut self, pacing: bool) -> Self {
        self.pacing_eligible = pacing;
        self
    }

    /// Phase-1 bar events always pace so the pending delta is visible
    pub fn needs_pacing(&self) -> bool {
        self.pacing_eligible || self.phase == Some(BarPhase::Phase1)
    }

    /// `payload.text`, when the event carries prose
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(Value::as_str)
    }
}

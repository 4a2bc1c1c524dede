//! Scenario Tests for skirmish
//!
//! Whole fights driven step by step:
//! - Mitigation: Typed damage through magic defense and resistance
//! - Targeting: Random default targets under a fixed seed
//! - Surprise: Ambush rounds and deferred intents
//! - Flee: Opposed escape checks and what happens to the runner
//! - Resources: Costs paid on attempt and wasted turns
//! - Statuses: Periodic effects at the owner's turn boundary
//! - Providers: NPC and narrator fallbacks
//! - Persistence: Snapshot, restore and continue
//! - Pacing: Event order, acknowledgments and two-phase bars

pub mod flee;
pub mod mitigation;
pub mod persistence;
pub mod providers;
pub mod statuses;
pub mod targeting;

//! skirmish - turn-based combat resolution engine
//!
//! A resumable combat state machine, an effects pipeline for typed damage
//! and status effects, a health/mana/stamina economy, and an output
//! orchestrator that delivers display events in strict, paced order to
//! asynchronous renderers and narrators.

pub mod combat;
pub mod config;
pub mod encounter;
pub mod error;
pub mod output;
pub mod providers;

pub use config::CombatConfig;
pub use encounter::Encounter;
pub use error::{CombatError, Result};

//! Encounter files
//!
//! An encounter bundles the participants, an optional ambush and the action
//! catalog they draw from:
//!
//! ```toml
//! [surprise]
//! initiating = "foes"
//! surprised = ["hero"]
//!
//! [[entities]]
//! id = "hero"
//! name = "Hero"
//! team = "party"
//! controller = "player"
//! actions = ["sword"]
//! pools = { health = { current = 30, max = 30 } }
//!
//! [catalog.weapons.sword]
//! name = "Sword"
//! attack_roll = true
//! atoms = [{ kind = "damage", magnitude = { type = "dice", notation = "1d8+2" }, damage_type = "slashing" }]
//! ```

use std::path::Path;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::combat::{ActionCatalog, CombatEntity, RosterLedger, SurpriseInfo};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub entities: Vec<CombatEntity>,
    #[serde(default)]
    pub surprise: Option<SurpriseInfo>,
    #[serde(default)]
    pub catalog: ActionCatalog,
}

impl Encounter {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Figment::from(Toml::file(path)).extract()?)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(Figment::from(Toml::string(text)).extract()?)
    }

    /// Split into the pieces a combat machine is started from
    pub fn into_parts(self) -> (RosterLedger, ActionCatalog, Option<SurpriseInfo>) {
        (RosterLedger::new(self.entities), self.catalog, self.surprise)
    }
}

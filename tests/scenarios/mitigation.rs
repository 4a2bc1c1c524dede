//! Mitigation scenario tests
//!
//! A fireball against a fire-resistant orc, and against a goblin that is
//! weak to fire.

use serde_json::json;
use skirmish::combat::{Intent, Outcome, Step};
use skirmish::output::{BarPhase, EventKind};

use crate::harness::{content, Arena};

/// 3d6 rolls 6, 6, 4 = 16; minus 2 magic defense = 14; 20% fire resistance
/// leaves floor(11.2) = 11, so the orc drops from 30 to 19
#[tokio::test]
async fn test_fireball_through_resistance() {
    let mut arena = Arena::builder(vec![content::mage("mage"), content::orc("orc")])
        .faces([15, 1, 6, 6, 4])
        .script("mage", [Intent::spell("fireball", &["orc"])])
        .build();

    arena
        .run_until(|m| m.state().round == 1 && m.state().step == Step::ApplyingStatusEffects)
        .await;

    assert_eq!(arena.health("orc"), 19);
    assert_eq!(arena.mana("mage"), 10);

    let bars: Vec<_> = arena
        .sink
        .of_kind(EventKind::ResourceBar)
        .into_iter()
        .filter(|r| r.entity() == Some("orc"))
        .collect();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].phase(), Some(BarPhase::Phase1));
    assert_eq!(bars[0].event.payload["value"], json!(30));
    assert_eq!(bars[0].event.payload["pending"], json!(-11));
    assert_eq!(bars[1].phase(), Some(BarPhase::Phase2));
    assert_eq!(bars[1].event.payload["value"], json!(19));
}

#[tokio::test]
async fn test_mana_bar_precedes_damage() {
    let mut arena = Arena::builder(vec![content::mage("mage"), content::orc("orc")])
        .faces([15, 1, 6, 6, 4])
        .script("mage", [Intent::spell("fireball", &["orc"])])
        .build();

    arena
        .run_until(|m| m.state().round == 1 && m.state().step == Step::ApplyingStatusEffects)
        .await;

    let owners: Vec<String> = arena
        .sink
        .of_kind(EventKind::ResourceBar)
        .iter()
        .filter_map(|r| r.entity().map(str::to_string))
        .collect();
    assert_eq!(owners, vec!["mage", "mage", "orc", "orc"]);
}

/// Vulnerability amplifies: 16 * 150% = 24 flattens a 12 health goblin
#[tokio::test]
async fn test_vulnerability_defeats_goblin() {
    let mut arena = Arena::builder(vec![content::mage("mage"), content::goblin("gob")])
        .faces([15, 1, 6, 6, 4])
        .script("mage", [Intent::spell("fireball", &["gob"])])
        .build();

    assert_eq!(arena.run_to_end().await, Outcome::Victory);
    assert_eq!(arena.health("gob"), 0);

    let defeated = arena.sink.of_kind(EventKind::Defeated);
    assert_eq!(defeated.len(), 1);
    assert_eq!(defeated[0].entity(), Some("gob"));

    // The goblin never got a turn
    assert!(arena
        .sink
        .of_kind(EventKind::TurnStart)
        .iter()
        .all(|r| r.entity() != Some("gob")));

    let kinds = arena.sink.kinds();
    assert_eq!(kinds.last(), Some(&EventKind::CombatEnd));
}

#[tokio::test]
async fn test_combat_state_cleared_at_end() {
    let mut arena = Arena::builder(vec![content::mage("mage"), content::goblin("gob")])
        .faces([15, 1, 6, 6, 6, 6, 4])
        .script("mage", [Intent::spell("venom", &["gob"]), Intent::spell("fireball", &["gob"])])
        .build();

    assert_eq!(arena.run_to_end().await, Outcome::Victory);
    assert!(arena.entity("gob").effects.is_empty());
    assert!(arena.entity("mage").modifiers.is_empty());
    assert!(arena.machine.state().deferred.is_empty());
}

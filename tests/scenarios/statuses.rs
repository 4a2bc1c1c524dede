//! Status effect scenario tests

use serde_json::json;
use skirmish::combat::{CombatEntity, EntityId, Intent, StackingRule, StatusEffect, StatusKind, Step};
use skirmish::output::EventKind;

use crate::harness::{content, Arena};

/// Venom: 2 poison damage at the end of each of the orc's next three turns
#[tokio::test]
async fn test_poison_ticks_then_expires() {
    let orc = EntityId::from("orc");
    let mut arena = Arena::builder(vec![content::mage("mage"), content::orc("orc")])
        .faces([15, 1])
        .script("mage", [Intent::spell("venom", &["orc"])])
        .build();

    arena
        .run_until(|m| m.state().step == Step::AdvancingTurn && m.state().current_actor() == Some(&orc))
        .await;
    assert_eq!(arena.mana("mage"), 25);
    assert_eq!(arena.health("orc"), 28);
    assert!(arena.entity("orc").effects.has("poison"));

    let ticks = arena.sink.of_kind(EventKind::StatusTick);
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].entity(), Some("orc"));
    assert_eq!(ticks[0].event.payload["status"], json!("poison"));

    arena.run_until(|m| m.state().round == 4).await;
    assert_eq!(arena.health("orc"), 24);
    assert!(arena.entity("orc").effects.is_empty());
    assert_eq!(arena.sink.of_kind(EventKind::StatusTick).len(), 3);

    let expired = arena.sink.of_kind(EventKind::StatusExpired);
    assert!(expired
        .iter()
        .any(|r| r.entity() == Some("orc") && r.event.payload["status"] == json!("poison")));
}

#[tokio::test]
async fn test_status_applied_event() {
    let mut arena = Arena::builder(vec![content::mage("mage"), content::orc("orc")])
        .faces([15, 1])
        .script("mage", [Intent::spell("venom", &["orc"])])
        .build();

    arena
        .run_until(|m| m.state().round == 1 && m.state().step == Step::NarratingOutcome)
        .await;
    let applied = arena.sink.of_kind(EventKind::StatusApplied);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].entity(), Some("orc"));
}

fn dazed_orc() -> CombatEntity {
    let mut orc = content::orc("orc");
    orc.effects
        .apply(StatusEffect::new("daze", StatusKind::Stunned, 1, 0), StackingRule::Refresh);
    orc
}

/// A stunned orc loses its turn, but the stun still counts down
#[tokio::test]
async fn test_stunned_npc_loses_turn() {
    let mut arena = Arena::builder(vec![content::fighter("hero"), dazed_orc()])
        .faces([15, 1])
        .build();

    arena.run_until(|m| m.state().round == 2).await;
    assert_eq!(arena.health("hero"), 30);
    assert!(arena.entity("orc").effects.is_empty());

    let skipped = arena.sink.of_kind(EventKind::TurnSkipped);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].entity(), Some("orc"));

    // Back on its feet in round two
    let orc = EntityId::from("orc");
    arena
        .run_until(|m| m.state().step == Step::AdvancingTurn && m.state().current_actor() == Some(&orc))
        .await;
    assert_eq!(arena.health("hero"), 27);
}

//! Persistence scenario tests
//!
//! A fight saved at a step boundary and restored with fresh collaborators
//! continues exactly as the original would have.

use skirmish::combat::{CombatSnapshot, EntityId, Intent, Step};
use skirmish::output::EventKind;
use skirmish::CombatError;

use crate::harness::{content, Arena, ArenaBuilder};

fn builder() -> ArenaBuilder {
    Arena::builder(vec![content::mage("mage"), content::orc("orc")])
}

/// Mage poisons the orc in round one; both then trade blows with dice that roll 1
async fn mid_fight() -> Arena {
    let mut arena = builder()
        .faces([15, 1])
        .script("mage", [Intent::spell("venom", &["orc"])])
        .build();
    arena
        .run_until(|m| m.state().round == 2 && m.state().step == Step::AwaitingPlayerInput)
        .await;
    arena
}

#[tokio::test]
async fn test_snapshot_round_trips_through_json() {
    let arena = mid_fight().await;
    let snapshot = arena.machine.snapshot().unwrap();
    let json = snapshot.to_json().unwrap();
    let restored = CombatSnapshot::from_json(&json).unwrap();
    assert_eq!(restored, snapshot);

    // The poison and its remaining duration survive
    let orc = restored.entities.iter().find(|e| e.id.as_str() == "orc").unwrap();
    let poison = orc.effects.iter().find(|e| e.name == "poison").unwrap();
    assert_eq!(poison.remaining, 2);
}

#[tokio::test]
async fn test_restored_fight_continues_identically() {
    let mut original = mid_fight().await;
    let json = original.machine.snapshot().unwrap().to_json().unwrap();
    let snapshot = CombatSnapshot::from_json(&json).unwrap();
    let mut restored = builder().resume(snapshot).unwrap();

    assert_eq!(restored.machine.state(), original.machine.state());
    assert_eq!(restored.machine.state().step, Step::AwaitingPlayerInput);

    original.run_until(|m| m.state().round == 4).await;
    restored.run_until(|m| m.state().round == 4).await;

    let a = original.machine.snapshot().unwrap();
    let b = restored.machine.snapshot().unwrap();
    assert_eq!(a.entities, b.entities);
    assert_eq!(a.state.turn_order, b.state.turn_order);
    assert_eq!(a.state.step, b.state.step);
    assert_eq!(a.state.id, b.state.id);
    assert_eq!(original.health("orc"), 24);
    assert!(restored.sink.of_kind(EventKind::CombatStart).is_empty());
}

#[tokio::test]
async fn test_restore_rejects_missing_participant() {
    let arena = mid_fight().await;
    let mut snapshot = arena.machine.snapshot().unwrap();
    snapshot.entities.retain(|e| e.id.as_str() != "orc");

    let err = builder().resume(snapshot).err().expect("restore should fail");
    assert!(matches!(err, CombatError::UnknownEntity(_)));
}

/// Hero swings a sword (attack roll plus 1d8+2) at an orc on seeded dice
fn seeded_duel() -> ArenaBuilder {
    let swing = Intent::Attack {
        weapon: Some("sword".to_string()),
        target: Some(EntityId::from("orc")),
    };
    Arena::builder(vec![content::fighter("hero"), content::orc("orc")])
        .seed(11)
        .script("hero", vec![swing; 8])
}

#[tokio::test]
async fn test_seeded_dice_resume_where_they_left_off() {
    let hero = EntityId::from("hero");
    let mut original = seeded_duel().build();
    original
        .run_until(|m| m.state().step == Step::AwaitingPlayerInput && m.state().current_actor() == Some(&hero))
        .await;

    let snapshot = original.machine.snapshot().unwrap();
    let dice = snapshot.dice.expect("seeded dice are saved");
    assert_eq!(dice.seed, 11);
    assert!(dice.draws > 0, "initiative already rolled");

    let json = snapshot.to_json().unwrap();
    let mut restored = seeded_duel().resume(CombatSnapshot::from_json(&json).unwrap()).unwrap();

    original.run_until(|m| m.state().round == 4).await;
    restored.run_until(|m| m.state().round == 4).await;

    let a = original.machine.snapshot().unwrap();
    let b = restored.machine.snapshot().unwrap();
    assert_eq!(a.entities, b.entities);
    assert_eq!(a.dice, b.dice);
    assert_eq!(a.state.round, b.state.round);
    assert_eq!(a.state.outcome, b.state.outcome);
}

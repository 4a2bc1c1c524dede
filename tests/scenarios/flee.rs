//! Flee scenario tests
//!
//! Escape stat plus a d20 against the strongest opponent's escape plus a d20,
//! with a bonus per extra living opponent. Strictly greater escapes.

use serde_json::json;
use skirmish::combat::{EntityId, Intent, Outcome, ResourceLedger, StatKind, Step};
use skirmish::output::EventKind;

use crate::harness::{content, Arena};

/// Index of the first event of `kind` about `entity`
fn position(arena: &Arena, kind: EventKind, entity: &str) -> Option<usize> {
    arena
        .sink
        .records()
        .iter()
        .position(|r| r.kind() == kind && r.entity() == Some(entity))
}

/// Rogue 4 + 10 = 14 against orc 2 + 10 = 12: the lone rogue gets away
#[tokio::test]
async fn test_successful_flee_ends_fight() {
    let mut arena = Arena::builder(vec![content::fighter("rogue"), content::orc("orc")])
        .faces([10, 5, 10, 10])
        .script("rogue", [Intent::Flee])
        .build();

    assert_eq!(arena.run_to_end().await, Outcome::Fled);
    assert!(arena.entity("rogue").fled);
    assert_eq!(arena.health("rogue"), 30);

    let attempt = arena.sink.of_kind(EventKind::FleeAttempt);
    assert_eq!(attempt.len(), 1);
    let payload = &attempt[0].event.payload;
    assert_eq!(payload["roll"], json!(14));
    assert_eq!(payload["against"], json!(12));
    assert_eq!(payload["opponent"], json!("orc"));
    assert_eq!(payload["success"], json!(true));
}

#[tokio::test]
async fn test_fled_entity_leaves_the_turn_order() {
    let mut arena = Arena::builder(vec![
        content::fighter("rogue"),
        content::fighter("knight"),
        content::orc("orc"),
    ])
    .faces([10, 9, 5, 10, 10])
    .script("rogue", [Intent::Flee])
    .build();

    arena.run_until(|m| m.state().round == 2).await;
    assert!(arena.machine.outcome().is_none());
    assert!(arena.entity("rogue").fled);

    let rogue = EntityId::from("rogue");
    assert!(!arena.machine.state().turn_order.contains(&rogue));

    let fled = position(&arena, EventKind::Fled, "rogue").expect("fled event");
    let later = arena.sink.records()[fled + 1..]
        .iter()
        .filter(|r| r.entity() == Some("rogue"))
        .count();
    assert_eq!(later, 0, "no events about the rogue after it fled");

    // The orc only ever targets the knight
    assert_eq!(arena.health("rogue"), 30);
    assert!(arena.health("knight") < 30);
}

/// A tie fails; the runner's defense drops for a round
#[tokio::test]
async fn test_failed_flee_penalizes_defense() {
    let mut arena = Arena::builder(vec![content::fighter("rogue"), content::orc("orc")])
        .faces([10, 5, 10, 12])
        .script("rogue", [Intent::Flee])
        .build();

    arena
        .run_until(|m| m.state().round == 1 && m.state().step == Step::NarratingOutcome)
        .await;

    let rogue = EntityId::from("rogue");
    assert!(!arena.entity("rogue").fled);
    assert!(arena.machine.outcome().is_none());
    assert_eq!(arena.machine.ledger().stat(&rogue, StatKind::Defense).unwrap(), 8);

    let attempt = arena.sink.of_kind(EventKind::FleeAttempt);
    assert_eq!(attempt[0].event.payload["success"], json!(false));

    // Worn off once the next round starts
    arena.run_until(|m| m.state().round == 2).await;
    assert_eq!(arena.machine.ledger().stat(&rogue, StatKind::Defense).unwrap(), 10);
}

/// Each extra living opponent adds one to the opposing roll
#[tokio::test]
async fn test_crowd_makes_escape_harder() {
    let mut arena = Arena::builder(vec![
        content::fighter("rogue"),
        content::orc("orc_a"),
        content::orc("orc_b"),
    ])
    .faces([10, 5, 4, 10, 10])
    .script("rogue", [Intent::Flee])
    .build();

    arena
        .run_until(|m| m.state().round == 1 && m.state().step == Step::NarratingOutcome)
        .await;

    let attempt = arena.sink.of_kind(EventKind::FleeAttempt);
    assert_eq!(attempt[0].event.payload["roll"], json!(14));
    assert_eq!(attempt[0].event.payload["against"], json!(13));
    assert_eq!(attempt[0].event.payload["success"], json!(true));
}

//! Provider scenario tests
//!
//! Automated intent providers and narrators are never trusted to answer: a
//! failure, a timeout or an illegal proposal falls back to deterministic
//! defaults and the fight goes on.

use std::sync::Arc;
use std::time::Duration;

use skirmish::combat::{EntityId, Intent, Step};
use skirmish::error::{ProviderError, ValidationError};
use skirmish::output::EventKind;
use skirmish::providers::{ScriptedNarrator, ScriptedProvider};

use crate::harness::{content, Arena, ArenaBuilder};

/// Orc acts first against a knight (first in the roster) and a weaker mage
fn party_vs_orc() -> ArenaBuilder {
    Arena::builder(vec![content::fighter("knight"), content::mage("mage"), content::orc("orc")])
        .faces([1, 1, 20])
}

async fn until_orc_narrated(arena: &mut Arena) {
    let orc = EntityId::from("orc");
    arena
        .run_until(|m| m.state().step == Step::ApplyingStatusEffects && m.state().current_actor() == Some(&orc))
        .await;
}

/// Baseline: the built-in NPC goes for the weakest enemy
#[tokio::test]
async fn test_default_npc_hits_weakest() {
    let mut arena = party_vs_orc().build();
    until_orc_narrated(&mut arena).await;
    assert_eq!(arena.health("mage"), 17);
    assert_eq!(arena.health("knight"), 30);
}

#[tokio::test]
async fn test_failing_npc_falls_back_to_first_enemy() {
    let npcs = ScriptedProvider::new();
    npcs.push_error("orc", ProviderError::Unavailable("model offline".to_string()));
    let mut arena = party_vs_orc().npcs(Arc::new(npcs)).build();

    until_orc_narrated(&mut arena).await;
    assert_eq!(arena.health("knight"), 27);
    assert_eq!(arena.health("mage"), 20);
}

#[tokio::test]
async fn test_illegal_npc_proposal_falls_back() {
    let npcs = ScriptedProvider::new().with("orc", [Intent::spell("meteor", &["mage"])]);
    let mut arena = party_vs_orc().npcs(Arc::new(npcs)).build();

    until_orc_narrated(&mut arena).await;
    assert_eq!(arena.health("knight"), 27);
}

#[tokio::test(start_paused = true)]
async fn test_slow_npc_times_out() {
    let npcs = ScriptedProvider::new()
        .with("orc", [Intent::Defend])
        .with_delay(Duration::from_secs(60));
    let mut arena = party_vs_orc()
        .config(|c| c.intent_timeout_ms = 500)
        .npcs(Arc::new(npcs))
        .build();

    let started = tokio::time::Instant::now();
    until_orc_narrated(&mut arena).await;
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(500));
    assert!(waited < Duration::from_secs(60));
    assert_eq!(arena.health("knight"), 27);
}

fn narration(arena: &Arena) -> Vec<String> {
    arena
        .sink
        .of_kind(EventKind::Narration)
        .iter()
        .filter_map(|r| r.text().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_narrator_reply_is_used() {
    let mut arena = party_vs_orc()
        .narrator(Arc::new(ScriptedNarrator::replying("The orc lunges.")))
        .build();
    until_orc_narrated(&mut arena).await;
    assert_eq!(narration(&arena), vec!["The orc lunges."]);
}

#[tokio::test]
async fn test_failing_narrator_uses_template() {
    let mut arena = party_vs_orc().narrator(Arc::new(ScriptedNarrator::failing())).build();
    until_orc_narrated(&mut arena).await;

    let lines = narration(&arena);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Mage takes 3 damage"), "got {:?}", lines);
}

#[tokio::test(start_paused = true)]
async fn test_slow_narrator_uses_template() {
    let narrator = ScriptedNarrator::replying("far too late").with_delay(Duration::from_secs(30));
    let mut arena = party_vs_orc()
        .config(|c| c.narration_timeout_ms = 200)
        .narrator(Arc::new(narrator))
        .build();
    until_orc_narrated(&mut arena).await;

    let lines = narration(&arena);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Orc"), "got {:?}", lines);
}

#[tokio::test]
async fn test_malformed_player_input_reprompts() {
    let players = ScriptedProvider::new();
    players.push_error(
        "knight",
        ProviderError::Malformed(ValidationError::Malformed("expected an action".to_string())),
    );
    players.push("knight", [Intent::attack("orc")]);
    let mut arena = Arena::builder(vec![content::fighter("knight"), content::orc("orc")])
        .faces([20, 1])
        .players(players)
        .build();

    arena
        .run_until(|m| m.state().step == Step::ProcessingAction)
        .await;
    let notices = arena.sink.texts();
    assert!(
        notices.iter().any(|t| t.contains("Choose again")),
        "expected a re-prompt, got {:?}",
        notices
    );
    assert_eq!(arena.machine.state().round, 1);
}

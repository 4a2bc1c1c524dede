//! Arena - a combat machine wired for tests
//!
//! Renders into a [`RecordingSink`], takes player input from a shared
//! [`ScriptedProvider`] and drains output after every step the way a real
//! driver would.

use std::sync::Arc;
use std::time::Duration;

use skirmish::combat::{
    ActionCatalog, Collaborators, CombatEntity, CombatMachine, CombatSnapshot, EntityId, Intent, Outcome,
    ResourceKind, ResourceLedger, RosterLedger, ScriptedRoller, StepOutcome, SurpriseInfo,
};
use skirmish::output::{DrainReport, Orchestrator};
use skirmish::providers::{IntentProvider, Narrator, ScriptedProvider};
use skirmish::CombatConfig;

use super::content;
use super::sink::RecordingSink;

/// Upper bound on steps before a test gives up
const STEP_LIMIT: usize = 500;

pub struct ArenaBuilder {
    entities: Vec<CombatEntity>,
    catalog: ActionCatalog,
    config: CombatConfig,
    faces: Option<Vec<u32>>,
    surprise: Option<SurpriseInfo>,
    players: Arc<ScriptedProvider>,
    npcs: Option<Arc<dyn IntentProvider>>,
    narrator: Option<Arc<dyn Narrator>>,
    sink: Option<Arc<RecordingSink>>,
    playback: Option<Arc<RecordingSink>>,
}

impl ArenaBuilder {
    /// Script the dice; exhausted scripts roll 1
    pub fn faces(mut self, faces: impl IntoIterator<Item = u32>) -> Self {
        self.faces = Some(faces.into_iter().collect());
        self
    }

    /// Seeded dice instead of a script
    pub fn seed(mut self, seed: u64) -> Self {
        self.faces = None;
        self.config.seed = Some(seed);
        self
    }

    pub fn config(mut self, tweak: impl FnOnce(&mut CombatConfig)) -> Self {
        tweak(&mut self.config);
        self
    }

    pub fn catalog(mut self, catalog: ActionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn surprise(mut self, surprise: SurpriseInfo) -> Self {
        self.surprise = Some(surprise);
        self
    }

    pub fn script(self, actor: &str, intents: impl IntoIterator<Item = Intent>) -> Self {
        self.players.push(actor, intents);
        self
    }

    pub fn players(mut self, players: ScriptedProvider) -> Self {
        self.players = Arc::new(players);
        self
    }

    pub fn npcs(mut self, npcs: Arc<dyn IntentProvider>) -> Self {
        self.npcs = Some(npcs);
        self
    }

    pub fn narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Render through this sink instead of an instant one
    pub fn sink(mut self, sink: Arc<RecordingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Also play narration-eligible events through this sink
    pub fn playback(mut self, sink: Arc<RecordingSink>) -> Self {
        self.playback = Some(sink);
        self
    }

    fn wire(&self) -> (Collaborators, Arc<RecordingSink>, Option<Arc<RecordingSink>>) {
        let sink = self
            .sink
            .clone()
            .unwrap_or_else(|| RecordingSink::new(Duration::ZERO));
        let mut output = Orchestrator::from_config(&self.config).with_fallback(sink.clone());
        if let Some(playback) = &self.playback {
            output = output.with_playback(playback.clone());
        }

        let players: Arc<dyn IntentProvider> = self.players.clone();
        let mut collaborators = Collaborators::new(&self.config, players, Arc::new(output));
        if let Some(faces) = &self.faces {
            collaborators = collaborators.with_roller(ScriptedRoller::new(faces.clone()));
        }
        if let Some(npcs) = &self.npcs {
            collaborators = collaborators.with_npcs(npcs.clone());
        }
        if let Some(narrator) = &self.narrator {
            collaborators = collaborators.with_narrator(narrator.clone());
        }
        (collaborators, sink, self.playback.clone())
    }

    pub fn build(self) -> Arena {
        let (collaborators, sink, playback) = self.wire();
        let machine = CombatMachine::start(
            RosterLedger::new(self.entities.clone()),
            self.catalog.clone(),
            self.config.clone(),
            collaborators,
            self.surprise.clone(),
        )
        .expect("arena should start");
        Arena {
            machine,
            players: self.players.clone(),
            sink,
            playback,
            reports: Vec::new(),
        }
    }

    /// Restore a snapshot with fresh collaborators
    pub fn resume(self, snapshot: CombatSnapshot) -> skirmish::Result<Arena> {
        let (collaborators, sink, playback) = self.wire();
        let machine = CombatMachine::restore(snapshot, self.catalog.clone(), self.config.clone(), collaborators)?;
        Ok(Arena {
            machine,
            players: self.players.clone(),
            sink,
            playback,
            reports: Vec::new(),
        })
    }
}

pub struct Arena {
    pub machine: CombatMachine<RosterLedger>,
    pub players: Arc<ScriptedProvider>,
    pub sink: Arc<RecordingSink>,
    pub playback: Option<Arc<RecordingSink>>,
    pub reports: Vec<DrainReport>,
}

impl Arena {
    /// Instant rendering, no pacing, scripted dice that roll 1
    pub fn builder(entities: Vec<CombatEntity>) -> ArenaBuilder {
        ArenaBuilder {
            entities,
            catalog: content::catalog(),
            config: CombatConfig {
                pacing_ms: 0,
                ..CombatConfig::default()
            },
            faces: Some(Vec::new()),
            surprise: None,
            players: Arc::new(ScriptedProvider::new()),
            npcs: None,
            narrator: None,
            sink: None,
            playback: None,
        }
    }

    /// Advance once and drain whatever the step produced
    pub async fn step(&mut self) -> StepOutcome {
        let outcome = self.machine.advance().await.expect("step should succeed");
        let report = self.machine.output().drain().await;
        self.reports.push(report);
        outcome
    }

    /// Step until `done` holds or the fight ends
    pub async fn run_until(&mut self, done: impl Fn(&CombatMachine<RosterLedger>) -> bool) {
        for _ in 0..STEP_LIMIT {
            if done(&self.machine) || self.machine.state().is_terminated() {
                return;
            }
            self.step().await;
        }
        panic!("arena did not settle within {} steps", STEP_LIMIT);
    }

    pub async fn run_to_end(&mut self) -> Outcome {
        for _ in 0..STEP_LIMIT {
            if let StepOutcome::Terminated(outcome) = self.step().await {
                return outcome;
            }
        }
        panic!("fight did not end within {} steps", STEP_LIMIT);
    }

    /// Submit ahead of a turn, draining any message it produced
    pub async fn submit(&mut self, actor: &str, intent: Intent) {
        self.machine
            .submit_intent(&EntityId::from(actor), intent)
            .expect("intent should be accepted");
        self.machine.output().drain().await;
    }

    pub fn entity(&self, id: &str) -> &CombatEntity {
        self.machine
            .ledger()
            .entity(&EntityId::from(id))
            .expect("entity should exist")
    }

    pub fn health(&self, id: &str) -> i32 {
        self.entity(id).pools.get(ResourceKind::Health).current
    }

    pub fn mana(&self, id: &str) -> i32 {
        self.entity(id).pools.get(ResourceKind::Mana).current
    }

    pub fn timeouts(&self) -> usize {
        self.reports.iter().map(|r| r.timeouts.len()).sum()
    }

    pub fn dropped(&self) -> usize {
        self.reports.iter().map(|r| r.dropped).sum()
    }
}

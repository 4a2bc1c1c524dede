//! Combat state machine
//!
//! A fight is driven from outside by repeated calls to
//! [`CombatMachine::advance`], each executing exactly one [`Step`]:
//!
//! ```text
//! STARTING -> [SURPRISE_CHECK -> SURPRISE_ATTACK -> SURPRISE_OUTCOME -> SURPRISE_END]
//!   -> ROLLING_INITIATIVE -> ROUND_STARTING -> AWAITING_PLAYER_INPUT | AWAITING_NPC_INTENT
//!   -> PROCESSING_ACTION -> RESOLVING_MECHANICS -> NARRATING_OUTCOME
//!   -> APPLYING_STATUS_EFFECTS -> ADVANCING_TURN -> (next turn or round)
//!   -> ENDING_COMBAT -> TERMINATED
//! ```
//!
//! A step either enqueues display events, which the caller drains before the
//! next call, or stops at an input wait. The machine never advances itself.

use std::fmt::Display;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, debug_span, error, info, warn, Instrument};

use super::action::{ActionCatalog, ActionResolver, CombatAction, FleeCheck, Intent, Resolution};
use super::dice::{DiceRoll, RngRoller, Roller};
use super::engine::{apply_periodic, EffectContext, EffectOutcome, EffectResult};
use super::entity::{CombatEntity, Controller, EntityId, StatKind, Team};
use super::initiative::roll_initiative;
use super::ledger::{ResourceLedger, RosterLedger, TimedModifier};
use super::rules::{RuleValidator, StandardRules};
use super::state::{CombatSnapshot, CombatState, Outcome, Step, SurpriseInfo};
use crate::config::CombatConfig;
use crate::error::{CombatError, ProviderError, Result, ValidationError};
use crate::output::{DisplayEvent, EventKind, Orchestrator};
use crate::providers::{
    fallback_intent, template_line, BattleView, DefaultNpc, IntentProvider, Narrator, TemplateNarrator,
};

/// Modifier source for the surprise-round defense penalty
const SURPRISE: &str = "surprise";
/// Modifier source for the failed-flee defense penalty
const FLEE_PENALTY: &str = "flee";

/// What one call to `advance` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A step ran; drain `events` before advancing again
    Advanced { step: Step, events: usize },
    /// A human has not answered yet; call again to keep waiting
    AwaitingInput { actor: EntityId },
    /// Display events from an earlier step are still queued
    Blocked { pending: usize },
    Terminated(Outcome),
}

/// Everything the machine talks to besides the ledger
pub struct Collaborators {
    pub roller: Box<dyn Roller>,
    pub rules: Box<dyn RuleValidator>,
    pub players: Arc<dyn IntentProvider>,
    pub npcs: Arc<dyn IntentProvider>,
    pub narrator: Arc<dyn Narrator>,
    pub output: Arc<Orchestrator>,
}

impl Collaborators {
    /// Standard rules, built-in NPCs and template narration
    ///
    /// The roller is seeded from `config.seed` when set.
    pub fn new(config: &CombatConfig, players: Arc<dyn IntentProvider>, output: Arc<Orchestrator>) -> Self {
        let roller: Box<dyn Roller> = match config.seed {
            Some(seed) => Box::new(RngRoller::seeded(seed)),
            None => Box::new(RngRoller::from_entropy()),
        };
        Self {
            roller,
            rules: Box::new(StandardRules),
            players,
            npcs: Arc::new(DefaultNpc),
            narrator: Arc::new(TemplateNarrator),
            output,
        }
    }

    pub fn with_roller(mut self, roller: impl Roller + 'static) -> Self {
        self.roller = Box::new(roller);
        self
    }

    pub fn with_rules(mut self, rules: impl RuleValidator + 'static) -> Self {
        self.rules = Box::new(rules);
        self
    }

    pub fn with_npcs(mut self, npcs: Arc<dyn IntentProvider>) -> Self {
        self.npcs = npcs;
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }
}

enum Flow {
    Continue,
    Wait(EntityId),
}

fn corrupt(context: impl Display) -> CombatError {
    error!("combat state corrupted: {}", context);
    CombatError::FatalStateCorruption(context.to_string())
}

/// Resumable turn-based combat over a [`ResourceLedger`]
pub struct CombatMachine<L: ResourceLedger> {
    state: CombatState,
    ledger: L,
    catalog: ActionCatalog,
    config: CombatConfig,
    roller: Box<dyn Roller>,
    rules: Box<dyn RuleValidator>,
    players: Arc<dyn IntentProvider>,
    npcs: Arc<dyn IntentProvider>,
    narrator: Arc<dyn Narrator>,
    output: Arc<Orchestrator>,
}

impl CombatMachine<RosterLedger> {
    /// Rebuild a machine from a snapshot taken at a step boundary
    pub fn restore(
        snapshot: CombatSnapshot,
        catalog: ActionCatalog,
        config: CombatConfig,
        mut collaborators: Collaborators,
    ) -> Result<Self> {
        if let Some(dice) = snapshot.dice {
            collaborators.roller.resume(dice);
        }
        let ledger = RosterLedger::new(snapshot.entities);
        Self::resume(snapshot.state, ledger, catalog, config, collaborators)
    }
}

impl<L: ResourceLedger> CombatMachine<L> {
    /// Set up a fight; the first `advance` runs the STARTING step
    pub fn start(
        ledger: L,
        catalog: ActionCatalog,
        config: CombatConfig,
        collaborators: Collaborators,
        surprise: Option<SurpriseInfo>,
    ) -> Result<Self> {
        config.validate()?;
        ledger.verify().map_err(CombatError::InvalidRoster)?;
        for team in [Team::Party, Team::Foes] {
            if !ledger.entities().iter().any(|e| e.team == team && e.is_active()) {
                return Err(CombatError::InvalidRoster(format!("no active {:?} members", team)));
            }
        }
        if let Some(surprise) = &surprise {
            if let Some(missing) = surprise.surprised.iter().find(|id| ledger.entity(id).is_none()) {
                return Err(CombatError::UnknownEntity(missing.clone()));
            }
        }

        let state = CombatState::new(surprise);
        info!(
            "combat {} starting with {} participants",
            state.id,
            ledger.entities().len()
        );
        Ok(Self::assemble(state, ledger, catalog, config, collaborators))
    }

    /// Continue a fight from a previously persisted state
    pub fn resume(
        state: CombatState,
        ledger: L,
        catalog: ActionCatalog,
        config: CombatConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        ledger.verify().map_err(corrupt)?;
        for id in &state.turn_order {
            if ledger.entity(id).is_none() {
                return Err(CombatError::UnknownEntity(id.clone()));
            }
        }
        info!("combat {} resumed at {} (round {})", state.id, state.step, state.round);
        Ok(Self::assemble(state, ledger, catalog, config, collaborators))
    }

    fn assemble(
        state: CombatState,
        ledger: L,
        catalog: ActionCatalog,
        config: CombatConfig,
        c: Collaborators,
    ) -> Self {
        Self {
            state,
            ledger,
            catalog,
            config,
            roller: c.roller,
            rules: c.rules,
            players: c.players,
            npcs: c.npcs,
            narrator: c.narrator,
            output: c.output,
        }
    }

    pub fn state(&self) -> &CombatState {
        &self.state
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn output(&self) -> &Arc<Orchestrator> {
        &self.output
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state.outcome
    }

    /// Capture state and entities; only valid when no events are pending
    pub fn snapshot(&self) -> Result<CombatSnapshot> {
        let pending = self.output.pending();
        if pending > 0 {
            return Err(CombatError::NotAtStepBoundary { pending });
        }
        Ok(CombatSnapshot {
            state: self.state.clone(),
            entities: self.ledger.snapshot(),
            dice: self.roller.state(),
        })
    }

    /// Hard abort: drop undelivered events, leave state at the last boundary
    pub fn abort(&self) -> usize {
        self.output.abort()
    }

    /// Submit an intent ahead of the actor's turn
    ///
    /// A surprised entity acting during the surprise round has its intent
    /// held until its first normal turn.
    pub fn submit_intent(&mut self, actor: &EntityId, intent: Intent) -> std::result::Result<(), ValidationError> {
        if self.state.is_terminated() || self.state.step == Step::EndingCombat {
            return Err(ValidationError::Illegal("the fight is over".to_string()));
        }
        let entity = self
            .ledger
            .entity(actor)
            .ok_or_else(|| ValidationError::UnknownTarget(actor.clone()))?;
        if !entity.is_active() {
            return Err(ValidationError::TargetDefeated(actor.clone()));
        }
        if self.state.is_caught_off_guard(actor) {
            let text = format!(
                "{} is caught off guard; the action will happen once the surprise round ends.",
                entity.name
            );
            debug!("deferring intent from surprised {}", actor);
            self.emit(DisplayEvent::system(text));
        }
        self.state.deferred.insert(actor.clone(), intent);
        Ok(())
    }

    /// Execute exactly one step
    pub async fn advance(&mut self) -> Result<StepOutcome> {
        if self.state.is_terminated() {
            let outcome = self
                .state
                .outcome
                .ok_or_else(|| corrupt("terminated without an outcome"))?;
            return Ok(StepOutcome::Terminated(outcome));
        }
        let pending = self.output.pending();
        if pending > 0 {
            return Ok(StepOutcome::Blocked { pending });
        }
        let span = debug_span!(
            "advance",
            combat = %self.state.id,
            round = self.state.round,
            step = %self.state.step
        );
        self.step().instrument(span).await
    }

    /// Drive the fight to its end, draining output between steps
    pub async fn run(&mut self) -> Result<Outcome> {
        loop {
            let outcome = self.advance().await?;
            self.output.drain().await;
            if let StepOutcome::Terminated(outcome) = outcome {
                return Ok(outcome);
            }
        }
    }

    async fn step(&mut self) -> Result<StepOutcome> {
        let step = self.state.step;
        let flow = match step {
            Step::Starting => self.on_starting(),
            Step::SurpriseCheck => self.on_surprise_check(),
            Step::SurpriseAttack => self.begin_turn(Step::SurpriseOutcome),
            Step::SurpriseOutcome => self.on_surprise_outcome(),
            Step::SurpriseEnd => self.on_surprise_end(),
            Step::RollingInitiative => self.on_rolling_initiative(),
            Step::RoundStarting => self.on_round_starting(),
            Step::AwaitingPlayerInput => self.on_player_input().await,
            Step::AwaitingNpcIntent => self.on_npc_intent().await,
            Step::ProcessingAction => self.on_processing_action(),
            Step::ResolvingMechanics => self.on_resolving(),
            Step::NarratingOutcome => self.on_narrating().await,
            Step::ApplyingStatusEffects => self.on_applying_statuses(),
            Step::AdvancingTurn => self.on_advancing_turn(),
            Step::EndingCombat => self.on_ending(),
            Step::Terminated => Ok(Flow::Continue),
        }?;

        if let Flow::Wait(actor) = flow {
            return Ok(StepOutcome::AwaitingInput { actor });
        }
        if step != self.state.step {
            debug!("{} -> {}", step, self.state.step);
        }
        if self.state.is_terminated() {
            let outcome = self
                .state
                .outcome
                .ok_or_else(|| corrupt("terminated without an outcome"))?;
            return Ok(StepOutcome::Terminated(outcome));
        }
        Ok(StepOutcome::Advanced {
            step,
            events: self.output.pending(),
        })
    }

    fn emit(&self, event: DisplayEvent) -> u64 {
        self.output.enqueue(event)
    }

    fn name_of(&self, id: &EntityId) -> String {
        self.ledger
            .entity(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn current_actor(&self) -> Result<EntityId> {
        self.state
            .current_actor()
            .cloned()
            .ok_or_else(|| corrupt(format!("no actor at turn index {}", self.state.active_index)))
    }

    fn view(&self, actor: &EntityId) -> Result<BattleView> {
        BattleView::build(&self.ledger, self.state.round, actor)
            .ok_or_else(|| CombatError::UnknownEntity(actor.clone()))
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state.outcome = Some(outcome);
        self.state.step = Step::EndingCombat;
    }

    fn on_starting(&mut self) -> Result<Flow> {
        let participants: Vec<Value> = self
            .ledger
            .entities()
            .iter()
            .map(|e| json!({ "id": e.id, "name": e.name, "team": e.team }))
            .collect();
        self.emit(
            DisplayEvent::log(
                EventKind::CombatStart,
                json!({ "combat": self.state.id, "participants": participants }),
            )
            .narrated(),
        );
        let ambush = self
            .state
            .surprise
            .as_ref()
            .is_some_and(|s| !s.surprised.is_empty());
        self.state.step = if ambush {
            Step::SurpriseCheck
        } else {
            Step::RollingInitiative
        };
        Ok(Flow::Continue)
    }

    fn on_surprise_check(&mut self) -> Result<Flow> {
        let Some(surprise) = self.state.surprise.clone() else {
            self.state.step = Step::RollingInitiative;
            return Ok(Flow::Continue);
        };

        let penalty = -self.config.surprise_penalty;
        for id in &surprise.surprised {
            self.ledger
                .add_modifier(id, TimedModifier::stat(SURPRISE, StatKind::Defense, penalty, None))
                .map_err(corrupt)?;
        }

        let rolls = roll_initiative(
            &self.ledger,
            self.roller.as_mut(),
            self.config.initiative_die,
            Some(surprise.initiating),
        );
        self.state.turn_order = rolls.iter().map(|r| r.entity.clone()).collect();
        self.state.initiative = rolls;
        self.state.active_index = 0;
        self.state.in_surprise_round = true;

        let surprised: Vec<String> = surprise.surprised.iter().map(|id| self.name_of(id)).collect();
        info!("surprise round: {:?} ambush {:?}", surprise.initiating, surprised);
        self.emit(
            DisplayEvent::log(
                EventKind::Surprise,
                json!({
                    "initiating": surprise.initiating,
                    "surprised": surprise.surprised,
                    "names": surprised,
                    "order": self.state.turn_order,
                }),
            )
            .narrated(),
        );
        self.state.step = Step::SurpriseAttack;
        Ok(Flow::Continue)
    }

    fn on_surprise_outcome(&mut self) -> Result<Flow> {
        self.emit(DisplayEvent::log(
            EventKind::SurpriseOver,
            json!({ "defeated": self.state.defeated }),
        ));
        match self.check_termination() {
            Some(outcome) => self.finish(outcome),
            None => self.state.step = Step::SurpriseEnd,
        }
        Ok(Flow::Continue)
    }

    fn on_surprise_end(&mut self) -> Result<Flow> {
        let surprised = self
            .state
            .surprise
            .as_ref()
            .map(|s| s.surprised.clone())
            .unwrap_or_default();
        for id in &surprised {
            self.ledger.remove_modifier(id, SURPRISE).map_err(corrupt)?;
        }
        self.state.in_surprise_round = false;
        self.emit(DisplayEvent::system("The surprise round is over."));
        self.state.step = Step::RollingInitiative;
        Ok(Flow::Continue)
    }

    fn on_rolling_initiative(&mut self) -> Result<Flow> {
        if let Some(outcome) = self.check_termination() {
            self.finish(outcome);
            return Ok(Flow::Continue);
        }
        let rolls = roll_initiative(&self.ledger, self.roller.as_mut(), self.config.initiative_die, None);
        self.state.turn_order = rolls.iter().map(|r| r.entity.clone()).collect();
        let order: Vec<Value> = rolls
            .iter()
            .map(|r| json!({ "entity": r.entity, "name": self.name_of(&r.entity), "total": r.total }))
            .collect();
        self.state.initiative = rolls;
        self.emit(DisplayEvent::log(
            EventKind::Initiative,
            json!({ "round": self.state.round + 1, "order": order }),
        ));
        self.state.step = Step::RoundStarting;
        Ok(Flow::Continue)
    }

    fn on_round_starting(&mut self) -> Result<Flow> {
        self.state.round += 1;
        self.state.active_index = 0;
        for (id, modifier) in self.ledger.tick_modifiers() {
            debug!("{} modifier on {} wears off", modifier.source, id);
            self.emit(
                DisplayEvent::log(
                    EventKind::StatusExpired,
                    json!({ "entity": id, "status": modifier.source }),
                )
                .paced(false),
            );
        }
        info!("round {} begins", self.state.round);
        self.emit(DisplayEvent::log(
            EventKind::RoundStart,
            json!({ "round": self.state.round }),
        ));
        self.begin_turn(Step::RollingInitiative)
    }

    /// Start the turn of the first active entity at or after `active_index`
    ///
    /// Falls through to `exhausted` when the order runs out.
    fn begin_turn(&mut self, exhausted: Step) -> Result<Flow> {
        while let Some(actor) = self.state.current_actor().cloned() {
            let Some(entity) = self.ledger.entity(&actor) else {
                return Err(corrupt(format!("{} is in the turn order but not the ledger", actor)));
            };
            if !entity.is_active() {
                self.state.active_index += 1;
                continue;
            }
            let name = entity.name.clone();
            let controller = entity.controller;
            let can_act = entity.can_act();

            self.emit(DisplayEvent::log(
                EventKind::TurnStart,
                json!({ "entity": actor, "name": name, "round": self.state.round }),
            ));

            if !can_act || self.state.is_caught_off_guard(&actor) {
                debug!("{} loses the turn", actor);
                self.emit(DisplayEvent::log(
                    EventKind::TurnSkipped,
                    json!({ "entity": actor, "text": format!("{} cannot act.", name) }),
                ));
                self.state.step = Step::ApplyingStatusEffects;
                return Ok(Flow::Continue);
            }

            self.state.step = match controller {
                Controller::Player => Step::AwaitingPlayerInput,
                Controller::Npc => Step::AwaitingNpcIntent,
            };
            return Ok(Flow::Continue);
        }
        self.state.step = exhausted;
        Ok(Flow::Continue)
    }

    fn bind_and_validate(&self, actor: &EntityId, intent: Intent) -> std::result::Result<CombatAction, ValidationError> {
        let entity = self
            .ledger
            .entity(actor)
            .ok_or_else(|| ValidationError::UnknownTarget(actor.clone()))?;
        let action = CombatAction::bind(intent, entity, &self.catalog);
        self.rules
            .validate(&action, entity, &self.ledger, &self.catalog)
            .into_result()?;
        Ok(action)
    }

    async fn on_player_input(&mut self) -> Result<Flow> {
        let actor = self.current_actor()?;
        let intent = match self.state.deferred.remove(&actor) {
            Some(intent) => intent,
            None => {
                let view = self.view(&actor)?;
                let provider = self.players.clone();
                let request = provider.get_intent(&actor, &view);
                let answer = match self.config.player_intent_timeout() {
                    Some(limit) => timeout(limit, request)
                        .await
                        .unwrap_or(Err(ProviderError::Timeout(limit))),
                    None => request.await,
                };
                match answer {
                    Ok(intent) => intent,
                    Err(ProviderError::Malformed(err)) => {
                        self.emit(DisplayEvent::system(format!("Could not use that: {}. Choose again.", err)));
                        return Ok(Flow::Continue);
                    }
                    Err(err) => {
                        debug!("no input from {} yet: {}", actor, err);
                        return Ok(Flow::Wait(actor));
                    }
                }
            }
        };

        match self.bind_and_validate(&actor, intent) {
            Ok(action) => {
                self.state.pending_action = Some(action);
                self.state.step = Step::ProcessingAction;
            }
            Err(err) => {
                debug!("rejected intent from {}: {}", actor, err);
                self.emit(DisplayEvent::system(format!("{}. Choose again.", err)));
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_npc_intent(&mut self) -> Result<Flow> {
        let actor = self.current_actor()?;
        let view = self.view(&actor)?;
        let proposed = match self.state.deferred.remove(&actor) {
            Some(intent) => Some(intent),
            None => {
                let provider = self.npcs.clone();
                let limit = self.config.intent_timeout();
                match timeout(limit, provider.get_intent(&actor, &view)).await {
                    Ok(Ok(intent)) => Some(intent),
                    Ok(Err(err)) => {
                        warn!("intent provider failed for {}: {}", actor, err);
                        None
                    }
                    Err(_) => {
                        warn!("intent provider for {} timed out after {:?}", actor, limit);
                        None
                    }
                }
            }
        };

        let action = match proposed.map(|intent| self.bind_and_validate(&actor, intent)) {
            Some(Ok(action)) => action,
            other => {
                if let Some(Err(err)) = other {
                    warn!("{} proposed an illegal action: {}", actor, err);
                }
                self.bind_and_validate(&actor, fallback_intent(&view))
                    .unwrap_or(CombatAction::Pass { actor: actor.clone() })
            }
        };
        self.state.pending_action = Some(action);
        self.state.step = Step::ProcessingAction;
        Ok(Flow::Continue)
    }

    fn on_processing_action(&mut self) -> Result<Flow> {
        let action = self
            .state
            .pending_action
            .clone()
            .ok_or_else(|| corrupt("processing without a pending action"))?;
        let actor = action.actor();
        let targets: Vec<String> = action.targets().iter().map(|t| self.name_of(t)).collect();
        self.emit(DisplayEvent::log(
            EventKind::ActionDeclared,
            json!({
                "actor": actor,
                "name": self.name_of(actor),
                "action": action,
                "label": action.label(),
                "targets": targets,
            }),
        ));
        self.state.step = Step::ResolvingMechanics;
        Ok(Flow::Continue)
    }

    fn on_resolving(&mut self) -> Result<Flow> {
        let action = self
            .state
            .pending_action
            .clone()
            .ok_or_else(|| corrupt("resolving without a pending action"))?;
        let actor = action.actor().clone();

        let resolution = match &action {
            CombatAction::Flee { .. } => self.resolve_flee(&actor)?,
            CombatAction::Surrender { .. } => {
                info!("{} surrenders", actor);
                self.emit(
                    DisplayEvent::log(
                        EventKind::Surrendered,
                        json!({ "entity": actor, "name": self.name_of(&actor) }),
                    )
                    .narrated(),
                );
                self.state.outcome = Some(Outcome::Surrendered);
                Resolution::default()
            }
            _ => {
                let resolver = ActionResolver::new(&self.catalog);
                let mut ctx = EffectContext {
                    ledger: &mut self.ledger,
                    roller: self.roller.as_mut(),
                    config: &self.config,
                };
                match resolver.resolve(&action, &mut ctx) {
                    Ok(resolution) => resolution,
                    Err(err) => {
                        warn!("{} by {} could not be resolved: {}", action.label(), actor, err);
                        self.emit(DisplayEvent::system("The action fizzles."));
                        Resolution::default()
                    }
                }
            }
        };

        self.emit_resolution(&actor, &action, &resolution);
        self.ledger.verify().map_err(corrupt)?;

        if self.state.outcome.is_none() {
            self.state.outcome = self.check_termination();
        }
        self.state.last_result = Some(resolution);
        self.state.step = Step::NarratingOutcome;
        Ok(Flow::Continue)
    }

    fn resolve_flee(&mut self, actor: &EntityId) -> Result<Resolution> {
        let team = self
            .ledger
            .entity(actor)
            .map(|e| e.team)
            .ok_or_else(|| corrupt(format!("fleeing entity {} vanished", actor)))?;
        let opponents: Vec<&CombatEntity> = self
            .ledger
            .entities()
            .into_iter()
            .filter(|e| e.team != team && e.is_active())
            .collect();

        // Highest initiative this round, else highest initiative stat
        let opponent = self
            .state
            .initiative
            .iter()
            .find(|r| opponents.iter().any(|o| o.id == r.entity))
            .map(|r| r.entity.clone())
            .or_else(|| {
                opponents
                    .iter()
                    .copied()
                    .fold(None::<&CombatEntity>, |best, e| match best {
                        Some(b) if b.stats.initiative >= e.stats.initiative => Some(b),
                        _ => Some(e),
                    })
                    .map(|e| e.id.clone())
            });
        let crowd = self.config.flee_enemy_bonus * (opponents.len() as i32 - 1).max(0);

        let die = DiceRoll::new(1, self.config.flee_die, 0);
        let escape = self.ledger.stat(actor, StatKind::Escape).map_err(corrupt)?;
        let roll = escape + die.roll(self.roller.as_mut());
        let against = match &opponent {
            Some(opponent) => {
                let stat = self.ledger.stat(opponent, StatKind::Escape).map_err(corrupt)?;
                stat + die.roll(self.roller.as_mut()) + crowd
            }
            None => i32::MIN,
        };
        let check = FleeCheck::new(opponent, roll, against);

        let name = self.name_of(actor);
        self.emit(DisplayEvent::log(
            EventKind::FleeAttempt,
            json!({
                "entity": actor,
                "name": name,
                "roll": check.roll,
                "against": check.against,
                "opponent": check.opponent,
                "success": check.success,
            }),
        ));

        if check.success {
            info!("{} flees ({} vs {})", actor, check.roll, check.against);
            self.ledger.mark_fled(actor).map_err(corrupt)?;
            self.emit(DisplayEvent::log(EventKind::Fled, json!({ "entity": actor, "name": name })).narrated());
        } else {
            debug!("{} fails to flee ({} vs {})", actor, check.roll, check.against);
            self.ledger
                .add_modifier(
                    actor,
                    TimedModifier::stat(
                        FLEE_PENALTY,
                        StatKind::Defense,
                        -self.config.flee_failure_penalty,
                        Some(1),
                    ),
                )
                .map_err(corrupt)?;
        }

        Ok(Resolution {
            flee: Some(check),
            ..Resolution::default()
        })
    }

    fn emit_resolution(&mut self, actor: &EntityId, action: &CombatAction, resolution: &Resolution) {
        for cost in &resolution.costs {
            if cost.before != cost.after {
                let max = self
                    .ledger
                    .resource(actor, cost.resource)
                    .map(|p| p.max)
                    .unwrap_or(cost.before);
                self.emit(DisplayEvent::bar_pending(
                    actor,
                    cost.resource,
                    cost.before,
                    cost.after - cost.before,
                    max,
                ));
                self.emit(DisplayEvent::bar_commit(actor, cost.resource, cost.after, max));
            }
        }

        if let Some(reason) = &resolution.wasted {
            info!("{} wastes the turn: {}", actor, reason);
            self.emit(DisplayEvent::system(format!("{}: {}.", self.name_of(actor), reason)));
            return;
        }

        let label = action.label();
        for result in &resolution.results {
            self.emit(DisplayEvent::log(
                EventKind::ActionResult,
                json!({
                    "actor": actor,
                    "action": label,
                    "attack": resolution.attack,
                    "result": result,
                }),
            ));
            self.emit_effect(result);
        }
    }

    fn emit_effect(&mut self, result: &EffectResult) {
        if let Some(resource) = result.resource {
            if result.before != result.after {
                let max = self
                    .ledger
                    .resource(&result.target, resource)
                    .map(|p| p.max)
                    .unwrap_or(result.before.max(result.after));
                self.emit(DisplayEvent::bar_pending(
                    &result.target,
                    resource,
                    result.before,
                    result.after - result.before,
                    max,
                ));
                self.emit(DisplayEvent::bar_commit(&result.target, resource, result.after, max));
            }
        }
        match &result.outcome {
            EffectOutcome::StatusApplied { name }
            | EffectOutcome::StatusRefreshed { name }
            | EffectOutcome::StatusReplaced { name, .. } => {
                self.emit(DisplayEvent::log(
                    EventKind::StatusApplied,
                    json!({ "entity": result.target, "status": name }),
                ));
            }
            _ => {}
        }
        if result.defeated {
            self.on_defeated(&result.target);
        }
    }

    fn on_defeated(&mut self, id: &EntityId) {
        if self.state.defeated.contains(id) {
            return;
        }
        let name = self.name_of(id);
        info!("{} is defeated", name);
        self.state.defeated.push(id.clone());
        self.emit(DisplayEvent::log(EventKind::Defeated, json!({ "entity": id, "name": name })));
    }

    /// Party-perspective outcome once a side has nobody left standing
    fn check_termination(&self) -> Option<Outcome> {
        let entities = self.ledger.entities();
        let active = |team: Team| entities.iter().filter(|e| e.team == team && e.is_active()).count();
        if active(Team::Party) == 0 {
            let escaped = entities
                .iter()
                .any(|e| e.team == Team::Party && e.fled && e.is_alive());
            return Some(if escaped { Outcome::Fled } else { Outcome::Defeat });
        }
        if active(Team::Foes) == 0 {
            return Some(Outcome::Victory);
        }
        None
    }

    fn narration_summary(&self, action: &CombatAction, resolution: &Resolution) -> Value {
        let effects: Vec<Value> = resolution
            .results
            .iter()
            .map(|r| {
                let mut effect = serde_json::to_value(&r.outcome).unwrap_or(Value::Null);
                if let Value::Object(map) = &mut effect {
                    map.insert("target".to_string(), json!(self.name_of(&r.target)));
                    map.insert("amount".to_string(), json!(r.amount));
                    map.insert("critical".to_string(), json!(r.critical));
                    map.insert("defeated".to_string(), json!(r.defeated));
                }
                effect
            })
            .collect();
        json!({
            "actor": self.name_of(action.actor()),
            "action": action.label(),
            "wasted": resolution.wasted,
            "fled": resolution.flee.as_ref().map(|f| f.success),
            "effects": effects,
        })
    }

    async fn on_narrating(&mut self) -> Result<Flow> {
        if let (Some(action), Some(resolution)) = (&self.state.pending_action, &self.state.last_result) {
            let summary = self.narration_summary(action, resolution);
            let narrator = self.narrator.clone();
            let limit = self.config.narration_timeout();
            let text = match timeout(limit, narrator.narrate(EventKind::ActionResult, &summary)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => text,
                Ok(Ok(_)) => template_line(EventKind::ActionResult, &summary),
                Ok(Err(err)) => {
                    warn!("narrator failed: {}", err);
                    template_line(EventKind::ActionResult, &summary)
                }
                Err(_) => {
                    warn!("narrator timed out after {:?}", limit);
                    template_line(EventKind::ActionResult, &summary)
                }
            };
            self.emit(DisplayEvent::narration(text, EventKind::ActionResult));
        }
        self.state.pending_action = None;
        self.state.step = if self.state.outcome.is_some() {
            Step::EndingCombat
        } else {
            Step::ApplyingStatusEffects
        };
        Ok(Flow::Continue)
    }

    fn on_applying_statuses(&mut self) -> Result<Flow> {
        let actor = self.current_actor()?;
        let active = self.ledger.entity(&actor).is_some_and(|e| e.is_active());
        if active {
            let ticks = self.ledger.tick_statuses(&actor).map_err(corrupt)?;
            for tick in ticks {
                if let Some(periodic) = tick.periodic {
                    let mut ctx = EffectContext {
                        ledger: &mut self.ledger,
                        roller: self.roller.as_mut(),
                        config: &self.config,
                    };
                    match apply_periodic(&actor, periodic, &mut ctx) {
                        Ok(result) => {
                            self.emit(DisplayEvent::log(
                                EventKind::StatusTick,
                                json!({ "entity": actor, "status": tick.name, "result": result }),
                            ));
                            self.emit_effect(&result);
                        }
                        Err(err) => warn!("{} tick on {} failed: {}", tick.name, actor, err),
                    }
                }
                if tick.expired {
                    self.emit(DisplayEvent::log(
                        EventKind::StatusExpired,
                        json!({ "entity": actor, "status": tick.name }),
                    ));
                }
            }
            self.ledger.verify().map_err(corrupt)?;
            if self.state.outcome.is_none() {
                self.state.outcome = self.check_termination();
            }
        }
        self.state.step = if self.state.outcome.is_some() {
            Step::EndingCombat
        } else {
            Step::AdvancingTurn
        };
        Ok(Flow::Continue)
    }

    fn on_advancing_turn(&mut self) -> Result<Flow> {
        self.state.active_index += 1;
        let exhausted = if self.state.in_surprise_round {
            Step::SurpriseOutcome
        } else {
            Step::RollingInitiative
        };
        self.begin_turn(exhausted)
    }

    fn on_ending(&mut self) -> Result<Flow> {
        let outcome = self
            .state
            .outcome
            .ok_or_else(|| corrupt("ending combat without an outcome"))?;
        self.emit(
            DisplayEvent::log(
                EventKind::CombatEnd,
                json!({
                    "outcome": outcome,
                    "rounds": self.state.round,
                    "defeated": self.state.defeated,
                }),
            )
            .narrated(),
        );
        self.ledger.discard_combat_state();
        self.state.deferred.clear();
        info!(
            "combat {} ended in {} after {} rounds",
            self.state.id, outcome, self.state.round
        );
        self.state.step = Step::Terminated;
        Ok(Flow::Continue)
    }
}

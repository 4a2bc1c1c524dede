//! Replay providers for tests, demos and recorded sessions

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{BattleView, IntentProvider, Narrator};
use crate::combat::{EntityId, Intent};
use crate::error::ProviderError;
use crate::output::EventKind;

/// Hands out queued intents per actor; `Pass` once an actor's queue is empty
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<EntityId, VecDeque<Result<Intent, ProviderError>>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with(self, actor: &str, intents: impl IntoIterator<Item = Intent>) -> Self {
        self.push(actor, intents);
        self
    }

    pub fn push(&self, actor: &str, intents: impl IntoIterator<Item = Intent>) {
        self.queues
            .lock()
            .entry(EntityId::from(actor))
            .or_default()
            .extend(intents.into_iter().map(Ok));
    }

    /// Queue a failure for the actor's next request
    pub fn push_error(&self, actor: &str, err: ProviderError) {
        self.queues
            .lock()
            .entry(EntityId::from(actor))
            .or_default()
            .push_back(Err(err));
    }

    pub fn remaining(&self, actor: &str) -> usize {
        self.queues
            .lock()
            .get(&EntityId::from(actor))
            .map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl IntentProvider for ScriptedProvider {
    async fn get_intent(&self, actor: &EntityId, _view: &BattleView) -> Result<Intent, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.queues.lock().get_mut(actor).and_then(VecDeque::pop_front);
        next.unwrap_or(Ok(Intent::Pass))
    }
}

/// Narrator with a fixed reply, optional latency and optional failure
#[derive(Debug, Clone)]
pub struct ScriptedNarrator {
    reply: Option<String>,
    delay: Duration,
}

impl ScriptedNarrator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            delay: Duration::ZERO,
        }
    }

    /// Always fails with `Unavailable`
    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(&self, _kind: EventKind, _summary: &Value) -> Result<String, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("narrator offline".to_string()))
    }
}

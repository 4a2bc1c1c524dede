//! Output orchestration
//!
//! The [`Orchestrator`] sits between the synchronous state machine and
//! asynchronous renderers:
//! - a strict FIFO of [`DisplayEvent`]s, never reordered or coalesced
//! - per-event dispatch to the event's channel sink
//! - concurrent wait for the render ack and, for narrated events, the
//!   playback ack, each bounded by a timeout
//! - a pacing delay after acknowledged events
//!
//! Event N+1 is never dispatched before event N has finished.

mod event;
mod sink;

pub use event::{BarPhase, Channel, DisplayEvent, EventKind};
pub use sink::{Ack, ChannelSink, EventSink, LogSink};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::CombatConfig;

/// Which acknowledgment an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckSource {
    Render,
    Playback,
}

/// An ack that did not arrive in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckTimeout {
    pub event: u64,
    pub kind: EventKind,
    pub source: AckSource,
}

/// Summary of one drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub dispatched: usize,
    pub timeouts: Vec<AckTimeout>,
    /// Acks dropped by a sink without firing
    pub dropped: usize,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.timeouts.is_empty() && self.dropped == 0
    }

    fn merge(&mut self, other: DrainReport) {
        self.dispatched += other.dispatched;
        self.timeouts.extend(other.timeouts);
        self.dropped += other.dropped;
    }
}

/// Marks one event as being delivered until dropped, so a drain future
/// cancelled mid-delivery does not leave the orchestrator looking busy
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // abort() may already have reset the count
        let _ = self.0.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

enum AckStatus {
    Acked,
    TimedOut,
    Dropped,
}

/// FIFO event queue with acknowledged, paced delivery
pub struct Orchestrator {
    queue: Mutex<VecDeque<DisplayEvent>>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    sinks: HashMap<Channel, Arc<dyn EventSink>>,
    fallback: Arc<dyn EventSink>,
    playback: Option<Arc<dyn EventSink>>,
    pacing: Duration,
    ack_timeout: Duration,
}

impl Orchestrator {
    pub fn new(pacing: Duration, ack_timeout: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            sinks: HashMap::new(),
            fallback: Arc::new(LogSink),
            playback: None,
            pacing,
            ack_timeout,
        }
    }

    pub fn from_config(config: &CombatConfig) -> Self {
        Self::new(config.pacing(), config.ack_timeout())
    }

    /// Route one channel to a sink
    pub fn with_sink(mut self, channel: Channel, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.insert(channel, sink);
        self
    }

    /// Sink for channels without a dedicated one (defaults to [`LogSink`])
    pub fn with_fallback(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.fallback = sink;
        self
    }

    /// Playback endpoint for narration-eligible events
    pub fn with_playback(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.playback = Some(sink);
        self
    }

    /// Append an event; returns its id
    pub fn enqueue(&self, mut event: DisplayEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        event.id = id;
        debug!("enqueue #{} {}", id, event.kind);
        self.queue.lock().push_back(event);
        id
    }

    /// Queued events plus the one being delivered, if any
    pub fn pending(&self) -> usize {
        self.queue.lock().len() + self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Discard everything not yet dispatched and forget any event a
    /// cancelled drain left half delivered; returns how many were dropped
    pub fn abort(&self) -> usize {
        let dropped = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        self.in_flight.store(0, Ordering::SeqCst);
        if dropped > 0 {
            warn!("output aborted with {} events undelivered", dropped);
        }
        dropped
    }

    /// Deliver queued events in order until the queue is empty
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some((event, _flight)) = self.pop() {
            report.merge(self.deliver(event).await);
        }
        report
    }

    fn pop(&self) -> Option<(DisplayEvent, InFlight<'_>)> {
        let mut queue = self.queue.lock();
        let event = queue.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some((event, InFlight(&self.in_flight)))
    }

    async fn deliver(&self, event: DisplayEvent) -> DrainReport {
        let mut report = DrainReport {
            dispatched: 1,
            ..DrainReport::default()
        };
        let id = event.id;
        let kind = event.kind;
        let pace = event.needs_pacing();

        let sink = self.sinks.get(&event.channel).unwrap_or(&self.fallback).clone();
        let playback_rx = match (&self.playback, event.narration_eligible) {
            (Some(playback), true) => {
                let (ack, rx) = Ack::pair();
                playback.dispatch(event.clone(), ack);
                Some(rx)
            }
            _ => None,
        };
        let (ack, render_rx) = Ack::pair();
        sink.dispatch(event, ack);

        let playback = async {
            match playback_rx {
                Some(rx) => Some(self.wait(rx).await),
                None => None,
            }
        };
        let (render, playback) = tokio::join!(self.wait(render_rx), playback);

        for (source, status) in [(AckSource::Render, Some(render)), (AckSource::Playback, playback)] {
            match status {
                Some(AckStatus::TimedOut) => {
                    warn!("{:?} ack for event #{} ({}) timed out", source, id, kind);
                    report.timeouts.push(AckTimeout {
                        event: id,
                        kind,
                        source,
                    });
                }
                Some(AckStatus::Dropped) => {
                    warn!("{:?} ack for event #{} ({}) dropped", source, id, kind);
                    report.dropped += 1;
                }
                Some(AckStatus::Acked) | None => {}
            }
        }

        if pace && !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
        report
    }

    async fn wait(&self, rx: oneshot::Receiver<()>) -> AckStatus {
        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(())) => AckStatus::Acked,
            Ok(Err(_)) => AckStatus::Dropped,
            Err(_) => AckStatus::TimedOut,
        }
    }
}

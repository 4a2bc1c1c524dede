//! RecordingSink - timestamped renderer double

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use skirmish::output::{Ack, BarPhase, DisplayEvent, EventKind, EventSink};
use tokio::time::Instant;

/// One dispatched event and when it was acknowledged
#[derive(Debug, Clone)]
pub struct Record {
    pub event: DisplayEvent,
    pub dispatched: Instant,
    pub acked: Option<Instant>,
}

impl Record {
    pub fn kind(&self) -> EventKind {
        self.event.kind
    }

    pub fn phase(&self) -> Option<BarPhase> {
        self.event.phase
    }

    pub fn entity(&self) -> Option<&str> {
        self.event.payload.get("entity").and_then(|v| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.event.text()
    }
}

/// Acks every event after a fixed delay, or never when muted
pub struct RecordingSink {
    delay: Duration,
    muted: bool,
    records: Arc<Mutex<Vec<Record>>>,
}

impl RecordingSink {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            muted: false,
            records: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Never acknowledges; acks are dropped after `delay`
    pub fn muted(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            muted: true,
            records: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.records.lock().iter().map(Record::kind).collect()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<Record> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    /// Texts of every event that carries one
    pub fn texts(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| r.text().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&self, event: DisplayEvent, ack: Ack) {
        let index = {
            let mut records = self.records.lock();
            records.push(Record {
                event,
                dispatched: Instant::now(),
                acked: None,
            });
            records.len() - 1
        };
        let records = self.records.clone();
        let delay = self.delay;
        let muted = self.muted;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if muted {
                drop(ack);
                return;
            }
            if let Some(record) = records.lock().get_mut(index) {
                record.acked = Some(Instant::now());
            }
            ack.ack();
        });
    }
}

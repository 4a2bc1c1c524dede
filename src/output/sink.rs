//! Renderer endpoints
//!
//! A sink receives each event together with an [`Ack`] it must fire once the
//! event has been rendered (or played back). Dropping the ack unfired counts
//! as a failed render; the orchestrator moves on either way.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::event::DisplayEvent;

/// One-shot render acknowledgment
#[derive(Debug)]
pub struct Ack {
    tx: oneshot::Sender<()>,
}

impl Ack {
    pub(crate) fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Signal that the event has been shown
    pub fn ack(self) {
        // Receiver gone means the orchestrator already gave up waiting
        let _ = self.tx.send(());
    }
}

/// Something that displays events
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: DisplayEvent, ack: Ack);
}

/// Renders to the tracing log and acknowledges immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn dispatch(&self, event: DisplayEvent, ack: Ack) {
        match event.text() {
            Some(text) => info!(target: "skirmish::render", "[{}] {}", event.kind, text),
            None => info!(target: "skirmish::render", "[{}] {}", event.kind, event.payload),
        }
        ack.ack();
    }
}

/// Forwards events to an async renderer task over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(DisplayEvent, Ack)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(DisplayEvent, Ack)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn dispatch(&self, event: DisplayEvent, ack: Ack) {
        if self.tx.send((event, ack)).is_err() {
            debug!("renderer channel closed; event dropped");
        }
    }
}

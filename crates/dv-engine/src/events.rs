//! Player event stream.

use crossbeam::channel::{self, Receiver, Sender};
use dv_ir::PlaybackState;

/// Notifications published by the player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayerEvent {
    /// Normalized playhead position in `[0, 1]`
    PositionChanged(f64),
    StateChanged(PlaybackState),
}

/// Fan-out of player events to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlayerEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every subscriber, dropping those whose receiver is gone.
    pub fn publish(&mut self, event: PlayerEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

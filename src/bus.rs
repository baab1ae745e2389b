//! Best-effort broadcast of per-frame results to any number of observers.
//!
//! Each subscriber gets its own unbounded channel. A subscriber that went
//! away (receiver dropped) is silently removed on the next broadcast; one
//! dead observer never blocks the others.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::event::Event;
use crate::tracker::TrackedPerson;

/// Messages fanned out to stream observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Tracking {
        frame_number: u64,
        tracks: Vec<TrackedPerson>,
    },
    Alert(Event),
    Error {
        message: String,
    },
}

/// Fan-out hub for one session's stream of messages.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<StreamMessage>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer and return its receiving end.
    pub fn subscribe(&mut self) -> Receiver<StreamMessage> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver a message to every live observer, dropping the dead ones.
    pub fn broadcast(&mut self, message: StreamMessage) {
        self.subscribers
            .retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

//! Change notifications for renderers and other observers

use crate::source::Generation;
use std::ops::Range;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrowEvent {
    RefreshStarted { generation: Generation },

    /// Rows in `rows` were added or replaced
    ItemsUpdated {
        generation: Generation,
        rows: Range<usize>,
    },

    /// Refresh complete; `count` normal items
    ItemsFinalized { generation: Generation, count: usize },

    SelectionChanged { row: usize },

    Warning { message: String },
}

/// Broadcast fan-out of [`NarrowEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NarrowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NarrowEvent> {
        self.sender.subscribe()
    }

    /// Deliver to current subscribers; no subscribers is fine
    pub fn emit(&self, event: NarrowEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

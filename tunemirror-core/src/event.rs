use crate::model::ItemType;
use crate::player::PlayerStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events that can be emitted by any component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Playback events
    StatusChanged(PlayerStatus),

    // Queue events
    QueueChanged { length: usize },
    HistoryChanged { length: usize },

    // Cache events
    CacheUpdated { item_type: ItemType, count: usize },
    SyncFinished,

    // Supervisor events
    TaskFailed(String),
}

/// Broadcast bus consumed by UI and media-control exporters.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn emit(&self, event: Event) {
        // Ignore errors - means no subscribers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

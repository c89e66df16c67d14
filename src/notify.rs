use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{ConflictReport, Event};

const CHANNEL_CAPACITY: usize = 256;

/// What subscribers of a semester channel receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A committed change to the semester.
    Committed(Event),
    /// A schedule was committed under the warn policy despite these conflicts.
    ConflictsAccepted { schedule_id: Ulid, report: ConflictReport },
}

/// Broadcast hub, one channel per semester.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notice>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a semester. Creates the channel if needed.
    pub fn subscribe(&self, semester_id: Ulid) -> broadcast::Receiver<Notice> {
        let sender = self
            .channels
            .entry(semester_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, semester_id: Ulid, notice: Notice) {
        if let Some(sender) = self.channels.get(&semester_id) {
            let _ = sender.send(notice);
        }
    }

    pub fn committed(&self, semester_id: Ulid, event: &Event) {
        if self.channels.contains_key(&semester_id) {
            self.send(semester_id, Notice::Committed(event.clone()));
        }
    }
}

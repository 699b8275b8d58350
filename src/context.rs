use tokio::sync::RwLock;

use crate::repository::UserId;
use crate::schedule::{ScheduleEntry, ScheduleId};

/// Identity of the care recipient this process runs for. Threaded explicitly
/// through the components that need it; no ambient global.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: UserId,
    pub user_name: String,
}

/// Read-mostly snapshot of today's schedule set, refreshed by explicit
/// fetches. The only in-place mutation is the optimistic `completed` flip on
/// confirm, which the next authoritative fetch overwrites.
pub struct TodaySnapshot {
    entries: RwLock<Vec<ScheduleEntry>>,
}

impl TodaySnapshot {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn replace(&self, entries: Vec<ScheduleEntry>) {
        let mut store = self.entries.write().await;
        *store = entries;
    }

    pub async fn entries(&self) -> Vec<ScheduleEntry> {
        self.entries.read().await.clone()
    }

    /// Optimistic local flip after a confirmed completion. Returns false when
    /// the entry is not part of the snapshot (stale id).
    pub async fn mark_completed(&self, schedule_id: ScheduleId) -> bool {
        let mut store = self.entries.write().await;
        match store
            .iter_mut()
            .find(|entry| entry.id == Some(schedule_id))
        {
            Some(entry) => {
                entry.completed = true;
                true
            }
            None => false,
        }
    }
}

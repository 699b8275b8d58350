use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RepositoryError, ScheduleRepository, UserId};
use crate::schedule::{ScheduleEntry, ScheduleId};

/// In-memory repository, primarily a test double for the state machine and
/// the dispatch bridge. Mirrors the backend contract: the today view lists
/// recurring entries before one-time entries, completion flips the flag.
pub struct InMemoryScheduleRepository {
    store: RwLock<Vec<ScheduleEntry>>,
    completions: RwLock<Vec<ScheduleId>>,
}

impl InMemoryScheduleRepository {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self {
            store: RwLock::new(entries),
            completions: RwLock::new(Vec::new()),
        }
    }

    /// Every id passed to `complete_entry`, in call order.
    pub async fn completions(&self) -> Vec<ScheduleId> {
        self.completions.read().await.clone()
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn fetch_today(&self, _user_id: UserId) -> Result<Vec<ScheduleEntry>, RepositoryError> {
        let store = self.store.read().await;
        let (recurring, one_time): (Vec<_>, Vec<_>) = store
            .iter()
            .cloned()
            .partition(|entry| entry.is_recurring());
        Ok(recurring.into_iter().chain(one_time).collect())
    }

    async fn complete_entry(&self, schedule_id: ScheduleId) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        self.completions.write().await.push(schedule_id);
        match store.iter_mut().find(|entry| entry.id == Some(schedule_id)) {
            Some(entry) => {
                entry.completed = true;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete_entry(&self, _user_id: UserId, title: &str) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|entry| entry.title != title);
        if store.len() == before {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }
}

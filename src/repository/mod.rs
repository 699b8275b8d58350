mod http;
mod memory;

pub use http::HttpScheduleService;
pub use memory::InMemoryScheduleRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::schedule::{ScheduleEntry, ScheduleId};

pub type UserId = i64;

/// Transport/backend failures. The backend only exposes an HTTP status, so
/// there is no finer-grained code to carry; callers must not assume partial
/// success and decide about retries themselves.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("backend is unreachable")]
    NetworkUnavailable,
    #[error("backend rejected the request with status {0}")]
    ServerRejected(u16),
    #[error("no matching record on the backend")]
    NotFound,
}

/// Source of truth for schedule entries and completion state.
#[async_trait]
pub trait ScheduleRepository: Send + Sync + 'static {
    /// All entries relevant today, recurring entries before one-time entries,
    /// fetch order otherwise preserved.
    async fn fetch_today(&self, user_id: UserId) -> Result<Vec<ScheduleEntry>, RepositoryError>;

    async fn complete_entry(&self, schedule_id: ScheduleId) -> Result<(), RepositoryError>;

    async fn delete_entry(&self, user_id: UserId, title: &str) -> Result<(), RepositoryError>;
}

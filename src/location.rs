use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::repository::{RepositoryError, UserId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Seam for the OS location service: a permission prompt plus the current
/// fix. A refused permission only disables the poller.
pub trait PositionSource: Send + Sync + 'static {
    fn request_location_permission(&self) -> bool;
    fn current_position(&self) -> anyhow::Result<Position>;
}

/// Fixed coordinates from configuration, for environments without a real
/// location service.
pub struct StaticPositionSource {
    position: Position,
}

impl StaticPositionSource {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: Position {
                latitude,
                longitude,
            },
        }
    }
}

impl PositionSource for StaticPositionSource {
    fn request_location_permission(&self) -> bool {
        true
    }

    fn current_position(&self) -> anyhow::Result<Position> {
        Ok(self.position)
    }
}

#[async_trait]
pub trait LocationReporter: Send + Sync + 'static {
    async fn report_position(
        &self,
        user_id: UserId,
        position: &Position,
    ) -> Result<(), RepositoryError>;
}

/// Relays position pings to the caretaking backend while permission is
/// granted. Failures are logged and the poll continues; nothing here blocks
/// the rest of the app.
pub fn spawn_location_poller(
    source: Arc<dyn PositionSource>,
    reporter: Arc<dyn LocationReporter>,
    user_id: UserId,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !source.request_location_permission() {
            log::warn!("Location permission denied; position pings are disabled.");
            return;
        }

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(interval) => {
                    match source.current_position() {
                        Ok(position) => {
                            if let Err(error) = reporter.report_position(user_id, &position).await {
                                log::error!("Failed to report position. [error = {error}]");
                            }
                        }
                        Err(error) => {
                            log::error!("Failed to read position. [error = {error}]");
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingReporter {
        reports: Mutex<Vec<(UserId, Position)>>,
    }

    #[async_trait]
    impl LocationReporter for RecordingReporter {
        async fn report_position(
            &self,
            user_id: UserId,
            position: &Position,
        ) -> Result<(), RepositoryError> {
            self.reports.lock().unwrap().push((user_id, *position));
            Ok(())
        }
    }

    struct DeniedSource;

    impl PositionSource for DeniedSource {
        fn request_location_permission(&self) -> bool {
            false
        }

        fn current_position(&self) -> anyhow::Result<Position> {
            anyhow::bail!("no permission")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn positions_are_reported_on_every_poll() {
        let source = Arc::new(StaticPositionSource::new(37.5665, 126.978));
        let reporter = Arc::new(RecordingReporter {
            reports: Mutex::new(Vec::new()),
        });
        let token = CancellationToken::new();

        let poller = spawn_location_poller(
            source,
            Arc::clone(&reporter) as Arc<dyn LocationReporter>,
            7,
            Duration::from_secs(10),
            token.clone(),
        );

        time::sleep(Duration::from_secs(35)).await;
        token.cancel();
        let _ = poller.await;

        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].0, 7);
        assert_eq!(reports[0].1.latitude, 37.5665);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_disables_the_poller() {
        let reporter = Arc::new(RecordingReporter {
            reports: Mutex::new(Vec::new()),
        });
        let token = CancellationToken::new();

        let poller = spawn_location_poller(
            Arc::new(DeniedSource),
            Arc::clone(&reporter) as Arc<dyn LocationReporter>,
            7,
            Duration::from_secs(10),
            token.clone(),
        );

        time::sleep(Duration::from_secs(60)).await;
        let _ = poller.await;

        assert!(reporter.reports.lock().unwrap().is_empty());
    }
}

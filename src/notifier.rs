use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{ReminderBridge, ReminderEvent};

pub const CHANNEL_ID: &str = "medication-reminder";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// Fatal to local scheduling for this session; callers degrade to
    /// push-only reminders.
    #[error("notification permission denied")]
    PermissionDenied,
}

/// Seam for the OS permission prompt.
pub trait PermissionGate: Send + Sync + 'static {
    fn request_notification_permission(&self) -> bool;
}

pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn request_notification_permission(&self) -> bool {
        true
    }
}

struct ScheduledTrigger {
    task: JoinHandle<()>,
    token: CancellationToken,
}

impl ScheduledTrigger {
    async fn cancel(self) {
        self.token.cancel();
        let _ = time::timeout(Duration::from_secs(5), self.task).await;
    }
}

/// Thin wrapper over the OS reminder triggers. A fired trigger produces the
/// same `ReminderEvent` shape as the push path, into the same bridge; a local
/// trigger is not tied to a backend entry, so its events carry no schedule id.
pub struct LocalNotifier {
    gate: Box<dyn PermissionGate>,
    bridge: ReminderBridge,
    triggers: Mutex<Vec<ScheduledTrigger>>,
    configured: AtomicBool,
}

impl LocalNotifier {
    pub fn new(gate: Box<dyn PermissionGate>, bridge: ReminderBridge) -> Self {
        Self {
            gate,
            bridge,
            triggers: Mutex::new(Vec::new()),
            configured: AtomicBool::new(false),
        }
    }

    /// Requests permission and creates the notification channel, once per
    /// process lifetime. Repeated calls after success are no-ops.
    pub fn configure(&self) -> Result<(), NotifyError> {
        if self.configured.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.gate.request_notification_permission() {
            log::warn!("Notification permission denied; local reminders are unavailable.");
            return Err(NotifyError::PermissionDenied);
        }
        log::info!("Notification channel created. [channel = {CHANNEL_ID}]");
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Registers a daily trigger at the next occurrence of `hour:minute` —
    /// today if still in the future, otherwise tomorrow.
    pub fn schedule_daily(&self, hour: u32, minute: u32, message: &str) {
        let Some(fire_at) = NaiveTime::from_hms_opt(hour, minute, 0) else {
            log::warn!("Refusing to schedule reminder at an invalid time. [time = {hour}:{minute}]");
            return;
        };

        let delay = next_occurrence_delay(&fire_at, Local::now().naive_local())
            .to_std()
            .expect("The target delay is always in the future.");
        log::info!(
            "Local reminder scheduled. [time = {hour:02}:{minute:02}, first_fire_in_secs = {}]",
            delay.as_secs()
        );

        let token = CancellationToken::new();
        let task_token = token.child_token();
        let bridge = self.bridge.clone();
        let message = message.to_string();
        let task = tokio::spawn(async move {
            let mut delay = delay;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = time::sleep(delay) => {
                        log::info!("Local reminder fired. [time = {hour:02}:{minute:02}]");
                        let event = ReminderEvent {
                            schedule_id: None,
                            hour,
                            minute,
                            message: message.clone(),
                        };
                        if bridge.dispatch(event).is_err() {
                            break;
                        }
                        delay = DAY;
                    }
                }
            }
        });

        self.triggers
            .lock()
            .unwrap()
            .push(ScheduledTrigger { task, token });
    }

    /// Removes every pending local trigger.
    pub async fn cancel_all(&self) {
        let triggers: Vec<_> = self.triggers.lock().unwrap().drain(..).collect();
        let count = triggers.len();
        for trigger in triggers {
            trigger.cancel().await;
        }
        log::info!("Cancelled all local reminders. [count = {count}]");
    }
}

pub(crate) fn next_occurrence_delay(fire_at: &NaiveTime, now: NaiveDateTime) -> chrono::Duration {
    let candidate = now.date().and_time(*fire_at);
    let target = if candidate > now {
        candidate
    } else {
        candidate
            .checked_add_signed(TimeDelta::days(1))
            .expect("Not realistic to overflow")
    };

    target - now
}

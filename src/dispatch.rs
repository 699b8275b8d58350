use chrono::NaiveDateTime;
use tokio::sync::mpsc;

use crate::push::{PushDelivery, PushHandler, PushPayload};
use crate::resolver::resolve_next;
use crate::schedule::{ScheduleEntry, ScheduleId, ScheduleKind};

pub const DEFAULT_REMINDER_HOUR: u32 = 16;
pub const DEFAULT_REMINDER_MINUTE: u32 = 0;
pub const DEFAULT_REMINDER_MESSAGE: &str = "오늘 약 복용 시간입니다!";

/// A normalized wake-up instruction. Created at the moment of trigger,
/// consumed by navigation into the confirmation screen, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEvent {
    /// Present when the trigger is tied to a specific backend entry. Absent
    /// means unknown origin and confirmation stays disabled.
    pub schedule_id: Option<ScheduleId>,
    pub hour: u32,
    pub minute: u32,
    pub message: String,
}

impl ReminderEvent {
    pub fn for_entry(entry: &ScheduleEntry) -> Self {
        let (hour, minute) = entry.display_time();
        let message = match entry.kind {
            ScheduleKind::Medication => {
                format!("오늘 {}을(를) 복용하실 시간입니다", entry.title)
            }
            ScheduleKind::Appointment => {
                format!("오늘 {}을(를) 방문하실 시간입니다", entry.title)
            }
        };
        Self {
            schedule_id: entry.id,
            hour,
            minute,
            message,
        }
    }
}

/// Canonical navigation target produced by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    TodayCheck(ReminderEvent),
    EmotionCheck,
}

/// Maps an inbound push payload onto a route. Unknown tags are a silent
/// no-op; an emotion check bypasses scheduling entirely.
pub fn decode_push(payload: &PushPayload) -> Option<Route> {
    match payload.kind.as_deref() {
        Some("TODAY_CHECK") => Some(Route::TodayCheck(ReminderEvent {
            schedule_id: payload
                .schedule_id
                .as_deref()
                .and_then(|raw| raw.parse().ok()),
            hour: payload
                .hour
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_REMINDER_HOUR),
            minute: payload
                .minute
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_REMINDER_MINUTE),
            message: payload
                .message
                .clone()
                .unwrap_or_else(|| DEFAULT_REMINDER_MESSAGE.to_string()),
        })),
        Some("EMOTION_CHECK") => Some(Route::EmotionCheck),
        _ => None,
    }
}

/// Single funnel for every reminder entry point. Push deliveries, local
/// notification fires and the in-app check button all end up in `dispatch`,
/// so the confirmation flow behaves identically regardless of origin.
#[derive(Clone)]
pub struct ReminderBridge {
    routes: mpsc::UnboundedSender<Route>,
}

impl ReminderBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (routes, receiver) = mpsc::unbounded_channel();
        (Self { routes }, receiver)
    }

    pub fn dispatch(&self, event: ReminderEvent) -> anyhow::Result<()> {
        self.send(Route::TodayCheck(event))
    }

    pub fn handle_push(&self, delivery: PushDelivery, payload: PushPayload) -> anyhow::Result<()> {
        match decode_push(&payload) {
            Some(Route::TodayCheck(event)) => {
                log::info!(
                    "Push reminder received. [delivery = {:?}, schedule_id = {:?}]",
                    delivery,
                    event.schedule_id
                );
                self.dispatch(event)
            }
            Some(Route::EmotionCheck) => {
                log::info!("Push emotion check received. [delivery = {:?}]", delivery);
                self.send(Route::EmotionCheck)
            }
            None => {
                log::debug!("Ignoring push with unknown tag. [kind = {:?}]", payload.kind);
                Ok(())
            }
        }
    }

    /// Manual "check schedule" trigger. Returns false when nothing is left
    /// today, which callers present as a message rather than an error.
    pub fn check_schedule(
        &self,
        entries: &[ScheduleEntry],
        now: NaiveDateTime,
    ) -> anyhow::Result<bool> {
        match resolve_next(entries, now) {
            Some(entry) => {
                self.dispatch(ReminderEvent::for_entry(entry))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The bridge as a push handler, registered once against every delivery
    /// channel.
    pub fn push_handler(&self) -> PushHandler {
        let bridge = self.clone();
        std::sync::Arc::new(move |delivery, payload| {
            if let Err(error) = bridge.handle_push(delivery, payload) {
                log::error!("Failed to route push message. [error = {error}]");
            }
        })
    }

    fn send(&self, route: Route) -> anyhow::Result<()> {
        self.routes
            .send(route)
            .map_err(|_| anyhow::anyhow!("route consumer is gone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Recurrence;
    use chrono::{NaiveDate, NaiveTime};

    fn today_check_payload() -> PushPayload {
        PushPayload {
            kind: Some("TODAY_CHECK".to_string()),
            hour: Some("9".to_string()),
            minute: Some("30".to_string()),
            message: Some("혈압약 드실 시간입니다".to_string()),
            schedule_id: Some("12".to_string()),
        }
    }

    #[test]
    fn today_check_decodes_all_fields() {
        let route = decode_push(&today_check_payload()).unwrap();

        assert_eq!(
            route,
            Route::TodayCheck(ReminderEvent {
                schedule_id: Some(12),
                hour: 9,
                minute: 30,
                message: "혈압약 드실 시간입니다".to_string(),
            })
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let payload = PushPayload {
            kind: Some("TODAY_CHECK".to_string()),
            ..Default::default()
        };

        let route = decode_push(&payload).unwrap();

        assert_eq!(
            route,
            Route::TodayCheck(ReminderEvent {
                schedule_id: None,
                hour: DEFAULT_REMINDER_HOUR,
                minute: DEFAULT_REMINDER_MINUTE,
                message: DEFAULT_REMINDER_MESSAGE.to_string(),
            })
        );
    }

    #[test]
    fn garbled_numeric_fields_fall_back_to_defaults() {
        let payload = PushPayload {
            kind: Some("TODAY_CHECK".to_string()),
            hour: Some("sixteen".to_string()),
            schedule_id: Some("abc".to_string()),
            ..Default::default()
        };

        let Route::TodayCheck(event) = decode_push(&payload).unwrap() else {
            panic!("expected a today-check route");
        };

        assert_eq!(event.hour, DEFAULT_REMINDER_HOUR);
        assert_eq!(event.schedule_id, None);
    }

    #[test]
    fn emotion_check_routes_to_the_mood_flow() {
        let payload = PushPayload {
            kind: Some("EMOTION_CHECK".to_string()),
            ..Default::default()
        };

        assert_eq!(decode_push(&payload), Some(Route::EmotionCheck));
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let payload = PushPayload {
            kind: Some("SOMETHING_ELSE".to_string()),
            ..Default::default()
        };

        assert_eq!(decode_push(&payload), None);
        assert_eq!(decode_push(&PushPayload::default()), None);
    }

    #[tokio::test]
    async fn every_trigger_path_produces_the_same_route() {
        let (bridge, mut routes) = ReminderBridge::new();
        let payload = today_check_payload();

        bridge
            .handle_push(PushDelivery::Foreground, payload.clone())
            .unwrap();
        bridge
            .handle_push(PushDelivery::Opened, payload.clone())
            .unwrap();
        bridge
            .handle_push(PushDelivery::Initial, payload.clone())
            .unwrap();
        let Route::TodayCheck(manual_event) = decode_push(&payload).unwrap() else {
            panic!("expected a today-check route");
        };
        bridge.dispatch(manual_event).unwrap();

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(routes.recv().await.unwrap());
        }
        assert!(received.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn unknown_push_produces_no_route() {
        let (bridge, mut routes) = ReminderBridge::new();

        bridge
            .handle_push(PushDelivery::Foreground, PushPayload::default())
            .unwrap();

        assert!(routes.try_recv().is_err());
    }

    #[tokio::test]
    async fn manual_check_dispatches_the_next_due_entry() {
        let (bridge, mut routes) = ReminderBridge::new();
        let entry = ScheduleEntry {
            id: Some(5),
            title: "아침 약".to_string(),
            kind: ScheduleKind::Medication,
            recurrence: Recurrence::daily(NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            completed: false,
        };
        let now = NaiveDate::from_ymd_opt(2025, 5, 31)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();

        assert!(bridge.check_schedule(&[entry], now).unwrap());

        let Route::TodayCheck(event) = routes.recv().await.unwrap() else {
            panic!("expected a today-check route");
        };
        assert_eq!(event.schedule_id, Some(5));
        assert_eq!((event.hour, event.minute), (8, 0));
        assert_eq!(event.message, "오늘 아침 약을(를) 복용하실 시간입니다");
    }

    #[tokio::test]
    async fn manual_check_with_nothing_remaining_produces_no_route() {
        let (bridge, mut routes) = ReminderBridge::new();
        let now = NaiveDate::from_ymd_opt(2025, 5, 31)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();

        assert!(!bridge.check_schedule(&[], now).unwrap());
        assert!(routes.try_recv().is_err());
    }
}

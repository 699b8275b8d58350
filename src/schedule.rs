use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub type ScheduleId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    Medication,
    Appointment,
}

/// When an entry fires. A daily entry carries no calendar date; a one-time
/// entry carries a full timestamp and never repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    Daily { time_of_day: NaiveTime },
    OneTime { at: NaiveDateTime },
}

impl Recurrence {
    pub fn daily(time_of_day: NaiveTime) -> Self {
        let normalized = time_of_day.with_nanosecond(0).expect("Will never fail.");
        Recurrence::Daily {
            time_of_day: normalized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Absent for entries not yet persisted by the backend.
    pub id: Option<ScheduleId>,
    pub title: String,
    pub kind: ScheduleKind,
    pub recurrence: Recurrence,
    /// Server-authoritative. The local copy is optimistically flipped on
    /// confirm and overwritten by the next fetch.
    pub completed: bool,
}

impl ScheduleEntry {
    /// The concrete point in time this entry resolves to, given "today".
    pub fn effective_instant(&self, today: NaiveDate) -> NaiveDateTime {
        match &self.recurrence {
            Recurrence::Daily { time_of_day } => today.and_time(*time_of_day),
            Recurrence::OneTime { at } => *at,
        }
    }

    /// Hour and minute to display on the reminder screen.
    pub fn display_time(&self) -> (u32, u32) {
        let time = match &self.recurrence {
            Recurrence::Daily { time_of_day } => *time_of_day,
            Recurrence::OneTime { at } => at.time(),
        };
        (time.hour(), time.minute())
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.recurrence, Recurrence::Daily { .. })
    }
}

/// Start of the next local day. Used by the local-midnight rollover policy to
/// decide when the today snapshot goes stale.
pub fn next_day_boundary(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now
        .date()
        .succ_opt()
        .expect("Not realistic to overflow");
    tomorrow.and_time(NaiveTime::MIN)
}

use chrono::NaiveDateTime;

use crate::schedule::ScheduleEntry;

/// Picks the single next not-yet-completed entry strictly after `now`.
///
/// A daily entry whose time of day has already passed today is invisible here
/// until a future today-fetch after the day boundary; rollover belongs to the
/// backend. Ties keep the entry that appears earlier in the input, which the
/// repository orders recurring-before-one-time.
pub fn resolve_next(entries: &[ScheduleEntry], now: NaiveDateTime) -> Option<&ScheduleEntry> {
    let today = now.date();
    let mut next: Option<(&ScheduleEntry, NaiveDateTime)> = None;

    for entry in entries.iter().filter(|entry| !entry.completed) {
        let instant = entry.effective_instant(today);
        if instant <= now {
            continue;
        }
        // Strict comparison keeps the earlier input element on equal instants.
        if next.is_none_or(|(_, best)| instant < best) {
            next = Some((entry, instant));
        }
    }

    next.map(|(entry, _)| entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Recurrence, ScheduleEntry, ScheduleKind};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use proptest::prelude::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 31)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn daily(id: i64, hour: u32, minute: u32, completed: bool) -> ScheduleEntry {
        ScheduleEntry {
            id: Some(id),
            title: format!("일정 {id}"),
            kind: ScheduleKind::Medication,
            recurrence: Recurrence::daily(NaiveTime::from_hms_opt(hour, minute, 0).unwrap()),
            completed,
        }
    }

    fn one_time(id: i64, when: NaiveDateTime, completed: bool) -> ScheduleEntry {
        ScheduleEntry {
            id: Some(id),
            title: format!("일정 {id}"),
            kind: ScheduleKind::Appointment,
            recurrence: Recurrence::OneTime { at: when },
            completed,
        }
    }

    #[test]
    fn empty_set_resolves_to_none() {
        assert_eq!(resolve_next(&[], at(7, 0)), None);
    }

    #[test]
    fn completed_entries_are_never_returned() {
        let entries = vec![daily(1, 8, 0, true), daily(2, 9, 0, false)];

        let next = resolve_next(&entries, at(7, 0)).unwrap();

        assert_eq!(next.id, Some(2));
    }

    #[test]
    fn earliest_future_entry_wins() {
        let entries = vec![
            daily(1, 12, 0, false),
            daily(2, 9, 0, false),
            one_time(3, at(10, 30), false),
        ];

        let next = resolve_next(&entries, at(7, 0)).unwrap();

        assert_eq!(next.id, Some(2));
    }

    #[test]
    fn equal_instants_keep_the_earlier_input_entry() {
        let entries = vec![daily(1, 8, 0, false), daily(2, 8, 0, false)];

        let next = resolve_next(&entries, at(7, 0)).unwrap();

        assert_eq!(next.id, Some(1));
    }

    #[test]
    fn passed_daily_time_does_not_roll_to_tomorrow() {
        let entries = vec![daily(1, 8, 0, false), daily(2, 8, 0, false)];

        assert_eq!(resolve_next(&entries, at(9, 0)), None);
    }

    #[test]
    fn entry_due_exactly_now_is_not_returned() {
        let entries = vec![daily(1, 8, 0, false)];

        assert_eq!(resolve_next(&entries, at(8, 0)), None);
    }

    #[test]
    fn one_time_entry_in_the_future_is_eligible() {
        let entries = vec![one_time(1, at(20, 15), false)];

        let next = resolve_next(&entries, at(19, 0)).unwrap();

        assert_eq!(next.id, Some(1));
    }

    proptest! {
        #[test]
        fn resolved_entry_is_incomplete_and_strictly_future(
            minutes in proptest::collection::vec((0u32..24 * 60, any::<bool>()), 0..12),
            now_minute in 0u32..24 * 60,
        ) {
            let entries: Vec<_> = minutes
                .iter()
                .enumerate()
                .map(|(idx, (minute, completed))| {
                    daily(idx as i64, minute / 60, minute % 60, *completed)
                })
                .collect();
            let now = at(now_minute / 60, now_minute % 60);

            match resolve_next(&entries, now) {
                Some(entry) => {
                    prop_assert!(!entry.completed);
                    prop_assert!(entry.effective_instant(now.date()) > now);
                }
                None => {
                    for entry in entries.iter().filter(|entry| !entry.completed) {
                        prop_assert!(entry.effective_instant(now.date()) <= now);
                    }
                }
            }
        }
    }
}

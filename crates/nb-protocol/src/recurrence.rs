//! Repeat rules for recurring reminders.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::localtime::{localize, next_month_on};

/// Upper bound on how many occurrences are skipped while catching up.
const MAX_CATCH_UP_STEPS: usize = 4_000;

/// How a reminder repeats after it is completed, skipped or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum Recurrence {
    /// Fires once, then becomes terminal.
    #[default]
    Once,
    Daily,
    EveryOtherDay,
    Weekly { weekday: Weekday },
    /// Day of month, clamped to the month length.
    Monthly { day: u32 },
}

impl Recurrence {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::Once)
    }

    /// First occurrence strictly after `after`, keeping the local wall-clock time of
    /// `anchor` in `tz`. Returns `None` for one-shot reminders.
    pub fn next_after(
        &self,
        anchor: DateTime<Utc>,
        tz: Tz,
        after: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let local = anchor.with_timezone(&tz).naive_local();
        let time = local.time();
        let mut date = local.date();
        for _ in 0..MAX_CATCH_UP_STEPS {
            date = self.step(date)?;
            let candidate = localize(tz, date.and_time(time))?.instant;
            if candidate > after {
                return Some(candidate);
            }
        }
        None
    }

    fn step(&self, date: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Recurrence::Once => None,
            Recurrence::Daily => date.succ_opt(),
            Recurrence::EveryOtherDay => date.checked_add_days(Days::new(2)),
            Recurrence::Weekly { weekday } => {
                let mut next = date.succ_opt()?;
                while next.weekday() != weekday {
                    next = next.succ_opt()?;
                }
                Some(next)
            }
            Recurrence::Monthly { day } => next_month_on(date, day),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Rome;

    fn rome(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Rome.with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn once_never_repeats() {
        let anchor = rome(2024, 3, 1, 9, 0);
        assert_eq!(Recurrence::Once.next_after(anchor, Rome, anchor), None);
        assert!(!Recurrence::Once.is_recurring());
    }

    #[test]
    fn daily_keeps_wall_clock_across_dst() {
        let anchor = rome(2024, 3, 30, 9, 0);
        let next = Recurrence::Daily.next_after(anchor, Rome, anchor).unwrap();
        assert_eq!(next, rome(2024, 3, 31, 9, 0));
        // 08:00 UTC before the change, 07:00 UTC after.
        assert_eq!(anchor.to_rfc3339(), "2024-03-30T08:00:00+00:00");
        assert_eq!(next.to_rfc3339(), "2024-03-31T07:00:00+00:00");
    }

    #[test]
    fn daily_catches_up_past_now() {
        let anchor = rome(2024, 3, 1, 9, 0);
        let now = rome(2024, 3, 5, 12, 0);
        let next = Recurrence::Daily.next_after(anchor, Rome, now).unwrap();
        assert_eq!(next, rome(2024, 3, 6, 9, 0));
    }

    #[test]
    fn every_other_day_steps_two() {
        let anchor = rome(2024, 3, 1, 20, 0);
        let next = Recurrence::EveryOtherDay
            .next_after(anchor, Rome, anchor)
            .unwrap();
        assert_eq!(next, rome(2024, 3, 3, 20, 0));
    }

    #[test]
    fn weekly_lands_on_weekday() {
        // 2024-03-01 is a Friday.
        let anchor = rome(2024, 3, 1, 9, 0);
        let rule = Recurrence::Weekly {
            weekday: Weekday::Mon,
        };
        assert_eq!(
            rule.next_after(anchor, Rome, anchor).unwrap(),
            rome(2024, 3, 4, 9, 0)
        );
    }

    #[test]
    fn monthly_clamps_short_months() {
        let anchor = rome(2024, 1, 31, 9, 0);
        let rule = Recurrence::Monthly { day: 31 };
        let feb = rule.next_after(anchor, Rome, anchor).unwrap();
        assert_eq!(feb, rome(2024, 2, 29, 9, 0));
        let mar = rule.next_after(feb, Rome, feb).unwrap();
        assert_eq!(mar, rome(2024, 3, 31, 9, 0));
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_string(&Recurrence::Monthly { day: 5 }).unwrap();
        assert_eq!(json, r#"{"every":"monthly","day":5}"#);
        let back: Recurrence = serde_json::from_str(r#"{"every":"daily"}"#).unwrap();
        assert_eq!(back, Recurrence::Daily);
    }
}

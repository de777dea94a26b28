//! Pinning local wall-clock times to UTC instants across DST transitions.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

/// A local wall-clock time resolved to a UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalInstant {
    pub instant: DateTime<Utc>,
    /// The wall-clock time fell inside a DST gap and was moved forward by the gap length.
    pub shifted: bool,
}

/// Resolve `naive` in `tz`.
///
/// Repeated wall-clock times (autumn fold) take the earlier instant. Skipped times
/// (spring gap) are read with the offset in force before the gap, which lands them
/// the same distance past the gap end.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<LocalInstant> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(LocalInstant {
            instant: dt.with_timezone(&Utc),
            shifted: false,
        }),
        LocalResult::Ambiguous(earliest, _) => Some(LocalInstant {
            instant: earliest.with_timezone(&Utc),
            shifted: false,
        }),
        LocalResult::None => {
            let before = tz
                .offset_from_local_datetime(&(naive - Duration::hours(3)))
                .earliest()?;
            let offset_secs = i64::from(before.fix().local_minus_utc());
            let utc = naive - Duration::seconds(offset_secs);
            Some(LocalInstant {
                instant: Utc.from_utc_datetime(&utc),
                shifted: true,
            })
        }
    }
}

/// Calendar date of `instant` as seen in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Number of days in the given month, `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

/// `day` of the month following `date`, clamped to that month's length.
pub fn next_month_on(date: NaiveDate, day: u32) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

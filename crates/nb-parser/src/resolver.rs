//! Time Resolver: temporal tokens → UTC instant, confidence and ambiguity flags.
//!
//! All computations run against an explicit `reference_now` and IANA zone; nothing
//! here reads the wall clock.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use nb_protocol::localtime::{LocalInstant, local_date, localize};
use nb_protocol::{AmbiguityFlag, Confidence};

use crate::error::{ResolveError, ResolveResult};
use crate::grammar::{self, ClockTime, Period, Token, TokenKind};

/// Default times of day used when the text names no exact time.
#[derive(Debug, Clone, Deserialize)]
pub struct ParserSettings {
    /// Applied to a date given without a time.
    #[serde(default = "default_hour")]
    pub default_hour: u32,
    #[serde(default)]
    pub default_minute: u32,
    #[serde(default = "default_morning_hour")]
    pub morning_hour: u32,
    #[serde(default = "default_afternoon_hour")]
    pub afternoon_hour: u32,
    #[serde(default = "default_evening_hour")]
    pub evening_hour: u32,
    #[serde(default = "default_night_hour")]
    pub night_hour: u32,
}

fn default_hour() -> u32 {
    9
}

fn default_morning_hour() -> u32 {
    9
}

fn default_afternoon_hour() -> u32 {
    15
}

fn default_evening_hour() -> u32 {
    20
}

fn default_night_hour() -> u32 {
    22
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            default_hour: default_hour(),
            default_minute: 0,
            morning_hour: default_morning_hour(),
            afternoon_hour: default_afternoon_hour(),
            evening_hour: default_evening_hour(),
            night_hour: default_night_hour(),
        }
    }
}

impl ParserSettings {
    fn default_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.default_hour, self.default_minute, 0)
            .unwrap_or(NaiveTime::MIN)
    }

    fn period_time(&self, period: Period) -> NaiveTime {
        let hour = match period {
            Period::Morning => self.morning_hour,
            Period::Afternoon => self.afternoon_hour,
            Period::Evening => self.evening_hour,
            Period::Night => self.night_hour,
        };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_else(|| self.default_time())
    }
}

/// Outcome of resolving a temporal expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub instant: DateTime<Utc>,
    pub confidence: Confidence,
    pub ambiguities: BTreeSet<AmbiguityFlag>,
    /// Later slots of a multi-time phrase, ascending.
    pub extra_instants: Vec<DateTime<Utc>>,
}

impl Resolution {
    fn new(instant: DateTime<Utc>, ambiguities: BTreeSet<AmbiguityFlag>) -> Self {
        let confidence = if ambiguities.is_empty() {
            Confidence::High
        } else {
            Confidence::Low
        };
        Self {
            instant,
            confidence,
            ambiguities,
            extra_instants: Vec::new(),
        }
    }
}

// ── Resolution plan ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePart {
    Unspecified,
    Explicit {
        day: u32,
        month: u32,
        year: Option<i32>,
    },
    Relative(i64),
    Weekday {
        weekday: chrono::Weekday,
        next: bool,
    },
    DayOfMonth(u32),
    Months(u32),
}

impl DatePart {
    fn rank(&self) -> u8 {
        match self {
            DatePart::Explicit { .. } => 5,
            DatePart::DayOfMonth(_) => 4,
            DatePart::Relative(_) => 3,
            DatePart::Weekday { .. } => 2,
            DatePart::Months(_) => 1,
            DatePart::Unspecified => 0,
        }
    }
}

/// Wall-clock candidates for one slot; two entries when the hour is 12h-ambiguous.
struct Slot {
    candidates: Vec<NaiveTime>,
    ambiguous: bool,
}

/// Resolves Italian date-time expressions.
#[derive(Debug, Clone, Default)]
pub struct TimeResolver {
    settings: ParserSettings,
}

impl TimeResolver {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Resolve `expression` against `reference_now` in `tz`.
    pub fn resolve(
        &self,
        expression: &str,
        reference_now: DateTime<Utc>,
        tz: Tz,
    ) -> ResolveResult<Resolution> {
        let tokens = grammar::scan(expression);
        self.resolve_tokens(&tokens, reference_now, tz)
    }

    /// Resolve already-scanned tokens.
    pub fn resolve_tokens(
        &self,
        tokens: &[Token],
        now: DateTime<Utc>,
        tz: Tz,
    ) -> ResolveResult<Resolution> {
        if tokens.is_empty() {
            return Err(ResolveError::UnparseableTime);
        }

        // An exact offset wins over everything else.
        if let Some(offset) = tokens.iter().find_map(|t| match t.kind {
            TokenKind::Offset(d) => Some(d),
            _ => None,
        }) {
            return Ok(Resolution::new(now + offset, BTreeSet::new()));
        }

        let date = date_part(tokens);
        let period = tokens.iter().find_map(|t| match t.kind {
            TokenKind::Period(p) => Some(p),
            TokenKind::Day { period, .. } => period,
            _ => None,
        });
        let slots = self.slots(tokens, period);

        let mut resolved = slots
            .iter()
            .map(|slot| self.resolve_slot(date, slot, now, tz))
            .collect::<ResolveResult<Vec<_>>>()?;
        resolved.sort_by_key(|r| r.instant);

        let mut iter = resolved.into_iter();
        let Some(mut primary) = iter.next() else {
            return Err(ResolveError::UnparseableTime);
        };
        for extra in iter {
            primary.ambiguities.extend(extra.ambiguities);
            primary.extra_instants.push(extra.instant);
        }
        Ok(Resolution::new(primary.instant, primary.ambiguities).with_extras(primary.extra_instants))
    }

    /// Nearest future occurrence of the default time of day.
    pub fn resolve_default(&self, now: DateTime<Utc>, tz: Tz) -> ResolveResult<Resolution> {
        let slot = Slot {
            candidates: vec![self.settings.default_time()],
            ambiguous: false,
        };
        self.resolve_slot(DatePart::Unspecified, &slot, now, tz)
    }

    fn slots(&self, tokens: &[Token], period: Option<Period>) -> Vec<Slot> {
        let times: Vec<ClockTime> = tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::Time(time) => Some(vec![*time]),
                TokenKind::Times(times) => Some(times.clone()),
                _ => None,
            })
            .unwrap_or_default();

        if times.is_empty() {
            let time = match period {
                Some(p) => self.settings.period_time(p),
                None => self.settings.default_time(),
            };
            return vec![Slot {
                candidates: vec![time],
                ambiguous: false,
            }];
        }

        times
            .into_iter()
            .map(|time| {
                let time = match period {
                    Some(p) => time.with_period(p),
                    None => time,
                };
                let mut candidates = vec![naive_time(time.hour, time.minute)];
                let ambiguous = time.is_ambiguous();
                if ambiguous {
                    candidates.push(naive_time(time.hour + 12, time.minute));
                }
                Slot {
                    candidates,
                    ambiguous,
                }
            })
            .collect()
    }

    fn resolve_slot(
        &self,
        date: DatePart,
        slot: &Slot,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> ResolveResult<Resolution> {
        let today = local_date(now, tz);
        let mut flags = BTreeSet::new();
        if slot.ambiguous {
            flags.insert(AmbiguityFlag::TimeAmbiguous);
        }

        let chosen = match date {
            DatePart::Unspecified => {
                let tomorrow = shift_days(today, 1)?;
                pick(&[today, tomorrow], &slot.candidates, now, tz)?
            }
            DatePart::Explicit { day, month, year } => {
                let y = year.unwrap_or(today.year());
                let date = NaiveDate::from_ymd_opt(y, month, day).ok_or_else(|| {
                    ResolveError::InvalidDate(format!("{day:02}/{month:02}/{y}"))
                })?;
                let chosen = pick(&[date], &slot.candidates, now, tz)?;
                if chosen.instant <= now {
                    flags.insert(AmbiguityFlag::PastDate);
                    if year.is_none() {
                        flags.insert(AmbiguityFlag::MissingYear);
                    }
                }
                chosen
            }
            DatePart::Relative(offset) => {
                let date = shift_days(today, offset)?;
                let chosen = pick(&[date], &slot.candidates, now, tz)?;
                if chosen.instant <= now {
                    flags.insert(AmbiguityFlag::PastDate);
                }
                chosen
            }
            DatePart::Weekday { weekday, next } => {
                let ahead = (7 + i64::from(weekday.num_days_from_monday())
                    - i64::from(today.weekday().num_days_from_monday()))
                    % 7;
                let mut chosen = pick(&[shift_days(today, ahead)?], &slot.candidates, now, tz)?;
                if ahead == 0 && (next || chosen.instant <= now) {
                    chosen = pick(&[shift_days(today, 7)?], &slot.candidates, now, tz)?;
                }
                chosen
            }
            DatePart::DayOfMonth(day) => {
                let mut found = None;
                for k in 0..=12 {
                    let Some(first) = today
                        .with_day(1)
                        .and_then(|d| d.checked_add_months(Months::new(k)))
                    else {
                        continue;
                    };
                    let Some(date) = first.with_day(day) else {
                        continue;
                    };
                    let chosen = pick(&[date], &slot.candidates, now, tz)?;
                    if chosen.instant > now {
                        found = Some(chosen);
                        break;
                    }
                }
                found.ok_or_else(|| ResolveError::InvalidDate(format!("day {day}")))?
            }
            DatePart::Months(n) => {
                let date = today
                    .checked_add_months(Months::new(n))
                    .ok_or_else(|| ResolveError::InvalidDate(format!("+{n} months")))?;
                pick(&[date], &slot.candidates, now, tz)?
            }
        };

        if chosen.shifted {
            flags.insert(AmbiguityFlag::NonexistentLocalTime);
        }
        Ok(Resolution::new(chosen.instant, flags))
    }
}

impl Resolution {
    fn with_extras(mut self, extras: Vec<DateTime<Utc>>) -> Self {
        self.extra_instants = extras;
        self
    }
}

// ── Helpers ─────────────────────────────────────────────────

fn date_part(tokens: &[Token]) -> DatePart {
    tokens
        .iter()
        .filter_map(|t| match t.kind {
            TokenKind::Date { day, month, year } => Some(DatePart::Explicit { day, month, year }),
            TokenKind::DayOfMonth(day) => Some(DatePart::DayOfMonth(day)),
            TokenKind::Day { offset, .. } => Some(DatePart::Relative(offset)),
            TokenKind::Weekday { weekday, next } => Some(DatePart::Weekday { weekday, next }),
            TokenKind::Months(n) => Some(DatePart::Months(n)),
            _ => None,
        })
        .fold(DatePart::Unspecified, |best, part| {
            if part.rank() > best.rank() { part } else { best }
        })
}

fn naive_time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour % 24, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn shift_days(date: NaiveDate, days: i64) -> ResolveResult<NaiveDate> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| ResolveError::InvalidDate(format!("{date} {days:+} days")))
}

/// Earliest combination after `now`, or the first combination when none is.
fn pick(
    dates: &[NaiveDate],
    times: &[NaiveTime],
    now: DateTime<Utc>,
    tz: Tz,
) -> ResolveResult<LocalInstant> {
    let mut all = Vec::with_capacity(dates.len() * times.len());
    for date in dates {
        for time in times {
            let local = localize(tz, date.and_time(*time))
                .ok_or_else(|| ResolveError::InvalidDate(format!("{date} {time}")))?;
            all.push(local);
        }
    }
    let future = all
        .iter()
        .filter(|l| l.instant > now)
        .min_by_key(|l| l.instant)
        .copied();
    future
        .or_else(|| all.first().copied())
        .ok_or(ResolveError::UnparseableTime)
}

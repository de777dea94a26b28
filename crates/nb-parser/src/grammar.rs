//! Ordered rule table for Italian temporal expressions.
//!
//! Rules are tried highest precedence first. Each rule is a case-insensitive regex
//! producing a typed [`TokenKind`]; a rule never claims text an earlier rule (or the
//! caller) already claimed. Spans index the original text, so callers can cut the
//! temporal fragment out of the message.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Duration, Weekday};
use regex::{Captures, Regex};

const NUM: &str = r"\d{1,3}|un|uno|una|due|tre|quattro|cinque|sei|sette|otto|nove|dieci|undici|dodici|quindici|venti|trenta|quaranta|quarantacinque|cinquanta|novanta";

const WEEKDAYS: &str =
    r"luned[iìí]|marted[iìí]|mercoled[iìí]|gioved[iìí]|venerd[iìí]|sabato|domenica";

const MONTHS: &str = r"gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre|gen|feb|mar|apr|mag|giu|lug|ago|set|ott|nov|dic";

const PERIOD_SUFFIX: &str =
    r"(?:\s+(?:di\s+|del\s+|della\s+)?(mattina|mattino|pomeriggio|sera|notte))?";

/// Part of the day named in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl Period {
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "mattina" | "mattino" | "stamattina" | "stamani" | "stamane" => Some(Period::Morning),
            "pomeriggio" => Some(Period::Afternoon),
            "sera" | "serata" | "stasera" => Some(Period::Evening),
            "notte" | "nottata" | "stanotte" => Some(Period::Night),
            _ => None,
        }
    }
}

/// A wall-clock time as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
    /// Written as 1..=12 without a leading zero, so a 12h reading is possible.
    pub twelve_hour: bool,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self {
            hour,
            minute,
            twelve_hour: false,
        })
    }

    fn parse(hour: &str, minute: Option<&str>) -> Option<Self> {
        let h: u32 = hour.parse().ok()?;
        let m: u32 = match minute {
            Some(m) => m.parse().ok()?,
            None => 0,
        };
        let mut time = Self::new(h, m)?;
        time.twelve_hour = (1..=12).contains(&h) && !hour.starts_with('0');
        Some(time)
    }

    /// Early hours written without a marker could mean morning or evening.
    pub fn is_ambiguous(&self) -> bool {
        self.twelve_hour && (1..=7).contains(&self.hour)
    }

    /// Apply a period marker ("di sera") to a 12h reading.
    pub fn with_period(self, period: Period) -> Self {
        if !self.twelve_hour {
            return self;
        }
        let hour = match period {
            Period::Morning => self.hour,
            Period::Afternoon | Period::Evening if self.hour < 12 => self.hour + 12,
            Period::Afternoon | Period::Evening => self.hour,
            Period::Night if self.hour == 12 => 0,
            Period::Night if self.hour >= 8 => self.hour + 12,
            Period::Night => self.hour,
        };
        Self {
            hour,
            minute: self.minute,
            twelve_hour: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// "tra 2 ore": exact offset from the reference instant.
    Offset(Duration),
    /// "domani", "tra 3 giorni", "stasera".
    Day { offset: i64, period: Option<Period> },
    /// "tra 2 mesi", "il mese prossimo".
    Months(u32),
    Time(ClockTime),
    /// "alle 10, 13, 16 e 19".
    Times(Vec<ClockTime>),
    Period(Period),
    Date {
        day: u32,
        month: u32,
        year: Option<i32>,
    },
    Weekday { weekday: Weekday, next: bool },
    DayOfMonth(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

// ── Rule table ──────────────────────────────────────────────

struct Rule {
    name: &'static str,
    regex: Regex,
    build: fn(&Captures) -> Option<TokenKind>,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, build: fn(&Captures) -> Option<TokenKind>) -> Self {
        Self {
            name,
            regex: Regex::new(&format!("(?i){pattern}")).unwrap(),
            build,
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // Offsets
        Rule::new(
            "offset_hours_minutes",
            &format!(r"\b(?:tra|fra)\s+({NUM})\s*(?:ore|ora|h)\s+e\s+({NUM})\s*(?:minuti|minuto|min)\b"),
            |c| {
                let hours = parse_count(cap(c, 1)?)?;
                let minutes = parse_count(cap(c, 2)?)?;
                Some(TokenKind::Offset(Duration::minutes(i64::from(hours * 60 + minutes))))
            },
        ),
        Rule::new(
            "offset_hour_and_half",
            r"\b(?:tra|fra)\s+un['’]?\s*ora\s+e\s+mezzo?a?\b",
            |_| Some(TokenKind::Offset(Duration::minutes(90))),
        ),
        Rule::new(
            "offset_one_hour",
            r"\b(?:tra|fra)\s+un['’]?\s*ora\b",
            |_| Some(TokenKind::Offset(Duration::hours(1))),
        ),
        Rule::new(
            "offset_half_hour",
            r"\b(?:tra|fra)\s+mezz['’]?\s*ora\b",
            |_| Some(TokenKind::Offset(Duration::minutes(30))),
        ),
        Rule::new(
            "offset_unit",
            &format!(r"\b(?:tra|fra)\s+({NUM})\s*(minuti|minuto|min|m|ore|ora|h)\b"),
            |c| {
                let n = i64::from(parse_count(cap(c, 1)?)?);
                let unit = cap(c, 2)?.to_lowercase();
                let offset = if unit.starts_with('m') {
                    Duration::minutes(n)
                } else {
                    Duration::hours(n)
                };
                (n > 0).then_some(TokenKind::Offset(offset))
            },
        ),
        Rule::new(
            "offset_days",
            &format!(r"\b(?:tra|fra)\s+({NUM})\s+(giorni|giorno|settimane|settimana|mesi|mese)\b"),
            |c| {
                let n = parse_count(cap(c, 1)?)?;
                let unit = cap(c, 2)?.to_lowercase();
                Some(match unit.as_str() {
                    "giorni" | "giorno" => TokenKind::Day {
                        offset: i64::from(n),
                        period: None,
                    },
                    "settimane" | "settimana" => TokenKind::Day {
                        offset: i64::from(n) * 7,
                        period: None,
                    },
                    _ => TokenKind::Months(n),
                })
            },
        ),
        // Times of day
        Rule::new(
            "time_list",
            r"\b(?:alle|ore)\s+(\d{1,2}(?:[:.]\d{2})?(?:\s*,\s*\d{1,2}(?:[:.]\d{2})?)*(?:\s*,\s*|\s+e\s+)\d{1,2}(?:[:.]\d{2})?)\b",
            |c| {
                let times = split_time_list(cap(c, 1)?)?;
                (times.len() > 1).then_some(TokenKind::Times(times))
            },
        ),
        Rule::new(
            "time_fraction",
            &format!(r"\b(?:alle\s+ore|alle|ore|verso\s+le|per\s+le|entro\s+le)\s+(\d{{1,2}})\s+e\s+(mezza|mezzo|un\s+quarto|tre\s+quarti)\b{PERIOD_SUFFIX}"),
            |c| {
                let minute = match cap(c, 2)?.to_lowercase().as_str() {
                    "mezza" | "mezzo" => "30",
                    "tre quarti" => "45",
                    _ => "15",
                };
                let time = ClockTime::parse(cap(c, 1)?, Some(minute))?;
                Some(TokenKind::Time(apply_suffix(time, c.get(3).map(|m| m.as_str()))))
            },
        ),
        Rule::new(
            "time",
            &format!(r"\b(?:alle\s+ore|alle|ore|verso\s+le|per\s+le|entro\s+le)\s+(\d{{1,2}})(?:[:.](\d{{2}}))?\b{PERIOD_SUFFIX}"),
            |c| {
                let time = ClockTime::parse(cap(c, 1)?, c.get(2).map(|m| m.as_str()))?;
                Some(TokenKind::Time(apply_suffix(time, c.get(3).map(|m| m.as_str()))))
            },
        ),
        Rule::new(
            "time_one",
            r"\ball['’]\s*una\b(?:\s+(?:di\s+|del\s+)?(pomeriggio|notte))?",
            |c| {
                let time = ClockTime::parse("1", None)?;
                Some(TokenKind::Time(apply_suffix(time, c.get(1).map(|m| m.as_str()))))
            },
        ),
        Rule::new(
            "noon_midnight",
            r"\b(?:a\s+)?(mezzogiorno|mezzanotte)\b",
            |c| {
                let hour = if cap(c, 1)?.to_lowercase() == "mezzogiorno" { 12 } else { 0 };
                Some(TokenKind::Time(ClockTime::new(hour, 0)?))
            },
        ),
        Rule::new(
            "clock",
            r"\b(\d{1,2}):(\d{2})\b",
            |c| Some(TokenKind::Time(ClockTime::parse(cap(c, 1)?, Some(cap(c, 2)?))?)),
        ),
        // Absolute dates
        Rule::new(
            "numeric_date",
            r"(?:\b(?:il|del|entro\s+il|per\s+il)\s+)?\b(\d{1,2})[/\-](\d{1,2})(?:[/\-](\d{4}|\d{2}))?\b",
            |c| {
                Some(TokenKind::Date {
                    day: cap(c, 1)?.parse().ok()?,
                    month: cap(c, 2)?.parse().ok()?,
                    year: c.get(3).and_then(|m| parse_year(m.as_str())),
                })
            },
        ),
        Rule::new(
            "textual_date",
            &format!(r"(?:\b(?:il|del|entro\s+il|per\s+il)\s+)?\b(\d{{1,2}}|primo|1º|1°)\s+(?:di\s+)?({MONTHS})\b(?:\s+(\d{{4}}))?"),
            |c| {
                let day_text = cap(c, 1)?.to_lowercase();
                let day = match day_text.as_str() {
                    "primo" | "1º" | "1°" => 1,
                    digits => digits.parse().ok()?,
                };
                Some(TokenKind::Date {
                    day,
                    month: month_from_name(cap(c, 2)?)?,
                    year: c.get(3).and_then(|m| parse_year(m.as_str())),
                })
            },
        ),
        // Relative days
        Rule::new(
            "relative_day",
            r"\b(dopo\s*domani|domani|oggi|stasera|stamattina|stamani|stamane|stanotte)\b",
            |c| {
                let word = cap(c, 1)?.to_lowercase();
                let offset = if word.starts_with("dopo") {
                    2
                } else if word == "domani" {
                    1
                } else {
                    0
                };
                Some(TokenKind::Day {
                    offset,
                    period: Period::from_word(&word),
                })
            },
        ),
        Rule::new(
            "weekday",
            &format!(r"(?:\b(?:il|la|per|entro)\s+)?\b(?:(prossim[oa])\s+)?({WEEKDAYS})(?:\s+(prossim[oa]))?\b"),
            |c| {
                Some(TokenKind::Weekday {
                    weekday: weekday_from_name(cap(c, 2)?)?,
                    next: c.get(1).is_some() || c.get(3).is_some(),
                })
            },
        ),
        Rule::new(
            "next_week",
            r"\b(?:la\s+)?(?:settimana\s+prossima|prossima\s+settimana)\b",
            |_| Some(TokenKind::Day {
                offset: 7,
                period: None,
            }),
        ),
        Rule::new(
            "next_month",
            r"\b(?:il\s+)?(?:mese\s+prossimo|prossimo\s+mese)\b",
            |_| Some(TokenKind::Months(1)),
        ),
        Rule::new(
            "day_of_month",
            r"\b(?:il|entro\s+il|per\s+il)\s+(\d{1,2})\b",
            |c| {
                let day: u32 = cap(c, 1)?.parse().ok()?;
                (1..=31).contains(&day).then_some(TokenKind::DayOfMonth(day))
            },
        ),
        // Bare periods
        Rule::new(
            "period",
            r"\b(?:(?:di|la|in|nel|nella|del|della|al)\s+)?(mattina|mattino|pomeriggio|sera|serata|notte|nottata)\b",
            |c| Period::from_word(cap(c, 1)?).map(TokenKind::Period),
        ),
    ]
});

/// Scan `text` for temporal tokens.
pub fn scan(text: &str) -> Vec<Token> {
    scan_excluding(text, &[])
}

/// Scan `text`, leaving the `claimed` byte ranges alone.
pub fn scan_excluding(text: &str, claimed: &[Range<usize>]) -> Vec<Token> {
    let mut claimed = claimed.to_vec();
    let mut tokens = Vec::new();

    for rule in RULES.iter() {
        for caps in rule.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let span = whole.range();
            if claimed.iter().any(|c| overlaps(c, &span)) {
                continue;
            }
            if let Some(kind) = (rule.build)(&caps) {
                tracing::trace!(rule = rule.name, matched = whole.as_str(), "temporal token");
                claimed.push(span.clone());
                tokens.push(Token { kind, span });
            }
        }
    }

    tokens.sort_by_key(|t| t.span.start);
    tokens
}

// ── Helpers ─────────────────────────────────────────────────

fn cap<'t>(caps: &Captures<'t>, idx: usize) -> Option<&'t str> {
    caps.get(idx).map(|m| m.as_str())
}

pub(crate) fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn apply_suffix(time: ClockTime, suffix: Option<&str>) -> ClockTime {
    match suffix.and_then(Period::from_word) {
        Some(period) => time.with_period(period),
        None => time,
    }
}

fn split_time_list(list: &str) -> Option<Vec<ClockTime>> {
    list.split([',', 'e', 'E'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once([':', '.']) {
            Some((h, m)) => ClockTime::parse(h, Some(m)),
            None => ClockTime::parse(part, None),
        })
        .collect()
}

/// Small cardinal numbers, as digits or Italian words.
pub fn parse_count(text: &str) -> Option<u32> {
    if let Ok(n) = text.parse() {
        return Some(n);
    }
    let n = match text.to_lowercase().as_str() {
        "un" | "uno" | "una" => 1,
        "due" => 2,
        "tre" => 3,
        "quattro" => 4,
        "cinque" => 5,
        "sei" => 6,
        "sette" => 7,
        "otto" => 8,
        "nove" => 9,
        "dieci" => 10,
        "undici" => 11,
        "dodici" => 12,
        "quindici" => 15,
        "venti" => 20,
        "trenta" => 30,
        "quaranta" => 40,
        "quarantacinque" => 45,
        "cinquanta" => 50,
        "novanta" => 90,
        _ => return None,
    };
    Some(n)
}

fn parse_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    Some(if text.len() == 2 { 2000 + year } else { year })
}

pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    let lower = name.to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    match prefix.as_str() {
        "lun" => Some(Weekday::Mon),
        "mar" => Some(Weekday::Tue),
        "mer" => Some(Weekday::Wed),
        "gio" => Some(Weekday::Thu),
        "ven" => Some(Weekday::Fri),
        "sab" => Some(Weekday::Sat),
        "dom" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    let month = match prefix.as_str() {
        "gen" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "mag" => 5,
        "giu" => 6,
        "lug" => 7,
        "ago" => 8,
        "set" => 9,
        "ott" => 10,
        "nov" => 11,
        "dic" => 12,
        _ => return None,
    };
    Some(month)
}

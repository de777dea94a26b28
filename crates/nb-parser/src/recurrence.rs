//! Repeat phrases ("ogni lunedì", "tutti i giorni", "il 5 di ogni mese").

use std::ops::Range;
use std::sync::LazyLock;

use chrono::Weekday;
use nb_protocol::Recurrence;
use regex::Regex;

use crate::grammar::{Period, TokenKind, weekday_from_name};

/// A repeat phrase found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceMatch {
    pub recurrence: Recurrence,
    pub span: Range<usize>,
    /// Date or period implied by the phrase, fed to the resolver as a token.
    pub hint: Option<TokenKind>,
    /// The day of month must be taken from the resolved first occurrence.
    pub monthly_from_due: bool,
    /// The weekday must be taken from the resolved first occurrence.
    pub weekly_from_due: bool,
}

static RE_MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:il\s+|l['’])?(\d{1,2})\s+(?:di\s+)?ogni\s+mese\b").unwrap()
});

static RE_MONTHLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:ogni\s+mese|tutti\s+i\s+mesi|mensilmente)\b").unwrap());

static RE_ALTERNATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:a\s+giorni\s+alterni|ogni\s+due\s+giorni|un\s+giorno\s+s[iì]\s+e\s+uno\s+no)\b")
        .unwrap()
});

static RE_WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:ogni|tutti\s+i|tutte\s+le)\s+(luned[iìí]|marted[iìí]|mercoled[iìí]|gioved[iìí]|venerd[iìí]|sabat[oi]|domenic[ah]e?)\b",
    )
    .unwrap()
});

static RE_WEEKLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ogni\s+settimana|tutte\s+le\s+settimane|settimanalmente)\b").unwrap()
});

static RE_DAILY_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ogni|tutte\s+le|tutti\s+i)\s+(mattina|mattine|pomeriggio|pomeriggi|sera|sere|notte|notti)\b")
        .unwrap()
});

static RE_DAILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ogni\s+giorno|tutti\s+i\s+giorni|quotidianamente|giornalmente)\b")
        .unwrap()
});

/// Find the first repeat phrase, most specific pattern first.
pub fn extract(text: &str) -> Option<RecurrenceMatch> {
    if let Some(c) = RE_MONTH_DAY.captures(text) {
        let whole = c.get(0)?;
        let day: u32 = c.get(1)?.as_str().parse().ok()?;
        if (1..=31).contains(&day) {
            return Some(RecurrenceMatch {
                recurrence: Recurrence::Monthly { day },
                span: whole.range(),
                hint: Some(TokenKind::DayOfMonth(day)),
                monthly_from_due: false,
                weekly_from_due: false,
            });
        }
    }

    if let Some(m) = RE_MONTHLY.find(text) {
        return Some(simple(Recurrence::Monthly { day: 1 }, m.range()).monthly_from_due());
    }

    if let Some(m) = RE_ALTERNATE.find(text) {
        return Some(simple(Recurrence::EveryOtherDay, m.range()));
    }

    if let Some(c) = RE_WEEKDAY.captures(text) {
        let whole = c.get(0)?;
        let weekday = weekday_from_name(c.get(1)?.as_str())?;
        return Some(RecurrenceMatch {
            recurrence: Recurrence::Weekly { weekday },
            span: whole.range(),
            hint: Some(TokenKind::Weekday {
                weekday,
                next: false,
            }),
            monthly_from_due: false,
            weekly_from_due: false,
        });
    }

    if let Some(m) = RE_WEEKLY.find(text) {
        let mut found = simple(
            Recurrence::Weekly {
                weekday: Weekday::Mon,
            },
            m.range(),
        );
        found.weekly_from_due = true;
        return Some(found);
    }

    if let Some(c) = RE_DAILY_PERIOD.captures(text) {
        let whole = c.get(0)?;
        let word = c.get(1)?.as_str().to_lowercase();
        let period = match word.as_str() {
            "mattine" => Some(Period::Morning),
            "pomeriggi" => Some(Period::Afternoon),
            "sere" => Some(Period::Evening),
            "notti" => Some(Period::Night),
            other => Period::from_word(other),
        };
        return Some(RecurrenceMatch {
            recurrence: Recurrence::Daily,
            span: whole.range(),
            hint: period.map(TokenKind::Period),
            monthly_from_due: false,
            weekly_from_due: false,
        });
    }

    RE_DAILY
        .find(text)
        .map(|m| simple(Recurrence::Daily, m.range()))
}

fn simple(recurrence: Recurrence, span: Range<usize>) -> RecurrenceMatch {
    RecurrenceMatch {
        recurrence,
        span,
        hint: None,
        monthly_from_due: false,
        weekly_from_due: false,
    }
}

impl RecurrenceMatch {
    fn monthly_from_due(mut self) -> Self {
        self.monthly_from_due = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_phrases() {
        for text in ["vitamina ogni giorno", "bere acqua tutti i giorni"] {
            let m = extract(text).unwrap();
            assert_eq!(m.recurrence, Recurrence::Daily, "{text}");
            assert_eq!(m.hint, None);
        }
    }

    #[test]
    fn daily_with_period() {
        let m = extract("pillola ogni sera").unwrap();
        assert_eq!(m.recurrence, Recurrence::Daily);
        assert_eq!(m.hint, Some(TokenKind::Period(Period::Evening)));
        let m = extract("tutte le mattine stretching").unwrap();
        assert_eq!(m.hint, Some(TokenKind::Period(Period::Morning)));
    }

    #[test]
    fn weekly_on_weekday() {
        let text = "palestra ogni lunedì alle 18";
        let m = extract(text).unwrap();
        assert_eq!(
            m.recurrence,
            Recurrence::Weekly {
                weekday: Weekday::Mon
            }
        );
        assert_eq!(&text[m.span.clone()], "ogni lunedì");
        let m = extract("messa tutte le domeniche").unwrap();
        assert_eq!(
            m.recurrence,
            Recurrence::Weekly {
                weekday: Weekday::Sun
            }
        );
    }

    #[test]
    fn monthly_on_day() {
        let m = extract("affitto il 5 di ogni mese").unwrap();
        assert_eq!(m.recurrence, Recurrence::Monthly { day: 5 });
        assert_eq!(m.hint, Some(TokenKind::DayOfMonth(5)));
        let m = extract("bolletta ogni mese").unwrap();
        assert!(m.monthly_from_due);
    }

    #[test]
    fn alternate_days() {
        let m = extract("annaffiare a giorni alterni").unwrap();
        assert_eq!(m.recurrence, Recurrence::EveryOtherDay);
    }

    #[test]
    fn weekly_without_weekday_uses_due_date() {
        let m = extract("pulizie ogni settimana").unwrap();
        assert!(m.weekly_from_due);
    }

    #[test]
    fn none_for_one_shot() {
        assert_eq!(extract("comprare il latte domani"), None);
    }
}

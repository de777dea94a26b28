//! Snooze/mute durations: "30m", "2h", "1h30m", "1d", "45 minuti", "mezz'ora".

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;

static RE_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*([a-zà-ú]*)").unwrap());

/// Parse a user-supplied duration. Bare numbers are minutes.
///
/// Returns `None` for empty, zero, malformed or out-of-range input.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    match text.as_str() {
        "mezz'ora" | "mezzora" | "mezz’ora" => return Some(Duration::minutes(30)),
        "un'ora" | "un ora" | "un’ora" => return Some(Duration::hours(1)),
        _ => {}
    }

    let mut total = Duration::zero();
    let mut consumed = 0;
    let mut components = 0;
    for caps in RE_COMPONENT.captures_iter(&text) {
        let whole = caps.get(0)?;
        if !text[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();
        components += 1;

        let value: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2).map_or("", |m| m.as_str());
        let step = match unit {
            "" => Duration::try_minutes(value),
            "s" | "sec" | "secondi" | "secondo" => Duration::try_seconds(value),
            "m" | "min" | "minuti" | "minuto" => Duration::try_minutes(value),
            "h" | "o" | "ora" | "ore" => Duration::try_hours(value),
            "d" | "g" | "giorno" | "giorni" => Duration::try_days(value),
            "w" | "sett" | "settimana" | "settimane" => Duration::try_weeks(value),
            _ => return None,
        }?;
        total = total.checked_add(&step)?;
    }

    if components == 0 || !text[consumed..].trim().is_empty() {
        return None;
    }
    (total > Duration::zero()).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_forms() {
        assert_eq!(parse_duration("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("2h"), Some(Duration::hours(2)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("1d"), Some(Duration::days(1)));
        assert_eq!(parse_duration("1w"), Some(Duration::weeks(1)));
    }

    #[test]
    fn italian_words() {
        assert_eq!(parse_duration("45 minuti"), Some(Duration::minutes(45)));
        assert_eq!(parse_duration("2 ore"), Some(Duration::hours(2)));
        assert_eq!(parse_duration("1 ora 15 min"), Some(Duration::minutes(75)));
        assert_eq!(parse_duration("mezz'ora"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("3 giorni"), Some(Duration::days(3)));
    }

    #[test]
    fn bare_number_is_minutes() {
        assert_eq!(parse_duration("90"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration(" 15 "), Some(Duration::minutes(15)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("5 anni"), None);
        assert_eq!(parse_duration("x 5m"), None);
        assert_eq!(parse_duration("5m poi"), None);
    }

    #[test]
    fn rejects_overflow() {
        assert_eq!(parse_duration("99999999999999h"), None);
        assert_eq!(parse_duration("99999999999999999999m"), None);
        assert_eq!(parse_duration("9223372036854775807s"), None);
        // Each component fits, the sum does not.
        assert_eq!(parse_duration("15250284452w 15250284452w"), None);
        assert!(parse_duration("100000000d").is_some());
    }
}

//! Intent Parser: raw message → [`ParsedReminder`] candidate.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use regex::Regex;

use nb_protocol::{ParsedReminder, Recurrence};

use crate::category;
use crate::error::{FailureReason, ParseFailure};
use crate::grammar::{self, Token};
use crate::recurrence::{self, RecurrenceMatch};
use crate::resolver::TimeResolver;

static RE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:ricordami|ricordamelo|ricordati|ricorda|ricordarmi|rammentami|promemoria|reminder|nota)\b[\s:,\-]*(?:(?:di|che|per|a)\b)?\s*",
    )
    .unwrap()
});

/// Words left dangling at the end of a title once the temporal fragment is cut out.
const TRAILING_CONNECTORS: &[&str] = &[
    "di", "a", "al", "alle", "all'", "per", "e", "ed", "il", "la", "lo", "le", "l'", "i", "gli",
    "entro", "tra", "fra", "da", "dal", "dalla", "del", "della", "verso", "ore", "ogni", "tutti",
    "tutte", "in", "nel", "nella", "che",
];

const LEADING_CONNECTORS: &[&str] = &["di", "che", "per", "a", "e"];

const PUNCTUATION: &[char] = &[',', ';', ':', '.', '-', '!', '?', '–'];

/// Parses free-form Italian reminder requests.
#[derive(Debug, Clone, Default)]
pub struct IntentParser {
    resolver: TimeResolver,
}

impl IntentParser {
    pub fn new(resolver: TimeResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &TimeResolver {
        &self.resolver
    }

    /// Parse `raw_text` against `reference_now` in `tz`.
    ///
    /// Deterministic: reads no clock besides `reference_now`.
    pub fn parse(
        &self,
        raw_text: &str,
        reference_now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<ParsedReminder, ParseFailure> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(ParseFailure::new(FailureReason::NoTimeFound));
        }

        let repeat = recurrence::extract(text);
        let claimed: Vec<Range<usize>> = repeat.iter().map(|m| m.span.clone()).collect();
        let mut tokens = grammar::scan_excluding(text, &claimed);

        let mut temporal: Vec<Range<usize>> = tokens.iter().map(|t| t.span.clone()).collect();
        temporal.extend(claimed);

        if let Some(RecurrenceMatch {
            hint: Some(hint),
            span,
            ..
        }) = &repeat
        {
            tokens.push(Token {
                kind: hint.clone(),
                span: span.clone(),
            });
        }

        let resolution = match (&repeat, tokens.is_empty()) {
            (Some(_), true) => self.resolver.resolve_default(reference_now, tz)?,
            (None, true) => return Err(ParseFailure::new(FailureReason::NoTimeFound)),
            (_, false) => self.resolver.resolve_tokens(&tokens, reference_now, tz)?,
        };

        let local_due = resolution.instant.with_timezone(&tz);
        let recurrence = match &repeat {
            Some(m) if m.monthly_from_due => Recurrence::Monthly {
                day: local_due.day(),
            },
            Some(m) if m.weekly_from_due => Recurrence::Weekly {
                weekday: local_due.weekday(),
            },
            Some(m) => m.recurrence,
            None if !resolution.extra_instants.is_empty() => Recurrence::Daily,
            None => Recurrence::Once,
        };

        let title = extract_title(text, &temporal);
        let category = category::detect(text);

        tracing::debug!(
            title = %title,
            due_at = %resolution.instant,
            confidence = ?resolution.confidence,
            category = category.as_str(),
            "parsed reminder"
        );

        Ok(ParsedReminder {
            raw_text: raw_text.to_string(),
            title,
            due_at: resolution.instant,
            timezone: tz,
            confidence: resolution.confidence,
            ambiguities: resolution.ambiguities,
            category,
            recurrence,
            extra_times: resolution.extra_instants,
        })
    }
}

/// Cut temporal spans and filler words out of `text`.
fn extract_title(text: &str, temporal: &[Range<usize>]) -> String {
    let mut spans = temporal.to_vec();
    spans.sort_by_key(|r| r.start);

    let mut remaining = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            remaining.push_str(&text[cursor..span.start]);
        }
        remaining.push(' ');
        cursor = cursor.max(span.end);
    }
    if cursor < text.len() {
        remaining.push_str(&text[cursor..]);
    }

    let stripped = RE_PREFIX.replace(&remaining, "");
    let mut words: Vec<&str> = stripped.split_whitespace().collect();

    while let Some(last) = words.last() {
        let bare = last.trim_end_matches(PUNCTUATION).to_lowercase();
        if bare.is_empty() || TRAILING_CONNECTORS.contains(&bare.as_str()) {
            words.pop();
        } else {
            break;
        }
    }
    while let Some(first) = words.first() {
        let bare = first.trim_matches(PUNCTUATION).to_lowercase();
        if bare.is_empty() || LEADING_CONNECTORS.contains(&bare.as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }

    let title = words.join(" ");
    let title = title.trim_end_matches(PUNCTUATION).trim();
    if title.is_empty() {
        text.to_string()
    } else {
        title.to_string()
    }
}

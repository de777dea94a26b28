//! Parser output: a reminder candidate awaiting confirmation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::recurrence::Recurrence;
use crate::reminder::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

/// Reasons a resolved time needs explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityFlag {
    /// Absolute date written without a year.
    MissingYear,
    /// Hour could be read as morning or evening.
    TimeAmbiguous,
    /// Resolved instant is already behind the reference time.
    PastDate,
    /// Local time skipped by a DST change; moved forward.
    NonexistentLocalTime,
}

/// Structured reminder candidate. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReminder {
    pub raw_text: String,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub timezone: Tz,
    pub confidence: Confidence,
    pub ambiguities: BTreeSet<AmbiguityFlag>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Further same-day slots for multi-time phrases ("alle 10, 13 e 19").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_times: Vec<DateTime<Utc>>,
}

impl ParsedReminder {
    pub fn is_confident(&self) -> bool {
        self.confidence == Confidence::High
    }

    pub fn local_due_at(&self) -> DateTime<Tz> {
        self.due_at.with_timezone(&self.timezone)
    }

    /// One candidate per fire time, each sharing title, category and recurrence.
    pub fn split_slots(&self) -> Vec<ParsedReminder> {
        let mut slots = Vec::with_capacity(1 + self.extra_times.len());
        let mut first = self.clone();
        first.extra_times.clear();
        slots.push(first);
        for due in &self.extra_times {
            let mut slot = self.clone();
            slot.due_at = *due;
            slot.extra_times.clear();
            slots.push(slot);
        }
        slots
    }
}

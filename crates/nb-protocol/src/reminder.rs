//! The persistent reminder entity and its lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parsed::ParsedReminder;
use crate::policy::NudgePolicy;
use crate::recurrence::Recurrence;

/// Follow-up nudges after the first delivery before a reminder expires.
pub const DEFAULT_MAX_NUDGES: u8 = 3;

/// Reminder identifier (UUIDv7, time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub Uuid);

impl ReminderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ReminderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where a reminder is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Waiting for `due_at`.
    Scheduled,
    /// First delivery claimed and in progress.
    Firing,
    /// Delivered, waiting for a response before nudge `level`.
    Nudging { level: u8 },
    /// Muted until `snooze_until`.
    Snoozed,
    Completed,
    Cancelled,
    Expired,
}

impl ReminderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReminderStatus::Completed | ReminderStatus::Cancelled | ReminderStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Firing => "firing",
            ReminderStatus::Nudging { .. } => "nudging",
            ReminderStatus::Snoozed => "snoozed",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Cancelled => "cancelled",
            ReminderStatus::Expired => "expired",
        }
    }

    pub fn nudge_level(&self) -> Option<u8> {
        match self {
            ReminderStatus::Nudging { level } => Some(*level),
            _ => None,
        }
    }

    /// Rebuild a status from its name and optional nudge level (storage columns).
    pub fn from_parts(name: &str, level: Option<u8>) -> Option<Self> {
        Some(match name {
            "scheduled" => ReminderStatus::Scheduled,
            "firing" => ReminderStatus::Firing,
            "nudging" => ReminderStatus::Nudging { level: level? },
            "snoozed" => ReminderStatus::Snoozed,
            "completed" => ReminderStatus::Completed,
            "cancelled" => ReminderStatus::Cancelled,
            "expired" => ReminderStatus::Expired,
            _ => return None,
        })
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Nudging { level } => write!(f, "nudging({level})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Display tag detected from the reminder text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Generic,
    Medicine,
    Birthday,
    Car,
    House,
    Health,
    Document,
    Habit,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Generic => "generic",
            Category::Medicine => "medicine",
            Category::Birthday => "birthday",
            Category::Car => "car",
            Category::House => "house",
            Category::Health => "health",
            Category::Document => "document",
            Category::Habit => "habit",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Category::Generic),
            "medicine" => Ok(Category::Medicine),
            "birthday" => Ok(Category::Birthday),
            "car" => Ok(Category::Car),
            "house" => Ok(Category::House),
            "health" => Ok(Category::Health),
            "document" => Ok(Category::Document),
            "habit" => Ok(Category::Habit),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Durable marker that a delivery attempt is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryClaim {
    pub attempt: u8,
    pub claimed_at: DateTime<Utc>,
}

/// A reminder as persisted by the store and driven by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    /// Opaque reference to the requesting user.
    pub owner_id: String,
    pub title: String,
    /// Instant of first delivery (UTC).
    pub due_at: DateTime<Utc>,
    /// Occurrence this cycle belongs to. Snoozing moves `due_at` but not this;
    /// recurring reminders step forward from it.
    pub series_due_at: DateTime<Utc>,
    /// IANA zone used for relative computations and display.
    pub timezone: Tz,
    pub status: ReminderStatus,
    /// Follow-up deliveries made since the first one.
    pub nudge_count: u8,
    pub max_nudges: u8,
    pub nudge_policy: NudgePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub snooze_count: u32,
    /// Next instant the scheduler must look at this reminder; `None` once terminal.
    pub next_check_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_delivered_at: Option<DateTime<Utc>>,
    /// Failed delivery attempts for the current attempt number.
    #[serde(default)]
    pub delivery_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<DeliveryClaim>,
    /// Optimistic-concurrency counter, bumped on every successful update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        due_at: DateTime<Utc>,
        timezone: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReminderId::new(),
            owner_id: owner_id.into(),
            title: title.into(),
            due_at,
            series_due_at: due_at,
            timezone,
            status: ReminderStatus::Scheduled,
            nudge_count: 0,
            max_nudges: DEFAULT_MAX_NUDGES,
            nudge_policy: NudgePolicy::standard(),
            snooze_until: None,
            category: Category::Generic,
            recurrence: Recurrence::Once,
            snooze_count: 0,
            next_check_at: Some(due_at),
            last_delivered_at: None,
            delivery_retries: 0,
            claim: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a reminder from a confirmed parse result.
    pub fn from_parsed(
        parsed: &ParsedReminder,
        owner_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(owner_id, &parsed.title, parsed.due_at, parsed.timezone, now)
            .with_category(parsed.category)
            .with_recurrence(parsed.recurrence)
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_policy(mut self, policy: NudgePolicy) -> Self {
        self.nudge_policy = policy;
        self
    }

    pub fn with_max_nudges(mut self, max_nudges: u8) -> Self {
        self.max_nudges = max_nudges;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `due_at` in the reminder's own zone.
    pub fn local_due_at(&self) -> DateTime<Tz> {
        self.due_at.with_timezone(&self.timezone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Reminder {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        Reminder::new("user-1", "comprare il latte", due, chrono_tz::Europe::Rome, now)
    }

    #[test]
    fn new_reminder_is_scheduled_at_due() {
        let r = sample();
        assert_eq!(r.status, ReminderStatus::Scheduled);
        assert_eq!(r.next_check_at, Some(r.due_at));
        assert_eq!(r.nudge_count, 0);
        assert_eq!(r.max_nudges, DEFAULT_MAX_NUDGES);
        assert_eq!(r.version, 0);
        assert_eq!(r.local_due_at().to_rfc3339(), "2024-03-02T10:00:00+01:00");
    }

    #[test]
    fn terminal_states() {
        assert!(ReminderStatus::Completed.is_terminal());
        assert!(ReminderStatus::Cancelled.is_terminal());
        assert!(ReminderStatus::Expired.is_terminal());
        assert!(!ReminderStatus::Snoozed.is_terminal());
        assert!(!ReminderStatus::Nudging { level: 3 }.is_terminal());
    }

    #[test]
    fn status_parts_roundtrip() {
        for status in [
            ReminderStatus::Scheduled,
            ReminderStatus::Firing,
            ReminderStatus::Nudging { level: 2 },
            ReminderStatus::Snoozed,
            ReminderStatus::Expired,
        ] {
            let rebuilt = ReminderStatus::from_parts(status.as_str(), status.nudge_level());
            assert_eq!(rebuilt, Some(status));
        }
        assert_eq!(ReminderStatus::from_parts("nudging", None), None);
        assert_eq!(ReminderStatus::from_parts("bogus", None), None);
    }

    #[test]
    fn status_serialization() {
        let json = serde_json::to_string(&ReminderStatus::Nudging { level: 2 }).unwrap();
        assert_eq!(json, r#"{"state":"nudging","level":2}"#);
        assert_eq!(ReminderStatus::Nudging { level: 2 }.to_string(), "nudging(2)");
    }

    #[test]
    fn reminder_json_keeps_timezone_name() {
        let r = sample();
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""timezone":"Europe/Rome""#));
        assert!(!json.contains("snooze_until"));
        let back: Reminder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn category_names() {
        assert_eq!("medicine".parse::<Category>(), Ok(Category::Medicine));
        assert_eq!(Category::Habit.as_str(), "habit");
        assert!("pizza".parse::<Category>().is_err());
    }

    #[test]
    fn reminder_id_parses() {
        let id = ReminderId::new();
        let parsed: ReminderId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}

//! Reminder state transitions.
//!
//! Everything here mutates a [`Reminder`] in place and touches neither the store
//! nor the notifier. The scheduler reads a reminder, applies one transition and
//! persists the result with a versioned update.
//!
//! ```text
//! Scheduled ─due─▶ Firing ─delivered─▶ Nudging(1) ─▶ … ─▶ Nudging(max) ─▶ Expired
//!     ▲                                     │
//!     └──────── Snoozed ◀── snooze ─────────┘        done/skip ─▶ Completed
//!                                                    cancel    ─▶ Cancelled
//! ```
//!
//! Recurring reminders never reach `Completed` or `Expired`: they roll over to
//! the next occurrence in `Scheduled`.

use chrono::{DateTime, Duration, Utc};

use nb_protocol::localtime::{local_date, localize};
use nb_protocol::{DeliveryClaim, LoggedAction, Reminder, ReminderStatus};

use crate::config::{QuietHours, RetryConfig};

/// A snooze warning is raised on every n-th snooze of the same occurrence.
pub const SNOOZE_WARNING_EVERY: u32 = 3;

/// What the scheduler should do with a reminder at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Next check lies in the future.
    NotDue,
    Terminal,
    /// Deliver this attempt (0 = first delivery, k = k-th nudge).
    Deliver { attempt: u8 },
    /// The last nudge window passed unanswered.
    Expire,
    /// The snooze elapsed.
    Wake,
    /// Inside quiet hours; look again at `until`.
    Defer { until: DateTime<Utc> },
}

pub fn next_step(reminder: &Reminder, now: DateTime<Utc>, quiet: Option<&QuietHours>) -> Step {
    if reminder.is_terminal() {
        return Step::Terminal;
    }
    let check_at = reminder.next_check_at.unwrap_or(reminder.due_at);
    if now < check_at {
        return Step::NotDue;
    }
    let attempt = match reminder.status {
        ReminderStatus::Snoozed => return Step::Wake,
        ReminderStatus::Scheduled | ReminderStatus::Firing => 0,
        ReminderStatus::Nudging { level } if level >= reminder.max_nudges => return Step::Expire,
        ReminderStatus::Nudging { level } => level,
        ReminderStatus::Completed | ReminderStatus::Cancelled | ReminderStatus::Expired => {
            return Step::Terminal;
        }
    };
    if let Some(until) = quiet.and_then(|q| q.deferral(now, reminder.timezone)) {
        return Step::Defer { until };
    }
    Step::Deliver { attempt }
}

// ── Delivery ────────────────────────────────────────────────────

/// Mark `attempt` as in flight. Persisted before the notifier is called.
pub fn claim(reminder: &mut Reminder, attempt: u8, now: DateTime<Utc>) {
    reminder.claim = Some(DeliveryClaim {
        attempt,
        claimed_at: now,
    });
    if attempt == 0 {
        reminder.status = ReminderStatus::Firing;
    }
    reminder.updated_at = now;
}

pub fn record_delivery(reminder: &mut Reminder, attempt: u8, now: DateTime<Utc>) {
    reminder.claim = None;
    reminder.delivery_retries = 0;
    reminder.last_delivered_at = Some(now);
    advance(reminder, attempt, now);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStep {
    /// Same attempt again at `at`.
    Retry { at: DateTime<Utc>, retry: u32 },
    /// Retries exhausted; moved on as if the attempt had been delivered.
    GaveUp,
}

pub fn record_failure(
    reminder: &mut Reminder,
    attempt: u8,
    now: DateTime<Utc>,
    retry: &RetryConfig,
) -> FailureStep {
    reminder.claim = None;
    reminder.delivery_retries += 1;
    if reminder.delivery_retries <= retry.max_retries {
        let at = now + retry.delay(reminder.delivery_retries);
        if attempt == 0 {
            reminder.status = ReminderStatus::Scheduled;
        }
        reminder.next_check_at = Some(at);
        reminder.updated_at = now;
        return FailureStep::Retry {
            at,
            retry: reminder.delivery_retries,
        };
    }
    reminder.delivery_retries = 0;
    advance(reminder, attempt, now);
    FailureStep::GaveUp
}

fn advance(reminder: &mut Reminder, attempt: u8, now: DateTime<Utc>) {
    let level = attempt.saturating_add(1);
    reminder.nudge_count = attempt;
    reminder.status = ReminderStatus::Nudging { level };
    reminder.next_check_at = Some(now + reminder.nudge_policy.interval(level));
    reminder.updated_at = now;
}

// ── Timed transitions ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Expired,
    RolledOver { next: DateTime<Utc> },
}

pub fn expire(reminder: &mut Reminder, now: DateTime<Utc>) -> Expiry {
    match next_occurrence(reminder, now) {
        Some(next) => {
            roll_over(reminder, next, now);
            Expiry::RolledOver { next }
        }
        None => {
            finish(reminder, ReminderStatus::Expired, now);
            Expiry::Expired
        }
    }
}

/// Snoozed → Scheduled, due at the end of the snooze.
pub fn wake(reminder: &mut Reminder, now: DateTime<Utc>) {
    let due = reminder.snooze_until.unwrap_or(now);
    reminder.status = ReminderStatus::Scheduled;
    reminder.due_at = due;
    reminder.next_check_at = Some(due);
    reminder.snooze_until = None;
    reminder.nudge_count = 0;
    reminder.delivery_retries = 0;
    reminder.updated_at = now;
}

pub fn defer(reminder: &mut Reminder, until: DateTime<Utc>, now: DateTime<Utc>) {
    reminder.next_check_at = Some(until);
    reminder.updated_at = now;
}

// ── User signals ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Done,
    Skip,
    Cancel,
    Snooze(Duration),
    /// Snooze until the reminder's local time of day, tomorrow.
    Tomorrow,
    /// Part of a global mute. Does not count towards snooze warnings.
    MuteUntil(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalOutcome {
    /// False when the reminder was already terminal or the signal was void.
    pub applied: bool,
    /// Status after the signal.
    pub status: ReminderStatus,
    pub logged: Option<LoggedAction>,
    pub snooze_warning: bool,
    /// Next occurrence, when a recurring reminder rolled over.
    pub next_due: Option<DateTime<Utc>>,
}

impl SignalOutcome {
    fn ignored(status: ReminderStatus) -> Self {
        Self {
            applied: false,
            status,
            logged: None,
            snooze_warning: false,
            next_due: None,
        }
    }
}

/// Apply a user signal. Signals on terminal reminders are no-ops.
pub fn apply_signal(reminder: &mut Reminder, signal: Signal, now: DateTime<Utc>) -> SignalOutcome {
    if reminder.is_terminal() {
        return SignalOutcome::ignored(reminder.status);
    }
    let mut outcome = SignalOutcome::ignored(reminder.status);
    match signal {
        Signal::Done => {
            outcome.logged = Some(LoggedAction::Done);
            outcome.next_due = close_occurrence(reminder, now);
        }
        Signal::Skip => {
            outcome.logged = Some(LoggedAction::Skipped);
            outcome.next_due = close_occurrence(reminder, now);
        }
        Signal::Cancel => {
            outcome.logged = Some(LoggedAction::Cancelled);
            finish(reminder, ReminderStatus::Cancelled, now);
        }
        Signal::Snooze(duration) => {
            if duration <= Duration::zero() {
                return outcome;
            }
            let Some(until) = now.checked_add_signed(duration) else {
                return outcome;
            };
            outcome.snooze_warning = counted_snooze(reminder, until, now);
            outcome.logged = Some(LoggedAction::Snoozed);
        }
        Signal::Tomorrow => {
            let Some(until) = tomorrow_at(reminder, now) else {
                return outcome;
            };
            outcome.snooze_warning = counted_snooze(reminder, until, now);
            outcome.logged = Some(LoggedAction::Snoozed);
        }
        Signal::MuteUntil(until) => {
            if until <= now {
                return outcome;
            }
            snooze(reminder, until, now);
            outcome.logged = Some(LoggedAction::Snoozed);
        }
    }
    outcome.applied = true;
    outcome.status = reminder.status;
    outcome
}

/// The reminder's local time of day on the day after `now`.
pub fn tomorrow_at(reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = reminder
        .series_due_at
        .with_timezone(&reminder.timezone)
        .time();
    let date = local_date(now, reminder.timezone).succ_opt()?;
    localize(reminder.timezone, date.and_time(time)).map(|l| l.instant)
}

fn counted_snooze(reminder: &mut Reminder, until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    snooze(reminder, until, now);
    reminder.snooze_count += 1;
    reminder.snooze_count % SNOOZE_WARNING_EVERY == 0
}

fn snooze(reminder: &mut Reminder, until: DateTime<Utc>, now: DateTime<Utc>) {
    reminder.status = ReminderStatus::Snoozed;
    reminder.snooze_until = Some(until);
    reminder.next_check_at = Some(until);
    reminder.claim = None;
    reminder.delivery_retries = 0;
    reminder.updated_at = now;
}

/// Done or skipped: recurring reminders move on, one-shots complete.
fn close_occurrence(reminder: &mut Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match next_occurrence(reminder, now) {
        Some(next) => {
            roll_over(reminder, next, now);
            Some(next)
        }
        None => {
            finish(reminder, ReminderStatus::Completed, now);
            None
        }
    }
}

fn next_occurrence(reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    reminder
        .recurrence
        .next_after(reminder.series_due_at, reminder.timezone, now)
}

fn roll_over(reminder: &mut Reminder, next: DateTime<Utc>, now: DateTime<Utc>) {
    reminder.status = ReminderStatus::Scheduled;
    reminder.due_at = next;
    reminder.series_due_at = next;
    reminder.next_check_at = Some(next);
    reminder.nudge_count = 0;
    reminder.snooze_until = None;
    reminder.snooze_count = 0;
    reminder.delivery_retries = 0;
    reminder.claim = None;
    reminder.updated_at = now;
}

fn finish(reminder: &mut Reminder, status: ReminderStatus, now: DateTime<Utc>) {
    reminder.status = status;
    reminder.next_check_at = None;
    reminder.snooze_until = None;
    reminder.claim = None;
    reminder.updated_at = now;
}

//! Maps inbound user events to lifecycle signals.
//!
//! Text commands:
//!
//! | text                           | action                          |
//! |--------------------------------|---------------------------------|
//! | `fatto`, `fatta`, `done`       | complete latest                 |
//! | `cancella`, `annulla`, `cancel`| cancel latest                   |
//! | `salta`, `skip`                | skip latest                     |
//! | `rimanda <dur>`, `snooze <dur>`| snooze latest                   |
//! | `silenzio <dur>`, `mute <dur>` | mute every reminder of the owner|
//!
//! A leading `/` is accepted. Button payloads are `<action>:<reminder id>`, with
//! `snooze:<dur>:<id>` and `silenzio:<dur>:<id>` carrying a duration.
//!
//! "Latest" is the owner's active reminder delivered most recently.

use std::sync::Arc;

use chrono::Duration;

use nb_parser::parse_duration;
use nb_protocol::{InboundEvent, InboundKind, ReminderId};

use crate::error::{DispatchError, SchedulerError};
use crate::lifecycle::SignalOutcome;
use crate::scheduler::EscalationScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Reminder(ReminderId),
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Done(Target),
    Cancel(Target),
    Skip(Target),
    Tomorrow(Target),
    Snooze { target: Target, duration: Duration },
    SnoozeAll { duration: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Signalled {
        id: ReminderId,
        outcome: SignalOutcome,
    },
    Muted {
        ids: Vec<ReminderId>,
        duration: Duration,
    },
}

pub struct CommandDispatcher {
    scheduler: Arc<EscalationScheduler>,
}

impl CommandDispatcher {
    pub fn new(scheduler: Arc<EscalationScheduler>) -> Self {
        Self { scheduler }
    }

    /// Decode an event without touching any reminder.
    pub fn classify(event: &InboundEvent) -> Result<Action, DispatchError> {
        match &event.kind {
            InboundKind::Text(text) => classify_text(text),
            InboundKind::Button(payload) => classify_button(payload),
        }
    }

    pub async fn dispatch(&self, event: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        let action = Self::classify(event)?;
        tracing::debug!(owner_id = %event.owner_id, ?action, "dispatching");
        let owner = event.owner_id.as_str();

        let (target, verb) = match action {
            Action::SnoozeAll { duration } => {
                let ids = self.scheduler.snooze_all(owner, duration).await?;
                return Ok(DispatchOutcome::Muted { ids, duration });
            }
            Action::Done(target) => (target, Verb::Done),
            Action::Cancel(target) => (target, Verb::Cancel),
            Action::Skip(target) => (target, Verb::Skip),
            Action::Tomorrow(target) => (target, Verb::Tomorrow),
            Action::Snooze { target, duration } => (target, Verb::Snooze(duration)),
        };

        let id = self.resolve(owner, target).await?;
        let outcome = match verb {
            Verb::Done => self.scheduler.complete(id).await?,
            Verb::Cancel => self.scheduler.cancel(id).await?,
            Verb::Skip => self.scheduler.skip(id).await?,
            Verb::Tomorrow => self.scheduler.postpone_to_tomorrow(id).await?,
            Verb::Snooze(duration) => self.scheduler.snooze_one(id, duration).await?,
        };
        Ok(DispatchOutcome::Signalled { id, outcome })
    }

    async fn resolve(&self, owner: &str, target: Target) -> Result<ReminderId, DispatchError> {
        match target {
            Target::Reminder(id) => {
                // Someone else's id behaves exactly like an unknown one.
                let reminder = self.scheduler.get(id).await?;
                if reminder.owner_id != owner {
                    return Err(SchedulerError::NotFound(id).into());
                }
                Ok(id)
            }
            Target::Latest => self
                .scheduler
                .latest_delivered(owner)
                .await?
                .map(|r| r.id)
                .ok_or_else(|| DispatchError::NoActiveReminder(owner.to_string())),
        }
    }
}

enum Verb {
    Done,
    Cancel,
    Skip,
    Tomorrow,
    Snooze(Duration),
}

fn classify_text(text: &str) -> Result<Action, DispatchError> {
    let normalized = text.trim().trim_start_matches('/').to_lowercase();
    let (command, rest) = match normalized.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (normalized.as_str(), ""),
    };
    let unknown = || DispatchError::UnknownAction(text.trim().to_string());

    let action = match command {
        "fatto" | "fatta" | "done" if rest.is_empty() => Action::Done(Target::Latest),
        "cancella" | "annulla" | "cancel" if rest.is_empty() => Action::Cancel(Target::Latest),
        "salta" | "skip" if rest.is_empty() => Action::Skip(Target::Latest),
        "rimanda" | "snooze" => Action::Snooze {
            target: Target::Latest,
            duration: duration_arg(rest)?,
        },
        "silenzio" | "mute" => Action::SnoozeAll {
            duration: duration_arg(rest)?,
        },
        _ => return Err(unknown()),
    };
    Ok(action)
}

fn classify_button(payload: &str) -> Result<Action, DispatchError> {
    let unknown = || DispatchError::UnknownAction(payload.to_string());
    let (head, id) = payload.trim().rsplit_once(':').ok_or_else(unknown)?;
    let id: ReminderId = id.parse().map_err(|_| unknown())?;
    let target = Target::Reminder(id);

    let action = match head {
        "done" => Action::Done(target),
        "cancel" => Action::Cancel(target),
        "skip" => Action::Skip(target),
        "tomorrow" => Action::Tomorrow(target),
        "snooze30" => Action::Snooze {
            target,
            duration: Duration::minutes(30),
        },
        "snooze60" => Action::Snooze {
            target,
            duration: Duration::minutes(60),
        },
        "snooze_week" => Action::Snooze {
            target,
            duration: Duration::days(7),
        },
        other => match other.split_once(':') {
            Some(("snooze" | "silenzio", duration)) => Action::Snooze {
                target,
                duration: duration_arg(duration)?,
            },
            _ => return Err(unknown()),
        },
    };
    Ok(action)
}

fn duration_arg(text: &str) -> Result<Duration, DispatchError> {
    parse_duration(text)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| DispatchError::InvalidDuration(text.to_string()))
}

//! Escalation scheduler.
//!
//! Owns the reminder lifecycle: finds due reminders, delivers them, follows up
//! with nudges per policy and applies user signals. The store is the source of
//! truth; the in-memory [`DueQueue`] only decides when to look again.
//!
//! Delivery is at-most-once per attempt:
//! - within one process, a per-reminder lock serialises claim, delivery and
//!   bookkeeping;
//! - across processes, the claim is a versioned update, so only one writer wins.
//!
//! Signals never take the lock. They read, transform and write back with the
//! version check, retrying on conflict, so a "done" arriving while a nudge is in
//! flight is never lost and no further nudge is scheduled after it.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinSet;

use nb_notify::{NotifyError, Notifier};
use nb_protocol::{
    ActionLogEntry, LoggedAction, ParsedReminder, Reminder, ReminderId, ReminderStatus,
};
use nb_store::{ReminderStore, StoreError};

use crate::clock::Clock;
use crate::config::{NudgeConfig, SchedulerConfig};
use crate::error::{SchedulerError, SchedulerResult};
use crate::lifecycle::{self, Expiry, FailureStep, Signal, SignalOutcome, Step};
use crate::locks::KeyedLocks;
use crate::queue::DueQueue;

/// Transitions one reminder may go through inside a single check.
const MAX_STEPS: usize = 4;

/// Read-modify-write attempts before a signal gives up.
const MAX_SIGNAL_ATTEMPTS: usize = 8;

/// What happened to one reminder during a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Delivered { attempt: u8 },
    RetryScheduled { attempt: u8, at: DateTime<Utc> },
    /// Retries exhausted for `attempt`; escalation moved on anyway.
    GaveUp { attempt: u8 },
    Expired,
    RolledOver { next: DateTime<Utc> },
    Woke,
    Deferred { until: DateTime<Utc> },
    /// A signal landed while the delivery was in flight.
    Superseded,
    /// Another worker holds the reminder.
    Busy,
}

/// Outcome of one [`EscalationScheduler::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub examined: usize,
    pub delivered: usize,
    pub retries: usize,
    pub expired: usize,
    pub rolled_over: usize,
    pub busy: usize,
    /// Reminders whose check failed; the rest of the tick still ran.
    pub errors: usize,
}

impl TickReport {
    fn record(&mut self, progress: &Progress) {
        match progress {
            Progress::Delivered { .. } => self.delivered += 1,
            Progress::RetryScheduled { .. } => self.retries += 1,
            Progress::Expired => self.expired += 1,
            Progress::RolledOver { .. } => self.rolled_over += 1,
            Progress::Busy => self.busy += 1,
            Progress::GaveUp { .. }
            | Progress::Woke
            | Progress::Deferred { .. }
            | Progress::Superseded => {}
        }
    }
}

pub struct EscalationScheduler {
    clock: Arc<dyn Clock>,
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    nudges: NudgeConfig,
    locks: KeyedLocks,
    queue: Mutex<DueQueue>,
}

impl EscalationScheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
        nudges: NudgeConfig,
    ) -> SchedulerResult<Self> {
        nudges.validate()?;
        Ok(Self {
            clock,
            store,
            notifier,
            config,
            nudges,
            locks: KeyedLocks::new(),
            queue: Mutex::new(DueQueue::new()),
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn get(&self, id: ReminderId) -> SchedulerResult<Reminder> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> SchedulerResult<Vec<Reminder>> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    // ── Creation ────────────────────────────────────────────────

    /// Persist one reminder per slot of `parsed`.
    ///
    /// Low-confidence parses are refused unless the user confirmed them.
    pub async fn create(
        &self,
        parsed: &ParsedReminder,
        owner_id: &str,
        confirmed: bool,
    ) -> SchedulerResult<Vec<Reminder>> {
        if !parsed.is_confident() && !confirmed {
            return Err(SchedulerError::LowConfidenceParse(
                parsed.ambiguities.iter().copied().collect(),
            ));
        }
        let now = self.clock.now();
        let policy = self.nudges.policy_for(parsed.category)?;
        let mut created = Vec::new();
        for slot in parsed.split_slots() {
            let reminder = Reminder::from_parsed(&slot, owner_id, now)
                .with_policy(policy.clone())
                .with_max_nudges(self.config.max_nudges);
            created.push(self.schedule(reminder).await?);
        }
        Ok(created)
    }

    /// Persist an already-built reminder and queue its first check.
    pub async fn schedule(&self, reminder: Reminder) -> SchedulerResult<Reminder> {
        self.store.create(reminder.clone()).await?;
        tracing::info!(
            reminder_id = %reminder.id,
            owner_id = %reminder.owner_id,
            due_at = %reminder.due_at,
            category = reminder.category.as_str(),
            "reminder scheduled"
        );
        self.enqueue(&reminder);
        Ok(reminder)
    }

    // ── Escalation ──────────────────────────────────────────────

    /// Check every reminder due at the current clock instant.
    ///
    /// Reminders are processed concurrently; a failure on one is logged and
    /// counted without affecting the others.
    pub async fn tick(self: &Arc<Self>) -> SchedulerResult<TickReport> {
        let now = self.clock.now();
        let mut ids: BTreeSet<ReminderId> = self.pop_queue(now);
        for reminder in self.store.list_due(now).await? {
            ids.insert(reminder.id);
        }

        let mut report = TickReport {
            examined: ids.len(),
            ..TickReport::default()
        };
        let mut tasks = JoinSet::new();
        for id in ids {
            let this = Arc::clone(self);
            tasks.spawn(async move { (id, this.check(id).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(progress))) => progress.iter().for_each(|p| report.record(p)),
                Ok((id, Err(e))) => {
                    tracing::warn!(reminder_id = %id, error = %e, "reminder check failed");
                    report.errors += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "reminder check task panicked");
                    report.errors += 1;
                }
            }
        }
        self.locks.prune();

        if report.examined > 0 {
            tracing::debug!(
                examined = report.examined,
                delivered = report.delivered,
                expired = report.expired,
                errors = report.errors,
                "tick complete"
            );
        }
        Ok(report)
    }

    /// Drive one reminder as far as it can go at the current instant.
    pub async fn check(&self, id: ReminderId) -> SchedulerResult<Vec<Progress>> {
        let Some(_guard) = self.locks.try_lock(id) else {
            return Ok(vec![Progress::Busy]);
        };

        let mut progress = Vec::new();
        for _ in 0..MAX_STEPS {
            let mut reminder = match self.store.get(id).await {
                Ok(r) => r,
                Err(StoreError::NotFound(_)) => return Ok(progress),
                Err(e) => return Err(e.into()),
            };
            let now = self.clock.now();

            if let Some(claim) = reminder.claim {
                if now < claim.claimed_at + self.config.claim_ttl() {
                    progress.push(Progress::Busy);
                    return Ok(progress);
                }
                tracing::warn!(
                    reminder_id = %id,
                    attempt = claim.attempt,
                    claimed_at = %claim.claimed_at,
                    "recovering abandoned delivery claim"
                );
                reminder.claim = None;
            }

            let step = lifecycle::next_step(&reminder, now, self.config.quiet_hours.as_ref());
            let made = match step {
                Step::NotDue | Step::Terminal => {
                    self.enqueue(&reminder);
                    return Ok(progress);
                }
                Step::Deliver { attempt } => {
                    progress.push(self.deliver(reminder, attempt).await?);
                    return Ok(progress);
                }
                Step::Wake => {
                    lifecycle::wake(&mut reminder, now);
                    Progress::Woke
                }
                Step::Defer { until } => {
                    lifecycle::defer(&mut reminder, until, now);
                    Progress::Deferred { until }
                }
                Step::Expire => match lifecycle::expire(&mut reminder, now) {
                    Expiry::Expired => Progress::Expired,
                    Expiry::RolledOver { next } => Progress::RolledOver { next },
                },
            };

            match self.store.update(&reminder).await {
                Ok(stored) => {
                    self.after_step(&stored, &made, now).await;
                    progress.push(made);
                    if matches!(made, Progress::Deferred { .. }) {
                        return Ok(progress);
                    }
                }
                // A signal got there first; look again.
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(progress)
    }

    async fn after_step(&self, stored: &Reminder, made: &Progress, now: DateTime<Utc>) {
        self.enqueue(stored);
        match made {
            Progress::Expired => {
                tracing::info!(reminder_id = %stored.id, "reminder expired unanswered");
                self.log_action(stored, LoggedAction::Expired, now).await;
            }
            Progress::RolledOver { next } => {
                tracing::info!(reminder_id = %stored.id, next = %next, "unanswered occurrence rolled over");
                self.log_action(stored, LoggedAction::Expired, now).await;
            }
            Progress::Woke => {
                tracing::debug!(reminder_id = %stored.id, "snooze elapsed");
            }
            Progress::Deferred { until } => {
                tracing::debug!(reminder_id = %stored.id, until = %until, "quiet hours, delivery deferred");
            }
            _ => {}
        }
    }

    /// Claim, deliver and record one attempt. Caller holds the reminder lock.
    async fn deliver(&self, mut reminder: Reminder, attempt: u8) -> SchedulerResult<Progress> {
        let id = reminder.id;
        let claimed_at = self.clock.now();
        lifecycle::claim(&mut reminder, attempt, claimed_at);
        let claimed = match self.store.update(&reminder).await {
            Ok(stored) => stored,
            Err(e) if e.is_conflict() => return Ok(Progress::Busy),
            Err(e) => return Err(e.into()),
        };

        let timeout = self.config.delivery_timeout();
        let result = match tokio::time::timeout(timeout, self.notifier.deliver(&claimed, attempt)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        // Compare against the stored copy; backends may round timestamps.
        let ours = claimed.claim;
        let mut current = claimed;
        for _ in 0..MAX_SIGNAL_ATTEMPTS {
            // Any signal clears the claim; if ours is gone the user already answered.
            if current.claim != ours {
                tracing::info!(
                    reminder_id = %id,
                    attempt,
                    status = %current.status,
                    "reminder changed during delivery, no further nudge"
                );
                return Ok(Progress::Superseded);
            }

            let now = self.clock.now();
            let progress = match &result {
                Ok(()) => {
                    lifecycle::record_delivery(&mut current, attempt, now);
                    Progress::Delivered { attempt }
                }
                Err(e) => match lifecycle::record_failure(&mut current, attempt, now, &self.config.retry) {
                    FailureStep::Retry { at, retry } => {
                        tracing::warn!(reminder_id = %id, attempt, retry, error = %e, "delivery failed, will retry");
                        Progress::RetryScheduled { attempt, at }
                    }
                    FailureStep::GaveUp => {
                        tracing::warn!(reminder_id = %id, attempt, error = %e, "delivery retries exhausted, moving on");
                        Progress::GaveUp { attempt }
                    }
                },
            };

            match self.store.update(&current).await {
                Ok(stored) => {
                    if let Progress::Delivered { .. } = progress {
                        tracing::info!(
                            reminder_id = %id,
                            owner_id = %stored.owner_id,
                            attempt,
                            next_check_at = ?stored.next_check_at,
                            "reminder delivered"
                        );
                    }
                    self.enqueue(&stored);
                    return Ok(progress);
                }
                Err(e) if e.is_conflict() => {
                    current = self.store.get(id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SchedulerError::Contention(id))
    }

    // ── Signals ─────────────────────────────────────────────────

    pub async fn complete(&self, id: ReminderId) -> SchedulerResult<SignalOutcome> {
        self.signal(id, Signal::Done).await
    }

    pub async fn cancel(&self, id: ReminderId) -> SchedulerResult<SignalOutcome> {
        self.signal(id, Signal::Cancel).await
    }

    pub async fn skip(&self, id: ReminderId) -> SchedulerResult<SignalOutcome> {
        self.signal(id, Signal::Skip).await
    }

    pub async fn snooze_one(&self, id: ReminderId, duration: Duration) -> SchedulerResult<SignalOutcome> {
        self.snooze_end(duration)?;
        self.signal(id, Signal::Snooze(duration)).await
    }

    pub async fn postpone_to_tomorrow(&self, id: ReminderId) -> SchedulerResult<SignalOutcome> {
        self.signal(id, Signal::Tomorrow).await
    }

    /// Mute every active reminder of `owner_id` that would otherwise act within
    /// `duration`. Returns the ids that were muted.
    pub async fn snooze_all(&self, owner_id: &str, duration: Duration) -> SchedulerResult<Vec<ReminderId>> {
        let until = self.snooze_end(duration)?;
        let mut muted = Vec::new();
        for reminder in self.store.list_by_owner(owner_id).await? {
            if reminder.is_terminal() || reminder.next_check_at.is_none_or(|at| at >= until) {
                continue;
            }
            match self.signal(reminder.id, Signal::MuteUntil(until)).await {
                Ok(outcome) if outcome.applied => muted.push(reminder.id),
                Ok(_) => {}
                Err(SchedulerError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(owner_id, until = %until, muted = muted.len(), "owner muted");
        Ok(muted)
    }

    /// The owner's active reminder delivered most recently.
    pub async fn latest_delivered(&self, owner_id: &str) -> SchedulerResult<Option<Reminder>> {
        let reminders = self.store.list_by_owner(owner_id).await?;
        Ok(reminders
            .into_iter()
            .filter(|r| !r.is_terminal() && r.last_delivered_at.is_some())
            .max_by_key(|r| (r.last_delivered_at, r.id)))
    }

    /// `now + duration`, provided the duration is positive and the instant representable.
    fn snooze_end(&self, duration: Duration) -> SchedulerResult<DateTime<Utc>> {
        if duration <= Duration::zero() {
            return Err(SchedulerError::InvalidDuration);
        }
        self.clock
            .now()
            .checked_add_signed(duration)
            .ok_or(SchedulerError::InvalidDuration)
    }

    async fn signal(&self, id: ReminderId, signal: Signal) -> SchedulerResult<SignalOutcome> {
        for _ in 0..MAX_SIGNAL_ATTEMPTS {
            let mut reminder = self.store.get(id).await?;
            let now = self.clock.now();
            let outcome = lifecycle::apply_signal(&mut reminder, signal, now);
            if !outcome.applied {
                tracing::debug!(reminder_id = %id, status = %reminder.status, ?signal, "signal ignored");
                return Ok(outcome);
            }
            match self.store.update(&reminder).await {
                Ok(stored) => {
                    tracing::info!(
                        reminder_id = %id,
                        owner_id = %stored.owner_id,
                        ?signal,
                        status = %stored.status,
                        "signal applied"
                    );
                    if outcome.snooze_warning {
                        tracing::info!(
                            reminder_id = %id,
                            snooze_count = stored.snooze_count,
                            "reminder snoozed repeatedly"
                        );
                    }
                    if let Some(action) = outcome.logged {
                        self.log_action(&stored, action, now).await;
                    }
                    self.enqueue(&stored);
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(reminder_id = %id, ?signal, "concurrent update, retrying signal");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SchedulerError::Contention(id))
    }

    // ── Loop ────────────────────────────────────────────────────

    /// Load every active reminder due within the next tick into the queue.
    pub async fn resync(&self) -> SchedulerResult<usize> {
        let horizon = self.clock.now() + Duration::seconds(self.tick_secs());
        let due = self.store.list_due(horizon).await?;
        for reminder in &due {
            self.enqueue(reminder);
        }
        Ok(due.len())
    }

    /// Tick forever. Sleeps until the next queued check or the tick interval,
    /// whichever is sooner.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let interval = std::time::Duration::from_secs(self.config.tick_interval_secs.max(1));
        tracing::info!(interval_secs = interval.as_secs(), "escalation scheduler started");
        loop {
            let wait = self.next_queued().map_or(interval, |at| {
                (at - self.clock.now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO)
                    .min(interval)
            });
            tokio::time::sleep(wait).await;

            if let Err(e) = self.tick().await {
                tracing::warn!(error = %e, "scheduler tick failed");
            }
        }
    }

    pub fn next_queued(&self) -> Option<DateTime<Utc>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).next_at()
    }

    fn tick_secs(&self) -> i64 {
        i64::try_from(self.config.tick_interval_secs).unwrap_or(i64::MAX / 1_000)
    }

    fn pop_queue(&self, now: DateTime<Utc>) -> BTreeSet<ReminderId> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_due(now)
    }

    fn enqueue(&self, reminder: &Reminder) {
        if reminder.is_terminal() {
            return;
        }
        if let Some(at) = reminder.next_check_at {
            self.queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(at, reminder.id);
        }
    }

    async fn log_action(&self, reminder: &Reminder, action: LoggedAction, now: DateTime<Utc>) {
        let entry = ActionLogEntry::new(reminder.id, reminder.owner_id.clone(), action, now);
        if let Err(e) = self.store.record_action(entry).await {
            tracing::warn!(reminder_id = %reminder.id, error = %e, "failed to record action");
        }
    }
}

/// Whether a status still expects a user answer.
pub fn awaiting_answer(status: ReminderStatus) -> bool {
    matches!(status, ReminderStatus::Firing | ReminderStatus::Nudging { .. })
}
